use crate::events::{DeliveryStatus, DomainEvent, EventPayload};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryView {
    pub item_name: String,
    pub status: DeliveryStatus,
    pub delay_minutes: u32,
    pub updated_at: NaiveDateTime,
}

impl DeliveryView {
    /// Still on its way and running late.
    pub fn is_delayed(&self) -> bool {
        self.delay_minutes > 0
            && matches!(
                self.status,
                DeliveryStatus::Scheduled | DeliveryStatus::InTransit
            )
    }
}

/// Latest delivery status per item for a day, by item name.
pub fn latest_deliveries(
    events: &[DomainEvent],
    store_id: &str,
    date: NaiveDate,
) -> Vec<DeliveryView> {
    let mut latest: BTreeMap<&str, DeliveryView> = BTreeMap::new();
    for ev in events {
        if ev.store_id != store_id || ev.date() != date {
            continue;
        }
        if let EventPayload::Delivery {
            item_name,
            status,
            delay_minutes,
        } = &ev.payload
        {
            latest.insert(
                item_name.as_str(),
                DeliveryView {
                    item_name: item_name.clone(),
                    status: *status,
                    delay_minutes: *delay_minutes,
                    updated_at: ev.ts,
                },
            );
        }
    }
    latest.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{NewEvent, log::EventLog};

    #[test]
    fn delivered_items_are_no_longer_delayed() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let at = |h| date.and_hms_opt(h, 0, 0).unwrap();
        let delivery = |h, item: &str, status, delay| {
            NewEvent::new(
                "s1",
                at(h),
                EventPayload::Delivery {
                    item_name: item.to_string(),
                    status,
                    delay_minutes: delay,
                },
            )
        };
        let mut log = EventLog::new();
        log.append(delivery(9, "fish", DeliveryStatus::InTransit, 20)).unwrap();
        log.append(delivery(10, "fish", DeliveryStatus::Delivered, 20)).unwrap();
        log.append(delivery(10, "tofu", DeliveryStatus::Scheduled, 45)).unwrap();
        let views = latest_deliveries(log.events(), "s1", date);
        assert_eq!(views.len(), 2);
        assert!(!views[0].is_delayed());
        assert!(views[1].is_delayed());
    }
}
