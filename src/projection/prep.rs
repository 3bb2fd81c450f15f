use crate::events::{DomainEvent, EventPayload, PrepStatus};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrepMetrics {
    pub date: NaiveDate,
    pub planned: u32,
    pub started: u32,
    pub completed: u32,
    pub cancelled: u32,
    pub completion_rate: f64,
    /// Prep items with a batch still planned or started.
    pub outstanding_items: Vec<String>,
}

impl PrepMetrics {
    pub fn tracked(&self) -> u32 {
        self.planned + self.started + self.completed
    }
}

/// Latest status per `(prep item, batch)` in log order.
pub fn prep_metrics(events: &[DomainEvent], store_id: &str, date: NaiveDate) -> PrepMetrics {
    let mut latest: BTreeMap<(&str, &str), PrepStatus> = BTreeMap::new();
    for ev in events {
        if ev.store_id != store_id || ev.date() != date {
            continue;
        }
        if let EventPayload::Prep {
            prep_item_id,
            batch_id,
            status,
            ..
        } = &ev.payload
        {
            latest.insert(
                (prep_item_id.as_str(), batch_id.as_deref().unwrap_or("-")),
                *status,
            );
        }
    }

    let mut metrics = PrepMetrics {
        date,
        planned: 0,
        started: 0,
        completed: 0,
        cancelled: 0,
        completion_rate: 0.0,
        outstanding_items: Vec::new(),
    };
    let mut outstanding = BTreeSet::new();
    for ((item, _), status) in latest {
        match status {
            PrepStatus::Planned => {
                metrics.planned += 1;
                outstanding.insert(item);
            }
            PrepStatus::Started => {
                metrics.started += 1;
                outstanding.insert(item);
            }
            PrepStatus::Completed => metrics.completed += 1,
            PrepStatus::Cancelled => metrics.cancelled += 1,
        }
    }
    let tracked = metrics.tracked();
    if tracked > 0 {
        metrics.completion_rate = metrics.completed as f64 * 100.0 / tracked as f64;
    }
    metrics.outstanding_items = outstanding.into_iter().map(str::to_string).collect();
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{NewEvent, log::EventLog};

    fn prep(item: &str, batch: Option<&str>, status: PrepStatus, h: u32) -> NewEvent {
        let ts = NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap();
        NewEvent::new(
            "s1",
            ts,
            EventPayload::Prep {
                prep_item_id: item.to_string(),
                batch_id: batch.map(str::to_string),
                quantity: 10,
                status,
                proposal_id: None,
            },
        )
    }

    #[test]
    fn completion_rate_uses_latest_status_per_batch() {
        let mut log = EventLog::new();
        log.append(prep("rice", Some("b1"), PrepStatus::Planned, 8)).unwrap();
        log.append(prep("rice", Some("b1"), PrepStatus::Completed, 9)).unwrap();
        log.append(prep("rice", Some("b2"), PrepStatus::Started, 9)).unwrap();
        log.append(prep("broth", None, PrepStatus::Planned, 8)).unwrap();
        log.append(prep("salad", None, PrepStatus::Cancelled, 8)).unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let m = prep_metrics(log.events(), "s1", date);
        assert_eq!((m.planned, m.started, m.completed, m.cancelled), (1, 1, 1, 1));
        assert!((m.completion_rate - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(m.outstanding_items, vec!["broth", "rice"]);
    }

    #[test]
    fn empty_day_has_zero_rate() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let m = prep_metrics(&[], "s1", date);
        assert_eq!(m.completion_rate, 0.0);
        assert!(m.outstanding_items.is_empty());
    }
}
