//! Demo day used by `seed` and the default replay batch.

use crate::config::CockpitConfig;
use crate::events::{DeliveryStatus, EventPayload, LaborAction, NewEvent, PrepStatus};
use crate::time::TimeBand;
use chrono::{Duration, NaiveDate, NaiveDateTime};

const MENUS: [(&str, f64); 4] = [
    ("teishoku-a", 1_200.0),
    ("teishoku-b", 1_450.0),
    ("ramen", 980.0),
    ("donburi", 1_100.0),
];

fn at(date: NaiveDate, h: u32, m: u32) -> NaiveDateTime {
    date.and_hms_opt(h, m, 0)
        .unwrap_or_else(|| date.and_time(chrono::NaiveTime::MIN))
}

fn prep(store_id: &str, ts: NaiveDateTime, item: &str, batch: &str, status: PrepStatus) -> NewEvent {
    NewEvent::new(
        store_id,
        ts,
        EventPayload::Prep {
            prep_item_id: item.to_string(),
            batch_id: Some(batch.to_string()),
            quantity: 20,
            status,
            proposal_id: None,
        },
    )
}

fn delivery(store_id: &str, ts: NaiveDateTime, item: &str, status: DeliveryStatus, delay: u32) -> NewEvent {
    NewEvent::new(
        store_id,
        ts,
        EventPayload::Delivery {
            item_name: item.to_string(),
            status,
            delay_minutes: delay,
        },
    )
}

/// A plausible business day up to `now`: forecasts for every band, the
/// roster checking in, prep, a late delivery and steady sales.
pub fn seed_events(
    config: &CockpitConfig,
    store_id: &str,
    date: NaiveDate,
    now: NaiveDateTime,
) -> Vec<NewEvent> {
    let planned_at = at(date, 8, 0).min(now);
    let mut events = vec![
        NewEvent::forecast(store_id, planned_at, date, TimeBand::Lunch, 60_000.0, 50),
        NewEvent::forecast(store_id, planned_at, date, TimeBand::Idle, 15_000.0, 15),
        NewEvent::forecast(store_id, planned_at, date, TimeBand::Dinner, 90_000.0, 60),
    ];

    let mut timeline = Vec::new();
    for (i, staff) in config.staff.iter().enumerate() {
        let check_in = at(date, 9, 0) + Duration::minutes(15 * i as i64);
        timeline.push(NewEvent::labor(store_id, check_in, &staff.id, LaborAction::CheckIn));
        if i == 0 {
            timeline.push(NewEvent::labor(
                store_id,
                at(date, 13, 0),
                &staff.id,
                LaborAction::BreakStart,
            ));
            timeline.push(NewEvent::labor(
                store_id,
                at(date, 13, 30),
                &staff.id,
                LaborAction::BreakEnd,
            ));
        }
    }

    timeline.extend([
        prep(store_id, at(date, 9, 0), "rice", "b1", PrepStatus::Planned),
        prep(store_id, at(date, 9, 0), "broth", "b1", PrepStatus::Planned),
        prep(store_id, at(date, 9, 30), "salad", "b1", PrepStatus::Planned),
        prep(store_id, at(date, 9, 15), "rice", "b1", PrepStatus::Started),
        prep(store_id, at(date, 9, 30), "broth", "b1", PrepStatus::Started),
        prep(store_id, at(date, 10, 0), "rice", "b1", PrepStatus::Completed),
        delivery(store_id, at(date, 10, 0), "fish", DeliveryStatus::InTransit, 20),
        delivery(store_id, at(date, 11, 30), "fish", DeliveryStatus::Delivered, 20),
    ]);

    let mut ts = at(date, 11, 0);
    let mut n = 0usize;
    while ts < at(date, 22, 0) {
        let (menu, price) = MENUS[n % MENUS.len()];
        let quantity = match config.bands.band_of(ts.time()) {
            TimeBand::Lunch => 4,
            TimeBand::Dinner => 5,
            _ => 1,
        };
        timeline.push(NewEvent::sale(store_id, ts, menu, quantity, price * quantity as f64));
        ts += Duration::minutes(30);
        n += 1;
    }

    timeline.sort_by_key(|ev| ev.ts);
    events.extend(timeline.into_iter().filter(|ev| ev.ts <= now));
    events
}

/// A lunch rush with stable ids, so stepping and playing it yield the same
/// log.
pub fn replay_batch(store_id: &str, date: NaiveDate) -> Vec<NewEvent> {
    let mut batch = vec![
        NewEvent::forecast(store_id, at(date, 10, 30), date, TimeBand::Lunch, 60_000.0, 50),
        NewEvent::labor(store_id, at(date, 10, 45), "staff-2", LaborAction::CheckIn),
        prep(store_id, at(date, 10, 50), "rice", "rush", PrepStatus::Started),
    ];
    for i in 0..6u32 {
        let (menu, price) = MENUS[i as usize % MENUS.len()];
        batch.push(NewEvent::sale(
            store_id,
            at(date, 11, 10 * i),
            menu,
            3,
            price * 3.0,
        ));
    }
    batch.extend([
        prep(store_id, at(date, 11, 55), "rice", "rush", PrepStatus::Completed),
        delivery(store_id, at(date, 12, 0), "vegetables", DeliveryStatus::InTransit, 40),
        NewEvent::labor(store_id, at(date, 12, 30), "staff-2", LaborAction::BreakStart),
        NewEvent::labor(store_id, at(date, 13, 0), "staff-2", LaborAction::BreakEnd),
    ]);
    batch
        .into_iter()
        .enumerate()
        .map(|(i, ev)| ev.with_id(format!("replay-{date}-{i:02}")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_stops_at_now() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let cfg = CockpitConfig::default();
        let morning = seed_events(&cfg, "store-1", date, at(date, 9, 5));
        assert!(morning.iter().all(|ev| ev.ts <= at(date, 9, 5)));
        let evening = seed_events(&cfg, "store-1", date, at(date, 23, 0));
        assert!(evening.len() > morning.len());
    }

    #[test]
    fn replay_batch_has_unique_ids() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let batch = replay_batch("store-1", date);
        let mut ids: Vec<_> = batch.iter().filter_map(|ev| ev.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), batch.len());
    }
}
