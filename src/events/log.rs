//! In-memory append-only event log.

use crate::error::{CockpitError, Result};
use crate::events::{DomainEvent, EventPayload, NewEvent};
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<DomainEvent>,
    ids: HashSet<String>,
    next_seq: u64,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a log from persisted events, checking the same invariants
    /// `append` enforces.
    pub fn from_events(events: Vec<DomainEvent>) -> Result<Self> {
        let mut log = Self::new();
        for ev in events {
            if ev.seq < log.next_seq {
                return Err(CockpitError::validation(format!(
                    "event {} has seq {} after seq {}",
                    ev.id,
                    ev.seq,
                    log.next_seq.saturating_sub(1)
                )));
            }
            validate_payload(&ev.store_id, &ev.payload)?;
            if ev.id.trim().is_empty() || !log.ids.insert(ev.id.clone()) {
                return Err(CockpitError::validation(format!(
                    "duplicate or empty event id `{}`",
                    ev.id
                )));
            }
            log.next_seq = ev.seq + 1;
            log.events.push(ev);
        }
        Ok(log)
    }

    /// Validate and append. Rejected input leaves the log unchanged.
    ///
    /// Timestamps are not re-sorted: log order is `seq` order, and callers
    /// submit events fed-forward.
    pub fn append(&mut self, new: NewEvent) -> Result<&DomainEvent> {
        validate(&new)?;
        let id = match new.id {
            Some(id) => id.trim().to_string(),
            None => Uuid::new_v4().to_string(),
        };
        if self.ids.contains(&id) {
            return Err(CockpitError::validation(format!("duplicate event id `{id}`")));
        }
        self.ids.insert(id.clone());
        let seq = self.next_seq;
        self.next_seq += 1;
        self.events.push(DomainEvent {
            id,
            seq,
            ts: new.ts,
            store_id: new.store_id.trim().to_string(),
            payload: new.payload,
        });
        let last = self.events.len() - 1;
        Ok(&self.events[last])
    }

    pub fn events(&self) -> &[DomainEvent] {
        &self.events
    }

    /// The first `n` events, for point-in-time inspection.
    pub fn prefix(&self, n: usize) -> &[DomainEvent] {
        &self.events[..n.min(self.events.len())]
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.ids.contains(id.trim())
    }

    pub fn last_seq(&self) -> Option<u64> {
        self.events.last().map(|ev| ev.seq)
    }

    pub fn query<P>(&self, predicate: P) -> Query<'_, P>
    where
        P: Fn(&DomainEvent) -> bool,
    {
        Query {
            events: &self.events,
            predicate,
        }
    }
}

/// A lazy, restartable view over matching events. Every call to `iter`
/// starts from the beginning of the log.
pub struct Query<'a, P> {
    events: &'a [DomainEvent],
    predicate: P,
}

impl<'a, P> Query<'a, P>
where
    P: Fn(&DomainEvent) -> bool,
{
    pub fn iter(&self) -> impl Iterator<Item = &'a DomainEvent> + '_ {
        self.events.iter().filter(move |ev| (self.predicate)(*ev))
    }

    pub fn count(&self) -> usize {
        self.iter().count()
    }
}

/// Decode a JSON array of events submitted from outside the process.
pub fn decode_batch(raw: &str) -> Result<Vec<NewEvent>> {
    let batch: Vec<NewEvent> = serde_json::from_str(raw)
        .map_err(|e| CockpitError::validation(format!("malformed event batch: {e}")))?;
    for ev in &batch {
        validate(ev)?;
    }
    Ok(batch)
}

pub fn validate(new: &NewEvent) -> Result<()> {
    if let Some(id) = new.id.as_deref()
        && id.trim().is_empty()
    {
        return Err(CockpitError::validation("event id must not be blank"));
    }
    validate_payload(&new.store_id, &new.payload)
}

fn validate_payload(store_id: &str, payload: &EventPayload) -> Result<()> {
    if store_id.trim().is_empty() {
        return Err(CockpitError::validation("event store_id must not be blank"));
    }
    match payload {
        EventPayload::Sales { total, menu_id, .. } => {
            require_amount("sales.total", *total)?;
            require_text("sales.menu_id", menu_id)
        }
        EventPayload::Labor { staff_id, .. } => require_text("labor.staff_id", staff_id),
        EventPayload::Prep {
            prep_item_id,
            batch_id,
            ..
        } => {
            require_text("prep.prep_item_id", prep_item_id)?;
            if let Some(batch) = batch_id {
                require_text("prep.batch_id", batch)?;
            }
            Ok(())
        }
        EventPayload::Delivery { item_name, .. } => require_text("delivery.item_name", item_name),
        EventPayload::Decision(rec) => {
            require_text("decision.proposal_id", &rec.proposal_id)?;
            require_text("decision.target_id", &rec.target_id)?;
            require_text("decision.title", &rec.title)
        }
        EventPayload::Forecast { forecast_sales, .. } => {
            require_amount("forecast.forecast_sales", *forecast_sales)
        }
    }
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CockpitError::validation(format!("{field} must not be blank")));
    }
    Ok(())
}

fn require_amount(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(CockpitError::validation(format!(
            "{field} must be a finite non-negative amount, got {value}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::LaborAction;
    use chrono::NaiveDate;

    fn ts(h: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn append_assigns_id_and_seq() {
        let mut log = EventLog::new();
        let first = log
            .append(NewEvent::labor("s1", ts(9), "staff-1", LaborAction::CheckIn))
            .unwrap()
            .clone();
        let second = log
            .append(NewEvent::sale("s1", ts(10), "menu-1", 1, 1200.0).with_id("sale-1"))
            .unwrap()
            .clone();
        assert!(!first.id.is_empty());
        assert_eq!(first.seq, 0);
        assert_eq!(second.seq, 1);
        assert_eq!(second.id, "sale-1");
    }

    #[test]
    fn rejected_event_leaves_log_unchanged() {
        let mut log = EventLog::new();
        log.append(NewEvent::sale("s1", ts(10), "menu-1", 1, 100.0))
            .unwrap();
        let err = log
            .append(NewEvent::sale("s1", ts(11), "menu-1", 1, f64::NAN))
            .unwrap_err();
        assert!(matches!(err, CockpitError::Validation(_)));
        let err = log
            .append(NewEvent::labor("s1", ts(11), " ", LaborAction::CheckIn))
            .unwrap_err();
        assert!(format!("{err}").contains("labor.staff_id"));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut log = EventLog::new();
        log.append(NewEvent::sale("s1", ts(10), "m", 1, 1.0).with_id("x"))
            .unwrap();
        assert!(
            log.append(NewEvent::sale("s1", ts(11), "m", 1, 1.0).with_id("x"))
                .is_err()
        );
    }

    #[test]
    fn out_of_order_timestamps_keep_insertion_order() {
        let mut log = EventLog::new();
        log.append(NewEvent::sale("s1", ts(12), "m", 1, 1.0)).unwrap();
        log.append(NewEvent::sale("s1", ts(9), "m", 1, 2.0)).unwrap();
        let order: Vec<_> = log.events().iter().map(|e| e.ts).collect();
        assert_eq!(order, vec![ts(12), ts(9)]);
    }

    #[test]
    fn query_is_restartable() {
        let mut log = EventLog::new();
        log.append(NewEvent::sale("s1", ts(10), "m", 1, 1.0)).unwrap();
        log.append(NewEvent::labor("s1", ts(10), "a", LaborAction::CheckIn))
            .unwrap();
        log.append(NewEvent::sale("s1", ts(11), "m", 1, 1.0)).unwrap();
        let sales = log.query(|ev| ev.kind() == "sales");
        assert_eq!(sales.count(), 2);
        assert_eq!(sales.iter().count(), 2);
        assert_eq!(log.prefix(2).len(), 2);
    }

    #[test]
    fn decode_batch_rejects_malformed_timestamps() {
        let raw = r#"[{"ts":"not-a-time","store_id":"s1","payload":{"type":"sales","total":1.0,"quantity":1,"menu_id":"m"}}]"#;
        let err = decode_batch(raw).unwrap_err();
        assert!(matches!(err, CockpitError::Validation(_)));

        let raw = r#"[{"ts":"2026-03-02T10:00:00","store_id":"s1","payload":{"type":"refund","total":1.0}}]"#;
        assert!(decode_batch(raw).is_err());

        let raw = r#"[{"ts":"2026-03-02T10:00:00","store_id":"s1","payload":{"type":"labor","staff_id":"a","action":"check-in"}}]"#;
        assert_eq!(decode_batch(raw).unwrap().len(), 1);
    }

    #[test]
    fn from_events_rejects_regressing_seq() {
        let mut log = EventLog::new();
        log.append(NewEvent::sale("s1", ts(10), "m", 1, 1.0)).unwrap();
        log.append(NewEvent::sale("s1", ts(11), "m", 1, 1.0)).unwrap();
        let mut events = log.events().to_vec();
        events.reverse();
        assert!(EventLog::from_events(events).is_err());
        let restored = EventLog::from_events(log.events().to_vec()).unwrap();
        assert_eq!(restored.last_seq(), Some(1));
    }
}
