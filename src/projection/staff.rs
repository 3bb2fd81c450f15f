use crate::events::{DomainEvent, EventPayload, LaborAction};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaffStatus {
    #[default]
    Out,
    Working,
    Break,
}

impl StaffStatus {
    /// Whether `action` is a real transition from this status. Check-out
    /// while on break is accepted and closes the break first.
    pub fn accepts(self, action: LaborAction) -> bool {
        matches!(
            (self, action),
            (StaffStatus::Out, LaborAction::CheckIn)
                | (StaffStatus::Working, LaborAction::BreakStart)
                | (StaffStatus::Working, LaborAction::CheckOut)
                | (StaffStatus::Break, LaborAction::BreakEnd)
                | (StaffStatus::Break, LaborAction::CheckOut)
        )
    }
}

impl fmt::Display for StaffStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StaffStatus::Out => "out",
            StaffStatus::Working => "working",
            StaffStatus::Break => "break",
        };
        f.write_str(s)
    }
}

/// One staff member's day, folded from `labor` events.
///
/// `total_minutes` is the shift span from check-in to check-out including
/// breaks; `break_minutes` is the break part of it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StaffState {
    pub staff_id: String,
    pub status: StaffStatus,
    pub last_action_at: Option<NaiveDateTime>,
    pub total_minutes: i64,
    pub break_minutes: i64,
    pub check_in_time: Option<NaiveDateTime>,
    pub ignored_actions: u32,
}

impl StaffState {
    pub fn worked_minutes(&self) -> i64 {
        (self.total_minutes - self.break_minutes).max(0)
    }

    pub fn worked_hours(&self) -> f64 {
        self.worked_minutes() as f64 / 60.0
    }
}

/// Running fold state. Durations accrue in seconds and are floored to
/// minutes once the fold is finished.
#[derive(Debug, Clone, Default)]
struct StaffFold {
    staff_id: String,
    status: StaffStatus,
    last_action_at: Option<NaiveDateTime>,
    check_in_time: Option<NaiveDateTime>,
    break_started_at: Option<NaiveDateTime>,
    shift_seconds: i64,
    break_seconds: i64,
    ignored_actions: u32,
}

impl StaffFold {
    fn new(staff_id: &str) -> Self {
        Self {
            staff_id: staff_id.to_string(),
            ..Self::default()
        }
    }

    fn apply_event(&mut self, action: LaborAction, ts: NaiveDateTime) {
        if self.last_action_at.is_some_and(|last| ts < last) || !self.status.accepts(action) {
            self.ignored_actions += 1;
            return;
        }
        match (self.status, action) {
            (StaffStatus::Out, LaborAction::CheckIn) => {
                self.check_in_time = Some(ts);
                self.status = StaffStatus::Working;
            }
            (StaffStatus::Working, LaborAction::BreakStart) => {
                self.break_started_at = Some(ts);
                self.status = StaffStatus::Break;
            }
            (StaffStatus::Break, LaborAction::BreakEnd) => {
                self.close_break(ts);
                self.status = StaffStatus::Working;
            }
            (StaffStatus::Break, LaborAction::CheckOut) => {
                self.close_break(ts);
                self.close_shift(ts);
            }
            (StaffStatus::Working, LaborAction::CheckOut) => self.close_shift(ts),
            _ => return,
        }
        self.last_action_at = Some(ts);
    }

    fn close_break(&mut self, ts: NaiveDateTime) {
        if let Some(start) = self.break_started_at.take() {
            self.break_seconds += (ts - start).num_seconds().max(0);
        }
    }

    fn close_shift(&mut self, ts: NaiveDateTime) {
        if let Some(start) = self.check_in_time {
            self.shift_seconds += (ts - start).num_seconds().max(0);
        }
        self.status = StaffStatus::Out;
    }

    /// Accrue open segments up to `until` and produce the view.
    fn finish(mut self, until: NaiveDateTime) -> StaffState {
        if self.status != StaffStatus::Out
            && let Some(start) = self.check_in_time
        {
            self.shift_seconds += (until - start).num_seconds().max(0);
        }
        if self.status == StaffStatus::Break
            && let Some(start) = self.break_started_at
        {
            self.break_seconds += (until - start).num_seconds().max(0);
        }
        StaffState {
            staff_id: self.staff_id,
            status: self.status,
            last_action_at: self.last_action_at,
            total_minutes: self.shift_seconds / 60,
            break_minutes: self.break_seconds / 60,
            check_in_time: self.check_in_time,
            ignored_actions: self.ignored_actions,
        }
    }
}

/// Open shifts of a past date accrue until midnight, today's until `as_of`.
fn accrual_end(date: NaiveDate, as_of: NaiveDateTime) -> NaiveDateTime {
    let end_of_day = date.and_time(chrono::NaiveTime::MIN) + Duration::days(1);
    as_of.min(end_of_day)
}

fn labor_events<'a>(
    events: &'a [DomainEvent],
    store_id: &'a str,
    date: NaiveDate,
    as_of: NaiveDateTime,
) -> impl Iterator<Item = (&'a str, LaborAction, NaiveDateTime)> + 'a {
    events.iter().filter_map(move |ev| match &ev.payload {
        EventPayload::Labor { staff_id, action }
            if ev.store_id == store_id && ev.date() == date && ev.ts <= as_of =>
        {
            Some((staff_id.as_str(), *action, ev.ts))
        }
        _ => None,
    })
}

pub fn derive_staff_status(
    events: &[DomainEvent],
    store_id: &str,
    staff_id: &str,
    date: NaiveDate,
    as_of: NaiveDateTime,
) -> StaffState {
    let mut fold = StaffFold::new(staff_id);
    for (id, action, ts) in labor_events(events, store_id, date, as_of) {
        if id == staff_id {
            fold.apply_event(action, ts);
        }
    }
    fold.finish(accrual_end(date, as_of))
}

/// Every staff member with at least one labor event on `date`, by id.
pub fn derive_staff_states(
    events: &[DomainEvent],
    store_id: &str,
    date: NaiveDate,
    as_of: NaiveDateTime,
) -> Vec<StaffState> {
    let mut folds: BTreeMap<&str, StaffFold> = BTreeMap::new();
    for (id, action, ts) in labor_events(events, store_id, date, as_of) {
        folds
            .entry(id)
            .or_insert_with(|| StaffFold::new(id))
            .apply_event(action, ts);
    }
    let until = accrual_end(date, as_of);
    folds.into_values().map(|fold| fold.finish(until)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{NewEvent, log::EventLog};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        date().and_hms_opt(h, m, 0).unwrap()
    }

    fn log(actions: &[(u32, u32, &str, LaborAction)]) -> EventLog {
        let mut log = EventLog::new();
        for (h, m, staff, action) in actions {
            log.append(NewEvent::labor("s1", at(*h, *m), staff, *action))
                .unwrap();
        }
        log
    }

    #[test]
    fn full_shift_with_lunch_break() {
        let log = log(&[
            (9, 0, "a", LaborAction::CheckIn),
            (12, 0, "a", LaborAction::BreakStart),
            (12, 30, "a", LaborAction::BreakEnd),
            (18, 0, "a", LaborAction::CheckOut),
        ]);
        let s = derive_staff_status(log.events(), "s1", "a", date(), at(23, 0));
        assert_eq!(s.total_minutes, 540);
        assert_eq!(s.break_minutes, 30);
        assert_eq!(s.worked_minutes(), 510);
        assert_eq!(s.status, StaffStatus::Out);
        assert_eq!(s.last_action_at, Some(at(18, 0)));
    }

    #[test]
    fn open_shift_accrues_until_as_of() {
        let log = log(&[
            (9, 0, "a", LaborAction::CheckIn),
            (11, 0, "a", LaborAction::BreakStart),
        ]);
        let s = derive_staff_status(log.events(), "s1", "a", date(), at(11, 15));
        assert_eq!(s.status, StaffStatus::Break);
        assert_eq!(s.total_minutes, 135);
        assert_eq!(s.break_minutes, 15);
    }

    #[test]
    fn check_out_during_break_closes_break() {
        let log = log(&[
            (9, 0, "a", LaborAction::CheckIn),
            (10, 0, "a", LaborAction::BreakStart),
            (10, 20, "a", LaborAction::CheckOut),
        ]);
        let s = derive_staff_status(log.events(), "s1", "a", date(), at(20, 0));
        assert_eq!(s.status, StaffStatus::Out);
        assert_eq!(s.total_minutes, 80);
        assert_eq!(s.break_minutes, 20);
    }

    #[test]
    fn invalid_actions_are_ignored_and_counted() {
        let log = log(&[
            (8, 0, "a", LaborAction::BreakEnd),
            (9, 0, "a", LaborAction::CheckIn),
            (9, 30, "a", LaborAction::CheckIn),
            (10, 0, "a", LaborAction::CheckOut),
            (10, 5, "a", LaborAction::CheckOut),
        ]);
        let s = derive_staff_status(log.events(), "s1", "a", date(), at(20, 0));
        assert_eq!(s.ignored_actions, 3);
        assert_eq!(s.total_minutes, 60);
    }

    #[test]
    fn other_staff_events_do_not_affect_status() {
        let own = [
            (9, 0, "a", LaborAction::CheckIn),
            (18, 0, "a", LaborAction::CheckOut),
        ];
        let mixed = [
            (8, 0, "b", LaborAction::CheckIn),
            (9, 0, "a", LaborAction::CheckIn),
            (10, 0, "b", LaborAction::BreakStart),
            (18, 0, "a", LaborAction::CheckOut),
            (19, 0, "b", LaborAction::CheckOut),
        ];
        let alone = derive_staff_status(log(&own).events(), "s1", "a", date(), at(23, 0));
        let shared = derive_staff_status(log(&mixed).events(), "s1", "a", date(), at(23, 0));
        assert_eq!(alone, shared);
    }

    #[test]
    fn states_are_listed_per_staff() {
        let log = log(&[
            (9, 0, "b", LaborAction::CheckIn),
            (9, 5, "a", LaborAction::CheckIn),
        ]);
        let states = derive_staff_states(log.events(), "s1", date(), at(10, 5));
        let ids: Vec<_> = states.iter().map(|s| s.staff_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(states[1].total_minutes, 65);
    }

    #[test]
    fn past_open_shift_stops_at_midnight() {
        let log = log(&[(20, 0, "a", LaborAction::CheckIn)]);
        let next_day = date().succ_opt().unwrap().and_hms_opt(12, 0, 0).unwrap();
        let s = derive_staff_status(log.events(), "s1", "a", date(), next_day);
        assert_eq!(s.total_minutes, 240);
    }
}
