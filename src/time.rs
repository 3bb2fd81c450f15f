//! Business-day time model: time bands, the band schedule and clocks.
//!
//! All timestamps are store-local `NaiveDateTime`s. A business date is the
//! calendar date of the timestamp.

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeBand {
    Lunch,
    Idle,
    Dinner,
    All,
}

impl TimeBand {
    /// Bands a timestamp can actually fall into.
    pub const CONCRETE: [TimeBand; 3] = [TimeBand::Lunch, TimeBand::Idle, TimeBand::Dinner];

    /// Whether a filter band selects an event that fell into `band`.
    pub fn selects(self, band: TimeBand) -> bool {
        self == TimeBand::All || self == band
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeBand::Lunch => "lunch",
            TimeBand::Idle => "idle",
            TimeBand::Dinner => "dinner",
            TimeBand::All => "all",
        }
    }
}

impl fmt::Display for TimeBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeBand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "lunch" => Ok(TimeBand::Lunch),
            "idle" => Ok(TimeBand::Idle),
            "dinner" => Ok(TimeBand::Dinner),
            "all" => Ok(TimeBand::All),
            other => Err(format!(
                "unknown time band `{other}`; expected lunch, idle, dinner or all"
            )),
        }
    }
}

/// Boundaries of the business day. Times before lunch and after close count
/// as `idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandSchedule {
    pub open: NaiveTime,
    pub lunch_start: NaiveTime,
    pub idle_start: NaiveTime,
    pub dinner_start: NaiveTime,
    pub close: NaiveTime,
}

impl Default for BandSchedule {
    fn default() -> Self {
        Self {
            open: hm(10, 0),
            lunch_start: hm(11, 0),
            idle_start: hm(15, 0),
            dinner_start: hm(17, 0),
            close: hm(22, 0),
        }
    }
}

impl BandSchedule {
    pub fn band_of(&self, time: NaiveTime) -> TimeBand {
        if time >= self.lunch_start && time < self.idle_start {
            TimeBand::Lunch
        } else if time >= self.dinner_start && time < self.close {
            TimeBand::Dinner
        } else {
            TimeBand::Idle
        }
    }

    pub fn bounds(&self, band: TimeBand) -> (NaiveTime, NaiveTime) {
        match band {
            TimeBand::Lunch => (self.lunch_start, self.idle_start),
            TimeBand::Idle => (self.idle_start, self.dinner_start),
            TimeBand::Dinner => (self.dinner_start, self.close),
            TimeBand::All => (self.open, self.close),
        }
    }

    pub fn has_started(&self, band: TimeBand, date: NaiveDate, as_of: NaiveDateTime) -> bool {
        let (start, _) = self.bounds(band);
        as_of >= date.and_time(start)
    }

    /// Share of `band` on `date` that has elapsed at `as_of`, in `[0, 1]`.
    pub fn elapsed_fraction(&self, band: TimeBand, date: NaiveDate, as_of: NaiveDateTime) -> f64 {
        let (start, end) = self.bounds(band);
        let start = date.and_time(start);
        let end = date.and_time(end);
        if as_of >= end {
            return 1.0;
        }
        if as_of <= start {
            return 0.0;
        }
        let total = (end - start).num_seconds() as f64;
        if total <= 0.0 {
            return 1.0;
        }
        ((as_of - start).num_seconds() as f64 / total).clamp(0.0, 1.0)
    }

    /// Whether the business day for `date` is over at `as_of`.
    pub fn day_closed(&self, date: NaiveDate, as_of: NaiveDateTime) -> bool {
        as_of >= date.and_time(self.close)
    }
}

pub(crate) fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN)
}

/// Source of "now" for commands and selectors that need an `as_of` instant.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Clock moved by hand. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<NaiveDateTime>>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    pub fn set(&self, at: NaiveDateTime) {
        self.now.set(at);
    }

    pub fn advance(&self, by: chrono::Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap().and_time(hm(h, m))
    }

    #[test]
    fn band_of_uses_schedule_boundaries() {
        let s = BandSchedule::default();
        assert_eq!(s.band_of(hm(9, 30)), TimeBand::Idle);
        assert_eq!(s.band_of(hm(11, 0)), TimeBand::Lunch);
        assert_eq!(s.band_of(hm(14, 59)), TimeBand::Lunch);
        assert_eq!(s.band_of(hm(15, 0)), TimeBand::Idle);
        assert_eq!(s.band_of(hm(19, 0)), TimeBand::Dinner);
        assert_eq!(s.band_of(hm(22, 30)), TimeBand::Idle);
    }

    #[test]
    fn elapsed_fraction_clamps() {
        let s = BandSchedule::default();
        let date = at(0, 0).date();
        assert_eq!(s.elapsed_fraction(TimeBand::Lunch, date, at(10, 0)), 0.0);
        assert_eq!(s.elapsed_fraction(TimeBand::Lunch, date, at(13, 0)), 0.5);
        assert_eq!(s.elapsed_fraction(TimeBand::Lunch, date, at(16, 0)), 1.0);
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(at(9, 0));
        let other = clock.clone();
        clock.advance(chrono::Duration::minutes(30));
        assert_eq!(other.now(), at(9, 30));
    }

    #[test]
    fn parses_time_band_names() {
        assert_eq!("dinner".parse::<TimeBand>().unwrap(), TimeBand::Dinner);
        assert!("brunch".parse::<TimeBand>().is_err());
    }
}
