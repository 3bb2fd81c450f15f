use crate::events::{DomainEvent, EventPayload};
use crate::time::{BandSchedule, TimeBand};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A calendar month, written `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    pub fn days(self) -> impl Iterator<Item = NaiveDate> {
        let first = NaiveDate::from_ymd_opt(self.year, self.month, 1);
        first
            .into_iter()
            .flat_map(|d| d.iter_days())
            .take_while(move |d| self.contains(*d))
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("invalid month `{s}`; expected YYYY-MM"))?;
        let year = year
            .parse::<i32>()
            .map_err(|_| format!("invalid year in `{s}`"))?;
        let month = month
            .parse::<u32>()
            .map_err(|_| format!("invalid month in `{s}`"))?;
        YearMonth::new(year, month).ok_or_else(|| format!("month out of range in `{s}`"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct BandTotals {
    sales: f64,
    quantity: u32,
    transactions: u32,
}

impl BandTotals {
    fn add(&mut self, other: &BandTotals) {
        self.sales += other.sales;
        self.quantity += other.quantity;
        self.transactions += other.transactions;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ForecastEntry {
    sales: f64,
    customers: u32,
    ts: NaiveDateTime,
    seq: u64,
}

/// Per-day, per-band sales and forecast totals of one store, built in one
/// pass over the log.
#[derive(Debug, Clone, Default)]
pub struct SalesLedger {
    actual: BTreeMap<(NaiveDate, TimeBand), BandTotals>,
    forecasts: BTreeMap<(NaiveDate, TimeBand), ForecastEntry>,
}

impl SalesLedger {
    pub fn build(events: &[DomainEvent], store_id: &str, schedule: &BandSchedule) -> Self {
        let mut ledger = Self::default();
        for ev in events.iter().filter(|ev| ev.store_id == store_id) {
            match &ev.payload {
                EventPayload::Sales {
                    total, quantity, ..
                } => {
                    let band = schedule.band_of(ev.ts.time());
                    let entry = ledger.actual.entry((ev.date(), band)).or_default();
                    entry.sales += total;
                    entry.quantity += quantity;
                    entry.transactions += 1;
                }
                EventPayload::Forecast {
                    date,
                    time_band,
                    forecast_sales,
                    forecast_customers,
                } => {
                    let candidate = ForecastEntry {
                        sales: *forecast_sales,
                        customers: *forecast_customers,
                        ts: ev.ts,
                        seq: ev.seq,
                    };
                    ledger
                        .forecasts
                        .entry((*date, *time_band))
                        .and_modify(|cur| {
                            if (candidate.ts, candidate.seq) >= (cur.ts, cur.seq) {
                                *cur = candidate;
                            }
                        })
                        .or_insert(candidate);
                }
                _ => {}
            }
        }
        ledger
    }

    /// Forecast sales and customers. `all` sums the concrete bands and falls
    /// back to an explicit `all` forecast when none of them is set.
    pub fn forecast(&self, date: NaiveDate, band: TimeBand) -> (f64, u32) {
        if band != TimeBand::All {
            return self
                .forecasts
                .get(&(date, band))
                .map_or((0.0, 0), |f| (f.sales, f.customers));
        }
        let concrete = TimeBand::CONCRETE
            .iter()
            .filter_map(|b| self.forecasts.get(&(date, *b)))
            .collect::<Vec<_>>();
        if concrete.is_empty() {
            return self
                .forecasts
                .get(&(date, TimeBand::All))
                .map_or((0.0, 0), |f| (f.sales, f.customers));
        }
        concrete
            .iter()
            .fold((0.0, 0), |(s, c), f| (s + f.sales, c + f.customers))
    }

    pub fn has_forecast(&self, date: NaiveDate) -> bool {
        self.forecasts.keys().any(|(d, _)| *d == date)
    }

    fn actual(&self, date: NaiveDate, band: TimeBand) -> BandTotals {
        let mut totals = BandTotals::default();
        for b in TimeBand::CONCRETE.iter().filter(|b| band.selects(**b)) {
            if let Some(t) = self.actual.get(&(date, *b)) {
                totals.add(t);
            }
        }
        totals
    }

    pub fn actual_sales(&self, date: NaiveDate, band: TimeBand) -> f64 {
        self.actual(date, band).sales
    }

    pub fn metrics(&self, date: NaiveDate, band: TimeBand) -> SalesMetrics {
        let (forecast_sales, forecast_customers) = self.forecast(date, band);
        let actual = self.actual(date, band);
        SalesMetrics {
            date,
            time_band: band,
            forecast_sales,
            forecast_customers,
            actual_sales: actual.sales,
            actual_quantity: actual.quantity,
            transaction_count: actual.transactions,
            achievement_rate: achievement(actual.sales, forecast_sales),
            average_spend: if actual.transactions > 0 {
                actual.sales / actual.transactions as f64
            } else {
                0.0
            },
        }
    }
}

fn achievement(actual: f64, forecast: f64) -> f64 {
    if forecast > 0.0 {
        actual * 100.0 / forecast
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesMetrics {
    pub date: NaiveDate,
    pub time_band: TimeBand,
    pub forecast_sales: f64,
    pub forecast_customers: u32,
    pub actual_sales: f64,
    pub actual_quantity: u32,
    pub transaction_count: u32,
    pub achievement_rate: f64,
    pub average_spend: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub has_forecast: bool,
    pub forecast_sales: f64,
    pub forecast_customers: u32,
    pub actual_sales: f64,
    pub achievement_rate: f64,
}

/// One row per day of `month`, whole-day band.
pub fn calendar_data(
    events: &[DomainEvent],
    store_id: &str,
    month: YearMonth,
    schedule: &BandSchedule,
) -> Vec<CalendarDay> {
    let ledger = SalesLedger::build(events, store_id, schedule);
    month
        .days()
        .map(|date| {
            let (forecast_sales, forecast_customers) = ledger.forecast(date, TimeBand::All);
            let actual_sales = ledger.actual_sales(date, TimeBand::All);
            CalendarDay {
                date,
                has_forecast: ledger.has_forecast(date),
                forecast_sales,
                forecast_customers,
                actual_sales,
                achievement_rate: achievement(actual_sales, forecast_sales),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySalesMetrics {
    pub month: YearMonth,
    pub time_band: TimeBand,
    pub actual_sales: f64,
    pub forecast_sales: f64,
    pub achievement_rate: f64,
    pub transaction_count: u32,
    pub days_with_sales: u32,
    pub average_daily_sales: f64,
    pub best_day: Option<NaiveDate>,
    pub best_day_sales: f64,
}

pub fn monthly_sales_metrics(
    events: &[DomainEvent],
    store_id: &str,
    month: YearMonth,
    band: TimeBand,
    schedule: &BandSchedule,
) -> MonthlySalesMetrics {
    let ledger = SalesLedger::build(events, store_id, schedule);
    let mut out = MonthlySalesMetrics {
        month,
        time_band: band,
        actual_sales: 0.0,
        forecast_sales: 0.0,
        achievement_rate: 0.0,
        transaction_count: 0,
        days_with_sales: 0,
        average_daily_sales: 0.0,
        best_day: None,
        best_day_sales: 0.0,
    };
    for date in month.days() {
        let day = ledger.metrics(date, band);
        out.actual_sales += day.actual_sales;
        out.forecast_sales += day.forecast_sales;
        out.transaction_count += day.transaction_count;
        if day.transaction_count > 0 {
            out.days_with_sales += 1;
            if out.best_day.is_none() || day.actual_sales > out.best_day_sales {
                out.best_day = Some(date);
                out.best_day_sales = day.actual_sales;
            }
        }
    }
    out.achievement_rate = achievement(out.actual_sales, out.forecast_sales);
    if out.days_with_sales > 0 {
        out.average_daily_sales = out.actual_sales / out.days_with_sales as f64;
    }
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyForecastSummary {
    pub month: YearMonth,
    pub time_band: TimeBand,
    pub forecast_sales_total: f64,
    pub forecast_customers_total: u32,
    pub days_forecasted: u32,
    pub forecast_to_date: f64,
    pub actual_to_date: f64,
    pub achievement_to_date: f64,
}

/// Month totals plus progress through `as_of`'s date inclusive.
pub fn monthly_forecast_summary(
    events: &[DomainEvent],
    store_id: &str,
    month: YearMonth,
    band: TimeBand,
    schedule: &BandSchedule,
    as_of: NaiveDateTime,
) -> MonthlyForecastSummary {
    let ledger = SalesLedger::build(events, store_id, schedule);
    let mut out = MonthlyForecastSummary {
        month,
        time_band: band,
        forecast_sales_total: 0.0,
        forecast_customers_total: 0,
        days_forecasted: 0,
        forecast_to_date: 0.0,
        actual_to_date: 0.0,
        achievement_to_date: 0.0,
    };
    for date in month.days() {
        let (sales, customers) = ledger.forecast(date, band);
        if sales > 0.0 || customers > 0 {
            out.days_forecasted += 1;
        }
        out.forecast_sales_total += sales;
        out.forecast_customers_total += customers;
        if date <= as_of.date() {
            out.forecast_to_date += sales;
            out.actual_to_date += ledger.actual_sales(date, band);
        }
    }
    out.achievement_to_date = achievement(out.actual_to_date, out.forecast_to_date);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{NewEvent, log::EventLog};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn at(d: u32, h: u32) -> NaiveDateTime {
        day(d).and_hms_opt(h, 0, 0).unwrap()
    }

    #[test]
    fn achievement_against_whole_day_forecast() {
        let mut log = EventLog::new();
        log.append(NewEvent::forecast("s1", at(1, 8), day(2), TimeBand::All, 100_000.0, 80))
            .unwrap();
        log.append(NewEvent::sale("s1", at(2, 12), "set-a", 40, 70_000.0))
            .unwrap();
        log.append(NewEvent::sale("s1", at(2, 19), "set-b", 20, 50_000.0))
            .unwrap();
        let ledger = SalesLedger::build(log.events(), "s1", &BandSchedule::default());
        let m = ledger.metrics(day(2), TimeBand::All);
        assert_eq!(m.actual_sales, 120_000.0);
        assert_eq!(m.achievement_rate, 120.0);
        assert_eq!(m.transaction_count, 2);

        let lunch = ledger.metrics(day(2), TimeBand::Lunch);
        assert_eq!(lunch.actual_sales, 70_000.0);
        assert_eq!(lunch.achievement_rate, 0.0);
    }

    #[test]
    fn latest_forecast_wins_and_all_sums_bands() {
        let mut log = EventLog::new();
        let s = BandSchedule::default();
        log.append(NewEvent::forecast("s1", at(1, 8), day(2), TimeBand::Lunch, 30_000.0, 30))
            .unwrap();
        log.append(NewEvent::forecast("s1", at(1, 9), day(2), TimeBand::Lunch, 40_000.0, 40))
            .unwrap();
        log.append(NewEvent::forecast("s1", at(1, 9), day(2), TimeBand::Dinner, 60_000.0, 50))
            .unwrap();
        log.append(NewEvent::forecast("s1", at(1, 9), day(2), TimeBand::All, 1.0, 1))
            .unwrap();
        let ledger = SalesLedger::build(log.events(), "s1", &s);
        assert_eq!(ledger.forecast(day(2), TimeBand::Lunch), (40_000.0, 40));
        assert_eq!(ledger.forecast(day(2), TimeBand::All), (100_000.0, 90));
        assert_eq!(ledger.forecast(day(3), TimeBand::All), (0.0, 0));
    }

    #[test]
    fn other_stores_are_ignored() {
        let mut log = EventLog::new();
        log.append(NewEvent::sale("s2", at(2, 12), "m", 1, 500.0)).unwrap();
        let m = SalesLedger::build(log.events(), "s1", &BandSchedule::default())
            .metrics(day(2), TimeBand::All);
        assert_eq!(m.actual_sales, 0.0);
    }

    #[test]
    fn calendar_covers_every_day_of_month() {
        let log = EventLog::new();
        let month: YearMonth = "2026-02".parse().unwrap();
        let rows = calendar_data(log.events(), "s1", month, &BandSchedule::default());
        assert_eq!(rows.len(), 28);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2026, 2, 1).unwrap());
        assert!("2026-13".parse::<YearMonth>().is_err());
    }

    #[test]
    fn monthly_totals_and_to_date_progress() {
        let mut log = EventLog::new();
        let s = BandSchedule::default();
        for d in 1..=3 {
            log.append(NewEvent::forecast("s1", at(1, 8), day(d), TimeBand::All, 10_000.0, 10))
                .unwrap();
        }
        log.append(NewEvent::sale("s1", at(1, 12), "m", 1, 8_000.0)).unwrap();
        log.append(NewEvent::sale("s1", at(2, 12), "m", 1, 12_000.0)).unwrap();

        let monthly = monthly_sales_metrics(log.events(), "s1", YearMonth::of(day(1)), TimeBand::All, &s);
        assert_eq!(monthly.actual_sales, 20_000.0);
        assert_eq!(monthly.days_with_sales, 2);
        assert_eq!(monthly.best_day, Some(day(2)));
        assert_eq!(monthly.average_daily_sales, 10_000.0);

        let summary = monthly_forecast_summary(
            log.events(),
            "s1",
            YearMonth::of(day(1)),
            TimeBand::All,
            &s,
            at(2, 20),
        );
        assert_eq!(summary.days_forecasted, 3);
        assert_eq!(summary.forecast_sales_total, 30_000.0);
        assert_eq!(summary.forecast_to_date, 20_000.0);
        assert_eq!(summary.achievement_to_date, 100.0);
    }
}
