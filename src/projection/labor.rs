use crate::projection::staff::{StaffState, StaffStatus};
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaborMetrics {
    pub date: NaiveDate,
    pub active_staff_count: usize,
    pub on_break_count: usize,
    pub total_hours_today: f64,
    pub labor_cost_estimate: f64,
    pub labor_cost_rate: f64,
}

/// Aggregate staff states into labor cost. `wage_for` maps a staff id to its
/// hourly wage.
pub fn labor_metrics(
    date: NaiveDate,
    states: &[StaffState],
    wage_for: impl Fn(&str) -> f64,
    actual_sales: f64,
) -> LaborMetrics {
    let mut metrics = LaborMetrics {
        date,
        active_staff_count: 0,
        on_break_count: 0,
        total_hours_today: 0.0,
        labor_cost_estimate: 0.0,
        labor_cost_rate: 0.0,
    };
    for state in states {
        match state.status {
            StaffStatus::Working => metrics.active_staff_count += 1,
            StaffStatus::Break => metrics.on_break_count += 1,
            StaffStatus::Out => {}
        }
        let hours = state.total_minutes as f64 / 60.0;
        metrics.total_hours_today += hours;
        metrics.labor_cost_estimate += hours * wage_for(&state.staff_id);
    }
    if actual_sales > 0.0 {
        metrics.labor_cost_rate = metrics.labor_cost_estimate / actual_sales * 100.0;
    }
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(id: &str, status: StaffStatus, minutes: i64) -> StaffState {
        StaffState {
            staff_id: id.to_string(),
            status,
            total_minutes: minutes,
            ..StaffState::default()
        }
    }

    #[test]
    fn cost_uses_per_staff_wage() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let states = [
            state("a", StaffStatus::Working, 120),
            state("b", StaffStatus::Break, 60),
            state("c", StaffStatus::Out, 30),
        ];
        let m = labor_metrics(
            date,
            &states,
            |id| if id == "a" { 1500.0 } else { 1000.0 },
            10_000.0,
        );
        assert_eq!(m.active_staff_count, 1);
        assert_eq!(m.on_break_count, 1);
        assert_eq!(m.total_hours_today, 3.5);
        assert_eq!(m.labor_cost_estimate, 4500.0);
        assert_eq!(m.labor_cost_rate, 45.0);
    }

    #[test]
    fn no_sales_means_zero_rate() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let m = labor_metrics(date, &[state("a", StaffStatus::Working, 60)], |_| 1000.0, 0.0);
        assert_eq!(m.labor_cost_rate, 0.0);
        assert_eq!(m.labor_cost_estimate, 1000.0);
    }
}
