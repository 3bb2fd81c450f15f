//! Incentive pool and per-staff shares.
//!
//! Points come from worked hours plus quest XP for completed todos. The pool
//! is a share of sales above target and is split in whole currency units by
//! largest remainder, so the estimated shares always add up to the pool.

use crate::config::IncentiveConfig;
use crate::projection::{StaffState, TodoView};
use crate::time::BandSchedule;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SalesBasis {
    Actual,
    RunRate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolStatus {
    Projected,
    Finalized,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncentivePool {
    pub target_sales: f64,
    pub sales_for_calculation: f64,
    pub over_achievement: f64,
    pub over_achievement_rate: f64,
    pub pool_share: f64,
    pub pool: i64,
    pub use_sales_value: SalesBasis,
    pub status: PoolStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffShare {
    pub staff_id: String,
    pub staff_name: String,
    pub worked_hours: f64,
    pub quest_xp: f64,
    pub points: f64,
    pub share_percentage: f64,
    pub estimated_share: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncentiveDistribution {
    pub date: NaiveDate,
    pub pool: IncentivePool,
    pub staff_shares: Vec<StaffShare>,
    pub total_points: f64,
}

pub struct IncentiveInput<'a> {
    pub date: NaiveDate,
    pub as_of: NaiveDateTime,
    pub staff: &'a [StaffState],
    pub completed_todos: &'a [&'a TodoView],
    pub actual_sales: f64,
    pub target_sales: f64,
    pub schedule: &'a BandSchedule,
    pub config: &'a IncentiveConfig,
}

/// Sales the pool is computed from: actuals once the day is over, otherwise
/// today's actuals extrapolated over the elapsed share of the business day.
pub fn sales_for_calculation(input: &IncentiveInput<'_>) -> (f64, SalesBasis, PoolStatus) {
    let finalized = input.date < input.as_of.date()
        || input.schedule.day_closed(input.date, input.as_of);
    if finalized {
        return (input.actual_sales, SalesBasis::Actual, PoolStatus::Finalized);
    }
    let elapsed = input.schedule.elapsed_fraction(
        crate::time::TimeBand::All,
        input.date,
        input.as_of,
    );
    let projected = if elapsed > 0.0 {
        input.actual_sales / elapsed
    } else {
        input.actual_sales
    };
    (projected, SalesBasis::RunRate, PoolStatus::Projected)
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn compute_pool(input: &IncentiveInput<'_>) -> IncentivePool {
    let (sales, basis, status) = sales_for_calculation(input);
    let over = (sales - input.target_sales).max(0.0);
    let over_rate = if input.target_sales > 0.0 {
        over * 100.0 / input.target_sales
    } else {
        0.0
    };
    let pool = round_cents(over * input.config.pool_share).floor() as i64;
    IncentivePool {
        target_sales: input.target_sales,
        sales_for_calculation: sales,
        over_achievement: over,
        over_achievement_rate: over_rate,
        pool_share: input.config.pool_share,
        pool: pool.max(0),
        use_sales_value: basis,
        status,
    }
}

pub fn distribute(
    input: &IncentiveInput<'_>,
    staff_name: impl Fn(&str) -> String,
) -> IncentiveDistribution {
    let pool = compute_pool(input);

    let mut hours: BTreeMap<&str, f64> = BTreeMap::new();
    for state in input.staff {
        *hours.entry(state.staff_id.as_str()).or_default() += state.worked_hours();
    }
    let mut xp: BTreeMap<&str, f64> = BTreeMap::new();
    for todo in input.completed_todos {
        if todo.updated_at.date() != input.date {
            continue;
        }
        if let Some(actor) = todo.record.actor_id.as_deref() {
            *xp.entry(actor).or_default() += todo.record.priority.quest_xp();
            hours.entry(actor).or_default();
        }
    }

    let mut shares = hours
        .into_iter()
        .map(|(id, worked_hours)| {
            let quest_xp = xp.get(id).copied().unwrap_or(0.0);
            StaffShare {
                staff_id: id.to_string(),
                staff_name: staff_name(id),
                worked_hours,
                quest_xp,
                points: worked_hours * input.config.points_per_hour + quest_xp,
                share_percentage: 0.0,
                estimated_share: 0,
            }
        })
        .filter(|s| s.points > 0.0)
        .collect::<Vec<_>>();
    shares.sort_by(|a, b| {
        b.points
            .total_cmp(&a.points)
            .then_with(|| a.staff_id.cmp(&b.staff_id))
    });

    let total_points: f64 = shares.iter().map(|s| s.points).sum();
    if total_points > 0.0 {
        for share in &mut shares {
            share.share_percentage = share.points * 100.0 / total_points;
        }
        allocate_largest_remainder(&mut shares, pool.pool, total_points);
    }

    IncentiveDistribution {
        date: input.date,
        pool,
        staff_shares: shares,
        total_points,
    }
}

/// Floor every raw share, then hand leftover units to the largest fractional
/// parts. Ties go to the earlier entry, which is the higher point total.
fn allocate_largest_remainder(shares: &mut [StaffShare], pool: i64, total_points: f64) {
    if pool <= 0 {
        return;
    }
    let raw = shares
        .iter()
        .map(|s| pool as f64 * s.points / total_points)
        .collect::<Vec<_>>();
    let mut allocated = 0i64;
    for (share, value) in shares.iter_mut().zip(&raw) {
        share.estimated_share = value.floor() as i64;
        allocated += share.estimated_share;
    }
    let mut order = (0..shares.len()).collect::<Vec<_>>();
    order.sort_by(|&a, &b| {
        let fa = raw[a] - raw[a].floor();
        let fb = raw[b] - raw[b].floor();
        fb.total_cmp(&fa).then_with(|| a.cmp(&b))
    });
    let mut leftover = pool - allocated;
    for idx in order.into_iter().cycle() {
        if leftover <= 0 {
            break;
        }
        shares[idx].estimated_share += 1;
        leftover -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{DecisionAction, DecisionRecord};
    use crate::projection::StaffStatus;
    use crate::time::TimeBand;
    use crate::workflow::Priority;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn at(h: u32) -> NaiveDateTime {
        date().and_hms_opt(h, 0, 0).unwrap()
    }

    fn staff(id: &str, minutes: i64) -> StaffState {
        StaffState {
            staff_id: id.to_string(),
            status: StaffStatus::Out,
            total_minutes: minutes,
            ..StaffState::default()
        }
    }

    fn completed(actor: &str, priority: Priority) -> TodoView {
        let record = DecisionRecord {
            proposal_id: "prop-1".to_string(),
            target_id: format!("role:{actor}"),
            title: "Prep rice".to_string(),
            description: String::new(),
            reason: String::new(),
            proposal_type: "prep".to_string(),
            priority,
            action: DecisionAction::Completed,
            distributed_to_roles: vec![],
            target_prep_item_ids: vec![],
            target_menu_ids: vec![],
            quantity: None,
            deadline: None,
            time_band: TimeBand::All,
            expected_effects: vec![],
            todo_count: 1,
            incident_id: None,
            actor_id: Some(actor.to_string()),
        };
        TodoView {
            proposal_id: record.proposal_id.clone(),
            target_id: record.target_id.clone(),
            store_id: "s1".to_string(),
            action: DecisionAction::Completed,
            record,
            approved_at: Some(at(10)),
            updated_at: at(11),
            last_seq: 3,
        }
    }

    fn input<'a>(
        staff: &'a [StaffState],
        todos: &'a [&'a TodoView],
        actual: f64,
        as_of: NaiveDateTime,
        schedule: &'a BandSchedule,
        config: &'a IncentiveConfig,
    ) -> IncentiveInput<'a> {
        IncentiveInput {
            date: date(),
            as_of,
            staff,
            completed_todos: todos,
            actual_sales: actual,
            target_sales: 100_000.0,
            schedule,
            config,
        }
    }

    #[test]
    fn pool_is_share_of_over_achievement() {
        let schedule = BandSchedule::default();
        let config = IncentiveConfig::default();
        let staff = [staff("a", 480)];
        let dist = distribute(
            &input(&staff, &[], 120_000.0, at(23), &schedule, &config),
            |id| id.to_uppercase(),
        );
        assert_eq!(dist.pool.pool, 2000);
        assert_eq!(dist.pool.status, PoolStatus::Finalized);
        assert_eq!(dist.pool.use_sales_value, SalesBasis::Actual);
        assert_eq!(dist.staff_shares[0].estimated_share, 2000);
        assert_eq!(dist.staff_shares[0].staff_name, "A");
    }

    #[test]
    fn shares_conserve_the_pool() {
        let schedule = BandSchedule::default();
        let config = IncentiveConfig::default();
        let staff = [staff("a", 60), staff("b", 60), staff("c", 60)];
        let dist = distribute(
            &input(&staff, &[], 101_000.0, at(23), &schedule, &config),
            str::to_string,
        );
        assert_eq!(dist.pool.pool, 100);
        let total: i64 = dist.staff_shares.iter().map(|s| s.estimated_share).sum();
        assert_eq!(total, 100);
        let pct: f64 = dist.staff_shares.iter().map(|s| s.share_percentage).sum();
        assert!((pct - 100.0).abs() < 1e-9);
        assert_eq!(dist.staff_shares[0].estimated_share, 34);
    }

    #[test]
    fn quest_xp_adds_points_by_priority() {
        let schedule = BandSchedule::default();
        let config = IncentiveConfig::default();
        let staff = [staff("a", 60), staff("b", 60)];
        let todo = completed("b", Priority::High);
        let todos = [&todo];
        let dist = distribute(
            &input(&staff, &todos, 0.0, at(23), &schedule, &config),
            str::to_string,
        );
        assert_eq!(dist.staff_shares[0].staff_id, "b");
        assert_eq!(dist.staff_shares[0].points, 30.0);
        assert_eq!(dist.total_points, 40.0);
        assert_eq!(dist.pool.pool, 0);
        assert!(dist.staff_shares.iter().all(|s| s.estimated_share == 0));
    }

    #[test]
    fn open_day_uses_run_rate() {
        let schedule = BandSchedule::default();
        let config = IncentiveConfig::default();
        // 10:00-22:00, at 16:00 half the day is gone.
        let dist = distribute(
            &input(&[], &[], 60_000.0, at(16), &schedule, &config),
            str::to_string,
        );
        assert_eq!(dist.pool.status, PoolStatus::Projected);
        assert_eq!(dist.pool.sales_for_calculation, 120_000.0);
        assert_eq!(dist.pool.pool, 2000);
        assert!(dist.staff_shares.is_empty());
    }
}
