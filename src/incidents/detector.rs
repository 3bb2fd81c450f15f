//! Threshold scan over the derived views of one store and date.

use crate::config::CockpitConfig;
use crate::events::DomainEvent;
use crate::incidents::{Finding, IncidentType, Severity};
use crate::projection::{
    SalesLedger, StaffStatus, TodoIndex, derive_staff_states, labor_metrics, latest_deliveries,
    prep_metrics,
};
use crate::time::TimeBand;
use chrono::{NaiveDate, NaiveDateTime};

/// Run every rule and return the breaches in a stable order.
pub fn detect(
    events: &[DomainEvent],
    store_id: &str,
    date: NaiveDate,
    as_of: NaiveDateTime,
    config: &CockpitConfig,
) -> Vec<Finding> {
    let mut findings = Vec::new();
    let ledger = SalesLedger::build(events, store_id, &config.bands);
    demand_drop(&ledger, date, as_of, config, &mut findings);
    labor_overrun(events, &ledger, store_id, date, as_of, config, &mut findings);
    stockout_risk(events, store_id, date, as_of, config, &mut findings);
    delivery_delay(events, store_id, date, config, &mut findings);
    ops_delay(events, store_id, date, as_of, &mut findings);
    findings
}

fn rate_severity(rate: f64, warning: f64, critical: f64) -> Option<Severity> {
    if rate < critical {
        Some(Severity::Critical)
    } else if rate < warning {
        Some(Severity::Warning)
    } else {
        None
    }
}

/// Achievement is measured against the share of forecast that should have
/// been sold by `as_of`. A date forecast only as a whole day is paced over
/// the full business day.
fn demand_drop(
    ledger: &SalesLedger,
    date: NaiveDate,
    as_of: NaiveDateTime,
    config: &CockpitConfig,
    out: &mut Vec<Finding>,
) {
    let t = &config.thresholds;
    let per_band = TimeBand::CONCRETE
        .iter()
        .any(|band| ledger.forecast(date, *band).0 > 0.0);
    let bands: &[TimeBand] = if per_band {
        &TimeBand::CONCRETE
    } else {
        &[TimeBand::All]
    };
    for &band in bands {
        if !config.bands.has_started(band, date, as_of) {
            continue;
        }
        let metrics = ledger.metrics(date, band);
        let expected = metrics.forecast_sales * config.bands.elapsed_fraction(band, date, as_of);
        if expected <= 0.0 {
            continue;
        }
        let pace = metrics.actual_sales * 100.0 / expected;
        if let Some(severity) = rate_severity(pace, t.demand_warning_rate, t.demand_critical_rate)
        {
            out.push(Finding {
                incident_type: IncidentType::DemandDrop,
                severity,
                time_band: band,
                date,
                subject: None,
                summary: format!(
                    "{band} sales at {pace:.0}% of forecast pace ({:.0} of {:.0} expected)",
                    metrics.actual_sales, expected
                ),
                related_ids: Vec::new(),
            });
        }
    }
}

fn labor_overrun(
    events: &[DomainEvent],
    ledger: &SalesLedger,
    store_id: &str,
    date: NaiveDate,
    as_of: NaiveDateTime,
    config: &CockpitConfig,
    out: &mut Vec<Finding>,
) {
    let t = &config.thresholds;
    let states = derive_staff_states(events, store_id, date, as_of);
    let actual_sales = ledger.actual_sales(date, TimeBand::All);
    let labor = labor_metrics(date, &states, |id| config.wage_for(id), actual_sales);

    if actual_sales > 0.0 {
        let rate = labor.labor_cost_rate;
        let severity = if rate > t.labor_cost_critical_rate {
            Some(Severity::Critical)
        } else if rate > t.labor_cost_warning_rate {
            Some(Severity::Warning)
        } else {
            None
        };
        if let Some(severity) = severity {
            out.push(Finding {
                incident_type: IncidentType::LaborOverrun,
                severity,
                time_band: TimeBand::All,
                date,
                subject: None,
                summary: format!(
                    "labor cost at {rate:.1}% of sales ({:.0} against {:.0})",
                    labor.labor_cost_estimate, actual_sales
                ),
                related_ids: Vec::new(),
            });
        }
    }

    let break_after = (t.break_required_after_hours * 60.0).round() as i64;
    for state in &states {
        if state.status == StaffStatus::Working
            && state.break_minutes == 0
            && state.worked_minutes() >= break_after
        {
            out.push(Finding {
                incident_type: IncidentType::LaborOverrun,
                severity: Severity::Warning,
                time_band: TimeBand::All,
                date,
                subject: Some(state.staff_id.clone()),
                summary: format!(
                    "{} has worked {:.1}h without a break",
                    config.staff_name(&state.staff_id),
                    state.worked_hours()
                ),
                related_ids: vec![state.staff_id.clone()],
            });
        }
    }
}

/// Prep is only judged once lunch service has begun.
fn stockout_risk(
    events: &[DomainEvent],
    store_id: &str,
    date: NaiveDate,
    as_of: NaiveDateTime,
    config: &CockpitConfig,
    out: &mut Vec<Finding>,
) {
    if !config.bands.has_started(TimeBand::Lunch, date, as_of) {
        return;
    }
    let t = &config.thresholds;
    let prep = prep_metrics(events, store_id, date);
    if prep.tracked() == 0 {
        return;
    }
    if let Some(severity) =
        rate_severity(prep.completion_rate, t.prep_warning_rate, t.prep_critical_rate)
    {
        out.push(Finding {
            incident_type: IncidentType::StockoutRisk,
            severity,
            time_band: TimeBand::All,
            date,
            subject: None,
            summary: format!(
                "prep completion at {:.0}%; outstanding: {}",
                prep.completion_rate,
                prep.outstanding_items.join(", ")
            ),
            related_ids: prep.outstanding_items,
        });
    }
}

fn delivery_delay(
    events: &[DomainEvent],
    store_id: &str,
    date: NaiveDate,
    config: &CockpitConfig,
    out: &mut Vec<Finding>,
) {
    for delivery in latest_deliveries(events, store_id, date) {
        if !delivery.is_delayed() {
            continue;
        }
        let severity =
            if delivery.delay_minutes > config.thresholds.delivery_critical_delay_minutes {
                Severity::Critical
            } else {
                Severity::Warning
            };
        out.push(Finding {
            incident_type: IncidentType::DeliveryDelay,
            severity,
            time_band: config.bands.band_of(delivery.updated_at.time()),
            date,
            summary: format!(
                "{} delivery running {} minutes late",
                delivery.item_name, delivery.delay_minutes
            ),
            subject: Some(delivery.item_name),
            related_ids: Vec::new(),
        });
    }
}

fn ops_delay(
    events: &[DomainEvent],
    store_id: &str,
    date: NaiveDate,
    as_of: NaiveDateTime,
    out: &mut Vec<Finding>,
) {
    let index = TodoIndex::build(events, store_id);
    for todo in index.overdue(as_of) {
        if todo.record.deadline.map(|d| d.date()) != Some(date) {
            continue;
        }
        out.push(Finding {
            incident_type: IncidentType::OpsDelay,
            severity: Severity::Warning,
            time_band: todo.record.time_band,
            date,
            subject: Some(format!("{}/{}", todo.proposal_id, todo.target_id)),
            summary: format!("todo `{}` is past its deadline", todo.record.title),
            related_ids: vec![todo.proposal_id.clone()],
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::log::EventLog;
    use crate::events::{DeliveryStatus, EventPayload, LaborAction, NewEvent};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        date().and_hms_opt(h, m, 0).unwrap()
    }

    fn of_type(findings: &[Finding], kind: IncidentType) -> Vec<&Finding> {
        findings.iter().filter(|f| f.incident_type == kind).collect()
    }

    #[test]
    fn severe_shortfall_is_critical_demand_drop() {
        let mut log = EventLog::new();
        log.append(NewEvent::forecast("store-1", at(8, 0), date(), TimeBand::Lunch, 100_000.0, 90))
            .unwrap();
        log.append(NewEvent::sale("store-1", at(12, 0), "set-a", 20, 30_000.0))
            .unwrap();
        let cfg = CockpitConfig::default();
        let findings = detect(log.events(), "store-1", date(), at(15, 30), &cfg);
        let demand = of_type(&findings, IncidentType::DemandDrop);
        assert_eq!(demand.len(), 1);
        assert_eq!(demand[0].severity, Severity::Critical);
        assert_eq!(demand[0].time_band, TimeBand::Lunch);
    }

    #[test]
    fn demand_is_prorated_within_band() {
        let mut log = EventLog::new();
        log.append(NewEvent::forecast("store-1", at(8, 0), date(), TimeBand::Lunch, 100_000.0, 90))
            .unwrap();
        log.append(NewEvent::sale("store-1", at(12, 0), "set-a", 20, 45_000.0))
            .unwrap();
        let cfg = CockpitConfig::default();
        // Halfway through lunch 45% of forecast is 90% of pace.
        let findings = detect(log.events(), "store-1", date(), at(13, 0), &cfg);
        assert!(of_type(&findings, IncidentType::DemandDrop).is_empty());
        // Band over: 45% of forecast.
        let findings = detect(log.events(), "store-1", date(), at(16, 0), &cfg);
        let demand = of_type(&findings, IncidentType::DemandDrop);
        assert_eq!(demand[0].severity, Severity::Critical);
    }

    #[test]
    fn whole_day_forecast_is_paced_over_the_day() {
        let mut log = EventLog::new();
        log.append(NewEvent::forecast("store-1", at(8, 0), date(), TimeBand::All, 100_000.0, 100))
            .unwrap();
        log.append(NewEvent::sale("store-1", at(12, 0), "set-a", 30, 30_000.0))
            .unwrap();
        let cfg = CockpitConfig::default();
        let findings = detect(log.events(), "store-1", date(), at(23, 0), &cfg);
        let demand = of_type(&findings, IncidentType::DemandDrop);
        assert_eq!(demand.len(), 1);
        assert_eq!(demand[0].severity, Severity::Critical);
        assert_eq!(demand[0].time_band, TimeBand::All);

        // Before open nothing is expected yet.
        let early = detect(log.events(), "store-1", date(), at(9, 0), &cfg);
        assert!(of_type(&early, IncidentType::DemandDrop).is_empty());
    }

    #[test]
    fn band_forecasts_take_precedence_over_whole_day() {
        let mut log = EventLog::new();
        log.append(NewEvent::forecast("store-1", at(8, 0), date(), TimeBand::All, 100_000.0, 100))
            .unwrap();
        log.append(NewEvent::forecast("store-1", at(8, 0), date(), TimeBand::Lunch, 40_000.0, 40))
            .unwrap();
        log.append(NewEvent::sale("store-1", at(12, 0), "set-a", 30, 38_000.0))
            .unwrap();
        let cfg = CockpitConfig::default();
        let findings = detect(log.events(), "store-1", date(), at(16, 0), &cfg);
        assert!(of_type(&findings, IncidentType::DemandDrop).is_empty());
    }

    #[test]
    fn staff_without_break_is_flagged_by_id() {
        let mut log = EventLog::new();
        log.append(NewEvent::labor("store-1", at(9, 0), "staff-2", LaborAction::CheckIn))
            .unwrap();
        let cfg = CockpitConfig::default();
        let early = detect(log.events(), "store-1", date(), at(12, 0), &cfg);
        assert!(of_type(&early, IncidentType::LaborOverrun).is_empty());
        let late = detect(log.events(), "store-1", date(), at(13, 30), &cfg);
        let labor = of_type(&late, IncidentType::LaborOverrun);
        assert_eq!(labor.len(), 1);
        assert_eq!(labor[0].subject.as_deref(), Some("staff-2"));
    }

    #[test]
    fn late_delivery_severity_follows_delay() {
        let mut log = EventLog::new();
        log.append(NewEvent::new(
            "store-1",
            at(9, 0),
            EventPayload::Delivery {
                item_name: "fish".to_string(),
                status: DeliveryStatus::InTransit,
                delay_minutes: 45,
            },
        ))
        .unwrap();
        let cfg = CockpitConfig::default();
        let findings = detect(log.events(), "store-1", date(), at(9, 30), &cfg);
        let delays = of_type(&findings, IncidentType::DeliveryDelay);
        assert_eq!(delays[0].severity, Severity::Critical);
        assert_eq!(delays[0].subject.as_deref(), Some("fish"));
    }

    #[test]
    fn scan_is_deterministic() {
        let mut log = EventLog::new();
        log.append(NewEvent::forecast("store-1", at(8, 0), date(), TimeBand::Lunch, 50_000.0, 40))
            .unwrap();
        log.append(NewEvent::labor("store-1", at(9, 0), "staff-1", LaborAction::CheckIn))
            .unwrap();
        let cfg = CockpitConfig::default();
        let a = detect(log.events(), "store-1", date(), at(14, 0), &cfg);
        let b = detect(log.events(), "store-1", date(), at(14, 0), &cfg);
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }
}
