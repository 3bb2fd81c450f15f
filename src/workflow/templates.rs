use crate::incidents::{Incident, IncidentType, Severity};
use crate::roles::Role;
use crate::workflow::{Priority, ProposalDraft};
use chrono::{Duration, NaiveDateTime};

fn priority_for(severity: Severity) -> Priority {
    match severity {
        Severity::Critical => Priority::Critical,
        Severity::Warning => Priority::High,
        Severity::Info => Priority::Medium,
    }
}

/// Draft the standard countermeasure for an incident. The draft links back to
/// the incident so approval and completion advance its status.
pub fn proposal_from_incident(incident: &Incident, now: NaiveDateTime) -> ProposalDraft {
    let band = incident.time_band;
    let subject = incident.subject.as_deref().unwrap_or("store");
    let draft = match incident.incident_type {
        IncidentType::DemandDrop => ProposalDraft::new(
            format!("Recover {band} demand"),
            "promotion",
        )
        .description("Run a same-day promotion and push upsell items at the register.")
        .roles([Role::Manager, Role::Staff])
        .expected_effect(format!("{band} achievement back above 80% of forecast pace"))
        .deadline(now + Duration::hours(2)),
        IncidentType::LaborOverrun if incident.subject.is_some() => ProposalDraft::new(
            format!("Schedule a break for {subject}"),
            "staffing",
        )
        .description("Rotate coverage so the staff member can take a break.")
        .roles([Role::Manager])
        .expected_effect("Break recorded within 30 minutes")
        .deadline(now + Duration::minutes(30)),
        IncidentType::LaborOverrun => ProposalDraft::new("Trim staffing to demand", "staffing")
            .description("Release or reassign staff until labor cost is back under threshold.")
            .roles([Role::Manager, Role::Owner])
            .expected_effect("Labor cost rate back under the warning threshold")
            .deadline(now + Duration::hours(1)),
        IncidentType::StockoutRisk => ProposalDraft::new("Accelerate prep", "prep")
            .description("Start outstanding prep batches before the next rush.")
            .prep_items(incident.related_ids.iter().cloned())
            .roles([Role::Staff])
            .expected_effect("Prep completion rate above the warning threshold")
            .deadline(now + Duration::hours(1)),
        IncidentType::DeliveryDelay => ProposalDraft::new(
            format!("Follow up on {subject} delivery"),
            "supply",
        )
        .description("Call the supplier for a new ETA and plan substitutes if needed.")
        .roles([Role::Manager])
        .expected_effect("Confirmed arrival time or substitute plan")
        .deadline(now + Duration::minutes(30)),
        IncidentType::OpsDelay => ProposalDraft::new(
            format!("Unblock overdue todo {subject}"),
            "ops",
        )
        .description("Reassign or finish the overdue task.")
        .roles([Role::Manager])
        .expected_effect("Overdue task completed")
        .deadline(now + Duration::minutes(30)),
    };
    draft
        .store(incident.store_id.clone())
        .reason(incident.summary.clone())
        .priority(priority_for(incident.severity))
        .time_band(band)
        .incident(incident.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incidents::{Finding, IncidentBook};
    use crate::time::TimeBand;
    use chrono::NaiveDate;

    fn incident(kind: IncidentType, subject: Option<&str>, related: &[&str]) -> Incident {
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let now = date.and_hms_opt(12, 0, 0).unwrap();
        let mut book = IncidentBook::new();
        let report = book.reconcile(
            "s1",
            date,
            vec![Finding {
                incident_type: kind,
                severity: Severity::Critical,
                time_band: TimeBand::Lunch,
                date,
                subject: subject.map(str::to_string),
                summary: "summary".to_string(),
                related_ids: related.iter().map(|s| s.to_string()).collect(),
            }],
            now,
        );
        book.get(&report.opened[0]).unwrap().clone()
    }

    #[test]
    fn stockout_template_targets_outstanding_prep() {
        let inc = incident(IncidentType::StockoutRisk, None, &["rice", "broth"]);
        let now = inc.detected_at;
        let p = proposal_from_incident(&inc, now).build("prop-1", now).unwrap();
        assert_eq!(p.todo_count, 2);
        assert_eq!(p.priority, Priority::Critical);
        assert_eq!(p.incident_id.as_deref(), Some(inc.id.as_str()));
        assert_eq!(p.reason, "summary");
        assert_eq!(p.store_id, "s1");
    }

    #[test]
    fn break_template_names_staff() {
        let inc = incident(IncidentType::LaborOverrun, Some("staff-2"), &[]);
        let draft = proposal_from_incident(&inc, inc.detected_at);
        assert!(draft.title.contains("staff-2"));
        assert_eq!(draft.distributed_to_roles, vec![Role::Manager]);
    }
}
