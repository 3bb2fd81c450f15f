//! Incident records and the book that keeps them across scans.
//!
//! Identity is the signature `type|band|date|subject` scoped by store; the
//! incident id is a digest of it, so repeated scans land on the same record.

pub mod detector;

use crate::error::{CockpitError, Result};
use crate::time::TimeBand;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentType {
    DemandDrop,
    LaborOverrun,
    StockoutRisk,
    DeliveryDelay,
    OpsDelay,
}

impl IncidentType {
    pub fn as_str(self) -> &'static str {
        match self {
            IncidentType::DemandDrop => "demand_drop",
            IncidentType::LaborOverrun => "labor_overrun",
            IncidentType::StockoutRisk => "stockout_risk",
            IncidentType::DeliveryDelay => "delivery_delay",
            IncidentType::OpsDelay => "ops_delay",
        }
    }

    /// Lead agent and supporting agents that own this kind of incident.
    pub fn owners(self) -> (Agent, Vec<Agent>) {
        use Agent::*;
        match self {
            IncidentType::DemandDrop => (Plan, vec![Pos, Management]),
            IncidentType::LaborOverrun => (Hr, vec![Ops, Management]),
            IncidentType::StockoutRisk => (Supply, vec![Ops]),
            IncidentType::DeliveryDelay => (Supply, vec![Ops]),
            IncidentType::OpsDelay => (Ops, vec![Management]),
        }
    }
}

impl fmt::Display for IncidentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl Severity {
    /// Lower rank sorts first.
    pub fn rank(self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::Warning => 1,
            Severity::Info => 2,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
    Open,
    Investigating,
    Proposed,
    Executing,
    Resolved,
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IncidentStatus::Open => "open",
            IncidentStatus::Investigating => "investigating",
            IncidentStatus::Proposed => "proposed",
            IncidentStatus::Executing => "executing",
            IncidentStatus::Resolved => "resolved",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Agent {
    Management,
    Plan,
    Ops,
    Pos,
    Supply,
    Hr,
}

/// A threshold breach found by one detector pass, before it is matched
/// against existing incidents.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub incident_type: IncidentType,
    pub severity: Severity,
    pub time_band: TimeBand,
    pub date: NaiveDate,
    pub subject: Option<String>,
    pub summary: String,
    pub related_ids: Vec<String>,
}

impl Finding {
    pub fn signature(&self, store_id: &str) -> String {
        format!(
            "{store_id}|{}|{}|{}|{}",
            self.incident_type,
            self.time_band,
            self.date,
            self.subject.as_deref().unwrap_or("-")
        )
    }
}

pub fn incident_id(signature: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(signature.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("inc-{}", &digest[..12])
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: String,
    pub signature: String,
    pub store_id: String,
    pub incident_type: IncidentType,
    pub severity: Severity,
    pub status: IncidentStatus,
    pub time_band: TimeBand,
    pub date: NaiveDate,
    #[serde(default)]
    pub subject: Option<String>,
    pub lead_agent: Agent,
    pub supporting_agents: Vec<Agent>,
    pub summary: String,
    #[serde(default)]
    pub related_ids: Vec<String>,
    #[serde(default)]
    pub proposal_id: Option<String>,
    pub detected_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Incident {
    pub fn is_resolved(&self) -> bool {
        self.status == IncidentStatus::Resolved
    }

    fn from_finding(store_id: &str, finding: Finding, now: NaiveDateTime) -> Self {
        let signature = finding.signature(store_id);
        let (lead_agent, supporting_agents) = finding.incident_type.owners();
        Self {
            id: incident_id(&signature),
            signature,
            store_id: store_id.to_string(),
            incident_type: finding.incident_type,
            severity: finding.severity,
            status: IncidentStatus::Open,
            time_band: finding.time_band,
            date: finding.date,
            subject: finding.subject,
            lead_agent,
            supporting_agents,
            summary: finding.summary,
            related_ids: finding.related_ids,
            proposal_id: None,
            detected_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub opened: Vec<String>,
    pub updated: Vec<String>,
    pub resolved: Vec<String>,
    pub unchanged: usize,
}

impl ScanReport {
    pub fn changed(&self) -> bool {
        !(self.opened.is_empty() && self.updated.is_empty() && self.resolved.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncidentBook {
    incidents: BTreeMap<String, Incident>,
}

impl IncidentBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_incidents(incidents: Vec<Incident>) -> Self {
        Self {
            incidents: incidents.into_iter().map(|i| (i.id.clone(), i)).collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Incident> {
        self.incidents.get(id)
    }

    /// Unresolved incidents of a store, most severe first, newest first
    /// within a severity.
    pub fn open_for_store(&self, store_id: &str) -> Vec<&Incident> {
        let mut open = self
            .incidents
            .values()
            .filter(|i| i.store_id == store_id && !i.is_resolved())
            .collect::<Vec<_>>();
        open.sort_by(|a, b| {
            a.severity
                .rank()
                .cmp(&b.severity.rank())
                .then_with(|| b.updated_at.cmp(&a.updated_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        open
    }

    /// Match one scan's findings for `(store_id, date)` against the book.
    ///
    /// A signature that is already resolved stays resolved. Open or
    /// investigating incidents of the scanned date whose condition is gone
    /// are resolved; incidents tied to a proposal follow the proposal instead.
    pub fn reconcile(
        &mut self,
        store_id: &str,
        date: NaiveDate,
        findings: Vec<Finding>,
        now: NaiveDateTime,
    ) -> ScanReport {
        let mut report = ScanReport::default();
        let mut seen = BTreeSet::new();

        for finding in findings {
            let signature = finding.signature(store_id);
            let id = incident_id(&signature);
            seen.insert(id.clone());
            match self.incidents.get_mut(&id) {
                Some(existing) if existing.is_resolved() => report.unchanged += 1,
                Some(existing) => {
                    if existing.severity != finding.severity
                        || existing.summary != finding.summary
                        || existing.related_ids != finding.related_ids
                    {
                        existing.severity = finding.severity;
                        existing.summary = finding.summary;
                        existing.related_ids = finding.related_ids;
                        existing.updated_at = now;
                        report.updated.push(id);
                    } else {
                        report.unchanged += 1;
                    }
                }
                None => {
                    self.incidents
                        .insert(id.clone(), Incident::from_finding(store_id, finding, now));
                    report.opened.push(id);
                }
            }
        }

        for incident in self.incidents.values_mut() {
            if incident.store_id != store_id
                || incident.date != date
                || seen.contains(&incident.id)
            {
                continue;
            }
            if matches!(
                incident.status,
                IncidentStatus::Open | IncidentStatus::Investigating
            ) {
                incident.status = IncidentStatus::Resolved;
                incident.updated_at = now;
                report.resolved.push(incident.id.clone());
            }
        }

        report
    }

    pub fn mark_investigating(&mut self, id: &str, now: NaiveDateTime) -> Result<&Incident> {
        self.transition(id, IncidentStatus::Investigating, now, |from| {
            from == IncidentStatus::Open
        })
    }

    pub fn mark_proposed(
        &mut self,
        id: &str,
        proposal_id: &str,
        now: NaiveDateTime,
    ) -> Result<&Incident> {
        self.transition(id, IncidentStatus::Proposed, now, |from| {
            matches!(from, IncidentStatus::Open | IncidentStatus::Investigating)
        })?;
        let incident = self
            .incidents
            .get_mut(id)
            .ok_or_else(|| CockpitError::not_found(format!("incident {id}")))?;
        incident.proposal_id = Some(proposal_id.to_string());
        Ok(incident)
    }

    pub fn mark_executing(&mut self, id: &str, now: NaiveDateTime) -> Result<&Incident> {
        self.transition(id, IncidentStatus::Executing, now, |from| {
            from == IncidentStatus::Proposed
        })
    }

    /// A rejected proposal hands the incident back for another attempt.
    pub fn return_to_investigating(&mut self, id: &str, now: NaiveDateTime) -> Result<&Incident> {
        self.transition(id, IncidentStatus::Investigating, now, |from| {
            from == IncidentStatus::Proposed
        })?;
        let incident = self
            .incidents
            .get_mut(id)
            .ok_or_else(|| CockpitError::not_found(format!("incident {id}")))?;
        incident.proposal_id = None;
        Ok(incident)
    }

    pub fn resolve(&mut self, id: &str, now: NaiveDateTime) -> Result<&Incident> {
        self.transition(id, IncidentStatus::Resolved, now, |from| {
            from != IncidentStatus::Resolved
        })
    }

    fn transition(
        &mut self,
        id: &str,
        to: IncidentStatus,
        now: NaiveDateTime,
        allowed_from: impl Fn(IncidentStatus) -> bool,
    ) -> Result<&Incident> {
        let incident = self
            .incidents
            .get_mut(id)
            .ok_or_else(|| CockpitError::not_found(format!("incident {id}")))?;
        if !allowed_from(incident.status) {
            return Err(CockpitError::InvalidTransition {
                subject: format!("incident {id}"),
                from: incident.status.to_string(),
                to: to.to_string(),
            });
        }
        incident.status = to;
        incident.updated_at = now;
        Ok(incident)
    }

    pub fn to_vec(&self) -> Vec<Incident> {
        self.incidents.values().cloned().collect()
    }
}
