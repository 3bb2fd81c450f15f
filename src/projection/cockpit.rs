use crate::incidents::{Incident, Severity};
use crate::projection::labor::LaborMetrics;
use crate::projection::prep::PrepMetrics;
use crate::projection::sales::SalesMetrics;
use crate::projection::todos::TodoStats;
use crate::time::TimeBand;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IncidentCounts {
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
}

impl IncidentCounts {
    pub fn tally<'a>(incidents: impl IntoIterator<Item = &'a Incident>) -> Self {
        let mut counts = Self::default();
        for incident in incidents.into_iter().filter(|i| !i.is_resolved()) {
            match incident.severity {
                Severity::Critical => counts.critical += 1,
                Severity::Warning => counts.warning += 1,
                Severity::Info => counts.info += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.critical + self.warning + self.info
    }
}

/// Dashboard headline for one store, date and band.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CockpitMetrics {
    pub store_id: String,
    pub date: NaiveDate,
    pub time_band: TimeBand,
    pub as_of: NaiveDateTime,
    pub sales: SalesMetrics,
    pub labor: LaborMetrics,
    pub prep: PrepMetrics,
    pub todos: TodoStats,
    pub open_incidents: IncidentCounts,
}
