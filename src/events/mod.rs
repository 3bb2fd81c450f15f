pub mod log;
pub mod schema;
pub mod store;

use crate::roles::Role;
use crate::time::TimeBand;
use crate::workflow::Priority;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An immutable entry of the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: String,
    pub seq: u64,
    pub ts: NaiveDateTime,
    pub store_id: String,
    pub payload: EventPayload,
}

impl DomainEvent {
    pub fn date(&self) -> NaiveDate {
        self.ts.date()
    }

    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    Sales {
        total: f64,
        quantity: u32,
        menu_id: String,
    },
    Labor {
        staff_id: String,
        action: LaborAction,
    },
    Prep {
        prep_item_id: String,
        #[serde(default)]
        batch_id: Option<String>,
        quantity: u32,
        status: PrepStatus,
        #[serde(default)]
        proposal_id: Option<String>,
    },
    Delivery {
        item_name: String,
        status: DeliveryStatus,
        #[serde(default)]
        delay_minutes: u32,
    },
    Decision(DecisionRecord),
    Forecast {
        date: NaiveDate,
        time_band: TimeBand,
        forecast_sales: f64,
        forecast_customers: u32,
    },
}

impl EventPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            EventPayload::Sales { .. } => "sales",
            EventPayload::Labor { .. } => "labor",
            EventPayload::Prep { .. } => "prep",
            EventPayload::Delivery { .. } => "delivery",
            EventPayload::Decision(_) => "decision",
            EventPayload::Forecast { .. } => "forecast",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LaborAction {
    CheckIn,
    CheckOut,
    BreakStart,
    BreakEnd,
}

impl fmt::Display for LaborAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LaborAction::CheckIn => "check-in",
            LaborAction::CheckOut => "check-out",
            LaborAction::BreakStart => "break-start",
            LaborAction::BreakEnd => "break-end",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrepStatus {
    Planned,
    Started,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryStatus {
    Scheduled,
    InTransit,
    Delivered,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionAction {
    Approved,
    Started,
    Completed,
    Rejected,
}

impl DecisionAction {
    pub fn is_terminal(self) -> bool {
        matches!(self, DecisionAction::Completed | DecisionAction::Rejected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DecisionAction::Approved => "approved",
            DecisionAction::Started => "started",
            DecisionAction::Completed => "completed",
            DecisionAction::Rejected => "rejected",
        }
    }
}

impl fmt::Display for DecisionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a `decision` event. Carries the full proposal shape so a todo
/// can be rebuilt into a proposal without the original record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub proposal_id: String,
    pub target_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub proposal_type: String,
    pub priority: Priority,
    pub action: DecisionAction,
    #[serde(default)]
    pub distributed_to_roles: Vec<Role>,
    #[serde(default)]
    pub target_prep_item_ids: Vec<String>,
    #[serde(default)]
    pub target_menu_ids: Vec<String>,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub deadline: Option<NaiveDateTime>,
    #[serde(default = "default_band")]
    pub time_band: TimeBand,
    #[serde(default)]
    pub expected_effects: Vec<String>,
    #[serde(default)]
    pub todo_count: u32,
    #[serde(default)]
    pub incident_id: Option<String>,
    #[serde(default)]
    pub actor_id: Option<String>,
}

fn default_band() -> TimeBand {
    TimeBand::All
}

/// An event submitted for append. The log assigns `seq`, and `id` when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    #[serde(default)]
    pub id: Option<String>,
    pub ts: NaiveDateTime,
    pub store_id: String,
    pub payload: EventPayload,
}

impl NewEvent {
    pub fn new(store_id: &str, ts: NaiveDateTime, payload: EventPayload) -> Self {
        Self {
            id: None,
            ts,
            store_id: store_id.to_string(),
            payload,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn labor(store_id: &str, ts: NaiveDateTime, staff_id: &str, action: LaborAction) -> Self {
        Self::new(
            store_id,
            ts,
            EventPayload::Labor {
                staff_id: staff_id.to_string(),
                action,
            },
        )
    }

    pub fn sale(store_id: &str, ts: NaiveDateTime, menu_id: &str, quantity: u32, total: f64) -> Self {
        Self::new(
            store_id,
            ts,
            EventPayload::Sales {
                total,
                quantity,
                menu_id: menu_id.to_string(),
            },
        )
    }

    pub fn forecast(
        store_id: &str,
        ts: NaiveDateTime,
        date: NaiveDate,
        time_band: TimeBand,
        forecast_sales: f64,
        forecast_customers: u32,
    ) -> Self {
        Self::new(
            store_id,
            ts,
            EventPayload::Forecast {
                date,
                time_band,
                forecast_sales,
                forecast_customers,
            },
        )
    }
}

impl From<DomainEvent> for NewEvent {
    fn from(ev: DomainEvent) -> Self {
        Self {
            id: Some(ev.id),
            ts: ev.ts,
            store_id: ev.store_id,
            payload: ev.payload,
        }
    }
}
