use crate::config::StoreProfile;
use crate::events::{DeliveryStatus, DomainEvent, NewEvent};
use crate::incidents::{Incident, ScanReport};
use crate::replay::ReplayState;
use crate::time::TimeBand;
use crate::workflow::{Proposal, ProposalDraft};
use chrono::NaiveDate;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct PrepInput {
    pub prep_item_id: String,
    pub quantity: u32,
    pub batch_id: Option<String>,
    pub proposal_id: Option<String>,
}

impl PrepInput {
    pub fn new(prep_item_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            prep_item_id: prep_item_id.into(),
            quantity,
            batch_id: None,
            proposal_id: None,
        }
    }

    pub fn batch(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = Some(batch_id.into());
        self
    }

    pub fn for_proposal(mut self, proposal_id: impl Into<String>) -> Self {
        self.proposal_id = Some(proposal_id.into());
        self
    }
}

/// Every mutation of a cockpit goes through one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CheckIn {
        staff_id: String,
    },
    CheckOut {
        staff_id: String,
    },
    StartBreak {
        staff_id: String,
    },
    EndBreak {
        staff_id: String,
    },
    RecordSale {
        menu_id: String,
        quantity: u32,
        total: f64,
    },
    RecordDelivery {
        item_name: String,
        status: DeliveryStatus,
        delay_minutes: u32,
    },
    UpsertForecast {
        date: NaiveDate,
        time_band: TimeBand,
        customers: u32,
        average_spend: f64,
    },
    StartPrep(PrepInput),
    CompletePrep(PrepInput),
    CreateProposal(ProposalDraft),
    ProposeFromIncident {
        incident_id: String,
    },
    UpdateProposal(Proposal),
    ApproveProposal {
        proposal_id: String,
    },
    RejectProposal {
        proposal_id: String,
    },
    StartDecision {
        proposal_id: String,
        target_id: Option<String>,
        actor_id: Option<String>,
    },
    CompleteDecision {
        proposal_id: String,
        target_id: Option<String>,
        actor_id: Option<String>,
    },
    ScanIncidents {
        date: Option<NaiveDate>,
    },
    InvestigateIncident {
        incident_id: String,
    },
    SwitchStore {
        store_id: String,
    },
    AppendEvents(Vec<NewEvent>),
    StartReplay {
        batch: Option<Vec<NewEvent>>,
    },
    StepReplay,
    PlayReplay,
    PauseReplay,
    ResetReplay,
    /// Consume ticks from the replay ticker, optionally waiting for one.
    PumpReplay {
        wait: Option<Duration>,
    },
    SeedDemoData,
    ResetAllData,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::CheckIn { .. } => "check_in",
            Command::CheckOut { .. } => "check_out",
            Command::StartBreak { .. } => "start_break",
            Command::EndBreak { .. } => "end_break",
            Command::RecordSale { .. } => "record_sale",
            Command::RecordDelivery { .. } => "record_delivery",
            Command::UpsertForecast { .. } => "upsert_forecast",
            Command::StartPrep(_) => "start_prep",
            Command::CompletePrep(_) => "complete_prep",
            Command::CreateProposal(_) => "create_proposal",
            Command::ProposeFromIncident { .. } => "propose_from_incident",
            Command::UpdateProposal(_) => "update_proposal",
            Command::ApproveProposal { .. } => "approve_proposal",
            Command::RejectProposal { .. } => "reject_proposal",
            Command::StartDecision { .. } => "start_decision",
            Command::CompleteDecision { .. } => "complete_decision",
            Command::ScanIncidents { .. } => "scan_incidents",
            Command::InvestigateIncident { .. } => "investigate_incident",
            Command::SwitchStore { .. } => "switch_store",
            Command::AppendEvents(_) => "append_events",
            Command::StartReplay { .. } => "start_replay",
            Command::StepReplay => "step_replay",
            Command::PlayReplay => "play_replay",
            Command::PauseReplay => "pause_replay",
            Command::ResetReplay => "reset_replay",
            Command::PumpReplay { .. } => "pump_replay",
            Command::SeedDemoData => "seed_demo_data",
            Command::ResetAllData => "reset_all_data",
        }
    }

    /// Replay commands only touch the overlay, which is never persisted.
    pub fn is_durable(&self) -> bool {
        !matches!(
            self,
            Command::StartReplay { .. }
                | Command::StepReplay
                | Command::PlayReplay
                | Command::PauseReplay
                | Command::ResetReplay
                | Command::PumpReplay { .. }
                | Command::ResetAllData
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "value", rename_all = "snake_case")]
pub enum Outcome {
    Events(Vec<DomainEvent>),
    Proposal(Proposal),
    Incident(Incident),
    Scan(ScanReport),
    Replay(ReplayState),
    Store(StoreProfile),
    Cleared,
}

impl Outcome {
    pub fn events(&self) -> &[DomainEvent] {
        match self {
            Outcome::Events(events) => events,
            _ => &[],
        }
    }
}
