use crate::error::{CockpitError, Result};
use crate::events::{DecisionAction, DecisionRecord};
use crate::roles::Role;
use crate::time::TimeBand;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Quest XP earned by completing a todo of this priority.
    pub fn quest_xp(self) -> f64 {
        match self {
            Priority::Low => 5.0,
            Priority::Medium => 10.0,
            Priority::High => 20.0,
            Priority::Critical => 30.0,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        };
        f.write_str(s)
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(format!(
                "unknown priority `{other}`; expected low, medium, high or critical"
            )),
        }
    }
}

/// A recommendation waiting in the pending queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: String,
    /// Store whose queue holds the proposal and whose log receives its todos.
    #[serde(default)]
    pub store_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub reason: String,
    pub proposal_type: String,
    pub priority: Priority,
    pub time_band: TimeBand,
    #[serde(default)]
    pub target_menu_ids: Vec<String>,
    #[serde(default)]
    pub target_prep_item_ids: Vec<String>,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub distributed_to_roles: Vec<Role>,
    #[serde(default)]
    pub deadline: Option<NaiveDateTime>,
    #[serde(default)]
    pub expected_effects: Vec<String>,
    #[serde(default)]
    pub todo_count: u32,
    #[serde(default)]
    pub incident_id: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Prefix of fan-out target ids so prep items and menus never collide.
pub const PREP_TARGET: &str = "prep:";
pub const MENU_TARGET: &str = "menu:";
pub const ROLE_TARGET: &str = "role:";
pub const AGGREGATE_TARGET: &str = "all";

impl Proposal {
    /// Targets one approval fans out into: prep items then menus, otherwise
    /// one per distributed role, otherwise a single aggregate todo.
    pub fn fan_out_targets(&self) -> Vec<String> {
        let mut targets = self
            .target_prep_item_ids
            .iter()
            .map(|id| format!("{PREP_TARGET}{id}"))
            .chain(
                self.target_menu_ids
                    .iter()
                    .map(|id| format!("{MENU_TARGET}{id}")),
            )
            .collect::<Vec<_>>();
        if targets.is_empty() {
            targets = self
                .distributed_to_roles
                .iter()
                .map(|role| format!("{ROLE_TARGET}{role}"))
                .collect();
        }
        if targets.is_empty() {
            targets.push(AGGREGATE_TARGET.to_string());
        }
        let mut seen = HashSet::new();
        targets.retain(|t| seen.insert(t.clone()));
        targets
    }

    pub fn planned_todo_count(&self) -> u32 {
        self.fan_out_targets().len() as u32
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(CockpitError::validation("proposal id must not be blank"));
        }
        if self.title.trim().is_empty() {
            return Err(CockpitError::validation("proposal title must not be blank"));
        }
        if self.proposal_type.trim().is_empty() {
            return Err(CockpitError::validation("proposal type must not be blank"));
        }
        if let Some(blank) = self
            .target_menu_ids
            .iter()
            .chain(&self.target_prep_item_ids)
            .find(|id| id.trim().is_empty())
        {
            return Err(CockpitError::validation(format!(
                "proposal {} has a blank target id `{blank}`",
                self.id
            )));
        }
        if self.quantity == Some(0) {
            return Err(CockpitError::validation(
                "proposal quantity must be positive when set",
            ));
        }
        Ok(())
    }

    /// The decision payload for one fan-out target.
    pub fn decision_record(
        &self,
        target_id: &str,
        action: DecisionAction,
        actor_id: Option<&str>,
    ) -> DecisionRecord {
        DecisionRecord {
            proposal_id: self.id.clone(),
            target_id: target_id.to_string(),
            title: self.title.clone(),
            description: self.description.clone(),
            reason: self.reason.clone(),
            proposal_type: self.proposal_type.clone(),
            priority: self.priority,
            action,
            distributed_to_roles: self.distributed_to_roles.clone(),
            target_prep_item_ids: self.target_prep_item_ids.clone(),
            target_menu_ids: self.target_menu_ids.clone(),
            quantity: self.quantity,
            deadline: self.deadline,
            time_band: self.time_band,
            expected_effects: self.expected_effects.clone(),
            todo_count: self.todo_count,
            incident_id: self.incident_id.clone(),
            actor_id: actor_id.map(str::to_string),
        }
    }
}

/// Rebuild the authoring shape of a proposal from one of its decision records.
pub fn proposal_from_decision(
    store_id: &str,
    record: &DecisionRecord,
    created_at: NaiveDateTime,
) -> Proposal {
    Proposal {
        id: record.proposal_id.clone(),
        store_id: store_id.to_string(),
        title: record.title.clone(),
        description: record.description.clone(),
        reason: record.reason.clone(),
        proposal_type: record.proposal_type.clone(),
        priority: record.priority,
        time_band: record.time_band,
        target_menu_ids: record.target_menu_ids.clone(),
        target_prep_item_ids: record.target_prep_item_ids.clone(),
        quantity: record.quantity,
        distributed_to_roles: record.distributed_to_roles.clone(),
        deadline: record.deadline,
        expected_effects: record.expected_effects.clone(),
        todo_count: record.todo_count,
        incident_id: record.incident_id.clone(),
        created_at,
    }
}

/// Manual or templated proposal input before an id is assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposalDraft {
    pub store_id: String,
    pub title: String,
    pub description: String,
    pub reason: String,
    pub proposal_type: String,
    pub priority: Priority,
    pub time_band: TimeBand,
    pub target_menu_ids: Vec<String>,
    pub target_prep_item_ids: Vec<String>,
    pub quantity: Option<u32>,
    pub distributed_to_roles: Vec<Role>,
    pub deadline: Option<NaiveDateTime>,
    pub expected_effects: Vec<String>,
    pub incident_id: Option<String>,
}

impl ProposalDraft {
    pub fn new(title: impl Into<String>, proposal_type: impl Into<String>) -> Self {
        Self {
            store_id: String::new(),
            title: title.into(),
            description: String::new(),
            reason: String::new(),
            proposal_type: proposal_type.into(),
            priority: Priority::Medium,
            time_band: TimeBand::All,
            target_menu_ids: Vec::new(),
            target_prep_item_ids: Vec::new(),
            quantity: None,
            distributed_to_roles: Vec::new(),
            deadline: None,
            expected_effects: Vec::new(),
            incident_id: None,
        }
    }

    pub fn store(mut self, store_id: impl Into<String>) -> Self {
        self.store_id = store_id.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn time_band(mut self, band: TimeBand) -> Self {
        self.time_band = band;
        self
    }

    pub fn roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.distributed_to_roles = roles.into_iter().collect();
        self
    }

    pub fn prep_items(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.target_prep_item_ids = ids.into_iter().collect();
        self
    }

    pub fn menus(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.target_menu_ids = ids.into_iter().collect();
        self
    }

    pub fn quantity(mut self, quantity: u32) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn deadline(mut self, deadline: NaiveDateTime) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn expected_effect(mut self, effect: impl Into<String>) -> Self {
        self.expected_effects.push(effect.into());
        self
    }

    pub fn incident(mut self, incident_id: impl Into<String>) -> Self {
        self.incident_id = Some(incident_id.into());
        self
    }

    /// Assign identity and compute the fan-out. The result is validated.
    pub fn build(self, id: impl Into<String>, created_at: NaiveDateTime) -> Result<Proposal> {
        let mut proposal = Proposal {
            id: id.into(),
            store_id: self.store_id,
            title: self.title.trim().to_string(),
            description: self.description,
            reason: self.reason,
            proposal_type: self.proposal_type.trim().to_string(),
            priority: self.priority,
            time_band: self.time_band,
            target_menu_ids: self.target_menu_ids,
            target_prep_item_ids: self.target_prep_item_ids,
            quantity: self.quantity,
            distributed_to_roles: self.distributed_to_roles,
            deadline: self.deadline,
            expected_effects: self.expected_effects,
            todo_count: 0,
            incident_id: self.incident_id,
            created_at,
        };
        proposal.validate()?;
        proposal.todo_count = proposal.planned_todo_count();
        Ok(proposal)
    }
}
