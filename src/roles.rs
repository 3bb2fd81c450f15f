//! Session roles and the advisory capability table.
//!
//! Role checks gate what a front end offers; they are not an access-control
//! boundary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Staff,
    Manager,
    Owner,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Staff, Role::Manager, Role::Owner];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Staff => "staff",
            Role::Manager => "manager",
            Role::Owner => "owner",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "staff" => Ok(Role::Staff),
            "manager" => Ok(Role::Manager),
            "owner" => Ok(Role::Owner),
            other => Err(format!(
                "unknown role `{other}`; expected staff, manager or owner"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    RecordLabor,
    RecordSales,
    RecordPrep,
    WorkTodos,
    EditForecast,
    ReviewProposals,
    ViewIncidents,
    ViewLaborCost,
    ViewIncentives,
    RunReplay,
    ManageData,
}

fn capability_table(role: Role) -> &'static [Capability] {
    use Capability::*;
    match role {
        Role::Staff => &[RecordLabor, RecordSales, RecordPrep, WorkTodos, ViewIncentives],
        Role::Manager => &[
            RecordLabor,
            RecordSales,
            RecordPrep,
            WorkTodos,
            EditForecast,
            ReviewProposals,
            ViewIncidents,
            ViewLaborCost,
            ViewIncentives,
        ],
        Role::Owner => &[
            RecordLabor,
            RecordSales,
            RecordPrep,
            WorkTodos,
            EditForecast,
            ReviewProposals,
            ViewIncidents,
            ViewLaborCost,
            ViewIncentives,
            RunReplay,
            ManageData,
        ],
    }
}

/// Capabilities resolved once for the lifetime of a session.
#[derive(Debug, Clone)]
pub struct Session {
    pub role: Role,
    capabilities: BTreeSet<Capability>,
}

impl Session {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            capabilities: capability_table(role).iter().copied().collect(),
        }
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn capabilities(&self) -> impl Iterator<Item = Capability> + '_ {
        self.capabilities.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_has_every_manager_capability() {
        let manager = Session::new(Role::Manager);
        let owner = Session::new(Role::Owner);
        assert!(manager.capabilities().all(|c| owner.can(c)));
        assert!(owner.can(Capability::RunReplay));
        assert!(!manager.can(Capability::ManageData));
    }

    #[test]
    fn staff_cannot_review_proposals() {
        let staff = Session::new(Role::Staff);
        assert!(staff.can(Capability::WorkTodos));
        assert!(!staff.can(Capability::ReviewProposals));
        assert!(!staff.can(Capability::ViewLaborCost));
    }
}
