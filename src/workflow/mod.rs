//! Proposal → decision → todo workflow records and rules.

pub mod proposal;
pub mod templates;
pub mod transitions;

pub use proposal::{Priority, Proposal, ProposalDraft, proposal_from_decision};
pub use templates::proposal_from_incident;
pub use transitions::validate_decision_transition;
