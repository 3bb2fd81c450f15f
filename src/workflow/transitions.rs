use crate::error::{CockpitError, Result};
use crate::events::DecisionAction;

/// Check that a todo currently at `current` may move to `next`.
///
/// `None` means no decision exists yet for the `(proposal, target)` pair.
pub fn validate_decision_transition(
    subject: &str,
    current: Option<DecisionAction>,
    next: DecisionAction,
) -> Result<()> {
    use DecisionAction::*;

    let allowed = match (current, next) {
        (None, Approved | Rejected) => true,
        (None, _) => false,
        (Some(from), _) if from.is_terminal() => false,
        (Some(Approved), Started | Completed) => true,
        (Some(Started), Completed) => true,
        (Some(_), _) => false,
    };
    if allowed {
        return Ok(());
    }
    Err(CockpitError::InvalidTransition {
        subject: subject.to_string(),
        from: current.map_or("none", DecisionAction::as_str).to_string(),
        to: next.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use DecisionAction::*;

    #[test]
    fn start_requires_approved() {
        assert!(validate_decision_transition("t", Some(Approved), Started).is_ok());
        let err = validate_decision_transition("t", Some(Started), Started).unwrap_err();
        assert!(format!("{err}").contains("started -> started"));
        assert!(validate_decision_transition("t", None, Started).is_err());
    }

    #[test]
    fn completing_unstarted_todo_is_permitted() {
        assert!(validate_decision_transition("t", Some(Approved), Completed).is_ok());
        assert!(validate_decision_transition("t", Some(Started), Completed).is_ok());
    }

    #[test]
    fn terminal_todos_reject_everything() {
        for next in [Approved, Started, Completed, Rejected] {
            assert!(validate_decision_transition("t", Some(Completed), next).is_err());
            assert!(validate_decision_transition("t", Some(Rejected), next).is_err());
        }
    }

    #[test]
    fn approval_happens_once() {
        assert!(validate_decision_transition("t", None, Approved).is_ok());
        assert!(validate_decision_transition("t", Some(Approved), Approved).is_err());
    }
}
