//! Goal lifecycle state machine.
//!
//! Who may trigger an action is decided by [`crate::domain::access`]; this
//! module only answers whether the action is legal in the goal's current
//! status and what status it lands on. Every (status, action) pair outside
//! the table below is an error, never a silent no-op.

use crate::domain::models::GoalStatus;
use serde::Deserialize;

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GoalAction {
    Submit,
    Approve,
    Complete,
}

impl GoalAction {
    pub const ALL: [GoalAction; 3] = [GoalAction::Submit, GoalAction::Approve, GoalAction::Complete];

    pub fn as_str(&self) -> &'static str {
        match self {
            GoalAction::Submit => "submit",
            GoalAction::Approve => "approve",
            GoalAction::Complete => "complete",
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("cannot {} a goal in status '{}'", .action.as_str(), .status.as_str())]
    Illegal { status: GoalStatus, action: GoalAction },
    #[error("goal owner has no manager assigned to approve it")]
    NoManager,
}

/// Resolve the target status for `action` on a goal currently in `status`.
///
/// Approval lands straight on `InProgress`; the `Approved` label is a
/// transient alias retained only in the persisted enum.
pub fn transition(status: GoalStatus, action: GoalAction) -> Result<GoalStatus, TransitionError> {
    match (status, action) {
        (GoalStatus::Draft, GoalAction::Submit) => Ok(GoalStatus::PendingApproval),
        (GoalStatus::PendingApproval, GoalAction::Approve) => Ok(GoalStatus::InProgress),
        (GoalStatus::InProgress, GoalAction::Complete) => Ok(GoalStatus::PendingAssessment),
        _ => Err(TransitionError::Illegal { status, action }),
    }
}

/// Submit is additionally gated on the owner having a manager to route the
/// approval to. This is a data precondition, not an authorization failure.
pub fn check_submit_has_manager(owner_has_manager: bool) -> Result<(), TransitionError> {
    if owner_has_manager {
        Ok(())
    } else {
        Err(TransitionError::NoManager)
    }
}

/// Draft is the only status in which the owner may edit or delete a goal.
pub fn is_mutable(status: GoalStatus) -> bool {
    status == GoalStatus::Draft
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path() {
        let status = GoalStatus::Draft;
        let status = transition(status, GoalAction::Submit).unwrap();
        assert_eq!(status, GoalStatus::PendingApproval);
        let status = transition(status, GoalAction::Approve).unwrap();
        assert_eq!(status, GoalStatus::InProgress);
        let status = transition(status, GoalAction::Complete).unwrap();
        assert_eq!(status, GoalStatus::PendingAssessment);
    }

    #[test]
    fn every_unlisted_pair_fails() {
        let legal = [
            (GoalStatus::Draft, GoalAction::Submit),
            (GoalStatus::PendingApproval, GoalAction::Approve),
            (GoalStatus::InProgress, GoalAction::Complete),
        ];
        for status in GoalStatus::ALL {
            for action in GoalAction::ALL {
                let result = transition(status, action);
                if legal.contains(&(status, action)) {
                    assert!(result.is_ok(), "{status:?} {action:?}");
                } else {
                    assert_eq!(result, Err(TransitionError::Illegal { status, action }));
                }
            }
        }
    }

    #[test]
    fn completed_and_cancelled_are_terminal() {
        for status in [GoalStatus::Completed, GoalStatus::Cancelled] {
            for action in GoalAction::ALL {
                assert!(transition(status, action).is_err());
            }
        }
    }

    #[test]
    fn submit_requires_manager() {
        assert_eq!(check_submit_has_manager(false), Err(TransitionError::NoManager));
        assert_eq!(check_submit_has_manager(true), Ok(()));
    }

    #[test]
    fn only_draft_is_mutable() {
        for status in GoalStatus::ALL {
            assert_eq!(is_mutable(status), status == GoalStatus::Draft);
        }
    }
}
