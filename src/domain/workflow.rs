//! Cross-entity workflow preconditions.
//!
//! Each dependent record (self-assessment, feedback request, peer feedback,
//! expert evaluation) is created by an explicit coordinator call in the
//! storage layer; the checks here run first over snapshots of the entities
//! involved. Every violated precondition surfaces its own stable error so
//! callers can tell "wrong status" from "missing prerequisite" from
//! "duplicate". The storage layer's unique constraints back the duplicate
//! checks against concurrent creators.

use crate::domain::models::{FeedbackRequestStatus, GoalStatus};
use uuid::Uuid;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("goal in status '{}' does not accept a self-assessment", .0.as_str())]
    SelfAssessmentWrongStatus(GoalStatus),
    #[error("a self-assessment already exists for this goal")]
    SelfAssessmentExists,
    #[error("feedback can only be requested for a goal awaiting assessment")]
    FeedbackRequestWrongStatus(GoalStatus),
    #[error("only the goal owner may request feedback")]
    FeedbackRequestNotOwner,
    #[error("you cannot request feedback from yourself")]
    SelfReview,
    #[error("a feedback request for this reviewer already exists")]
    FeedbackRequestExists,
    #[error("this feedback request has already been completed")]
    FeedbackRequestCompleted,
    #[error("only the named reviewer may leave feedback on this request")]
    NotTheReviewer,
    #[error("expert evaluation requires a goal awaiting assessment")]
    ExpertEvaluationWrongStatus(GoalStatus),
    #[error("the goal has no self-assessment yet")]
    MissingSelfAssessment,
    #[error("the goal has no peer feedback yet")]
    MissingPeerFeedback,
    #[error("an expert evaluation already exists for this goal")]
    ExpertEvaluationExists,
}

/// What the expert-evaluation check needs to know about a goal and its
/// dependent records, fetched in one pass.
#[derive(Clone, Copy, Debug)]
pub struct GoalAssessmentSnapshot {
    pub status: GoalStatus,
    pub has_self_assessment: bool,
    pub peer_feedback_count: i64,
    pub has_expert_evaluation: bool,
}

pub fn check_self_assessment_create(
    goal_status: GoalStatus,
    already_exists: bool,
) -> Result<(), WorkflowError> {
    if !goal_status.can_add_self_assessment() {
        return Err(WorkflowError::SelfAssessmentWrongStatus(goal_status));
    }
    if already_exists {
        return Err(WorkflowError::SelfAssessmentExists);
    }
    Ok(())
}

pub fn check_feedback_request_create(
    goal_status: GoalStatus,
    goal_owner: Uuid,
    requester: Uuid,
    reviewer: Uuid,
    duplicate_exists: bool,
) -> Result<(), WorkflowError> {
    if requester != goal_owner {
        return Err(WorkflowError::FeedbackRequestNotOwner);
    }
    if reviewer == requester {
        return Err(WorkflowError::SelfReview);
    }
    if goal_status != GoalStatus::PendingAssessment {
        return Err(WorkflowError::FeedbackRequestWrongStatus(goal_status));
    }
    if duplicate_exists {
        return Err(WorkflowError::FeedbackRequestExists);
    }
    Ok(())
}

pub fn check_peer_feedback_create(
    request_reviewer: Uuid,
    actor_employee: Uuid,
    request_status: FeedbackRequestStatus,
) -> Result<(), WorkflowError> {
    if request_reviewer != actor_employee {
        return Err(WorkflowError::NotTheReviewer);
    }
    if request_status != FeedbackRequestStatus::Pending {
        return Err(WorkflowError::FeedbackRequestCompleted);
    }
    Ok(())
}

/// All prerequisites must hold before the evaluation commits; the missing
/// dependent records are reported before the duplicate check so the caller
/// learns what is actually blocking completion.
pub fn check_expert_evaluation_create(snapshot: GoalAssessmentSnapshot) -> Result<(), WorkflowError> {
    if snapshot.status != GoalStatus::PendingAssessment {
        return Err(WorkflowError::ExpertEvaluationWrongStatus(snapshot.status));
    }
    if !snapshot.has_self_assessment {
        return Err(WorkflowError::MissingSelfAssessment);
    }
    if snapshot.peer_feedback_count == 0 {
        return Err(WorkflowError::MissingPeerFeedback);
    }
    if snapshot.has_expert_evaluation {
        return Err(WorkflowError::ExpertEvaluationExists);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[test]
    fn self_assessment_window_and_duplicate() {
        assert!(check_self_assessment_create(GoalStatus::InProgress, false).is_ok());
        assert!(check_self_assessment_create(GoalStatus::PendingAssessment, false).is_ok());
        assert_eq!(
            check_self_assessment_create(GoalStatus::Draft, false),
            Err(WorkflowError::SelfAssessmentWrongStatus(GoalStatus::Draft))
        );
        assert_eq!(
            check_self_assessment_create(GoalStatus::InProgress, true),
            Err(WorkflowError::SelfAssessmentExists)
        );
    }

    #[test]
    fn feedback_request_preconditions() {
        let owner = id(1);
        let reviewer = id(2);
        assert!(check_feedback_request_create(
            GoalStatus::PendingAssessment, owner, owner, reviewer, false
        )
        .is_ok());

        assert_eq!(
            check_feedback_request_create(GoalStatus::PendingAssessment, owner, id(3), reviewer, false),
            Err(WorkflowError::FeedbackRequestNotOwner)
        );
        assert_eq!(
            check_feedback_request_create(GoalStatus::PendingAssessment, owner, owner, owner, false),
            Err(WorkflowError::SelfReview)
        );
        assert_eq!(
            check_feedback_request_create(GoalStatus::InProgress, owner, owner, reviewer, false),
            Err(WorkflowError::FeedbackRequestWrongStatus(GoalStatus::InProgress))
        );
        assert_eq!(
            check_feedback_request_create(GoalStatus::PendingAssessment, owner, owner, reviewer, true),
            Err(WorkflowError::FeedbackRequestExists)
        );
    }

    #[test]
    fn peer_feedback_preconditions() {
        let reviewer = id(2);
        assert!(check_peer_feedback_create(reviewer, reviewer, FeedbackRequestStatus::Pending).is_ok());
        assert_eq!(
            check_peer_feedback_create(reviewer, id(3), FeedbackRequestStatus::Pending),
            Err(WorkflowError::NotTheReviewer)
        );
        assert_eq!(
            check_peer_feedback_create(reviewer, reviewer, FeedbackRequestStatus::Completed),
            Err(WorkflowError::FeedbackRequestCompleted)
        );
    }

    #[test]
    fn expert_evaluation_reports_first_missing_prerequisite() {
        let base = GoalAssessmentSnapshot {
            status: GoalStatus::PendingAssessment,
            has_self_assessment: true,
            peer_feedback_count: 1,
            has_expert_evaluation: false,
        };
        assert!(check_expert_evaluation_create(base).is_ok());

        assert_eq!(
            check_expert_evaluation_create(GoalAssessmentSnapshot {
                status: GoalStatus::InProgress,
                ..base
            }),
            Err(WorkflowError::ExpertEvaluationWrongStatus(GoalStatus::InProgress))
        );
        // With neither dependent record present, the missing self-assessment
        // is named first.
        assert_eq!(
            check_expert_evaluation_create(GoalAssessmentSnapshot {
                has_self_assessment: false,
                peer_feedback_count: 0,
                ..base
            }),
            Err(WorkflowError::MissingSelfAssessment)
        );
        assert_eq!(
            check_expert_evaluation_create(GoalAssessmentSnapshot {
                peer_feedback_count: 0,
                ..base
            }),
            Err(WorkflowError::MissingPeerFeedback)
        );
        assert_eq!(
            check_expert_evaluation_create(GoalAssessmentSnapshot {
                has_expert_evaluation: true,
                ..base
            }),
            Err(WorkflowError::ExpertEvaluationExists)
        );
    }
}
