//! Request error taxonomy.
//!
//! Four caller-recoverable kinds plus `internal`. Authorization failures
//! (403) and state failures (400) stay distinct: one means "you may not",
//! the other "legal actor, illegal moment". Out-of-scope reads are
//! reported as `not_found` so an invisible id looks exactly like a
//! missing one.

use crate::domain::access::AccessError;
use crate::domain::state_machine::TransitionError;
use crate::domain::workflow::WorkflowError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Authorization(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    StateViolation(String),
    #[error("{0}")]
    DataPrecondition(String),
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Authorization(_) => "authorization",
            ApiError::NotFound(_) => "not_found",
            ApiError::StateViolation(_) => "state_violation",
            ApiError::DataPrecondition(_) => "data_precondition",
            ApiError::Validation(_) => "validation",
            ApiError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Authorization(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::StateViolation(_)
            | ApiError::DataPrecondition(_)
            | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn goal_not_found() -> Self {
        ApiError::NotFound("goal not found".into())
    }

    /// Map a storage error on a workflow insert: a unique-constraint hit is
    /// the concurrent-duplicate case and stays caller-recoverable.
    pub fn on_conflict(err: sqlx::Error, duplicate_detail: &str) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return ApiError::StateViolation(duplicate_detail.to_string());
            }
        }
        ApiError::Internal(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("internal error: {:#}", self);
        } else {
            tracing::debug!("request rejected ({}): {}", self.kind(), self);
        }
        let body = Json(json!({ "error": self.kind(), "detail": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Internal(err.into())
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        ApiError::Authorization(err.to_string())
    }
}

impl From<TransitionError> for ApiError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::Illegal { .. } => ApiError::StateViolation(err.to_string()),
            TransitionError::NoManager => ApiError::DataPrecondition(err.to_string()),
        }
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::FeedbackRequestNotOwner | WorkflowError::NotTheReviewer => {
                ApiError::Authorization(err.to_string())
            }
            WorkflowError::SelfReview => ApiError::Validation(err.to_string()),
            _ => ApiError::StateViolation(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::GoalStatus;
    use crate::domain::state_machine::GoalAction;

    #[test]
    fn kinds_map_to_status_codes() {
        assert_eq!(ApiError::Authorization("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::StateViolation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::DataPrecondition("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn transition_errors_keep_their_kind() {
        let illegal: ApiError = TransitionError::Illegal {
            status: GoalStatus::Completed,
            action: GoalAction::Submit,
        }
        .into();
        assert_eq!(illegal.kind(), "state_violation");

        let no_manager: ApiError = TransitionError::NoManager.into();
        assert_eq!(no_manager.kind(), "data_precondition");
    }

    #[test]
    fn workflow_errors_split_authorization_from_state() {
        let not_reviewer: ApiError = WorkflowError::NotTheReviewer.into();
        assert_eq!(not_reviewer.kind(), "authorization");

        let missing: ApiError = WorkflowError::MissingSelfAssessment.into();
        assert_eq!(missing.kind(), "state_violation");

        let self_review: ApiError = WorkflowError::SelfReview.into();
        assert_eq!(self_review.kind(), "validation");
    }
}
