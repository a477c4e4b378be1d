//! Assessment workflow: self-assessment, feedback requests, peer feedback,
//! expert evaluation.
//!
//! Creation of each dependent record runs its precondition checks against
//! fresh snapshots, then commits through the storage layer, which performs
//! any parent-status flip in the same transaction and whose unique
//! constraints absorb concurrent duplicates.

use crate::db;
use crate::domain::access;
use crate::domain::models::UserRole;
use crate::domain::workflow;
use crate::error::ApiError;
use crate::state::SharedState;
use crate::web::goals::load_visible_goal;
use crate::web::session::AuthActor;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct AssessmentPayload {
    pub rating: i16,
    pub comments: String,
    pub areas_to_improve: String,
}

#[derive(Deserialize)]
pub struct CreateFeedbackRequestPayload {
    pub reviewer_id: Uuid,
    #[serde(default)]
    pub message: String,
}

#[derive(Deserialize)]
pub struct ExpertEvaluationPayload {
    pub final_rating: i16,
    pub comments: String,
    pub areas_to_improve: String,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route(
            "/goals/:id/self-assessment",
            get(get_self_assessment)
                .post(create_self_assessment)
                .put(update_self_assessment)
                .patch(update_self_assessment),
        )
        .route(
            "/goals/:id/feedback-requests",
            get(list_feedback_requests).post(create_feedback_request),
        )
        .route("/goals/:id/feedback-requests/mine", get(my_feedback_requests))
        .route("/feedback-requests/:id/feedback", post(create_peer_feedback))
        .route(
            "/goals/:id/expert-evaluation",
            get(get_expert_evaluation).post(create_expert_evaluation),
        )
        .with_state(state)
}

fn validate_rating(rating: i16) -> Result<(), ApiError> {
    if !(1..=10).contains(&rating) {
        return Err(ApiError::Validation("rating must be between 1 and 10".into()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Self-assessment
// ---------------------------------------------------------------------------

async fn get_self_assessment(
    AuthActor(actor): AuthActor,
    State(state): State<SharedState>,
    Path(goal_id): Path<Uuid>,
) -> Result<Json<db::SelfAssessmentRow>, ApiError> {
    let (goal, _, _) = load_visible_goal(&state, &actor, goal_id).await?;
    let assessment = db::find_self_assessment(&state.pool, goal.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("no self-assessment for this goal".into()))?;
    Ok(Json(assessment))
}

async fn create_self_assessment(
    AuthActor(actor): AuthActor,
    State(state): State<SharedState>,
    Path(goal_id): Path<Uuid>,
    Json(payload): Json<AssessmentPayload>,
) -> Result<(StatusCode, Json<db::SelfAssessmentRow>), ApiError> {
    let (goal, _, rel) = load_visible_goal(&state, &actor, goal_id).await?;
    access::authorize_self_assessment_write(&actor, rel)?;
    validate_rating(payload.rating)?;

    let exists = db::find_self_assessment(&state.pool, goal.id).await?.is_some();
    workflow::check_self_assessment_create(goal.status, exists)?;

    let assessment = db::create_self_assessment(
        &state.pool,
        goal.id,
        payload.rating,
        &payload.comments,
        &payload.areas_to_improve,
    )
    .await
    .map_err(|e| ApiError::on_conflict(e, "a self-assessment already exists for this goal"))?;

    Ok((StatusCode::CREATED, Json(assessment)))
}

async fn update_self_assessment(
    AuthActor(actor): AuthActor,
    State(state): State<SharedState>,
    Path(goal_id): Path<Uuid>,
    Json(payload): Json<AssessmentPayload>,
) -> Result<Json<db::SelfAssessmentRow>, ApiError> {
    let (goal, _, rel) = load_visible_goal(&state, &actor, goal_id).await?;
    access::authorize_self_assessment_write(&actor, rel)?;
    validate_rating(payload.rating)?;

    if db::find_self_assessment(&state.pool, goal.id).await?.is_none() {
        return Err(ApiError::NotFound("no self-assessment for this goal".into()));
    }

    let assessment = db::update_self_assessment(
        &state.pool,
        goal.id,
        payload.rating,
        &payload.comments,
        &payload.areas_to_improve,
    )
    .await?;
    Ok(Json(assessment))
}

// ---------------------------------------------------------------------------
// Feedback requests
// ---------------------------------------------------------------------------

async fn list_feedback_requests(
    AuthActor(actor): AuthActor,
    State(state): State<SharedState>,
    Path(goal_id): Path<Uuid>,
) -> Result<Json<Vec<db::FeedbackRequestRow>>, ApiError> {
    let (goal, _, _) = load_visible_goal(&state, &actor, goal_id).await?;
    Ok(Json(db::list_feedback_requests(&state.pool, goal.id).await?))
}

/// Requests on this goal where the caller is the named reviewer. Reviewers
/// are not required to have read access to the goal itself.
async fn my_feedback_requests(
    AuthActor(actor): AuthActor,
    State(state): State<SharedState>,
    Path(goal_id): Path<Uuid>,
) -> Result<Json<Vec<db::FeedbackRequestRow>>, ApiError> {
    let employee = actor.employee()?;
    let requests =
        db::list_feedback_requests_for_reviewer(&state.pool, goal_id, employee.id).await?;
    Ok(Json(requests))
}

async fn create_feedback_request(
    AuthActor(actor): AuthActor,
    State(state): State<SharedState>,
    Path(goal_id): Path<Uuid>,
    Json(payload): Json<CreateFeedbackRequestPayload>,
) -> Result<(StatusCode, Json<db::FeedbackRequestRow>), ApiError> {
    let employee_id = actor.employee()?.id;
    let (goal, owner, _) = load_visible_goal(&state, &actor, goal_id).await?;

    if db::find_employee(&state.pool, payload.reviewer_id).await?.is_none() {
        return Err(ApiError::Validation("reviewer does not exist".into()));
    }
    let duplicate =
        db::feedback_request_exists(&state.pool, goal.id, payload.reviewer_id).await?;
    workflow::check_feedback_request_create(
        goal.status,
        owner.id,
        employee_id,
        payload.reviewer_id,
        duplicate,
    )?;

    let request = db::create_feedback_request(
        &state.pool,
        goal.id,
        payload.reviewer_id,
        employee_id,
        payload.message.trim(),
    )
    .await
    .map_err(|e| ApiError::on_conflict(e, "a feedback request for this reviewer already exists"))?;

    tracing::info!(
        "feedback request {} created on goal {} for reviewer {}",
        request.id,
        goal.id,
        payload.reviewer_id
    );
    Ok((StatusCode::CREATED, Json(request)))
}

// ---------------------------------------------------------------------------
// Peer feedback
// ---------------------------------------------------------------------------

async fn create_peer_feedback(
    AuthActor(actor): AuthActor,
    State(state): State<SharedState>,
    Path(request_id): Path<Uuid>,
    Json(payload): Json<AssessmentPayload>,
) -> Result<(StatusCode, Json<db::PeerFeedbackRow>), ApiError> {
    let employee_id = actor.employee()?.id;
    let request = db::find_feedback_request(&state.pool, request_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("feedback request not found".into()))?;

    workflow::check_peer_feedback_create(request.reviewer_id, employee_id, request.status)?;
    validate_rating(payload.rating)?;

    let feedback = db::create_peer_feedback_completing_request(
        &state.pool,
        request.id,
        payload.rating,
        &payload.comments,
        &payload.areas_to_improve,
    )
    .await
    .map_err(|e| ApiError::on_conflict(e, "feedback has already been left on this request"))?;

    tracing::info!("peer feedback {} completes request {}", feedback.id, request.id);
    Ok((StatusCode::CREATED, Json(feedback)))
}

// ---------------------------------------------------------------------------
// Expert evaluation
// ---------------------------------------------------------------------------

async fn get_expert_evaluation(
    AuthActor(actor): AuthActor,
    State(state): State<SharedState>,
    Path(goal_id): Path<Uuid>,
) -> Result<Json<db::ExpertEvaluationRow>, ApiError> {
    let (goal, _, _) = load_visible_goal(&state, &actor, goal_id).await?;
    let evaluation = db::find_expert_evaluation(&state.pool, goal.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("no expert evaluation for this goal".into()))?;
    Ok(Json(evaluation))
}

async fn create_expert_evaluation(
    AuthActor(actor): AuthActor,
    State(state): State<SharedState>,
    Path(goal_id): Path<Uuid>,
    Json(payload): Json<ExpertEvaluationPayload>,
) -> Result<(StatusCode, Json<db::ExpertEvaluationRow>), ApiError> {
    if actor.role != UserRole::ExpertiseLeader {
        return Err(ApiError::Authorization("expertise leader role required".into()));
    }
    let expert_id = actor.employee()?.id;
    validate_rating(payload.final_rating)?;

    let snapshot = db::goal_assessment_snapshot(&state.pool, goal_id)
        .await?
        .ok_or_else(ApiError::goal_not_found)?;
    workflow::check_expert_evaluation_create(snapshot)?;

    let evaluation = db::create_expert_evaluation_completing_goal(
        &state.pool,
        goal_id,
        expert_id,
        payload.final_rating,
        &payload.comments,
        &payload.areas_to_improve,
    )
    .await
    .map_err(|e| ApiError::on_conflict(e, "an expert evaluation already exists for this goal"))?;

    tracing::info!(
        "expert evaluation {} by {} completes goal {}",
        evaluation.id,
        expert_id,
        goal_id
    );
    Ok((StatusCode::CREATED, Json(evaluation)))
}
