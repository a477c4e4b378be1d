//! Goal CRUD, lifecycle transitions, and progress notes.
//!
//! Every handler resolves the goal through [`load_visible_goal`], which
//! folds the read-access decision into a not-found answer so callers
//! cannot probe for goals outside their scope.

use crate::db;
use crate::domain::access::{self, Actor, Relation};
use crate::domain::models::GoalStatus;
use crate::domain::state_machine::{self, GoalAction};
use crate::domain::visibility;
use crate::error::ApiError;
use crate::state::SharedState;
use crate::web::session::AuthActor;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct CreateGoalRequest {
    pub title: String,
    pub description: String,
    pub expected_results: String,
    pub start_period: NaiveDate,
    pub end_period: NaiveDate,
}

#[derive(Deserialize)]
pub struct UpdateGoalRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub expected_results: Option<String>,
    pub start_period: Option<NaiveDate>,
    pub end_period: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct ListGoalsQuery {
    /// Comma-separated status filter with OR semantics.
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateProgressRequest {
    pub description: String,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/goals", get(list_goals).post(create_goal))
        .route(
            "/goals/:id",
            get(get_goal).put(update_goal).patch(update_goal).delete(delete_goal),
        )
        .route("/goals/:id/submit", post(submit_goal))
        .route("/goals/:id/approve", post(approve_goal))
        .route("/goals/:id/complete", post(complete_goal))
        .route("/goals/:id/progress", get(list_progress).post(create_progress))
        .with_state(state)
}

/// Fetch a goal together with its owner and the actor's relation to that
/// owner. An unreadable goal is reported as not found, never as forbidden.
pub(crate) async fn load_visible_goal(
    state: &SharedState,
    actor: &Actor,
    goal_id: Uuid,
) -> Result<(db::GoalRow, db::EmployeeInfo, Relation), ApiError> {
    let goal = db::find_goal(&state.pool, goal_id)
        .await?
        .ok_or_else(ApiError::goal_not_found)?;
    let owner = db::find_employee(&state.pool, goal.employee_id)
        .await?
        .ok_or_else(ApiError::goal_not_found)?;

    let rel = match &actor.employee {
        Some(employee) => {
            let parents = db::manager_map(&state.pool).await?;
            access::relation(employee.id, owner.id, owner.manager_id, &parents)
        }
        None => Relation::Unrelated,
    };

    if !access::can_read_goal(actor, rel, goal.status) {
        return Err(ApiError::goal_not_found());
    }
    Ok((goal, owner, rel))
}

fn validate_period(start: NaiveDate, end: NaiveDate) -> Result<(), ApiError> {
    if end <= start {
        return Err(ApiError::Validation("end_period must be after start_period".into()));
    }
    Ok(())
}

fn parse_status_filter(raw: &Option<String>) -> Result<Option<Vec<GoalStatus>>, ApiError> {
    let Some(raw) = raw else { return Ok(None) };
    let mut statuses = Vec::new();
    for part in raw.split(',') {
        let status = GoalStatus::try_from(part)
            .map_err(|_| ApiError::Validation(format!("unknown goal status '{}'", part.trim())))?;
        statuses.push(status);
    }
    Ok(Some(statuses))
}

async fn list_goals(
    AuthActor(actor): AuthActor,
    State(state): State<SharedState>,
    Query(query): Query<ListGoalsQuery>,
) -> Result<Json<Vec<db::GoalRow>>, ApiError> {
    let statuses = parse_status_filter(&query.status)?;

    let descendants = match &actor.employee {
        Some(employee) if employee.has_reports => {
            db::descendants_of(&state.pool, employee.id, None).await?
        }
        _ => Vec::new(),
    };
    let scope = visibility::goal_scope(&actor, &descendants)?;

    let goals = db::list_goals(&state.pool, &scope, statuses.as_deref()).await?;
    Ok(Json(goals))
}

async fn create_goal(
    AuthActor(actor): AuthActor,
    State(state): State<SharedState>,
    Json(payload): Json<CreateGoalRequest>,
) -> Result<(StatusCode, Json<db::GoalRow>), ApiError> {
    let employee = actor
        .employee()
        .map_err(|_| ApiError::Authorization("you have no employee profile to create goals".into()))?;

    if payload.title.trim().is_empty() {
        return Err(ApiError::Validation("title is required".into()));
    }
    validate_period(payload.start_period, payload.end_period)?;

    let goal = db::create_goal(
        &state.pool,
        employee.id,
        payload.title.trim(),
        &payload.description,
        &payload.expected_results,
        payload.start_period,
        payload.end_period,
    )
    .await?;

    tracing::info!("goal {} created by employee {}", goal.id, employee.id);
    Ok((StatusCode::CREATED, Json(goal)))
}

async fn get_goal(
    AuthActor(actor): AuthActor,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<db::GoalRow>, ApiError> {
    let (goal, _, _) = load_visible_goal(&state, &actor, id).await?;
    Ok(Json(goal))
}

async fn update_goal(
    AuthActor(actor): AuthActor,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateGoalRequest>,
) -> Result<Json<db::GoalRow>, ApiError> {
    let (goal, _, rel) = load_visible_goal(&state, &actor, id).await?;

    if !state_machine::is_mutable(goal.status) {
        return Err(ApiError::StateViolation("only draft goals can be updated".into()));
    }
    access::authorize_goal_edit(&actor, rel)?;

    let title = payload.title.unwrap_or(goal.title);
    if title.trim().is_empty() {
        return Err(ApiError::Validation("title must not be empty".into()));
    }
    let description = payload.description.unwrap_or(goal.description);
    let expected_results = payload.expected_results.unwrap_or(goal.expected_results);
    let start_period = payload.start_period.unwrap_or(goal.start_period);
    let end_period = payload.end_period.unwrap_or(goal.end_period);
    validate_period(start_period, end_period)?;

    let updated = db::update_goal(
        &state.pool,
        id,
        title.trim(),
        &description,
        &expected_results,
        start_period,
        end_period,
    )
    .await?
    .ok_or_else(|| ApiError::StateViolation("only draft goals can be updated".into()))?;
    Ok(Json(updated))
}

async fn delete_goal(
    AuthActor(actor): AuthActor,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let (goal, _, rel) = load_visible_goal(&state, &actor, id).await?;

    if !state_machine::is_mutable(goal.status) {
        return Err(ApiError::StateViolation("only draft goals can be deleted".into()));
    }
    access::authorize_goal_edit(&actor, rel)?;

    if !db::delete_goal(&state.pool, id).await? {
        return Err(ApiError::StateViolation("only draft goals can be deleted".into()));
    }
    tracing::info!("goal {id} deleted by user {}", actor.user_id);
    Ok(StatusCode::NO_CONTENT)
}

/// Shared transition driver: state legality first, then the actor guard,
/// so a premature action reads as "not yet" and a foreign one as "not you".
async fn run_transition(
    state: &SharedState,
    actor: &Actor,
    goal_id: Uuid,
    action: GoalAction,
) -> Result<db::GoalRow, ApiError> {
    let (goal, owner, rel) = load_visible_goal(state, actor, goal_id).await?;

    let next = state_machine::transition(goal.status, action)?;
    access::authorize_goal_action(actor, action, rel)?;

    if action == GoalAction::Submit {
        state_machine::check_submit_has_manager(owner.manager_id.is_some())?;
    }

    // Compare-and-set against the status this request validated; losing
    // the race to a concurrent transition is a state violation, not a
    // silent overwrite.
    let updated = db::set_goal_status(&state.pool, goal_id, goal.status, next)
        .await?
        .ok_or_else(|| {
            ApiError::StateViolation(format!(
                "goal is no longer in status '{}'",
                goal.status.as_str()
            ))
        })?;
    tracing::info!(
        "goal {goal_id} {} by user {}: {} -> {}",
        action.as_str(),
        actor.user_id,
        goal.status.as_str(),
        next.as_str()
    );
    Ok(updated)
}

async fn submit_goal(
    AuthActor(actor): AuthActor,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<db::GoalRow>, ApiError> {
    Ok(Json(run_transition(&state, &actor, id, GoalAction::Submit).await?))
}

async fn approve_goal(
    AuthActor(actor): AuthActor,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<db::GoalRow>, ApiError> {
    Ok(Json(run_transition(&state, &actor, id, GoalAction::Approve).await?))
}

async fn complete_goal(
    AuthActor(actor): AuthActor,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<db::GoalRow>, ApiError> {
    Ok(Json(run_transition(&state, &actor, id, GoalAction::Complete).await?))
}

async fn list_progress(
    AuthActor(actor): AuthActor,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<db::ProgressRow>>, ApiError> {
    let (goal, _, _) = load_visible_goal(&state, &actor, id).await?;
    Ok(Json(db::list_progress(&state.pool, goal.id).await?))
}

async fn create_progress(
    AuthActor(actor): AuthActor,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateProgressRequest>,
) -> Result<(StatusCode, Json<db::ProgressRow>), ApiError> {
    let (goal, _, rel) = load_visible_goal(&state, &actor, id).await?;

    access::authorize_progress_create(&actor, rel)?;
    if !goal.status.can_add_progress() {
        return Err(ApiError::StateViolation(
            "progress can only be added while the goal is in progress".into(),
        ));
    }
    if payload.description.trim().is_empty() {
        return Err(ApiError::Validation("description is required".into()));
    }

    let entry = db::create_progress(&state.pool, goal.id, payload.description.trim())
        .await?
        .ok_or_else(|| {
            ApiError::StateViolation(
                "progress can only be added while the goal is in progress".into(),
            )
        })?;
    Ok((StatusCode::CREATED, Json(entry)))
}
