//! Account administration. The coarse tier of the access resolver lives
//! here: only admins list, create, or delete raw accounts.

use crate::db;
use crate::domain::access::Actor;
use crate::domain::models::UserRole;
use crate::error::ApiError;
use crate::state::SharedState;
use crate::web::auth;
use crate::web::session::AuthActor;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default = "default_role")]
    pub role: UserRole,
}

fn default_role() -> UserRole {
    UserRole::Employee
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/me", get(me))
        .route("/:id", delete(delete_user))
        .with_state(state)
}

fn require_admin(actor: &Actor) -> Result<(), ApiError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Authorization("admin role required".into()))
    }
}

async fn list_users(
    AuthActor(actor): AuthActor,
    State(state): State<SharedState>,
) -> Result<Json<Vec<db::DbUser>>, ApiError> {
    require_admin(&actor)?;
    Ok(Json(db::list_users(&state.pool).await?))
}

async fn me(
    AuthActor(actor): AuthActor,
    State(state): State<SharedState>,
) -> Result<Json<db::DbUser>, ApiError> {
    let user = db::find_user_by_id(&state.pool, actor.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;
    Ok(Json(user))
}

async fn create_user(
    AuthActor(actor): AuthActor,
    State(state): State<SharedState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<db::DbUser>), ApiError> {
    require_admin(&actor)?;

    if payload.email.trim().is_empty() || !payload.email.contains('@') {
        return Err(ApiError::Validation("a valid email is required".into()));
    }
    let hash = auth::hash_password(&payload.password)?;

    let user = db::create_user(
        &state.pool,
        payload.email.trim(),
        &hash,
        payload.first_name.trim(),
        payload.last_name.trim(),
        payload.role,
    )
    .await
    .map_err(|e| ApiError::on_conflict(e, "a user with this email already exists"))?;

    tracing::info!("admin {} created user {}", actor.user_id, user.id);
    Ok((StatusCode::CREATED, Json(user)))
}

async fn delete_user(
    AuthActor(actor): AuthActor,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    require_admin(&actor)?;
    if db::delete_user(&state.pool, id).await? {
        tracing::info!("admin {} deleted user {id}", actor.user_id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("user not found".into()))
    }
}
