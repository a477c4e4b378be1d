//! Employee profiles and the org hierarchy surface.

use crate::db;
use crate::error::ApiError;
use crate::state::SharedState;
use crate::web::session::AuthActor;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct CreateEmployeeRequest {
    pub user_id: Uuid,
    pub position: String,
    pub hire_date: NaiveDate,
    pub manager_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct UpdateEmployeeRequest {
    pub position: Option<String>,
    pub hire_date: Option<NaiveDate>,
    /// Present-and-null clears the manager link; absent leaves it alone.
    #[serde(default, with = "double_option")]
    pub manager_id: Option<Option<Uuid>>,
}

/// Distinguish `"manager_id": null` from the field being absent.
mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(de).map(Some)
    }
}

#[derive(Deserialize)]
pub struct TeamQuery {
    pub levels: Option<i64>,
}

/// `levels` must be a positive integer that fits the traversal's depth
/// counter; values past u32 would otherwise truncate to a wrong bound.
fn parse_levels(levels: Option<i64>) -> Result<Option<u32>, ApiError> {
    match levels {
        None => Ok(None),
        Some(n) if n > 0 => u32::try_from(n)
            .map(Some)
            .map_err(|_| ApiError::Validation("levels is too large".into())),
        Some(_) => Err(ApiError::Validation("levels must be a positive integer".into())),
    }
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(list_employees).post(create_employee))
        .route(
            "/:id",
            get(get_employee).patch(update_employee).delete(delete_employee),
        )
        .route("/:id/team", get(team))
        .with_state(state)
}

async fn list_employees(
    AuthActor(_actor): AuthActor,
    State(state): State<SharedState>,
) -> Result<Json<Vec<db::EmployeeInfo>>, ApiError> {
    Ok(Json(db::list_employees(&state.pool).await?))
}

async fn get_employee(
    AuthActor(_actor): AuthActor,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<db::EmployeeInfo>, ApiError> {
    let employee = db::find_employee(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("employee not found".into()))?;
    Ok(Json(employee))
}

async fn create_employee(
    AuthActor(actor): AuthActor,
    State(state): State<SharedState>,
    Json(payload): Json<CreateEmployeeRequest>,
) -> Result<(StatusCode, Json<db::EmployeeInfo>), ApiError> {
    if !actor.is_admin() {
        return Err(ApiError::Authorization("admin role required".into()));
    }
    if payload.position.trim().is_empty() {
        return Err(ApiError::Validation("position is required".into()));
    }
    if let Some(manager_id) = payload.manager_id {
        if db::find_employee(&state.pool, manager_id).await?.is_none() {
            return Err(ApiError::Validation("manager does not exist".into()));
        }
    }

    let id = db::create_employee(
        &state.pool,
        payload.user_id,
        payload.position.trim(),
        payload.hire_date,
        payload.manager_id,
    )
    .await
    .map_err(|e| ApiError::on_conflict(e, "this user already has an employee profile"))?;

    let employee = db::find_employee(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("employee vanished after insert")))?;
    Ok((StatusCode::CREATED, Json(employee)))
}

async fn update_employee(
    AuthActor(actor): AuthActor,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateEmployeeRequest>,
) -> Result<Json<db::EmployeeInfo>, ApiError> {
    let current = db::find_employee(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("employee not found".into()))?;

    let is_self = actor.employee.as_ref().is_some_and(|e| e.id == id);
    if !actor.is_admin() && !is_self {
        return Err(ApiError::Authorization("you may only edit your own profile".into()));
    }

    let position = payload.position.unwrap_or(current.position);
    if position.trim().is_empty() {
        return Err(ApiError::Validation("position must not be empty".into()));
    }
    let hire_date = payload.hire_date.unwrap_or(current.hire_date);
    let manager_id = match payload.manager_id {
        Some(new_manager) => new_manager,
        None => current.manager_id,
    };

    if let Some(manager_id) = manager_id {
        if db::find_employee(&state.pool, manager_id).await?.is_none() {
            return Err(ApiError::Validation("manager does not exist".into()));
        }
    }

    // The manager graph must stay a forest; the storage layer re-validates
    // the reassignment against a map read in the same transaction.
    if !db::update_employee(&state.pool, id, position.trim(), hire_date, manager_id).await? {
        return Err(ApiError::Validation(
            "this manager assignment would create a cycle in the hierarchy".into(),
        ));
    }
    let updated = db::find_employee(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("employee not found".into()))?;
    Ok(Json(updated))
}

async fn delete_employee(
    AuthActor(actor): AuthActor,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !actor.is_admin() {
        return Err(ApiError::Authorization("admin role required".into()));
    }
    if db::delete_employee(&state.pool, id).await? {
        tracing::info!("admin {} deleted employee {id}", actor.user_id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("employee not found".into()))
    }
}

/// Level-bounded descendant closure. `levels` omitted means the whole
/// subtree; `levels=N` stops after N levels of reports.
async fn team(
    AuthActor(actor): AuthActor,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(query): Query<TeamQuery>,
) -> Result<Json<Vec<db::EmployeeInfo>>, ApiError> {
    if actor.employee.is_none() && !actor.is_admin() {
        return Err(ApiError::NotFound("you have no employee profile".into()));
    }

    let max_depth = parse_levels(query.levels)?;

    if db::find_employee(&state.pool, id).await?.is_none() {
        return Err(ApiError::NotFound("employee not found".into()));
    }

    let member_ids = db::descendants_of(&state.pool, id, max_depth).await?;
    if member_ids.is_empty() {
        return Ok(Json(Vec::new()));
    }
    Ok(Json(db::find_employees(&state.pool, &member_ids).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_bounds() {
        assert_eq!(parse_levels(None).unwrap(), None);
        assert_eq!(parse_levels(Some(3)).unwrap(), Some(3));
        assert!(parse_levels(Some(0)).is_err());
        assert!(parse_levels(Some(-1)).is_err());
        // A value past u32 must be rejected, not silently truncated.
        assert!(parse_levels(Some(u32::MAX as i64 + 2)).is_err());
    }
}
