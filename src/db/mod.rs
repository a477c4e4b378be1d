pub mod seed;

use crate::domain::access::{Actor, EmployeeRef};
use crate::domain::hierarchy::{self, Traversal};
use crate::domain::models::{FeedbackRequestStatus, GoalStatus, UserRole};
use crate::domain::visibility::GoalScope;
use crate::domain::workflow::GoalAssessmentSnapshot;
use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Serialize, FromRow)]
pub struct DbUser {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct EmployeeInfo {
    pub id: Uuid,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: UserRole,
    pub position: String,
    pub hire_date: NaiveDate,
    pub manager_id: Option<Uuid>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct GoalRow {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub title: String,
    pub description: String,
    pub expected_results: String,
    pub start_period: NaiveDate,
    pub end_period: NaiveDate,
    pub status: GoalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct ProgressRow {
    pub id: Uuid,
    pub goal_id: Uuid,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct SelfAssessmentRow {
    pub id: Uuid,
    pub goal_id: Uuid,
    pub rating: i16,
    pub comments: String,
    pub areas_to_improve: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct FeedbackRequestRow {
    pub id: Uuid,
    pub goal_id: Uuid,
    pub reviewer_id: Uuid,
    pub requested_by_id: Uuid,
    pub message: String,
    pub status: FeedbackRequestStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct PeerFeedbackRow {
    pub id: Uuid,
    pub feedback_request_id: Uuid,
    pub rating: i16,
    pub comments: String,
    pub areas_to_improve: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct ExpertEvaluationRow {
    pub id: Uuid,
    pub goal_id: Uuid,
    pub expert_id: Uuid,
    pub final_rating: i16,
    pub comments: String,
    pub areas_to_improve: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

const USER_COLUMNS: &str =
    "id, email, password_hash, first_name, last_name, role, is_active, created_at";

pub async fn find_user_by_email(pool: &PgPool, email: &str) -> Result<Option<DbUser>> {
    let user = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn find_user_by_id(pool: &PgPool, id: Uuid) -> Result<Option<DbUser>> {
    let user = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn list_users(pool: &PgPool) -> Result<Vec<DbUser>> {
    let users = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY created_at"
    ))
    .fetch_all(pool)
    .await?;
    Ok(users)
}

pub async fn create_user(
    pool: &PgPool,
    email: &str,
    password_hash: &str,
    first_name: &str,
    last_name: &str,
    role: UserRole,
) -> Result<DbUser, sqlx::Error> {
    sqlx::query_as::<_, DbUser>(&format!(
        "INSERT INTO users (id, email, password_hash, first_name, last_name, role)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {USER_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(first_name)
    .bind(last_name)
    .bind(role)
    .fetch_one(pool)
    .await
}

pub async fn delete_user(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Actor snapshot for the access resolver: role plus the optional employee
/// profile with its direct-report flag, in one round trip.
pub async fn load_actor(pool: &PgPool, user_id: Uuid) -> Result<Option<Actor>> {
    #[derive(FromRow)]
    struct ActorRow {
        user_id: Uuid,
        role: UserRole,
        employee_id: Option<Uuid>,
        manager_id: Option<Uuid>,
        has_reports: bool,
    }

    let row = sqlx::query_as::<_, ActorRow>(
        r#"
        SELECT u.id AS user_id,
               u.role,
               e.id AS employee_id,
               e.manager_id,
               EXISTS(SELECT 1 FROM employees s WHERE s.manager_id = e.id) AS has_reports
        FROM users u
        LEFT JOIN employees e ON e.user_id = u.id
        WHERE u.id = $1 AND u.is_active
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| Actor {
        user_id: r.user_id,
        role: r.role,
        employee: r.employee_id.map(|id| EmployeeRef {
            id,
            manager_id: r.manager_id,
            has_reports: r.has_reports,
        }),
    }))
}

// ---------------------------------------------------------------------------
// Employees / hierarchy
// ---------------------------------------------------------------------------

const EMPLOYEE_COLUMNS: &str = "e.id, e.user_id, u.first_name, u.last_name, u.email, u.role,
     e.position, e.hire_date, e.manager_id";

pub async fn list_employees(pool: &PgPool) -> Result<Vec<EmployeeInfo>> {
    let employees = sqlx::query_as::<_, EmployeeInfo>(&format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees e JOIN users u ON u.id = e.user_id
         ORDER BY u.last_name, u.first_name"
    ))
    .fetch_all(pool)
    .await?;
    Ok(employees)
}

pub async fn find_employee(pool: &PgPool, id: Uuid) -> Result<Option<EmployeeInfo>> {
    let employee = sqlx::query_as::<_, EmployeeInfo>(&format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees e JOIN users u ON u.id = e.user_id
         WHERE e.id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(employee)
}

pub async fn find_employees(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<EmployeeInfo>> {
    let employees = sqlx::query_as::<_, EmployeeInfo>(&format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees e JOIN users u ON u.id = e.user_id
         WHERE e.id = ANY($1)"
    ))
    .bind(ids)
    .fetch_all(pool)
    .await?;
    Ok(employees)
}

pub async fn create_employee(
    pool: &PgPool,
    user_id: Uuid,
    position: &str,
    hire_date: NaiveDate,
    manager_id: Option<Uuid>,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO employees (id, user_id, position, hire_date, manager_id) VALUES ($1, $2, $3, $4, $5)")
        .bind(id)
        .bind(user_id)
        .bind(position)
        .bind(hire_date)
        .bind(manager_id)
        .execute(pool)
        .await?;
    Ok(id)
}

const MANAGER_TREE_LOCK: i64 = 0x746c_6e74;

/// Update a profile, validating the cycle rule against a manager map read
/// inside the same transaction. Reassignments serialize on an advisory
/// lock, so two crossed updates cannot each validate against the old map
/// and jointly commit a cycle. Returns `false` when the new manager link
/// would close one; the transaction rolls back.
pub async fn update_employee(
    pool: &PgPool,
    id: Uuid,
    position: &str,
    hire_date: NaiveDate,
    manager_id: Option<Uuid>,
) -> Result<bool> {
    let mut tx = pool.begin().await?;

    if let Some(manager_id) = manager_id {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(MANAGER_TREE_LOCK)
            .execute(&mut *tx)
            .await?;
        let pairs: Vec<(Uuid, Uuid)> =
            sqlx::query_as("SELECT id, manager_id FROM employees WHERE manager_id IS NOT NULL")
                .fetch_all(&mut *tx)
                .await?;
        let parents: HashMap<Uuid, Uuid> = pairs.into_iter().collect();
        if hierarchy::creates_cycle(id, manager_id, &parents) {
            return Ok(false);
        }
    }

    sqlx::query("UPDATE employees SET position = $2, hire_date = $3, manager_id = $4 WHERE id = $1")
        .bind(id)
        .bind(position)
        .bind(hire_date)
        .bind(manager_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(true)
}

/// Direct reports' manager links are severed by the schema
/// (`ON DELETE SET NULL`); goals cascade away with the employee.
pub async fn delete_employee(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM employees WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// id -> manager_id for every employee with a manager. One query; used by
/// the ancestor walk and by cycle validation on reassignment.
pub async fn manager_map(pool: &PgPool) -> Result<HashMap<Uuid, Uuid>> {
    let pairs: Vec<(Uuid, Uuid)> =
        sqlx::query_as("SELECT id, manager_id FROM employees WHERE manager_id IS NOT NULL")
            .fetch_all(pool)
            .await?;
    Ok(pairs.into_iter().collect())
}

/// Descendant closure under `root`, level-batched: one child-fetch query
/// per level of the tree, never one per node.
pub async fn descendants_of(pool: &PgPool, root: Uuid, max_depth: Option<u32>) -> Result<Vec<Uuid>> {
    let mut traversal = Traversal::new(root, max_depth);
    while !traversal.done() {
        let frontier = traversal.frontier().to_vec();
        let children: Vec<(Uuid,)> =
            sqlx::query_as("SELECT id FROM employees WHERE manager_id = ANY($1)")
                .bind(&frontier)
                .fetch_all(pool)
                .await?;
        traversal.advance(children.into_iter().map(|(id,)| id).collect());
    }
    Ok(traversal.into_members())
}

// ---------------------------------------------------------------------------
// Goals
// ---------------------------------------------------------------------------

const GOAL_COLUMNS: &str = "id, employee_id, title, description, expected_results,
     start_period, end_period, status, created_at, updated_at";

pub async fn find_goal(pool: &PgPool, id: Uuid) -> Result<Option<GoalRow>> {
    let goal = sqlx::query_as::<_, GoalRow>(&format!(
        "SELECT {GOAL_COLUMNS} FROM goals WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(goal)
}

pub async fn create_goal(
    pool: &PgPool,
    employee_id: Uuid,
    title: &str,
    description: &str,
    expected_results: &str,
    start_period: NaiveDate,
    end_period: NaiveDate,
) -> Result<GoalRow> {
    let goal = sqlx::query_as::<_, GoalRow>(&format!(
        "INSERT INTO goals (id, employee_id, title, description, expected_results, start_period, end_period)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING {GOAL_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(employee_id)
    .bind(title)
    .bind(description)
    .bind(expected_results)
    .bind(start_period)
    .bind(end_period)
    .fetch_one(pool)
    .await?;
    Ok(goal)
}

/// Visibility-scoped listing with an optional status OR-filter. A single
/// statement covers every scope so the filter composes uniformly.
pub async fn list_goals(
    pool: &PgPool,
    scope: &GoalScope,
    statuses: Option<&[GoalStatus]>,
) -> Result<Vec<GoalRow>> {
    let (all, owner_ids, include_pending_assessment): (bool, Vec<Uuid>, bool) = match scope {
        GoalScope::All => (true, Vec::new(), false),
        GoalScope::Team(ids) => (false, ids.clone(), false),
        GoalScope::OwnPlusPendingAssessment(id) => (false, vec![*id], true),
        GoalScope::Own(id) => (false, vec![*id], false),
    };

    let goals = sqlx::query_as::<_, GoalRow>(&format!(
        "SELECT {GOAL_COLUMNS} FROM goals
         WHERE ($1 OR employee_id = ANY($2) OR ($3 AND status = 'pending_assessment'))
           AND ($4 OR status = ANY($5))
         ORDER BY created_at DESC"
    ))
    .bind(all)
    .bind(&owner_ids)
    .bind(include_pending_assessment)
    .bind(statuses.is_none())
    .bind(statuses.unwrap_or(&[]))
    .fetch_all(pool)
    .await?;
    Ok(goals)
}

// The write statements below re-check in SQL the status their handler
// validated in memory, so a concurrent status change between the read and
// the write surfaces as zero rows instead of silently committing a write
// the state machine forbids.

fn update_goal_sql() -> String {
    format!(
        "UPDATE goals
         SET title = $2, description = $3, expected_results = $4,
             start_period = $5, end_period = $6, updated_at = NOW()
         WHERE id = $1 AND status = 'draft'
         RETURNING {GOAL_COLUMNS}"
    )
}

fn set_goal_status_sql() -> String {
    format!(
        "UPDATE goals SET status = $3, updated_at = NOW()
         WHERE id = $1 AND status = $2
         RETURNING {GOAL_COLUMNS}"
    )
}

const DELETE_GOAL_SQL: &str = "DELETE FROM goals WHERE id = $1 AND status = 'draft'";

/// `None` when the goal is no longer in draft.
pub async fn update_goal(
    pool: &PgPool,
    id: Uuid,
    title: &str,
    description: &str,
    expected_results: &str,
    start_period: NaiveDate,
    end_period: NaiveDate,
) -> Result<Option<GoalRow>> {
    let goal = sqlx::query_as::<_, GoalRow>(&update_goal_sql())
        .bind(id)
        .bind(title)
        .bind(description)
        .bind(expected_results)
        .bind(start_period)
        .bind(end_period)
        .fetch_optional(pool)
        .await?;
    Ok(goal)
}

/// Compare-and-set on the status column: the update applies only while the
/// goal is still in `current`. `None` means a concurrent request moved it.
pub async fn set_goal_status(
    pool: &PgPool,
    id: Uuid,
    current: GoalStatus,
    next: GoalStatus,
) -> Result<Option<GoalRow>> {
    let goal = sqlx::query_as::<_, GoalRow>(&set_goal_status_sql())
        .bind(id)
        .bind(current)
        .bind(next)
        .fetch_optional(pool)
        .await?;
    Ok(goal)
}

/// `false` when the goal is no longer in draft.
pub async fn delete_goal(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query(DELETE_GOAL_SQL)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

pub async fn list_progress(pool: &PgPool, goal_id: Uuid) -> Result<Vec<ProgressRow>> {
    let entries = sqlx::query_as::<_, ProgressRow>(
        "SELECT id, goal_id, description, created_at FROM goal_progress
         WHERE goal_id = $1 ORDER BY created_at DESC",
    )
    .bind(goal_id)
    .fetch_all(pool)
    .await?;
    Ok(entries)
}

const CREATE_PROGRESS_SQL: &str =
    "INSERT INTO goal_progress (id, goal_id, description)
     SELECT $1, g.id, $3 FROM goals g WHERE g.id = $2 AND g.status = 'in_progress'
     RETURNING id, goal_id, description, created_at";

/// The insert is conditioned on the goal still being in progress; `None`
/// means it left that status after the handler's check.
pub async fn create_progress(
    pool: &PgPool,
    goal_id: Uuid,
    description: &str,
) -> Result<Option<ProgressRow>> {
    let entry = sqlx::query_as::<_, ProgressRow>(CREATE_PROGRESS_SQL)
        .bind(Uuid::new_v4())
        .bind(goal_id)
        .bind(description)
        .fetch_optional(pool)
        .await?;
    Ok(entry)
}

// ---------------------------------------------------------------------------
// Self-assessment
// ---------------------------------------------------------------------------

const SELF_ASSESSMENT_COLUMNS: &str = "id, goal_id, rating, comments, areas_to_improve, created_at";

pub async fn find_self_assessment(pool: &PgPool, goal_id: Uuid) -> Result<Option<SelfAssessmentRow>> {
    let row = sqlx::query_as::<_, SelfAssessmentRow>(&format!(
        "SELECT {SELF_ASSESSMENT_COLUMNS} FROM self_assessments WHERE goal_id = $1"
    ))
    .bind(goal_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn create_self_assessment(
    pool: &PgPool,
    goal_id: Uuid,
    rating: i16,
    comments: &str,
    areas_to_improve: &str,
) -> Result<SelfAssessmentRow, sqlx::Error> {
    sqlx::query_as::<_, SelfAssessmentRow>(&format!(
        "INSERT INTO self_assessments (id, goal_id, rating, comments, areas_to_improve)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {SELF_ASSESSMENT_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(goal_id)
    .bind(rating)
    .bind(comments)
    .bind(areas_to_improve)
    .fetch_one(pool)
    .await
}

pub async fn update_self_assessment(
    pool: &PgPool,
    goal_id: Uuid,
    rating: i16,
    comments: &str,
    areas_to_improve: &str,
) -> Result<SelfAssessmentRow> {
    let row = sqlx::query_as::<_, SelfAssessmentRow>(&format!(
        "UPDATE self_assessments SET rating = $2, comments = $3, areas_to_improve = $4
         WHERE goal_id = $1
         RETURNING {SELF_ASSESSMENT_COLUMNS}"
    ))
    .bind(goal_id)
    .bind(rating)
    .bind(comments)
    .bind(areas_to_improve)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

// ---------------------------------------------------------------------------
// Feedback requests / peer feedback
// ---------------------------------------------------------------------------

const FEEDBACK_REQUEST_COLUMNS: &str =
    "id, goal_id, reviewer_id, requested_by_id, message, status, created_at";

pub async fn list_feedback_requests(pool: &PgPool, goal_id: Uuid) -> Result<Vec<FeedbackRequestRow>> {
    let rows = sqlx::query_as::<_, FeedbackRequestRow>(&format!(
        "SELECT {FEEDBACK_REQUEST_COLUMNS} FROM feedback_requests
         WHERE goal_id = $1 ORDER BY created_at"
    ))
    .bind(goal_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn list_feedback_requests_for_reviewer(
    pool: &PgPool,
    goal_id: Uuid,
    reviewer_id: Uuid,
) -> Result<Vec<FeedbackRequestRow>> {
    let rows = sqlx::query_as::<_, FeedbackRequestRow>(&format!(
        "SELECT {FEEDBACK_REQUEST_COLUMNS} FROM feedback_requests
         WHERE goal_id = $1 AND reviewer_id = $2 ORDER BY created_at"
    ))
    .bind(goal_id)
    .bind(reviewer_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn feedback_request_exists(pool: &PgPool, goal_id: Uuid, reviewer_id: Uuid) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM feedback_requests WHERE goal_id = $1 AND reviewer_id = $2)",
    )
    .bind(goal_id)
    .bind(reviewer_id)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

pub async fn find_feedback_request(pool: &PgPool, id: Uuid) -> Result<Option<FeedbackRequestRow>> {
    let row = sqlx::query_as::<_, FeedbackRequestRow>(&format!(
        "SELECT {FEEDBACK_REQUEST_COLUMNS} FROM feedback_requests WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn create_feedback_request(
    pool: &PgPool,
    goal_id: Uuid,
    reviewer_id: Uuid,
    requested_by_id: Uuid,
    message: &str,
) -> Result<FeedbackRequestRow, sqlx::Error> {
    sqlx::query_as::<_, FeedbackRequestRow>(&format!(
        "INSERT INTO feedback_requests (id, goal_id, reviewer_id, requested_by_id, message)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {FEEDBACK_REQUEST_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(goal_id)
    .bind(reviewer_id)
    .bind(requested_by_id)
    .bind(message)
    .fetch_one(pool)
    .await
}

/// Create the peer feedback and flip its request to `completed` in one
/// transaction, so no reader observes the record without the flip.
pub async fn create_peer_feedback_completing_request(
    pool: &PgPool,
    feedback_request_id: Uuid,
    rating: i16,
    comments: &str,
    areas_to_improve: &str,
) -> Result<PeerFeedbackRow, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let feedback = sqlx::query_as::<_, PeerFeedbackRow>(
        "INSERT INTO peer_feedback (id, feedback_request_id, rating, comments, areas_to_improve)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING id, feedback_request_id, rating, comments, areas_to_improve, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(feedback_request_id)
    .bind(rating)
    .bind(comments)
    .bind(areas_to_improve)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE feedback_requests SET status = 'completed' WHERE id = $1")
        .bind(feedback_request_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(feedback)
}

// ---------------------------------------------------------------------------
// Expert evaluation
// ---------------------------------------------------------------------------

const EXPERT_EVALUATION_COLUMNS: &str =
    "id, goal_id, expert_id, final_rating, comments, areas_to_improve, created_at";

pub async fn find_expert_evaluation(pool: &PgPool, goal_id: Uuid) -> Result<Option<ExpertEvaluationRow>> {
    let row = sqlx::query_as::<_, ExpertEvaluationRow>(&format!(
        "SELECT {EXPERT_EVALUATION_COLUMNS} FROM expert_evaluations WHERE goal_id = $1"
    ))
    .bind(goal_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Everything the expert-evaluation precondition check needs, in one query.
pub async fn goal_assessment_snapshot(
    pool: &PgPool,
    goal_id: Uuid,
) -> Result<Option<GoalAssessmentSnapshot>> {
    #[derive(FromRow)]
    struct SnapshotRow {
        status: GoalStatus,
        has_self_assessment: bool,
        peer_feedback_count: i64,
        has_expert_evaluation: bool,
    }

    let row = sqlx::query_as::<_, SnapshotRow>(
        r#"
        SELECT g.status,
               EXISTS(SELECT 1 FROM self_assessments sa WHERE sa.goal_id = g.id) AS has_self_assessment,
               (SELECT COUNT(*) FROM peer_feedback pf
                  JOIN feedback_requests fr ON fr.id = pf.feedback_request_id
                  WHERE fr.goal_id = g.id) AS peer_feedback_count,
               EXISTS(SELECT 1 FROM expert_evaluations ee WHERE ee.goal_id = g.id) AS has_expert_evaluation
        FROM goals g
        WHERE g.id = $1
        "#,
    )
    .bind(goal_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| GoalAssessmentSnapshot {
        status: r.status,
        has_self_assessment: r.has_self_assessment,
        peer_feedback_count: r.peer_feedback_count,
        has_expert_evaluation: r.has_expert_evaluation,
    }))
}

/// Create the expert evaluation and complete the goal in one transaction.
/// The unique constraint on goal_id makes the concurrent-duplicate case a
/// database error rather than a double success.
pub async fn create_expert_evaluation_completing_goal(
    pool: &PgPool,
    goal_id: Uuid,
    expert_id: Uuid,
    final_rating: i16,
    comments: &str,
    areas_to_improve: &str,
) -> Result<ExpertEvaluationRow, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let evaluation = sqlx::query_as::<_, ExpertEvaluationRow>(&format!(
        "INSERT INTO expert_evaluations (id, goal_id, expert_id, final_rating, comments, areas_to_improve)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {EXPERT_EVALUATION_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(goal_id)
    .bind(expert_id)
    .bind(final_rating)
    .bind(comments)
    .bind(areas_to_improve)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE goals SET status = 'completed', updated_at = NOW() WHERE id = $1")
        .bind(goal_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(evaluation)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every goal write carries its status guard in the statement itself,
    /// so a stale handler-side check cannot commit a forbidden write.
    #[test]
    fn goal_writes_re_check_status_in_sql() {
        assert!(set_goal_status_sql().contains("AND status = $2"));
        assert!(update_goal_sql().contains("AND status = 'draft'"));
        assert!(DELETE_GOAL_SQL.contains("AND status = 'draft'"));
        assert!(CREATE_PROGRESS_SQL.contains("g.status = 'in_progress'"));
    }
}
