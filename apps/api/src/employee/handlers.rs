use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::accounts::get_user;
use crate::auth::AuthUser;
use crate::employee::updates::{
    list_my_updates, post_update, WorkUpdateCreate, WorkUpdateQuery,
};
use crate::errors::AppError;
use crate::hr::employees::{find_by_user, update_own_phone};
use crate::hr::policies::{get_policy, list_policies, PolicyQuery};
use crate::models::employee::EmployeeDetail;
use crate::models::policy::PolicyRow;
use crate::models::project::{ProjectRow, TaskRow, TaskStatus, WorkUpdateRow};
use crate::models::user::UserView;
use crate::pagination::{Page, PageParams};
use crate::pm::tasks::{get_task, set_task_status, StatusUpdate};
use crate::state::AppState;
use crate::validation;

#[derive(Serialize)]
pub struct ProfileResponse {
    pub user: UserView,
    pub employee: Option<EmployeeDetail>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProfileUpdate {
    /// `null` clears the phone number.
    #[serde(default, deserialize_with = "validation::double_option")]
    pub phone: Option<Option<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MyTaskQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Serialize)]
pub struct EmployeeDashboard {
    pub tasks_by_status: Vec<StatusCount>,
    pub overdue_tasks: i64,
    pub hours_last_7_days: f64,
    pub projects: i64,
}

// ── Profile ───────────────────────────────────────────────────────────────

/// GET /api/v1/me/profile
pub async fn handle_get_profile(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = get_user(&state.db, auth.id).await?;
    let employee = find_by_user(&state.db, auth.id).await?;
    Ok(Json(ProfileResponse {
        user: user.into(),
        employee,
    }))
}

/// PATCH /api/v1/me/profile
pub async fn handle_update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<ProfileUpdate>,
) -> Result<Json<ProfileResponse>, AppError> {
    if let Some(phone) = req.phone {
        update_own_phone(&state.db, auth.id, phone.as_deref()).await?;
    }
    handle_get_profile(State(state), auth).await
}

// ── Tasks ─────────────────────────────────────────────────────────────────

/// GET /api/v1/me/tasks
pub async fn handle_my_tasks(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<MyTaskQuery>,
) -> Result<Json<Vec<TaskRow>>, AppError> {
    let status = query
        .status
        .as_deref()
        .map(|s| validation::parse_enum::<TaskStatus>("status", s))
        .transpose()?;

    let tasks = sqlx::query_as::<_, TaskRow>(
        r#"
        SELECT * FROM tasks
        WHERE assignee_id = $1 AND ($2::text IS NULL OR status = $2)
        ORDER BY due_date NULLS LAST, created_at
        "#,
    )
    .bind(auth.id)
    .bind(status.map(|s| s.as_str()))
    .fetch_all(&state.db)
    .await?;
    Ok(Json(tasks))
}

/// PATCH /api/v1/me/tasks/:id/status
///
/// Tasks assigned to someone else look missing.
pub async fn handle_update_task_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusUpdate>,
) -> Result<Json<TaskRow>, AppError> {
    let status = validation::parse_enum::<TaskStatus>("status", &req.status)?;
    let task = get_task(&state.db, id).await?;
    if task.assignee_id != Some(auth.id) {
        return Err(AppError::NotFound(format!("Task {id} not found")));
    }
    Ok(Json(set_task_status(&state.db, &task, status).await?))
}

// ── Work updates ──────────────────────────────────────────────────────────

/// POST /api/v1/me/updates
pub async fn handle_post_update(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<WorkUpdateCreate>,
) -> Result<(StatusCode, Json<WorkUpdateRow>), AppError> {
    let update = post_update(&state.db, auth.id, req).await?;
    Ok((StatusCode::CREATED, Json(update)))
}

/// GET /api/v1/me/updates
pub async fn handle_list_updates(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<WorkUpdateQuery>,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<WorkUpdateRow>>, AppError> {
    let (items, total) = list_my_updates(&state.db, auth.id, &query, &page).await?;
    Ok(Json(Page::new(items, total, &page)))
}

// ── Policies (read-only) ──────────────────────────────────────────────────

/// GET /api/v1/me/policies
pub async fn handle_list_policies(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<PolicyQuery>,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<PolicyRow>>, AppError> {
    let (items, total) = list_policies(&state.db, &query, &page).await?;
    Ok(Json(Page::new(items, total, &page)))
}

/// GET /api/v1/me/policies/:id
pub async fn handle_get_policy(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PolicyRow>, AppError> {
    Ok(Json(get_policy(&state.db, id).await?))
}

// ── Projects ──────────────────────────────────────────────────────────────

/// GET /api/v1/me/projects
pub async fn handle_my_projects(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<ProjectRow>>, AppError> {
    let projects = sqlx::query_as::<_, ProjectRow>(
        r#"
        SELECT p.* FROM projects p
        JOIN project_members m ON m.project_id = p.id
        WHERE m.user_id = $1
        ORDER BY p.name
        "#,
    )
    .bind(auth.id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(projects))
}

// ── Dashboard ─────────────────────────────────────────────────────────────

/// GET /api/v1/me/dashboard
pub async fn handle_dashboard(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<EmployeeDashboard>, AppError> {
    let tasks_by_status = sqlx::query_as::<_, StatusCount>(
        r#"
        SELECT status, COUNT(*) AS count FROM tasks
        WHERE assignee_id = $1
        GROUP BY status
        ORDER BY status
        "#,
    )
    .bind(auth.id)
    .fetch_all(&state.db)
    .await?;

    let overdue_tasks: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM tasks
        WHERE assignee_id = $1 AND status <> 'done' AND due_date < CURRENT_DATE
        "#,
    )
    .bind(auth.id)
    .fetch_one(&state.db)
    .await?;

    let hours_last_7_days: f64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(hours_spent), 0)::float8 FROM work_updates
        WHERE user_id = $1 AND created_at >= NOW() - INTERVAL '7 days'
        "#,
    )
    .bind(auth.id)
    .fetch_one(&state.db)
    .await?;

    let projects: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM project_members WHERE user_id = $1")
        .bind(auth.id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(EmployeeDashboard {
        tasks_by_status,
        overdue_tasks,
        hours_last_7_days,
        projects,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_update_absent_vs_null() {
        let absent: ProfileUpdate = serde_json::from_str("{}").unwrap();
        assert!(absent.phone.is_none());
        let cleared: ProfileUpdate = serde_json::from_str(r#"{"phone": null}"#).unwrap();
        assert_eq!(cleared.phone, Some(None));
    }
}
