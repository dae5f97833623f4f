use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::project::{ProjectMember, ProjectRow, ProjectStatus, TaskRow};
use crate::models::user::Role;
use crate::pagination::{Page, PageParams};
use crate::pm::members::{add_member, list_members, remove_member, AddMemberRequest};
use crate::pm::projects::{
    create_project, delete_project, list_projects, load_managed_project, project_progress,
    update_project, ProjectCreate, ProjectProgress, ProjectQuery, ProjectUpdate,
};
use crate::pm::tasks::{
    create_task, delete_task, get_task, list_project_tasks, update_task, TaskCreate, TaskFilter,
    TaskUpdate,
};
use crate::state::AppState;
use crate::validation;

#[derive(Serialize)]
pub struct PmDashboard {
    pub projects: Vec<ProjectProgress>,
    pub total_projects: usize,
    pub open_tasks: i64,
    pub overdue_tasks: i64,
}

/// Admin sees every project; a PM only the ones they manage.
fn manager_scope(auth: &AuthUser) -> Option<Uuid> {
    if auth.is_admin() {
        None
    } else {
        Some(auth.id)
    }
}

// ── Projects ──────────────────────────────────────────────────────────────

/// GET /api/v1/pm/projects
pub async fn handle_list_projects(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ProjectQuery>,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<ProjectRow>>, AppError> {
    auth.require(&[Role::Pm])?;
    let status = query
        .status
        .as_deref()
        .map(|s| validation::parse_enum::<ProjectStatus>("status", s))
        .transpose()?;

    let (items, total) = list_projects(&state.db, manager_scope(&auth), status, &page).await?;
    Ok(Json(Page::new(items, total, &page)))
}

/// POST /api/v1/pm/projects
pub async fn handle_create_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<ProjectCreate>,
) -> Result<(StatusCode, Json<ProjectRow>), AppError> {
    auth.require(&[Role::Pm])?;
    let project = create_project(&state.db, &auth, req).await?;
    tracing::info!("Project {} created by {}", project.id, auth.id);
    Ok((StatusCode::CREATED, Json(project)))
}

/// GET /api/v1/pm/projects/:id
pub async fn handle_get_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ProjectRow>, AppError> {
    auth.require(&[Role::Pm])?;
    Ok(Json(load_managed_project(&state.db, &auth, id).await?))
}

/// PATCH /api/v1/pm/projects/:id
pub async fn handle_update_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ProjectUpdate>,
) -> Result<Json<ProjectRow>, AppError> {
    auth.require(&[Role::Pm])?;
    let existing = load_managed_project(&state.db, &auth, id).await?;
    Ok(Json(update_project(&state.db, &auth, existing, req).await?))
}

/// DELETE /api/v1/pm/projects/:id
pub async fn handle_delete_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require(&[Role::Pm])?;
    let project = load_managed_project(&state.db, &auth, id).await?;
    delete_project(&state.db, project.id).await?;
    tracing::info!("Project {} deleted by {}", project.id, auth.id);
    Ok(StatusCode::NO_CONTENT)
}

// ── Members ───────────────────────────────────────────────────────────────

/// GET /api/v1/pm/projects/:id/members
pub async fn handle_list_members(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ProjectMember>>, AppError> {
    auth.require(&[Role::Pm])?;
    let project = load_managed_project(&state.db, &auth, id).await?;
    Ok(Json(list_members(&state.db, project.id).await?))
}

/// POST /api/v1/pm/projects/:id/members
pub async fn handle_add_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<AddMemberRequest>,
) -> Result<Json<Vec<ProjectMember>>, AppError> {
    auth.require(&[Role::Pm])?;
    let project = load_managed_project(&state.db, &auth, id).await?;
    Ok(Json(add_member(&state.db, project.id, req.user_id).await?))
}

/// DELETE /api/v1/pm/projects/:id/members/:user_id
pub async fn handle_remove_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    auth.require(&[Role::Pm])?;
    let project = load_managed_project(&state.db, &auth, id).await?;
    remove_member(&state.db, project.id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Tasks ─────────────────────────────────────────────────────────────────

/// GET /api/v1/pm/projects/:id/tasks
pub async fn handle_list_tasks(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Query(filter): Query<TaskFilter>,
) -> Result<Json<Vec<TaskRow>>, AppError> {
    auth.require(&[Role::Pm])?;
    let project = load_managed_project(&state.db, &auth, id).await?;
    Ok(Json(list_project_tasks(&state.db, project.id, &filter).await?))
}

/// POST /api/v1/pm/projects/:id/tasks
pub async fn handle_create_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<TaskCreate>,
) -> Result<(StatusCode, Json<TaskRow>), AppError> {
    auth.require(&[Role::Pm])?;
    let project = load_managed_project(&state.db, &auth, id).await?;
    let task = create_task(&state.db, state.queue.as_ref(), &project, req).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// PATCH /api/v1/pm/tasks/:id
pub async fn handle_update_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<TaskUpdate>,
) -> Result<Json<TaskRow>, AppError> {
    auth.require(&[Role::Pm])?;
    let existing = get_task(&state.db, id).await?;
    let project = load_managed_project(&state.db, &auth, existing.project_id).await?;
    let task = update_task(&state.db, state.queue.as_ref(), &project, existing, req).await?;
    Ok(Json(task))
}

/// DELETE /api/v1/pm/tasks/:id
pub async fn handle_delete_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require(&[Role::Pm])?;
    let task = get_task(&state.db, id).await?;
    load_managed_project(&state.db, &auth, task.project_id).await?;
    delete_task(&state.db, task.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Dashboard ─────────────────────────────────────────────────────────────

/// GET /api/v1/pm/dashboard
pub async fn handle_dashboard(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<PmDashboard>, AppError> {
    auth.require(&[Role::Pm])?;
    let projects = project_progress(&state.db, manager_scope(&auth)).await?;
    Ok(Json(summarize(projects)))
}

fn summarize(projects: Vec<ProjectProgress>) -> PmDashboard {
    let open_tasks = projects.iter().map(|p| p.total_tasks - p.done).sum();
    let overdue_tasks = projects.iter().map(|p| p.overdue).sum();
    PmDashboard {
        total_projects: projects.len(),
        open_tasks,
        overdue_tasks,
        projects,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(total: i64, done: i64, overdue: i64) -> ProjectProgress {
        ProjectProgress {
            id: Uuid::new_v4(),
            name: "p".into(),
            status: "active".into(),
            due_date: None,
            total_tasks: total,
            todo: total - done,
            in_progress: 0,
            blocked: 0,
            done,
            overdue,
            completion_rate: 0.0,
        }
    }

    #[test]
    fn test_summarize_totals() {
        let dashboard = summarize(vec![progress(10, 4, 2), progress(3, 3, 0)]);
        assert_eq!(dashboard.total_projects, 2);
        assert_eq!(dashboard.open_tasks, 6);
        assert_eq!(dashboard.overdue_tasks, 2);
    }

    #[test]
    fn test_manager_scope() {
        let admin = AuthUser {
            id: Uuid::new_v4(),
            role: Role::Admin,
        };
        let pm = AuthUser {
            role: Role::Pm,
            ..admin.clone()
        };
        assert_eq!(manager_scope(&admin), None);
        assert_eq!(manager_scope(&pm), Some(pm.id));
    }
}
