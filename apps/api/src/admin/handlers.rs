use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use sqlx::FromRow;
use tracing::warn;
use uuid::Uuid;

use crate::admin::backups::{
    create_backup, delete_backup, download_backup, get_backup, list_backups, BackupCreate,
};
use crate::admin::users::{
    create_user, deactivate_user, list_users, update_user, UserCreate, UserQuery, UserUpdate,
};
use crate::auth::accounts::get_user;
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::backup::BackupRow;
use crate::models::user::{Role, UserView};
use crate::pagination::{Page, PageParams};
use crate::state::AppState;
use crate::validation::OptionalJson;

#[derive(Debug, Serialize, FromRow)]
pub struct LabelCount {
    pub label: String,
    pub count: i64,
}

#[derive(Serialize)]
pub struct AdminDashboard {
    pub users_by_role: Vec<LabelCount>,
    pub active_users: i64,
    pub inactive_users: i64,
    pub projects_by_status: Vec<LabelCount>,
    pub open_tasks: i64,
    pub reports_last_7_days: i64,
    /// `None` when Redis could not be reached.
    pub queued_tasks: Option<i64>,
}

// ── Users ─────────────────────────────────────────────────────────────────

/// GET /api/v1/admin/users
pub async fn handle_list_users(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<UserQuery>,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<UserView>>, AppError> {
    auth.require(&[Role::Admin])?;
    let (rows, total) = list_users(&state.db, &query, &page).await?;
    let items = rows.into_iter().map(UserView::from).collect();
    Ok(Json(Page::new(items, total, &page)))
}

/// POST /api/v1/admin/users
pub async fn handle_create_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<UserCreate>,
) -> Result<(StatusCode, Json<UserView>), AppError> {
    auth.require(&[Role::Admin])?;
    let user = create_user(&state.db, req).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// GET /api/v1/admin/users/:id
pub async fn handle_get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserView>, AppError> {
    auth.require(&[Role::Admin])?;
    Ok(Json(get_user(&state.db, id).await?.into()))
}

/// PATCH /api/v1/admin/users/:id
pub async fn handle_update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UserUpdate>,
) -> Result<Json<UserView>, AppError> {
    auth.require(&[Role::Admin])?;
    Ok(Json(update_user(&state.db, &auth, id, req).await?.into()))
}

/// DELETE /api/v1/admin/users/:id
pub async fn handle_delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require(&[Role::Admin])?;
    deactivate_user(&state.db, &auth, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Backups ───────────────────────────────────────────────────────────────

/// POST /api/v1/admin/backups
pub async fn handle_create_backup(
    State(state): State<AppState>,
    auth: AuthUser,
    body: OptionalJson<BackupCreate>,
) -> Result<(StatusCode, Json<BackupRow>), AppError> {
    auth.require(&[Role::Admin])?;
    let req = body.or_default();
    let backup = create_backup(&state.db, &state.s3, &state.config.s3_bucket, auth.id, req).await?;
    Ok((StatusCode::CREATED, Json(backup)))
}

/// GET /api/v1/admin/backups
pub async fn handle_list_backups(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<BackupRow>>, AppError> {
    auth.require(&[Role::Admin])?;
    let (items, total) = list_backups(&state.db, &page).await?;
    Ok(Json(Page::new(items, total, &page)))
}

/// GET /api/v1/admin/backups/:id
pub async fn handle_get_backup(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<BackupRow>, AppError> {
    auth.require(&[Role::Admin])?;
    Ok(Json(get_backup(&state.db, id).await?))
}

/// GET /api/v1/admin/backups/:id/download
pub async fn handle_download_backup(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    auth.require(&[Role::Admin])?;
    let backup = get_backup(&state.db, id).await?;
    let data = download_backup(&state.s3, &state.config.s3_bucket, &backup).await?;

    let filename = backup
        .s3_key
        .rsplit('/')
        .next()
        .unwrap_or("backup.json")
        .to_string();
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        data,
    ))
}

/// DELETE /api/v1/admin/backups/:id
pub async fn handle_delete_backup(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require(&[Role::Admin])?;
    let backup = get_backup(&state.db, id).await?;
    delete_backup(&state.db, &state.s3, &state.config.s3_bucket, &backup).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Dashboard ─────────────────────────────────────────────────────────────

/// GET /api/v1/admin/dashboard
pub async fn handle_dashboard(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<AdminDashboard>, AppError> {
    auth.require(&[Role::Admin])?;

    let users_by_role = sqlx::query_as::<_, LabelCount>(
        "SELECT role AS label, COUNT(*) AS count FROM users GROUP BY role ORDER BY role",
    )
    .fetch_all(&state.db)
    .await?;

    let (active_users, inactive_users): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FILTER (WHERE is_active),
               COUNT(*) FILTER (WHERE NOT is_active)
        FROM users
        "#,
    )
    .fetch_one(&state.db)
    .await?;

    let projects_by_status = sqlx::query_as::<_, LabelCount>(
        "SELECT status AS label, COUNT(*) AS count FROM projects GROUP BY status ORDER BY status",
    )
    .fetch_all(&state.db)
    .await?;

    let open_tasks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE status <> 'done'")
        .fetch_one(&state.db)
        .await?;

    let reports_last_7_days: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM reports WHERE created_at >= NOW() - INTERVAL '7 days'",
    )
    .fetch_one(&state.db)
    .await?;

    // The dashboard still renders when Redis is down.
    let queued_tasks = match state.queue.depth().await {
        Ok(depth) => Some(depth),
        Err(e) => {
            warn!("Could not read queue depth: {e}");
            None
        }
    };

    Ok(Json(AdminDashboard {
        users_by_role,
        active_users,
        inactive_users,
        projects_by_status,
        open_tasks,
        reports_last_7_days,
        queued_tasks,
    }))
}
