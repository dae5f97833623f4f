use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::hr::employees::{
    create_employee, deactivate_employee, get_employee, list_employees, update_employee,
    EmployeeCreate, EmployeeQuery, EmployeeUpdate,
};
use crate::hr::policies::{
    create_policy, delete_policy, draft_policy, get_policy, list_policies, update_policy,
    PolicyCreate, PolicyDraft, PolicyDraftRequest, PolicyQuery, PolicyUpdate,
};
use crate::models::employee::EmployeeDetail;
use crate::models::policy::PolicyRow;
use crate::models::user::Role;
use crate::pagination::{Page, PageParams};
use crate::state::AppState;

#[derive(Debug, Serialize, FromRow)]
pub struct DepartmentCount {
    pub department: String,
    pub headcount: i64,
}

#[derive(Debug, Serialize, FromRow)]
pub struct CategoryCount {
    pub category: String,
    pub policies: i64,
}

#[derive(Serialize)]
pub struct HrDashboard {
    pub total_employees: i64,
    pub headcount_by_department: Vec<DepartmentCount>,
    pub joiners_last_30_days: i64,
    pub policies_by_category: Vec<CategoryCount>,
}

// ── Employees ─────────────────────────────────────────────────────────────

/// GET /api/v1/hr/employees
pub async fn handle_list_employees(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<EmployeeQuery>,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<EmployeeDetail>>, AppError> {
    auth.require(&[Role::Hr])?;
    let (items, total) = list_employees(&state.db, &query, &page).await?;
    Ok(Json(Page::new(items, total, &page)))
}

/// POST /api/v1/hr/employees
pub async fn handle_create_employee(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<EmployeeCreate>,
) -> Result<(StatusCode, Json<EmployeeDetail>), AppError> {
    auth.require(&[Role::Hr])?;
    let employee = create_employee(&state.db, state.queue.as_ref(), &auth, req).await?;
    Ok((StatusCode::CREATED, Json(employee)))
}

/// GET /api/v1/hr/employees/:id
pub async fn handle_get_employee(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<EmployeeDetail>, AppError> {
    auth.require(&[Role::Hr])?;
    Ok(Json(get_employee(&state.db, id).await?))
}

/// PATCH /api/v1/hr/employees/:id
pub async fn handle_update_employee(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<EmployeeUpdate>,
) -> Result<Json<EmployeeDetail>, AppError> {
    auth.require(&[Role::Hr])?;
    let existing = get_employee(&state.db, id).await?;
    Ok(Json(update_employee(&state.db, existing, req).await?))
}

/// DELETE /api/v1/hr/employees/:id
pub async fn handle_delete_employee(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require(&[Role::Hr])?;
    let existing = get_employee(&state.db, id).await?;
    if existing.user_id == auth.id {
        return Err(AppError::Validation(
            "You cannot deactivate your own account".to_string(),
        ));
    }
    deactivate_employee(&state.db, &existing).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Policies ──────────────────────────────────────────────────────────────

/// GET /api/v1/hr/policies
pub async fn handle_list_policies(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<PolicyQuery>,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<PolicyRow>>, AppError> {
    auth.require(&[Role::Hr])?;
    let (items, total) = list_policies(&state.db, &query, &page).await?;
    Ok(Json(Page::new(items, total, &page)))
}

/// POST /api/v1/hr/policies
pub async fn handle_create_policy(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<PolicyCreate>,
) -> Result<(StatusCode, Json<PolicyRow>), AppError> {
    auth.require(&[Role::Hr])?;
    let policy = create_policy(&state.db, auth.id, req).await?;
    Ok((StatusCode::CREATED, Json(policy)))
}

/// GET /api/v1/hr/policies/:id
pub async fn handle_get_policy(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PolicyRow>, AppError> {
    auth.require(&[Role::Hr])?;
    Ok(Json(get_policy(&state.db, id).await?))
}

/// PATCH /api/v1/hr/policies/:id
pub async fn handle_update_policy(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<PolicyUpdate>,
) -> Result<Json<PolicyRow>, AppError> {
    auth.require(&[Role::Hr])?;
    let existing = get_policy(&state.db, id).await?;
    Ok(Json(update_policy(&state.db, existing, req).await?))
}

/// DELETE /api/v1/hr/policies/:id
pub async fn handle_delete_policy(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth.require(&[Role::Hr])?;
    delete_policy(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/hr/policies/draft
pub async fn handle_draft_policy(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<PolicyDraftRequest>,
) -> Result<Json<PolicyDraft>, AppError> {
    auth.require(&[Role::Hr])?;
    Ok(Json(draft_policy(&state.llm, req).await?))
}

// ── Dashboard ─────────────────────────────────────────────────────────────

/// GET /api/v1/hr/dashboard
///
/// Headcount counts active accounts only.
pub async fn handle_dashboard(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<HrDashboard>, AppError> {
    auth.require(&[Role::Hr])?;

    let headcount_by_department = sqlx::query_as::<_, DepartmentCount>(
        r#"
        SELECT e.department, COUNT(*) AS headcount
        FROM employees e
        JOIN users u ON u.id = e.user_id
        WHERE u.is_active
        GROUP BY e.department
        ORDER BY headcount DESC, e.department
        "#,
    )
    .fetch_all(&state.db)
    .await?;

    let joiners_last_30_days: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM employees e
        JOIN users u ON u.id = e.user_id
        WHERE u.is_active AND e.date_joined >= CURRENT_DATE - 30
        "#,
    )
    .fetch_one(&state.db)
    .await?;

    let policies_by_category = sqlx::query_as::<_, CategoryCount>(
        "SELECT category, COUNT(*) AS policies FROM policies GROUP BY category ORDER BY category",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(HrDashboard {
        total_employees: headcount_by_department.iter().map(|d| d.headcount).sum(),
        headcount_by_department,
        joiners_last_30_days,
        policies_by_category,
    }))
}
