//! Axum route handlers for project reports (PM surface).

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::report::ReportRow;
use crate::models::user::Role;
use crate::pagination::{Page, PageParams};
use crate::pm::projects::load_managed_project;
use crate::queue::TaskKind;
use crate::reports::pipeline::{generate_daily_report, ReportRequest};
use crate::state::AppState;
use crate::validation::OptionalJson;

#[derive(Debug, Default, Deserialize)]
pub struct GenerateReportBody {
    /// Defaults to today (UTC).
    pub report_date: Option<NaiveDate>,
    #[serde(default)]
    pub send_email: bool,
}

#[derive(Debug, Serialize)]
pub struct ReportQueuedResponse {
    pub task_id: Uuid,
    pub project_id: Uuid,
    pub report_date: NaiveDate,
    pub status: &'static str,
}

fn report_date_or_today(requested: Option<NaiveDate>) -> Result<NaiveDate, AppError> {
    let today = Utc::now().date_naive();
    match requested {
        Some(date) if date > today => Err(AppError::Validation(
            "report_date cannot be in the future".to_string(),
        )),
        Some(date) => Ok(date),
        None => Ok(today),
    }
}

/// POST /api/v1/pm/projects/:id/reports
///
/// Queues report generation and returns 202 with the task id.
pub async fn handle_queue_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
    body: OptionalJson<GenerateReportBody>,
) -> Result<(StatusCode, Json<ReportQueuedResponse>), AppError> {
    auth.require(&[Role::Pm])?;
    let project = load_managed_project(&state.db, &auth, project_id).await?;
    let body = body.or_default();
    let report_date = report_date_or_today(body.report_date)?;

    let task_id = state
        .queue
        .enqueue(TaskKind::GenerateDailyReport {
            project_id: project.id,
            report_date,
            requested_by: Some(auth.id),
            send_email: body.send_email,
        })
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ReportQueuedResponse {
            task_id,
            project_id: project.id,
            report_date,
            status: "queued",
        }),
    ))
}

/// POST /api/v1/pm/projects/:id/reports/run
///
/// Runs the pipeline inline and returns the saved report.
pub async fn handle_run_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
    body: OptionalJson<GenerateReportBody>,
) -> Result<Json<ReportRow>, AppError> {
    auth.require(&[Role::Pm])?;
    let project = load_managed_project(&state.db, &auth, project_id).await?;
    let body = body.or_default();

    let request = ReportRequest {
        project_id: project.id,
        report_date: report_date_or_today(body.report_date)?,
        requested_by: Some(auth.id),
        send_email: body.send_email,
    };
    let report = generate_daily_report(&state.db, &state.llm, state.queue.as_ref(), &request).await?;
    Ok(Json(report))
}

/// GET /api/v1/pm/projects/:id/reports
pub async fn handle_list_reports(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<ReportRow>>, AppError> {
    auth.require(&[Role::Pm])?;
    let project = load_managed_project(&state.db, &auth, project_id).await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reports WHERE project_id = $1")
        .bind(project.id)
        .fetch_one(&state.db)
        .await?;
    let items = sqlx::query_as::<_, ReportRow>(
        "SELECT * FROM reports WHERE project_id = $1 ORDER BY report_date DESC LIMIT $2 OFFSET $3",
    )
    .bind(project.id)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(&state.db)
    .await?;

    Ok(Json(Page::new(items, total, &page)))
}

/// GET /api/v1/pm/reports/:id
pub async fn handle_get_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(report_id): Path<Uuid>,
) -> Result<Json<ReportRow>, AppError> {
    auth.require(&[Role::Pm])?;
    let report = sqlx::query_as::<_, ReportRow>("SELECT * FROM reports WHERE id = $1")
        .bind(report_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Report {report_id} not found")))?;

    // Ownership is checked through the project.
    load_managed_project(&state.db, &auth, report.project_id).await?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_report_date_defaults_to_today() {
        assert_eq!(report_date_or_today(None).unwrap(), Utc::now().date_naive());
    }

    #[test]
    fn test_future_report_date_rejected() {
        let tomorrow = Utc::now().date_naive() + Duration::days(2);
        assert!(matches!(
            report_date_or_today(Some(tomorrow)),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_body_defaults() {
        let body: GenerateReportBody = serde_json::from_str("{}").unwrap();
        assert!(!body.send_email);
        assert!(body.report_date.is_none());
    }
}
