//! Daily Project Progress Report: orchestrates the report pipeline.
//!
//! Flow: load project → load tasks, members, updates → compute metrics →
//!       LLM summary → LLM classification → upsert report → queue e-mail.
//!
//! Runs inline from `POST /pm/projects/:id/reports/run` and from the
//! background worker for queued and scheduled reports.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::accounts::get_user;
use crate::errors::AppError;
use crate::llm_client::prompts::{truncate_chars, GROUNDING_INSTRUCTION, JSON_ONLY_SYSTEM};
use crate::llm_client::LlmClient;
use crate::mailer::templates;
use crate::models::project::{ProjectMember, ProjectRow, TaskRow, WorkUpdateDetail};
use crate::models::report::{ReportHealth, ReportRow};
use crate::pm::members::list_members;
use crate::pm::projects::get_project;
use crate::pm::tasks::{list_project_tasks, TaskFilter};
use crate::queue::{TaskKind, TaskQueue};
use crate::reports::metrics::{compute_metrics, derive_health, ProjectMetrics, ReportWindow};
use crate::reports::prompts::{
    CLASSIFY_PROMPT_TEMPLATE, CLASSIFY_ROLE, NO_ACTIVITY_SUMMARY, SUMMARY_PROMPT_TEMPLATE,
    SUMMARY_SYSTEM,
};

const MAX_PROMPT_TASKS: usize = 40;
const MAX_PROMPT_UPDATES: usize = 100;
const MAX_UPDATE_CHARS: usize = 500;
const MAX_CLASSIFIED_ITEMS: usize = 5;
const MAX_CLASSIFIED_ITEM_CHARS: usize = 300;

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub project_id: Uuid,
    pub report_date: NaiveDate,
    /// `None` for scheduled reports.
    pub requested_by: Option<Uuid>,
    pub send_email: bool,
}

/// LLM classification output. Missing lists default to empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Classification {
    #[serde(default)]
    pub health: Option<String>,
    #[serde(default)]
    pub blockers: Vec<String>,
    #[serde(default)]
    pub risks: Vec<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
}

/// Everything the pipeline has decided before persisting.
#[derive(Debug, Clone)]
pub struct ReportDraft {
    pub summary: String,
    pub health: ReportHealth,
    pub metrics: ProjectMetrics,
    pub blockers: Vec<String>,
    pub risks: Vec<String>,
    pub highlights: Vec<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

/// Runs the report pipeline for one project and day, replacing any earlier
/// report for the same day.
pub async fn generate_daily_report(
    pool: &PgPool,
    llm: &LlmClient,
    queue: &dyn TaskQueue,
    request: &ReportRequest,
) -> Result<ReportRow, AppError> {
    // Step 1: Load project
    let project = get_project(pool, request.project_id).await?;
    let window = window_for(request.report_date, Utc::now());
    info!(
        "Generating report for project {} ({}), window {} .. {}",
        project.id, project.name, window.start, window.end
    );

    // Step 2: Load activity
    let tasks = list_project_tasks(pool, project.id, &TaskFilter::default()).await?;
    let members = list_members(pool, project.id).await?;
    let updates = load_updates(pool, project.id, window).await?;

    // Step 3: Metrics
    let metrics = compute_metrics(&tasks, &members, &updates, window);
    let metric_health = derive_health(&metrics);

    // Steps 4-7: Summary and classification
    let draft = if metrics.has_activity() {
        let summary_prompt = build_summary_prompt(&project, &metrics, &tasks, &members, &updates, window)?;
        let summary = llm.call_text(&summary_prompt, SUMMARY_SYSTEM).await?;

        let classify_prompt = build_classify_prompt(&summary, &metrics, &updates)?;
        let classify_system = format!("{CLASSIFY_ROLE} {JSON_ONLY_SYSTEM}");
        let classification = match llm
            .call_json::<Classification>(&classify_prompt, &classify_system)
            .await
        {
            Ok(c) => c,
            Err(e) => {
                warn!(
                    "Classification failed for project {}; using metrics only: {e}",
                    project.id
                );
                Classification::default()
            }
        };

        merge_classification(summary, metrics, metric_health, classification)
    } else {
        info!("No activity on project {} in window; skipping LLM", project.id);
        ReportDraft {
            summary: NO_ACTIVITY_SUMMARY.to_string(),
            health: metric_health,
            metrics,
            blockers: vec![],
            risks: vec![],
            highlights: vec![],
        }
    };

    // Step 8: Persist
    let report = upsert_report(pool, project.id, request, &draft).await?;
    info!(
        "Report {} saved for project {} on {}: {}",
        report.id, project.id, report.report_date, report.health
    );

    // Step 9: Notify
    if request.send_email {
        let manager = get_user(pool, project.manager_id).await?;
        let email = templates::daily_report(&manager.email, &project.name, &report);
        queue.enqueue(TaskKind::SendEmail { email }).await?;
    }

    Ok(report)
}

/// 24 hours ending at the close of `report_date`, or at `now` for today.
pub fn window_for(report_date: NaiveDate, now: DateTime<Utc>) -> ReportWindow {
    let day_end = report_date
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or(now);
    let end = day_end.min(now);
    ReportWindow {
        start: end - Duration::hours(24),
        end,
    }
}

/// Combines LLM output with the metric-derived health; the worse health wins.
pub fn merge_classification(
    summary: String,
    metrics: ProjectMetrics,
    metric_health: ReportHealth,
    classification: Classification,
) -> ReportDraft {
    let llm_health = classification
        .health
        .as_deref()
        .and_then(|h| h.trim().parse::<ReportHealth>().ok())
        .unwrap_or(metric_health);

    ReportDraft {
        summary,
        health: metric_health.worst(llm_health),
        metrics,
        blockers: clean_items(classification.blockers),
        risks: clean_items(classification.risks),
        highlights: clean_items(classification.highlights),
    }
}

fn clean_items(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .take(MAX_CLASSIFIED_ITEMS)
        .map(|s| truncate_chars(&s, MAX_CLASSIFIED_ITEM_CHARS))
        .collect()
}

async fn load_updates(
    pool: &PgPool,
    project_id: Uuid,
    window: ReportWindow,
) -> Result<Vec<WorkUpdateDetail>, AppError> {
    Ok(sqlx::query_as::<_, WorkUpdateDetail>(
        r#"
        SELECT w.id, w.user_id, u.full_name AS author_name, w.task_id,
               t.title AS task_title, w.content, w.hours_spent, w.created_at
        FROM work_updates w
        JOIN users u ON u.id = w.user_id
        LEFT JOIN tasks t ON t.id = w.task_id
        WHERE w.project_id = $1 AND w.created_at > $2 AND w.created_at <= $3
        ORDER BY w.created_at ASC
        "#,
    )
    .bind(project_id)
    .bind(window.start)
    .bind(window.end)
    .fetch_all(pool)
    .await?)
}

async fn upsert_report(
    pool: &PgPool,
    project_id: Uuid,
    request: &ReportRequest,
    draft: &ReportDraft,
) -> Result<ReportRow, AppError> {
    let metrics = serde_json::to_value(&draft.metrics)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize metrics: {e}")))?;

    Ok(sqlx::query_as::<_, ReportRow>(
        r#"
        INSERT INTO reports
            (id, project_id, report_date, summary, health, metrics,
             blockers, risks, highlights, generated_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (project_id, report_date) DO UPDATE SET
            summary = EXCLUDED.summary,
            health = EXCLUDED.health,
            metrics = EXCLUDED.metrics,
            blockers = EXCLUDED.blockers,
            risks = EXCLUDED.risks,
            highlights = EXCLUDED.highlights,
            generated_by = EXCLUDED.generated_by,
            created_at = NOW()
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(project_id)
    .bind(request.report_date)
    .bind(&draft.summary)
    .bind(draft.health.as_str())
    .bind(metrics)
    .bind(&draft.blockers)
    .bind(&draft.risks)
    .bind(&draft.highlights)
    .bind(request.requested_by)
    .fetch_one(pool)
    .await?)
}

// ────────────────────────────────────────────────────────────────────────────
// Prompt building
// ────────────────────────────────────────────────────────────────────────────

fn build_summary_prompt(
    project: &ProjectRow,
    metrics: &ProjectMetrics,
    tasks: &[TaskRow],
    members: &[ProjectMember],
    updates: &[WorkUpdateDetail],
    window: ReportWindow,
) -> Result<String, AppError> {
    let project_json = serde_json::to_string_pretty(&serde_json::json!({
        "name": project.name,
        "description": project.description,
        "status": project.status,
        "start_date": project.start_date,
        "due_date": project.due_date,
        "team_size": members.len(),
    }))
    .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize project: {e}")))?;

    Ok(SUMMARY_PROMPT_TEMPLATE
        .replace("{grounding_instruction}", GROUNDING_INSTRUCTION)
        .replace("{project_json}", &project_json)
        .replace("{metrics_json}", &metrics_json(metrics)?)
        .replace("{tasks_block}", &tasks_block(tasks, members, window))
        .replace("{updates_block}", &updates_block(updates)))
}

fn build_classify_prompt(
    summary: &str,
    metrics: &ProjectMetrics,
    updates: &[WorkUpdateDetail],
) -> Result<String, AppError> {
    Ok(CLASSIFY_PROMPT_TEMPLATE
        .replace("{summary}", summary)
        .replace("{metrics_json}", &metrics_json(metrics)?)
        .replace("{updates_block}", &updates_block(updates)))
}

fn metrics_json(metrics: &ProjectMetrics) -> Result<String, AppError> {
    serde_json::to_string_pretty(metrics)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize metrics: {e}")))
}

/// Open tasks plus tasks completed inside the window, one per line.
fn tasks_block(tasks: &[TaskRow], members: &[ProjectMember], window: ReportWindow) -> String {
    let names: HashMap<Uuid, &str> = members
        .iter()
        .map(|m| (m.user_id, m.full_name.as_str()))
        .collect();
    let today = window.end.date_naive();

    let lines: Vec<String> = tasks
        .iter()
        .filter(|t| !t.is_done() || t.completed_at.is_some_and(|at| window.contains(at)))
        .take(MAX_PROMPT_TASKS)
        .map(|t| {
            let assignee = t
                .assignee_id
                .and_then(|id| names.get(&id).copied())
                .unwrap_or("unassigned");
            let due = t
                .due_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "none".to_string());
            let overdue = if t.is_overdue(today) { " OVERDUE" } else { "" };
            format!(
                "- [{}] {} (priority: {}, assignee: {}, due: {}){}",
                t.status, t.title, t.priority, assignee, due, overdue
            )
        })
        .collect();

    if lines.is_empty() {
        "(none)".to_string()
    } else {
        lines.join("\n")
    }
}

fn updates_block(updates: &[WorkUpdateDetail]) -> String {
    if updates.is_empty() {
        return "(none)".to_string();
    }
    updates
        .iter()
        .take(MAX_PROMPT_UPDATES)
        .map(|u| {
            let task = u.task_title.as_deref().unwrap_or("general");
            let hours = u
                .hours_spent
                .map(|h| format!("{h:.1}h"))
                .unwrap_or_else(|| "n/a".to_string());
            format!(
                "- {} | {} | task: {} | hours: {} | {}",
                u.created_at.format("%H:%M"),
                u.author_name,
                task,
                hours,
                truncate_chars(u.content.trim(), MAX_UPDATE_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::project::{TaskPriority, TaskStatus};
    use chrono::TimeZone;

    fn task(title: &str, status: TaskStatus, assignee: Option<Uuid>) -> TaskRow {
        TaskRow {
            id: Uuid::new_v4(),
            project_id: Uuid::nil(),
            title: title.into(),
            description: String::new(),
            assignee_id: assignee,
            status: status.as_str().into(),
            priority: TaskPriority::High.as_str().into(),
            due_date: None,
            completed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_window_for_past_day_ends_at_midnight() {
        let now = Utc.with_ymd_and_hms(2024, 5, 12, 9, 30, 0).unwrap();
        let w = window_for(NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(), now);
        assert_eq!(w.end, Utc.with_ymd_and_hms(2024, 5, 11, 0, 0, 0).unwrap());
        assert_eq!(w.start, Utc.with_ymd_and_hms(2024, 5, 10, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_window_for_today_ends_now() {
        let now = Utc.with_ymd_and_hms(2024, 5, 12, 9, 30, 0).unwrap();
        let w = window_for(now.date_naive(), now);
        assert_eq!(w.end, now);
        assert_eq!(w.start, now - Duration::hours(24));
    }

    #[test]
    fn test_merge_takes_worse_health() {
        let c = Classification {
            health: Some("on_track".into()),
            ..Default::default()
        };
        let draft = merge_classification("s".into(), ProjectMetrics::default(), ReportHealth::AtRisk, c);
        assert_eq!(draft.health, ReportHealth::AtRisk);

        let c = Classification {
            health: Some("off_track".into()),
            ..Default::default()
        };
        let draft = merge_classification("s".into(), ProjectMetrics::default(), ReportHealth::OnTrack, c);
        assert_eq!(draft.health, ReportHealth::OffTrack);
    }

    #[test]
    fn test_merge_unknown_health_falls_back_to_metrics() {
        let c = Classification {
            health: Some("great".into()),
            ..Default::default()
        };
        let draft = merge_classification("s".into(), ProjectMetrics::default(), ReportHealth::AtRisk, c);
        assert_eq!(draft.health, ReportHealth::AtRisk);
    }

    #[test]
    fn test_merge_cleans_lists() {
        let c = Classification {
            health: None,
            blockers: vec!["  ".into(), " waiting on vendor ".into()],
            risks: (0..8).map(|i| format!("risk {i}")).collect(),
            highlights: vec!["x".repeat(400)],
        };
        let draft = merge_classification("s".into(), ProjectMetrics::default(), ReportHealth::OnTrack, c);
        assert_eq!(draft.blockers, vec!["waiting on vendor".to_string()]);
        assert_eq!(draft.risks.len(), MAX_CLASSIFIED_ITEMS);
        assert_eq!(draft.highlights[0].chars().count(), MAX_CLASSIFIED_ITEM_CHARS + 1);
    }

    #[test]
    fn test_classification_tolerates_missing_fields() {
        let c: Classification = serde_json::from_str(r#"{"health": "at_risk"}"#).unwrap();
        assert!(c.blockers.is_empty());
        assert_eq!(c.health.as_deref(), Some("at_risk"));
    }

    #[test]
    fn test_tasks_block_names_assignees_and_skips_old_done() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 18, 0, 0).unwrap();
        let window = window_for(now.date_naive(), now);
        let member = ProjectMember {
            user_id: Uuid::new_v4(),
            email: "a@x.co".into(),
            full_name: "Ada".into(),
            role: "employee".into(),
            added_at: now,
        };
        let mut old_done = task("Old work", TaskStatus::Done, None);
        old_done.completed_at = Some(now - Duration::days(3));
        let mut fresh_done = task("Fresh work", TaskStatus::Done, None);
        fresh_done.completed_at = Some(now - Duration::hours(2));
        let open = task("Open work", TaskStatus::InProgress, Some(member.user_id));

        let block = tasks_block(&[old_done, fresh_done, open], &[member], window);
        assert!(!block.contains("Old work"));
        assert!(block.contains("Fresh work"));
        assert!(block.contains("assignee: Ada"));
    }

    #[test]
    fn test_updates_block_formats_and_truncates() {
        let update = WorkUpdateDetail {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            author_name: "Ada".into(),
            task_id: None,
            task_title: Some("Login page".into()),
            content: "y".repeat(MAX_UPDATE_CHARS + 50),
            hours_spent: Some(2.0),
            created_at: Utc.with_ymd_and_hms(2024, 5, 10, 14, 5, 0).unwrap(),
        };
        let block = updates_block(&[update]);
        assert!(block.starts_with("- 14:05 | Ada | task: Login page | hours: 2.0h | "));
        assert!(block.ends_with('…'));
        assert_eq!(updates_block(&[]), "(none)");
    }

    #[test]
    fn test_classify_prompt_fills_placeholders() {
        let prompt = build_classify_prompt("All good", &ProjectMetrics::default(), &[]).unwrap();
        assert!(prompt.contains("All good"));
        assert!(!prompt.contains("{summary}"));
        assert!(!prompt.contains("{metrics_json}"));
        assert!(!prompt.contains("{updates_block}"));
    }
}
