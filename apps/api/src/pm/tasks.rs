use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::auth::accounts::get_user;
use crate::errors::AppError;
use crate::mailer::templates;
use crate::models::project::{ProjectRow, TaskPriority, TaskRow, TaskStatus};
use crate::pm::members::is_member;
use crate::queue::{TaskKind, TaskQueue};
use crate::validation;

#[derive(Debug, Default, Deserialize)]
pub struct TaskFilter {
    pub status: Option<String>,
    pub assignee_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct TaskCreate {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub assignee_id: Option<Uuid>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    /// `null` unassigns.
    #[serde(default, deserialize_with = "validation::double_option")]
    pub assignee_id: Option<Option<Uuid>>,
    pub status: Option<String>,
    pub priority: Option<String>,
    /// `null` clears the due date.
    #[serde(default, deserialize_with = "validation::double_option")]
    pub due_date: Option<Option<NaiveDate>>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

pub async fn get_task(pool: &PgPool, id: Uuid) -> Result<TaskRow, AppError> {
    sqlx::query_as::<_, TaskRow>("SELECT * FROM tasks WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Task {id} not found")))
}

pub async fn list_project_tasks(
    pool: &PgPool,
    project_id: Uuid,
    filter: &TaskFilter,
) -> Result<Vec<TaskRow>, AppError> {
    let status = filter
        .status
        .as_deref()
        .map(|s| validation::parse_enum::<TaskStatus>("status", s))
        .transpose()?;

    Ok(sqlx::query_as::<_, TaskRow>(
        r#"
        SELECT * FROM tasks
        WHERE project_id = $1
          AND ($2::text IS NULL OR status = $2)
          AND ($3::uuid IS NULL OR assignee_id = $3)
        ORDER BY
            CASE priority WHEN 'critical' THEN 0 WHEN 'high' THEN 1
                          WHEN 'medium' THEN 2 ELSE 3 END,
            due_date NULLS LAST,
            created_at
        "#,
    )
    .bind(project_id)
    .bind(status.map(|s| s.as_str()))
    .bind(filter.assignee_id)
    .fetch_all(pool)
    .await?)
}

/// `completed_at` after a status change: stamped on entering `done`,
/// kept while staying `done`, cleared on leaving it.
pub fn completed_at_after(
    previous: Option<DateTime<Utc>>,
    new_status: TaskStatus,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match new_status {
        TaskStatus::Done => Some(previous.unwrap_or(now)),
        _ => None,
    }
}

/// The assignee a PATCH must vet for membership. A kept assignee is not
/// re-checked, so done tasks of removed members stay editable.
pub fn assignee_to_check(requested: Option<Option<Uuid>>) -> Option<Uuid> {
    requested.flatten()
}

async fn check_assignee(pool: &PgPool, project_id: Uuid, assignee: Option<Uuid>) -> Result<(), AppError> {
    if let Some(user_id) = assignee {
        if !is_member(pool, project_id, user_id).await? {
            return Err(AppError::Validation(format!(
                "Assignee {user_id} is not a member of this project"
            )));
        }
    }
    Ok(())
}

pub async fn create_task(
    pool: &PgPool,
    queue: &dyn TaskQueue,
    project: &ProjectRow,
    req: TaskCreate,
) -> Result<TaskRow, AppError> {
    let title = validation::required("title", &req.title, 200)?;
    validation::max_len("description", &req.description, 5000)?;
    let status = match req.status.as_deref() {
        Some(s) => validation::parse_enum::<TaskStatus>("status", s)?,
        None => TaskStatus::Todo,
    };
    let priority = match req.priority.as_deref() {
        Some(p) => validation::parse_enum::<TaskPriority>("priority", p)?,
        None => TaskPriority::Medium,
    };
    check_assignee(pool, project.id, req.assignee_id).await?;

    let now = Utc::now();
    let task = sqlx::query_as::<_, TaskRow>(
        r#"
        INSERT INTO tasks
            (id, project_id, title, description, assignee_id, status, priority, due_date, completed_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(project.id)
    .bind(title)
    .bind(req.description.trim())
    .bind(req.assignee_id)
    .bind(status.as_str())
    .bind(priority.as_str())
    .bind(req.due_date)
    .bind(completed_at_after(None, status, now))
    .fetch_one(pool)
    .await?;

    if task.assignee_id.is_some() {
        notify_assignment(pool, queue, &task, project).await;
    }
    Ok(task)
}

pub async fn update_task(
    pool: &PgPool,
    queue: &dyn TaskQueue,
    project: &ProjectRow,
    existing: TaskRow,
    req: TaskUpdate,
) -> Result<TaskRow, AppError> {
    let title = match req.title.as_deref() {
        Some(t) => validation::required("title", t, 200)?,
        None => existing.title.clone(),
    };
    let description = match req.description {
        Some(d) => {
            validation::max_len("description", &d, 5000)?;
            d.trim().to_string()
        }
        None => existing.description.clone(),
    };
    let status = match req.status.as_deref() {
        Some(s) => validation::parse_enum::<TaskStatus>("status", s)?,
        None => validation::parse_enum::<TaskStatus>("status", &existing.status)?,
    };
    let priority = match req.priority.as_deref() {
        Some(p) => validation::parse_enum::<TaskPriority>("priority", p)?.as_str().to_string(),
        None => existing.priority.clone(),
    };
    check_assignee(pool, project.id, assignee_to_check(req.assignee_id)).await?;
    let assignee_id = req.assignee_id.unwrap_or(existing.assignee_id);
    let due_date = req.due_date.unwrap_or(existing.due_date);
    let completed_at = completed_at_after(existing.completed_at, status, Utc::now());

    let task = sqlx::query_as::<_, TaskRow>(
        r#"
        UPDATE tasks
        SET title = $1, description = $2, assignee_id = $3, status = $4, priority = $5,
            due_date = $6, completed_at = $7, updated_at = NOW()
        WHERE id = $8
        RETURNING *
        "#,
    )
    .bind(title)
    .bind(description)
    .bind(assignee_id)
    .bind(status.as_str())
    .bind(priority)
    .bind(due_date)
    .bind(completed_at)
    .bind(existing.id)
    .fetch_one(pool)
    .await?;

    if task.assignee_id.is_some() && task.assignee_id != existing.assignee_id {
        notify_assignment(pool, queue, &task, project).await;
    }
    Ok(task)
}

/// Status-only change, used from the employee surface.
pub async fn set_task_status(
    pool: &PgPool,
    existing: &TaskRow,
    status: TaskStatus,
) -> Result<TaskRow, AppError> {
    let completed_at = completed_at_after(existing.completed_at, status, Utc::now());
    Ok(sqlx::query_as::<_, TaskRow>(
        r#"
        UPDATE tasks SET status = $1, completed_at = $2, updated_at = NOW()
        WHERE id = $3
        RETURNING *
        "#,
    )
    .bind(status.as_str())
    .bind(completed_at)
    .bind(existing.id)
    .fetch_one(pool)
    .await?)
}

pub async fn delete_task(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    sqlx::query("DELETE FROM tasks WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Queues the assignment e-mail. The task is already saved, so failures are only logged.
async fn notify_assignment(pool: &PgPool, queue: &dyn TaskQueue, task: &TaskRow, project: &ProjectRow) {
    let Some(assignee_id) = task.assignee_id else {
        return;
    };
    let assignee = match get_user(pool, assignee_id).await {
        Ok(user) => user,
        Err(e) => {
            warn!("Cannot notify assignee {assignee_id} of task {}: {e}", task.id);
            return;
        }
    };

    let email = templates::task_assigned(
        &assignee.email,
        &assignee.full_name,
        &task.title,
        &project.name,
        &task.priority,
        task.due_date,
    );
    if let Err(e) = queue.enqueue(TaskKind::SendEmail { email }).await {
        warn!("Failed to queue assignment e-mail for task {}: {e}", task.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_entering_done_stamps_now() {
        let now = Utc::now();
        assert_eq!(completed_at_after(None, TaskStatus::Done, now), Some(now));
    }

    #[test]
    fn test_staying_done_keeps_original_stamp() {
        let earlier = Utc::now() - Duration::days(1);
        assert_eq!(
            completed_at_after(Some(earlier), TaskStatus::Done, Utc::now()),
            Some(earlier)
        );
    }

    #[test]
    fn test_leaving_done_clears_stamp() {
        let earlier = Utc::now() - Duration::days(1);
        assert_eq!(
            completed_at_after(Some(earlier), TaskStatus::InProgress, Utc::now()),
            None
        );
    }

    #[test]
    fn test_task_update_null_unassigns() {
        let update: TaskUpdate = serde_json::from_str(r#"{"assignee_id": null}"#).unwrap();
        assert_eq!(update.assignee_id, Some(None));
        let update: TaskUpdate = serde_json::from_str(r#"{"title": "x"}"#).unwrap();
        assert_eq!(update.assignee_id, None);
    }

    #[test]
    fn test_untouched_assignee_is_not_rechecked() {
        let untouched: TaskUpdate = serde_json::from_str(r#"{"title": "x", "status": "todo"}"#).unwrap();
        assert_eq!(assignee_to_check(untouched.assignee_id), None);

        let cleared: TaskUpdate = serde_json::from_str(r#"{"assignee_id": null}"#).unwrap();
        assert_eq!(assignee_to_check(cleared.assignee_id), None);

        let someone = Uuid::new_v4();
        let reassigned: TaskUpdate =
            serde_json::from_str(&format!(r#"{{"assignee_id": "{someone}"}}"#)).unwrap();
        assert_eq!(assignee_to_check(reassigned.assignee_id), Some(someone));
    }
}
