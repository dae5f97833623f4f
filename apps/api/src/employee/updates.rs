use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::project::WorkUpdateRow;
use crate::pagination::PageParams;
use crate::pm::members::is_member;
use crate::pm::tasks::get_task;
use crate::validation;

pub const MAX_HOURS_PER_UPDATE: f64 = 24.0;

#[derive(Debug, Deserialize)]
pub struct WorkUpdateCreate {
    pub project_id: Uuid,
    pub content: String,
    pub hours_spent: Option<f64>,
    pub task_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WorkUpdateQuery {
    pub project_id: Option<Uuid>,
}

/// Hours must fall in (0, 24].
pub fn check_hours(hours: Option<f64>) -> Result<(), AppError> {
    match hours {
        Some(h) if !h.is_finite() || h <= 0.0 || h > MAX_HOURS_PER_UPDATE => Err(
            AppError::Validation(format!(
                "hours_spent must be greater than 0 and at most {MAX_HOURS_PER_UPDATE}"
            )),
        ),
        _ => Ok(()),
    }
}

pub async fn post_update(
    pool: &PgPool,
    user_id: Uuid,
    req: WorkUpdateCreate,
) -> Result<WorkUpdateRow, AppError> {
    let content = validation::required("content", &req.content, 4000)?;
    check_hours(req.hours_spent)?;

    if !is_member(pool, req.project_id, user_id).await? {
        return Err(AppError::Forbidden);
    }
    if let Some(task_id) = req.task_id {
        let task = get_task(pool, task_id).await?;
        if task.project_id != req.project_id {
            return Err(AppError::Validation(format!(
                "Task {task_id} does not belong to project {}",
                req.project_id
            )));
        }
    }

    Ok(sqlx::query_as::<_, WorkUpdateRow>(
        r#"
        INSERT INTO work_updates (id, project_id, user_id, task_id, content, hours_spent)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(req.project_id)
    .bind(user_id)
    .bind(req.task_id)
    .bind(content)
    .bind(req.hours_spent)
    .fetch_one(pool)
    .await?)
}

pub async fn list_my_updates(
    pool: &PgPool,
    user_id: Uuid,
    query: &WorkUpdateQuery,
    page: &PageParams,
) -> Result<(Vec<WorkUpdateRow>, i64), AppError> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM work_updates WHERE user_id = $1 AND ($2::uuid IS NULL OR project_id = $2)",
    )
    .bind(user_id)
    .bind(query.project_id)
    .fetch_one(pool)
    .await?;

    let items = sqlx::query_as::<_, WorkUpdateRow>(
        r#"
        SELECT * FROM work_updates
        WHERE user_id = $1 AND ($2::uuid IS NULL OR project_id = $2)
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(user_id)
    .bind(query.project_id)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    Ok((items, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hours_bounds() {
        assert!(check_hours(None).is_ok());
        assert!(check_hours(Some(0.25)).is_ok());
        assert!(check_hours(Some(24.0)).is_ok());
        assert!(check_hours(Some(0.0)).is_err());
        assert!(check_hours(Some(-1.0)).is_err());
        assert!(check_hours(Some(24.5)).is_err());
        assert!(check_hours(Some(f64::NAN)).is_err());
    }
}
