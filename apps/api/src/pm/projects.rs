use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::auth::accounts::get_user;
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::project::{ProjectRow, ProjectStatus};
use crate::models::user::Role;
use crate::pagination::PageParams;
use crate::validation;

#[derive(Debug, Deserialize)]
pub struct ProjectCreate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: Option<String>,
    pub start_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    /// Admin only; PMs always manage the projects they create.
    pub manager_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub start_date: Option<NaiveDate>,
    /// `null` clears the due date.
    #[serde(default, deserialize_with = "validation::double_option")]
    pub due_date: Option<Option<NaiveDate>>,
    pub manager_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProjectQuery {
    pub status: Option<String>,
}

/// Per-project task rollup for the PM dashboard.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProjectProgress {
    pub id: Uuid,
    pub name: String,
    pub status: String,
    pub due_date: Option<NaiveDate>,
    pub total_tasks: i64,
    pub todo: i64,
    pub in_progress: i64,
    pub blocked: i64,
    pub done: i64,
    pub overdue: i64,
    #[sqlx(skip)]
    pub completion_rate: f64,
}

pub async fn get_project(pool: &PgPool, id: Uuid) -> Result<ProjectRow, AppError> {
    sqlx::query_as::<_, ProjectRow>("SELECT * FROM projects WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Project {id} not found")))
}

/// Loads a project the caller manages. Admin may load any project.
pub async fn load_managed_project(
    pool: &PgPool,
    auth: &AuthUser,
    id: Uuid,
) -> Result<ProjectRow, AppError> {
    let project = get_project(pool, id).await?;
    if !auth.is_admin() && project.manager_id != auth.id {
        return Err(AppError::Forbidden);
    }
    Ok(project)
}

/// `manager` narrows the listing to one manager's projects.
pub async fn list_projects(
    pool: &PgPool,
    manager: Option<Uuid>,
    status: Option<ProjectStatus>,
    page: &PageParams,
) -> Result<(Vec<ProjectRow>, i64), AppError> {
    let status = status.map(|s| s.as_str());

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM projects
        WHERE ($1::uuid IS NULL OR manager_id = $1)
          AND ($2::text IS NULL OR status = $2)
        "#,
    )
    .bind(manager)
    .bind(status)
    .fetch_one(pool)
    .await?;

    let items = sqlx::query_as::<_, ProjectRow>(
        r#"
        SELECT * FROM projects
        WHERE ($1::uuid IS NULL OR manager_id = $1)
          AND ($2::text IS NULL OR status = $2)
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(manager)
    .bind(status)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    Ok((items, total))
}

async fn check_manager(pool: &PgPool, manager_id: Uuid) -> Result<(), AppError> {
    let user = get_user(pool, manager_id).await?;
    let role: Result<Role, _> = user.role.parse();
    match role {
        Ok(Role::Pm) | Ok(Role::Admin) if user.is_active => Ok(()),
        _ => Err(AppError::Validation(
            "manager_id must reference an active PM or admin".to_string(),
        )),
    }
}

pub async fn create_project(
    pool: &PgPool,
    auth: &AuthUser,
    req: ProjectCreate,
) -> Result<ProjectRow, AppError> {
    let name = validation::required("name", &req.name, 200)?;
    validation::max_len("description", &req.description, 5000)?;
    let status = match req.status.as_deref() {
        Some(s) => validation::parse_enum::<ProjectStatus>("status", s)?,
        None => ProjectStatus::Planning,
    };
    validation::date_range(req.start_date, req.due_date)?;

    let manager_id = match req.manager_id {
        Some(id) if auth.is_admin() => id,
        Some(id) if id != auth.id => return Err(AppError::Forbidden),
        _ => auth.id,
    };
    check_manager(pool, manager_id).await?;

    Ok(sqlx::query_as::<_, ProjectRow>(
        r#"
        INSERT INTO projects (id, name, description, status, start_date, due_date, manager_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(req.description.trim())
    .bind(status.as_str())
    .bind(req.start_date)
    .bind(req.due_date)
    .bind(manager_id)
    .fetch_one(pool)
    .await?)
}

pub async fn update_project(
    pool: &PgPool,
    auth: &AuthUser,
    existing: ProjectRow,
    req: ProjectUpdate,
) -> Result<ProjectRow, AppError> {
    let name = match req.name.as_deref() {
        Some(n) => validation::required("name", n, 200)?,
        None => existing.name,
    };
    let description = match req.description {
        Some(d) => {
            validation::max_len("description", &d, 5000)?;
            d.trim().to_string()
        }
        None => existing.description,
    };
    let status = match req.status.as_deref() {
        Some(s) => validation::parse_enum::<ProjectStatus>("status", s)?.as_str().to_string(),
        None => existing.status,
    };
    let start_date = req.start_date.unwrap_or(existing.start_date);
    let due_date = req.due_date.unwrap_or(existing.due_date);
    validation::date_range(start_date, due_date)?;

    let manager_id = match req.manager_id {
        Some(id) if id != existing.manager_id => {
            if !auth.is_admin() {
                return Err(AppError::Forbidden);
            }
            check_manager(pool, id).await?;
            id
        }
        _ => existing.manager_id,
    };

    Ok(sqlx::query_as::<_, ProjectRow>(
        r#"
        UPDATE projects
        SET name = $1, description = $2, status = $3, start_date = $4,
            due_date = $5, manager_id = $6, updated_at = NOW()
        WHERE id = $7
        RETURNING *
        "#,
    )
    .bind(name)
    .bind(description)
    .bind(status)
    .bind(start_date)
    .bind(due_date)
    .bind(manager_id)
    .bind(existing.id)
    .fetch_one(pool)
    .await?)
}

pub async fn delete_project(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    // Tasks, members, updates and reports cascade.
    sqlx::query("DELETE FROM projects WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn project_progress(
    pool: &PgPool,
    manager: Option<Uuid>,
) -> Result<Vec<ProjectProgress>, AppError> {
    let mut rows = sqlx::query_as::<_, ProjectProgress>(
        r#"
        SELECT p.id, p.name, p.status, p.due_date,
               COUNT(t.id) AS total_tasks,
               COUNT(t.id) FILTER (WHERE t.status = 'todo') AS todo,
               COUNT(t.id) FILTER (WHERE t.status = 'in_progress') AS in_progress,
               COUNT(t.id) FILTER (WHERE t.status = 'blocked') AS blocked,
               COUNT(t.id) FILTER (WHERE t.status = 'done') AS done,
               COUNT(t.id) FILTER (
                   WHERE t.status <> 'done' AND t.due_date < CURRENT_DATE
               ) AS overdue
        FROM projects p
        LEFT JOIN tasks t ON t.project_id = p.id
        WHERE ($1::uuid IS NULL OR p.manager_id = $1)
        GROUP BY p.id
        ORDER BY p.name
        "#,
    )
    .bind(manager)
    .fetch_all(pool)
    .await?;

    for row in &mut rows {
        row.completion_rate = completion_rate(row.done, row.total_tasks);
    }
    Ok(rows)
}

pub fn completion_rate(done: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    ((done as f64 / total as f64) * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_rate() {
        assert_eq!(completion_rate(0, 0), 0.0);
        assert_eq!(completion_rate(1, 4), 0.25);
        assert_eq!(completion_rate(2, 3), 0.67);
    }

    #[test]
    fn test_project_create_defaults() {
        let req: ProjectCreate = serde_json::from_value(serde_json::json!({
            "name": "Portal",
            "start_date": "2024-01-01"
        }))
        .unwrap();
        assert_eq!(req.description, "");
        assert!(req.status.is_none());
        assert!(req.manager_id.is_none());
    }
}
