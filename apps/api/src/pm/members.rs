use serde::Deserialize;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::auth::accounts::get_user;
use crate::errors::AppError;
use crate::models::project::ProjectMember;

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
}

pub async fn list_members(pool: &PgPool, project_id: Uuid) -> Result<Vec<ProjectMember>, AppError> {
    Ok(sqlx::query_as::<_, ProjectMember>(
        r#"
        SELECT u.id AS user_id, u.email, u.full_name, u.role, m.added_at
        FROM project_members m
        JOIN users u ON u.id = m.user_id
        WHERE m.project_id = $1
        ORDER BY u.full_name
        "#,
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?)
}

pub async fn is_member<'e, E: PgExecutor<'e>>(
    executor: E,
    project_id: Uuid,
    user_id: Uuid,
) -> Result<bool, AppError> {
    Ok(sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM project_members WHERE project_id = $1 AND user_id = $2)",
    )
    .bind(project_id)
    .bind(user_id)
    .fetch_one(executor)
    .await?)
}

/// Adds an active user to the project. Adding an existing member is a no-op.
pub async fn add_member(
    pool: &PgPool,
    project_id: Uuid,
    user_id: Uuid,
) -> Result<Vec<ProjectMember>, AppError> {
    let user = get_user(pool, user_id).await?;
    if !user.is_active {
        return Err(AppError::Validation(format!(
            "User {user_id} is deactivated and cannot join projects"
        )));
    }

    sqlx::query(
        "INSERT INTO project_members (project_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(project_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    list_members(pool, project_id).await
}

/// Removes a member and unassigns their open tasks in the project.
pub async fn remove_member(pool: &PgPool, project_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    let removed = sqlx::query("DELETE FROM project_members WHERE project_id = $1 AND user_id = $2")
        .bind(project_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    if removed == 0 {
        return Err(AppError::NotFound(format!(
            "User {user_id} is not a member of project {project_id}"
        )));
    }

    sqlx::query(
        r#"
        UPDATE tasks SET assignee_id = NULL, updated_at = NOW()
        WHERE project_id = $1 AND assignee_id = $2 AND status <> 'done'
        "#,
    )
    .bind(project_id)
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
