use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::auth::accounts::{get_user, insert_user, NewUser};
use crate::auth::password::hash_password_async;
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::user::{Role, UserRow};
use crate::pagination::PageParams;
use crate::validation;

#[derive(Debug, Deserialize)]
pub struct UserCreate {
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserUpdate {
    pub full_name: Option<String>,
    pub role: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub role: Option<String>,
}

pub async fn list_users(
    pool: &PgPool,
    query: &UserQuery,
    page: &PageParams,
) -> Result<(Vec<UserRow>, i64), AppError> {
    let role = query
        .role
        .as_deref()
        .map(|r| validation::parse_enum::<Role>("role", r))
        .transpose()?;
    let role = role.map(|r| r.as_str());

    let total: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE ($1::text IS NULL OR role = $1)")
            .bind(role)
            .fetch_one(pool)
            .await?;

    let items = sqlx::query_as::<_, UserRow>(
        r#"
        SELECT * FROM users
        WHERE ($1::text IS NULL OR role = $1)
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(role)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    Ok((items, total))
}

pub async fn create_user(pool: &PgPool, req: UserCreate) -> Result<UserRow, AppError> {
    let email = validation::email("email", &req.email)?;
    let full_name = validation::required("full_name", &req.full_name, 120)?;
    let role = validation::parse_enum::<Role>("role", &req.role)?;
    validation::password("password", &req.password)?;

    let password_hash = hash_password_async(req.password).await?;
    let user = insert_user(
        pool,
        NewUser {
            email: &email,
            full_name: &full_name,
            role,
            password_hash: &password_hash,
        },
    )
    .await?;

    info!("User {} created with role {}", user.id, role);
    Ok(user)
}

/// Admins may not lock themselves out, either by deactivation or demotion.
fn check_self_change(auth: &AuthUser, target: Uuid, role: Option<Role>, is_active: Option<bool>) -> Result<(), AppError> {
    if auth.id != target {
        return Ok(());
    }
    if is_active == Some(false) {
        return Err(AppError::Validation(
            "You cannot deactivate your own account".to_string(),
        ));
    }
    if role.is_some_and(|r| r != Role::Admin) {
        return Err(AppError::Validation(
            "You cannot remove your own admin role".to_string(),
        ));
    }
    Ok(())
}

pub async fn update_user(
    pool: &PgPool,
    auth: &AuthUser,
    id: Uuid,
    req: UserUpdate,
) -> Result<UserRow, AppError> {
    let existing = get_user(pool, id).await?;
    let role = req
        .role
        .as_deref()
        .map(|r| validation::parse_enum::<Role>("role", r))
        .transpose()?;
    check_self_change(auth, id, role, req.is_active)?;

    let full_name = match req.full_name.as_deref() {
        Some(n) => validation::required("full_name", n, 120)?,
        None => existing.full_name,
    };
    let role = role.map(|r| r.as_str().to_string()).unwrap_or(existing.role);
    let is_active = req.is_active.unwrap_or(existing.is_active);

    Ok(sqlx::query_as::<_, UserRow>(
        r#"
        UPDATE users SET full_name = $1, role = $2, is_active = $3, updated_at = NOW()
        WHERE id = $4
        RETURNING *
        "#,
    )
    .bind(full_name)
    .bind(role)
    .bind(is_active)
    .bind(id)
    .fetch_one(pool)
    .await?)
}

/// Soft delete. Rows stay so history keeps its authors.
pub async fn deactivate_user(pool: &PgPool, auth: &AuthUser, id: Uuid) -> Result<(), AppError> {
    check_self_change(auth, id, None, Some(false))?;
    let updated = sqlx::query("UPDATE users SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();
    if updated == 0 {
        return Err(AppError::NotFound(format!("User {id} not found")));
    }
    info!("User {id} deactivated by {}", auth.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            role: Role::Admin,
        }
    }

    #[test]
    fn test_admin_cannot_deactivate_self() {
        let auth = admin();
        assert!(matches!(
            check_self_change(&auth, auth.id, None, Some(false)),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_admin_cannot_demote_self() {
        let auth = admin();
        assert!(check_self_change(&auth, auth.id, Some(Role::Hr), None).is_err());
        assert!(check_self_change(&auth, auth.id, Some(Role::Admin), Some(true)).is_ok());
    }

    #[test]
    fn test_changes_to_others_allowed() {
        let auth = admin();
        assert!(check_self_change(&auth, Uuid::new_v4(), Some(Role::Employee), Some(false)).is_ok());
    }
}
