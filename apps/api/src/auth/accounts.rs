//! Queries over the `users` table shared by auth, admin and HR.

use sqlx::{PgExecutor, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::auth::password::hash_password_async;
use crate::config::BootstrapAdmin;
use crate::errors::AppError;
use crate::models::user::{normalize_email, Role, UserRow};

pub struct NewUser<'a> {
    pub email: &'a str,
    pub full_name: &'a str,
    pub role: Role,
    pub password_hash: &'a str,
}

pub async fn insert_user<'e, E: PgExecutor<'e>>(
    executor: E,
    user: NewUser<'_>,
) -> Result<UserRow, AppError> {
    let row = sqlx::query_as::<_, UserRow>(
        r#"
        INSERT INTO users (id, email, full_name, password_hash, role)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(normalize_email(user.email))
    .bind(user.full_name)
    .bind(user.password_hash)
    .bind(user.role.as_str())
    .fetch_one(executor)
    .await?;
    Ok(row)
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRow>, AppError> {
    Ok(
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = $1")
            .bind(normalize_email(email))
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn get_user<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<UserRow, AppError> {
    sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {id} not found")))
}

/// Creates the first admin when the `users` table is empty.
pub async fn ensure_bootstrap_admin(
    pool: &PgPool,
    admin: Option<&BootstrapAdmin>,
) -> Result<(), AppError> {
    let Some(admin) = admin else {
        return Ok(());
    };

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        return Ok(());
    }

    let password_hash = hash_password_async(admin.password.clone()).await?;
    let user = insert_user(
        pool,
        NewUser {
            email: &admin.email,
            full_name: "Administrator",
            role: Role::Admin,
            password_hash: &password_hash,
        },
    )
    .await?;

    info!("Bootstrap admin account created: {}", user.email);
    Ok(())
}
