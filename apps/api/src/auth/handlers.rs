use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::accounts::{find_by_email, get_user};
use crate::auth::password::{hash_password_async, verify_password_async};
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::user::{Role, UserView};
use crate::state::AppState;
use crate::validation;

const INVALID_LOGIN: &str = "Invalid email or password";

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub user: UserView,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// POST /api/v1/auth/login
///
/// Unknown e-mail, wrong password and deactivated accounts are indistinguishable.
pub async fn handle_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let unauthorized = || AppError::Unauthorized(INVALID_LOGIN.to_string());

    let user = find_by_email(&state.db, &req.email)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(unauthorized)?;

    if !verify_password_async(req.password, user.password_hash.clone()).await? {
        return Err(unauthorized());
    }

    let role: Role = user
        .role
        .parse()
        .map_err(|e: String| AppError::Internal(anyhow::anyhow!(e)))?;
    let issued = state.tokens.issue(user.id, &user.email, role)?;

    info!("User {} logged in as {}", user.id, role);

    Ok(Json(LoginResponse {
        token: issued.token,
        token_type: "Bearer",
        expires_at: issued.expires_at,
        user: user.into(),
    }))
}

/// GET /api/v1/auth/me
pub async fn handle_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserView>, AppError> {
    let user = get_user(&state.db, auth.id).await?;
    Ok(Json(user.into()))
}

/// POST /api/v1/auth/password
pub async fn handle_change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    validation::password("new_password", &req.new_password)?;

    let user = get_user(&state.db, auth.id).await?;
    if !verify_password_async(req.current_password, user.password_hash).await? {
        return Err(AppError::Validation(
            "current_password is incorrect".to_string(),
        ));
    }

    let new_hash = hash_password_async(req.new_password).await?;
    sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
        .bind(new_hash)
        .bind(auth.id)
        .execute(&state.db)
        .await?;

    info!("User {} changed their password", auth.id);
    Ok(StatusCode::NO_CONTENT)
}
