use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::sessions::{
    create_session, delete_session, get_own_session, list_messages, list_sessions, send_message,
};
use super::Persona;
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::chat::{ChatMessageRow, ChatSessionRow};
use crate::state::AppState;
use crate::validation::OptionalJson;

#[derive(Debug, Default, Deserialize)]
pub struct SessionCreate {
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessageCreate {
    pub content: String,
}

/// POST /api/v1/assistant/sessions
pub async fn handle_create_session(
    State(state): State<AppState>,
    auth: AuthUser,
    body: OptionalJson<SessionCreate>,
) -> Result<(StatusCode, Json<ChatSessionRow>), AppError> {
    let req = body.or_default();
    let persona = Persona::for_role(auth.role);
    let session = create_session(&state.db, auth.id, persona, req.title.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /api/v1/assistant/sessions
pub async fn handle_list_sessions(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<ChatSessionRow>>, AppError> {
    Ok(Json(list_sessions(&state.db, auth.id).await?))
}

/// GET /api/v1/assistant/sessions/:id/messages
pub async fn handle_list_messages(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ChatMessageRow>>, AppError> {
    let session = get_own_session(&state.db, auth.id, id).await?;
    Ok(Json(list_messages(&state.db, session.id).await?))
}

/// POST /api/v1/assistant/sessions/:id/messages
///
/// Returns the assistant's reply.
pub async fn handle_send_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<MessageCreate>,
) -> Result<Json<ChatMessageRow>, AppError> {
    let session = get_own_session(&state.db, auth.id, id).await?;
    let reply = send_message(&state.db, &state.llm, &session, &req.content).await?;
    Ok(Json(reply))
}

/// DELETE /api/v1/assistant/sessions/:id
pub async fn handle_delete_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let session = get_own_session(&state.db, auth.id, id).await?;
    delete_session(&state.db, &session).await?;
    Ok(StatusCode::NO_CONTENT)
}
