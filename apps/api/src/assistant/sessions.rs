use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::context::build_context;
use super::prompts::ASSISTANT_SYSTEM_TEMPLATE;
use super::Persona;
use crate::errors::AppError;
use crate::llm_client::prompts::{truncate_chars, GROUNDING_INSTRUCTION};
use crate::llm_client::{ChatTurn, LlmClient, TurnRole};
use crate::models::chat::{ChatMessageRow, ChatSessionRow};
use crate::validation;

pub const DEFAULT_TITLE: &str = "New conversation";
pub const MAX_MESSAGE_CHARS: usize = 4000;
/// Messages sent to the model per reply, newest last.
pub const HISTORY_LIMIT: i64 = 20;
const TITLE_FROM_MESSAGE_CHARS: usize = 60;

pub async fn create_session(
    pool: &PgPool,
    user_id: Uuid,
    persona: Persona,
    title: Option<&str>,
) -> Result<ChatSessionRow, AppError> {
    let title = validation::optional("title", title, 200)?.unwrap_or_else(|| DEFAULT_TITLE.to_string());
    Ok(sqlx::query_as::<_, ChatSessionRow>(
        r#"
        INSERT INTO chat_sessions (id, user_id, persona, title)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(persona.as_str())
    .bind(title)
    .fetch_one(pool)
    .await?)
}

/// Loads a session owned by `user_id`. Other users' sessions look missing.
pub async fn get_own_session(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<ChatSessionRow, AppError> {
    sqlx::query_as::<_, ChatSessionRow>("SELECT * FROM chat_sessions WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Chat session {id} not found")))
}

pub async fn list_sessions(pool: &PgPool, user_id: Uuid) -> Result<Vec<ChatSessionRow>, AppError> {
    Ok(sqlx::query_as::<_, ChatSessionRow>(
        "SELECT * FROM chat_sessions WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

pub async fn delete_session(pool: &PgPool, session: &ChatSessionRow) -> Result<(), AppError> {
    sqlx::query("DELETE FROM chat_sessions WHERE id = $1")
        .bind(session.id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn list_messages(pool: &PgPool, session_id: Uuid) -> Result<Vec<ChatMessageRow>, AppError> {
    Ok(sqlx::query_as::<_, ChatMessageRow>(
        "SELECT * FROM chat_messages WHERE session_id = $1 ORDER BY created_at, id",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?)
}

async fn insert_message(
    pool: &PgPool,
    session_id: Uuid,
    role: TurnRole,
    content: &str,
) -> Result<ChatMessageRow, AppError> {
    let role = match role {
        TurnRole::User => "user",
        TurnRole::Assistant => "assistant",
    };
    Ok(sqlx::query_as::<_, ChatMessageRow>(
        r#"
        INSERT INTO chat_messages (id, session_id, role, content)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(session_id)
    .bind(role)
    .bind(content)
    .fetch_one(pool)
    .await?)
}

async fn recent_messages(pool: &PgPool, session_id: Uuid) -> Result<Vec<ChatMessageRow>, AppError> {
    let mut rows = sqlx::query_as::<_, ChatMessageRow>(
        r#"
        SELECT * FROM chat_messages
        WHERE session_id = $1
        ORDER BY created_at DESC, id DESC
        LIMIT $2
        "#,
    )
    .bind(session_id)
    .bind(HISTORY_LIMIT)
    .fetch_all(pool)
    .await?;
    rows.reverse();
    Ok(rows)
}

/// Turns stored messages into a conversation the Messages API accepts: it must
/// open with a user turn and alternate, so leading assistant turns are dropped
/// and consecutive same-role turns are merged.
pub fn build_turns(messages: &[ChatMessageRow]) -> Vec<ChatTurn> {
    let mut turns: Vec<ChatTurn> = Vec::with_capacity(messages.len());
    for message in messages {
        let role = if message.role == "assistant" {
            TurnRole::Assistant
        } else {
            TurnRole::User
        };
        if turns.is_empty() && role == TurnRole::Assistant {
            continue;
        }
        match turns.last_mut() {
            Some(last) if last.role == role => {
                last.content.push_str("\n\n");
                last.content.push_str(&message.content);
            }
            _ => turns.push(ChatTurn {
                role,
                content: message.content.clone(),
            }),
        }
    }
    turns
}

pub fn build_system_prompt(persona: Persona, context_block: &str) -> String {
    ASSISTANT_SYSTEM_TEMPLATE
        .replace("{persona_system}", persona.system_prompt())
        .replace("{grounding_instruction}", GROUNDING_INSTRUCTION)
        .replace("{context_block}", context_block)
}

/// Stores the user's message, asks the model and stores its reply.
pub async fn send_message(
    pool: &PgPool,
    llm: &LlmClient,
    session: &ChatSessionRow,
    content: &str,
) -> Result<ChatMessageRow, AppError> {
    // Step 1: Validate and store the user turn
    let content = validation::required("content", content, MAX_MESSAGE_CHARS)?;
    let persona = validation::parse_enum::<Persona>("persona", &session.persona)?;
    insert_message(pool, session.id, TurnRole::User, &content).await?;

    if session.title == DEFAULT_TITLE {
        sqlx::query("UPDATE chat_sessions SET title = $1 WHERE id = $2")
            .bind(truncate_chars(&content, TITLE_FROM_MESSAGE_CHARS))
            .bind(session.id)
            .execute(pool)
            .await?;
    }

    // Step 2: Context and history
    let context_block = build_context(pool, persona, session.user_id).await?;
    let system = build_system_prompt(persona, &context_block);
    let turns = build_turns(&recent_messages(pool, session.id).await?);

    // Step 3: Reply
    let reply = llm.chat(&system, &turns).await?;
    let stored = insert_message(pool, session.id, TurnRole::Assistant, &reply).await?;

    info!(
        "Assistant replied in session {} ({} turns of history)",
        session.id,
        turns.len()
    );
    Ok(stored)
}
