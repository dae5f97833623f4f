use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::hr::prompts::{DRAFT_POLICY_PROMPT_TEMPLATE, DRAFT_POLICY_SYSTEM};
use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::LlmClient;
use crate::models::policy::PolicyRow;
use crate::pagination::PageParams;
use crate::validation;

const MAX_CONTENT_CHARS: usize = 50_000;
const MAX_KEY_POINTS: usize = 20;

#[derive(Debug, Deserialize)]
pub struct PolicyCreate {
    pub title: String,
    pub category: String,
    pub content: String,
    /// Defaults to today.
    pub effective_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PolicyUpdate {
    pub title: Option<String>,
    pub category: Option<String>,
    pub content: Option<String>,
    pub effective_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PolicyQuery {
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PolicyDraftRequest {
    pub topic: String,
    #[serde(default)]
    pub key_points: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyDraft {
    pub title: String,
    pub content: String,
}

/// Categories are free text but compared in lowercase.
fn normalize_category(category: &str) -> Result<String, AppError> {
    Ok(validation::required("category", category, 60)?.to_lowercase())
}

pub async fn get_policy(pool: &PgPool, id: Uuid) -> Result<PolicyRow, AppError> {
    sqlx::query_as::<_, PolicyRow>("SELECT * FROM policies WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Policy {id} not found")))
}

pub async fn list_policies(
    pool: &PgPool,
    query: &PolicyQuery,
    page: &PageParams,
) -> Result<(Vec<PolicyRow>, i64), AppError> {
    let category = query
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_lowercase);

    let total: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM policies WHERE ($1::text IS NULL OR category = $1)")
            .bind(category.as_deref())
            .fetch_one(pool)
            .await?;

    let items = sqlx::query_as::<_, PolicyRow>(
        r#"
        SELECT * FROM policies
        WHERE ($1::text IS NULL OR category = $1)
        ORDER BY category, title
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(category.as_deref())
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    Ok((items, total))
}

/// Policies in force on `today`, newest first. Feeds the assistants' context.
pub async fn current_policies(pool: &PgPool, limit: i64) -> Result<Vec<PolicyRow>, AppError> {
    Ok(sqlx::query_as::<_, PolicyRow>(
        r#"
        SELECT * FROM policies
        WHERE effective_date <= CURRENT_DATE
        ORDER BY effective_date DESC, updated_at DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?)
}

pub async fn create_policy(
    pool: &PgPool,
    created_by: Uuid,
    req: PolicyCreate,
) -> Result<PolicyRow, AppError> {
    let title = validation::required("title", &req.title, 200)?;
    let category = normalize_category(&req.category)?;
    let content = validation::required("content", &req.content, MAX_CONTENT_CHARS)?;
    let effective_date = req.effective_date.unwrap_or_else(|| Utc::now().date_naive());

    Ok(sqlx::query_as::<_, PolicyRow>(
        r#"
        INSERT INTO policies (id, title, category, content, effective_date, version, created_by)
        VALUES ($1, $2, $3, $4, $5, 1, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(title)
    .bind(category)
    .bind(content)
    .bind(effective_date)
    .bind(created_by)
    .fetch_one(pool)
    .await?)
}

/// Every successful update bumps `version`.
pub async fn update_policy(
    pool: &PgPool,
    existing: PolicyRow,
    req: PolicyUpdate,
) -> Result<PolicyRow, AppError> {
    let title = match req.title.as_deref() {
        Some(t) => validation::required("title", t, 200)?,
        None => existing.title,
    };
    let category = match req.category.as_deref() {
        Some(c) => normalize_category(c)?,
        None => existing.category,
    };
    let content = match req.content.as_deref() {
        Some(c) => validation::required("content", c, MAX_CONTENT_CHARS)?,
        None => existing.content,
    };
    let effective_date = req.effective_date.unwrap_or(existing.effective_date);

    Ok(sqlx::query_as::<_, PolicyRow>(
        r#"
        UPDATE policies
        SET title = $1, category = $2, content = $3, effective_date = $4,
            version = version + 1, updated_at = NOW()
        WHERE id = $5
        RETURNING *
        "#,
    )
    .bind(title)
    .bind(category)
    .bind(content)
    .bind(effective_date)
    .bind(existing.id)
    .fetch_one(pool)
    .await?)
}

pub async fn delete_policy(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    let deleted = sqlx::query("DELETE FROM policies WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(AppError::NotFound(format!("Policy {id} not found")));
    }
    Ok(())
}

pub fn build_draft_prompt(topic: &str, key_points: &[String]) -> String {
    let points = if key_points.is_empty() {
        "(none given, use common practice for this topic)".to_string()
    } else {
        key_points
            .iter()
            .map(|p| format!("- {}", p.trim()))
            .collect::<Vec<_>>()
            .join("\n")
    };
    DRAFT_POLICY_PROMPT_TEMPLATE
        .replace("{topic}", topic)
        .replace("{key_points}", &points)
}

/// Asks the LLM for a policy draft. Nothing is saved.
pub async fn draft_policy(llm: &LlmClient, req: PolicyDraftRequest) -> Result<PolicyDraft, AppError> {
    let topic = validation::required("topic", &req.topic, 200)?;
    if req.key_points.len() > MAX_KEY_POINTS {
        return Err(AppError::Validation(format!(
            "key_points may contain at most {MAX_KEY_POINTS} items"
        )));
    }
    for point in &req.key_points {
        validation::max_len("key_points", point, 500)?;
    }

    let prompt = build_draft_prompt(&topic, &req.key_points);
    let system = format!("{DRAFT_POLICY_SYSTEM}\n\n{JSON_ONLY_SYSTEM}");
    let draft: PolicyDraft = llm.call_json(&prompt, &system).await?;

    if draft.title.trim().is_empty() || draft.content.trim().is_empty() {
        return Err(AppError::Llm("Policy draft came back empty".to_string()));
    }
    Ok(PolicyDraft {
        title: draft.title.trim().to_string(),
        content: draft.content.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_is_lowercased() {
        assert_eq!(normalize_category("  Leave ").unwrap(), "leave");
        assert!(normalize_category(" ").is_err());
    }

    #[test]
    fn test_draft_prompt_lists_key_points() {
        let prompt = build_draft_prompt(
            "Remote work",
            &["Two office days".to_string(), " Core hours 10-4 ".to_string()],
        );
        assert!(prompt.contains("Remote work"));
        assert!(prompt.contains("- Two office days\n- Core hours 10-4"));
        assert!(!prompt.contains("{key_points}"));
    }

    #[test]
    fn test_draft_prompt_without_key_points() {
        let prompt = build_draft_prompt("Expenses", &[]);
        assert!(prompt.contains("common practice"));
    }

    #[test]
    fn test_draft_request_key_points_default() {
        let req: PolicyDraftRequest = serde_json::from_str(r#"{"topic": "Leave"}"#).unwrap();
        assert!(req.key_points.is_empty());
    }
}
