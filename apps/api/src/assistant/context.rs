//! Workspace data blocks handed to the assistant alongside the conversation.
//!
//! Each persona sees only what its role may see. Blocks are plain text and
//! bounded so a large workspace cannot blow up the prompt.

use sqlx::PgPool;
use uuid::Uuid;

use super::Persona;
use crate::errors::AppError;
use crate::hr::policies::current_policies;
use crate::llm_client::prompts::truncate_chars;
use crate::models::policy::PolicyRow;
use crate::models::project::TaskRow;
use crate::pm::projects::{project_progress, ProjectProgress};

const MAX_POLICIES: i64 = 15;
const POLICY_EXCERPT_CHARS: usize = 600;
const MAX_OPEN_TASKS: i64 = 25;

pub async fn build_context(pool: &PgPool, persona: Persona, user_id: Uuid) -> Result<String, AppError> {
    let sections = match persona {
        Persona::Operations => vec![operations_block(pool).await?],
        Persona::Hr => vec![policies_block(&current_policies(pool, MAX_POLICIES).await?)],
        Persona::Project => vec![projects_block(&project_progress(pool, Some(user_id)).await?)],
        Persona::Workplace => vec![
            policies_block(&current_policies(pool, MAX_POLICIES).await?),
            open_tasks_block(&my_open_tasks(pool, user_id).await?),
        ],
    };
    Ok(sections.join("\n\n"))
}

pub fn policies_block(policies: &[PolicyRow]) -> String {
    if policies.is_empty() {
        return "POLICIES: none published.".to_string();
    }
    let mut out = String::from("POLICIES:");
    for p in policies {
        out.push_str(&format!(
            "\n- {} [{}; v{}; effective {}]\n  {}",
            p.title,
            p.category,
            p.version,
            p.effective_date,
            truncate_chars(&p.content.replace('\n', " "), POLICY_EXCERPT_CHARS)
        ));
    }
    out
}

pub fn projects_block(projects: &[ProjectProgress]) -> String {
    if projects.is_empty() {
        return "PROJECTS YOU MANAGE: none.".to_string();
    }
    let mut out = String::from("PROJECTS YOU MANAGE:");
    for p in projects {
        let due = p
            .due_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "no due date".to_string());
        out.push_str(&format!(
            "\n- {} ({}, due {}): {} tasks, {} todo, {} in progress, {} blocked, {} done, {} overdue",
            p.name, p.status, due, p.total_tasks, p.todo, p.in_progress, p.blocked, p.done, p.overdue
        ));
    }
    out
}

pub fn open_tasks_block(tasks: &[TaskRow]) -> String {
    if tasks.is_empty() {
        return "YOUR OPEN TASKS: none.".to_string();
    }
    let mut out = String::from("YOUR OPEN TASKS:");
    for t in tasks {
        let due = t
            .due_date
            .map(|d| format!(", due {d}"))
            .unwrap_or_default();
        out.push_str(&format!("\n- {} [{}, {} priority{}]", t.title, t.status, t.priority, due));
    }
    out
}

async fn my_open_tasks(pool: &PgPool, user_id: Uuid) -> Result<Vec<TaskRow>, AppError> {
    Ok(sqlx::query_as::<_, TaskRow>(
        r#"
        SELECT * FROM tasks
        WHERE assignee_id = $1 AND status <> 'done'
        ORDER BY due_date NULLS LAST, created_at
        LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(MAX_OPEN_TASKS)
    .fetch_all(pool)
    .await?)
}

async fn operations_block(pool: &PgPool) -> Result<String, AppError> {
    let (active_users, inactive_users, projects, open_tasks, backups): (i64, i64, i64, i64, i64) =
        sqlx::query_as(
            r#"
            SELECT (SELECT COUNT(*) FROM users WHERE is_active),
                   (SELECT COUNT(*) FROM users WHERE NOT is_active),
                   (SELECT COUNT(*) FROM projects),
                   (SELECT COUNT(*) FROM tasks WHERE status <> 'done'),
                   (SELECT COUNT(*) FROM backups)
            "#,
        )
        .fetch_one(pool)
        .await?;

    Ok(format!(
        "WORKSPACE TOTALS:\n- active users: {active_users}\n- deactivated users: {inactive_users}\n\
         - projects: {projects}\n- open tasks: {open_tasks}\n- stored backups: {backups}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn policy(title: &str, content: &str) -> PolicyRow {
        PolicyRow {
            id: Uuid::new_v4(),
            title: title.into(),
            category: "leave".into(),
            content: content.into(),
            effective_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            version: 2,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_policies_block_truncates_content() {
        let long = "x".repeat(POLICY_EXCERPT_CHARS + 50);
        let block = policies_block(&[policy("Annual leave", &long)]);
        assert!(block.contains("Annual leave [leave; v2; effective 2024-01-01]"));
        assert!(block.ends_with('…'));
    }

    #[test]
    fn test_empty_blocks_say_so() {
        assert_eq!(policies_block(&[]), "POLICIES: none published.");
        assert_eq!(projects_block(&[]), "PROJECTS YOU MANAGE: none.");
        assert_eq!(open_tasks_block(&[]), "YOUR OPEN TASKS: none.");
    }

    #[test]
    fn test_projects_block_lists_counts() {
        let block = projects_block(&[ProjectProgress {
            id: Uuid::new_v4(),
            name: "Portal".into(),
            status: "active".into(),
            due_date: None,
            total_tasks: 5,
            todo: 1,
            in_progress: 2,
            blocked: 1,
            done: 1,
            overdue: 0,
            completion_rate: 0.2,
        }]);
        assert!(block.contains(
            "Portal (active, due no due date): 5 tasks, 1 todo, 2 in progress, 1 blocked, 1 done, 0 overdue"
        ));
    }
}
