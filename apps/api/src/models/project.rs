use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

text_enum!(
    ProjectStatus {
        Planning => "planning",
        Active => "active",
        OnHold => "on_hold",
        Completed => "completed",
    }
);

text_enum!(
    TaskStatus {
        Todo => "todo",
        InProgress => "in_progress",
        Blocked => "blocked",
        Done => "done",
    }
);

text_enum!(
    TaskPriority {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
);

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProjectRow {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub status: String,
    pub start_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub manager_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProjectMember {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaskRow {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub description: String,
    pub assignee_id: Option<Uuid>,
    pub status: String,
    pub priority: String,
    pub due_date: Option<NaiveDate>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRow {
    pub fn is_done(&self) -> bool {
        self.status == TaskStatus::Done.as_str()
    }

    /// Overdue means past its due date on `today` and not yet done.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.is_done() && self.due_date.is_some_and(|due| due < today)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkUpdateRow {
    pub id: Uuid,
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub task_id: Option<Uuid>,
    pub content: String,
    pub hours_spent: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Work update joined with its author and task, as fed to the report pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkUpdateDetail {
    pub id: Uuid,
    pub user_id: Uuid,
    pub author_name: String,
    pub task_id: Option<Uuid>,
    pub task_title: Option<String>,
    pub content: String,
    pub hours_spent: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(status: TaskStatus, due: Option<NaiveDate>) -> TaskRow {
        TaskRow {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            title: "t".into(),
            description: String::new(),
            assignee_id: None,
            status: status.as_str().into(),
            priority: TaskPriority::Medium.as_str().into(),
            due_date: due,
            completed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_overdue_requires_past_due_date() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let yesterday = NaiveDate::from_ymd_opt(2024, 5, 9);
        assert!(task(TaskStatus::Todo, yesterday).is_overdue(today));
        assert!(!task(TaskStatus::Todo, Some(today)).is_overdue(today));
        assert!(!task(TaskStatus::Todo, None).is_overdue(today));
    }

    #[test]
    fn test_done_task_is_never_overdue() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let long_ago = NaiveDate::from_ymd_opt(2020, 1, 1);
        assert!(!task(TaskStatus::Done, long_ago).is_overdue(today));
    }

    #[test]
    fn test_status_serde_matches_column_text() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        assert_eq!(ProjectStatus::OnHold.as_str(), "on_hold");
    }
}
