//! Generic background task queue over a Redis list.
//!
//! Producers `LPUSH` JSON-encoded tasks onto `syncem:tasks`; workers `BRPOP`
//! from the other end, so tasks run in FIFO order. Failures land on
//! `syncem:tasks:failed` and are not retried.

pub mod scheduler;
pub mod worker;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use redis::aio::MultiplexedConnection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::errors::AppError;
use crate::mailer::Email;

pub const TASKS_KEY: &str = "syncem:tasks";
pub const FAILED_KEY: &str = "syncem:tasks:failed";

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Task encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl From<QueueError> for AppError {
    fn from(e: QueueError) -> Self {
        AppError::Queue(e.to_string())
    }
}

/// Work the background runner knows how to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskKind {
    SendEmail {
        email: Email,
    },
    GenerateDailyReport {
        project_id: Uuid,
        report_date: NaiveDate,
        requested_by: Option<Uuid>,
        send_email: bool,
    },
}

impl TaskKind {
    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::SendEmail { .. } => "send_email",
            TaskKind::GenerateDailyReport { .. } => "generate_daily_report",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub kind: TaskKind,
    pub enqueued_at: DateTime<Utc>,
    pub attempts: u32,
}

impl Task {
    pub fn new(kind: TaskKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            enqueued_at: Utc::now(),
            attempts: 0,
        }
    }
}

/// Producer side of the queue, carried in `AppState` as `Arc<dyn TaskQueue>`.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Pushes a task and returns its id.
    async fn enqueue(&self, kind: TaskKind) -> Result<Uuid, QueueError>;

    /// Number of tasks waiting to run.
    async fn depth(&self) -> Result<i64, QueueError>;

    /// Claims `key` for `ttl_secs`. Returns false when someone else holds it.
    async fn try_claim(&self, key: &str, ttl_secs: u64) -> Result<bool, QueueError>;

    /// Drops a claim taken with `try_claim`.
    async fn release(&self, key: &str) -> Result<(), QueueError>;
}

#[derive(Clone)]
pub struct RedisTaskQueue {
    conn: MultiplexedConnection,
}

impl RedisTaskQueue {
    pub async fn connect(client: &redis::Client) -> Result<Self, QueueError> {
        Ok(Self {
            conn: client.get_multiplexed_async_connection().await?,
        })
    }
}

#[async_trait]
impl TaskQueue for RedisTaskQueue {
    async fn enqueue(&self, kind: TaskKind) -> Result<Uuid, QueueError> {
        let task = Task::new(kind);
        let payload = serde_json::to_string(&task)?;
        let mut conn = self.conn.clone();
        redis::cmd("LPUSH")
            .arg(TASKS_KEY)
            .arg(payload)
            .query_async::<_, i64>(&mut conn)
            .await?;
        tracing::debug!("Enqueued task {} ({})", task.id, task.kind.name());
        Ok(task.id)
    }

    async fn depth(&self) -> Result<i64, QueueError> {
        let mut conn = self.conn.clone();
        Ok(redis::cmd("LLEN")
            .arg(TASKS_KEY)
            .query_async::<_, i64>(&mut conn)
            .await?)
    }

    async fn try_claim(&self, key: &str, ttl_secs: u64) -> Result<bool, QueueError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(Utc::now().to_rfc3339())
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn release(&self, key: &str) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(key)
            .query_async::<_, i64>(&mut conn)
            .await?;
        Ok(())
    }
}

/// In-process queue used by tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryQueue {
    pub tasks: std::sync::Mutex<Vec<Task>>,
    claims: std::sync::Mutex<std::collections::HashSet<String>>,
}

#[cfg(test)]
#[async_trait]
impl TaskQueue for MemoryQueue {
    async fn enqueue(&self, kind: TaskKind) -> Result<Uuid, QueueError> {
        let task = Task::new(kind);
        let id = task.id;
        self.tasks.lock().unwrap().push(task);
        Ok(id)
    }

    async fn depth(&self) -> Result<i64, QueueError> {
        Ok(self.tasks.lock().unwrap().len() as i64)
    }

    async fn try_claim(&self, key: &str, _ttl_secs: u64) -> Result<bool, QueueError> {
        Ok(self.claims.lock().unwrap().insert(key.to_string()))
    }

    async fn release(&self, key: &str) -> Result<(), QueueError> {
        self.claims.lock().unwrap().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_wire_format_is_tagged() {
        let task = Task::new(TaskKind::GenerateDailyReport {
            project_id: Uuid::nil(),
            report_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            requested_by: None,
            send_email: true,
        });
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["kind"]["type"], "generate_daily_report");
        assert_eq!(value["kind"]["report_date"], "2024-06-01");
        assert_eq!(value["attempts"], 0);

        let decoded: Task = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, task);
    }

    #[test]
    fn test_unknown_task_type_fails_to_decode() {
        let raw = r#"{"id":"00000000-0000-0000-0000-000000000000",
                      "kind":{"type":"reindex"},
                      "enqueued_at":"2024-01-01T00:00:00Z","attempts":0}"#;
        assert!(serde_json::from_str::<Task>(raw).is_err());
    }

    #[tokio::test]
    async fn test_memory_queue_claims_once() {
        let queue = MemoryQueue::default();
        assert!(queue.try_claim("k", 10).await.unwrap());
        assert!(!queue.try_claim("k", 10).await.unwrap());
        queue.release("k").await.unwrap();
        assert!(queue.try_claim("k", 10).await.unwrap());
    }
}
