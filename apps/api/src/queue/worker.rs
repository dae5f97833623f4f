//! Background worker pool.
//!
//! Each worker owns a dedicated Redis connection (BRPOP blocks it), pops one
//! task at a time and dispatches it by kind. Errors never stop a worker.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use redis::aio::MultiplexedConnection;
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::llm_client::LlmClient;
use crate::mailer::{deliver, Mailer};
use crate::queue::{Task, TaskKind, TaskQueue, FAILED_KEY, TASKS_KEY};
use crate::reports::pipeline::{generate_daily_report, ReportRequest};

const BRPOP_TIMEOUT_SECS: u64 = 5;
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Dependencies a task handler may use.
#[derive(Clone)]
pub struct WorkerContext {
    pub db: PgPool,
    pub llm: LlmClient,
    pub mailer: Arc<dyn Mailer>,
    pub queue: Arc<dyn TaskQueue>,
}

/// Spawns `concurrency` workers and returns their handles.
pub fn spawn_workers(
    client: redis::Client,
    ctx: WorkerContext,
    concurrency: usize,
) -> Vec<JoinHandle<()>> {
    (0..concurrency)
        .map(|worker_id| tokio::spawn(worker_loop(worker_id, client.clone(), ctx.clone())))
        .collect()
}

async fn worker_loop(worker_id: usize, client: redis::Client, ctx: WorkerContext) {
    info!("Worker {worker_id} started");
    loop {
        let mut conn = match client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Worker {worker_id} cannot reach Redis: {e}");
                tokio::time::sleep(RECONNECT_DELAY).await;
                continue;
            }
        };

        loop {
            let popped: redis::RedisResult<Option<(String, String)>> = redis::cmd("BRPOP")
                .arg(TASKS_KEY)
                .arg(BRPOP_TIMEOUT_SECS)
                .query_async(&mut conn)
                .await;

            match popped {
                Ok(Some((_, payload))) => process_payload(worker_id, &ctx, &mut conn, &payload).await,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Worker {worker_id} lost its Redis connection: {e}");
                    break;
                }
            }
        }

        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

async fn process_payload(
    worker_id: usize,
    ctx: &WorkerContext,
    conn: &mut MultiplexedConnection,
    payload: &str,
) {
    let mut task: Task = match serde_json::from_str(payload) {
        Ok(task) => task,
        Err(e) => {
            error!("Worker {worker_id} dropped undecodable task: {e}");
            record_failure(conn, payload, &format!("decode: {e}")).await;
            return;
        }
    };
    task.attempts += 1;

    let started = Instant::now();
    info!(
        "Worker {worker_id} running task {} ({}), attempt {}",
        task.id,
        task.kind.name(),
        task.attempts
    );

    match run_task(ctx, &task).await {
        Ok(()) => info!(
            "Task {} ({}) finished in {}ms",
            task.id,
            task.kind.name(),
            started.elapsed().as_millis()
        ),
        Err(e) => {
            error!("Task {} ({}) failed: {e:#}", task.id, task.kind.name());
            let encoded = serde_json::to_string(&task).unwrap_or_else(|_| payload.to_string());
            record_failure(conn, &encoded, &format!("{e:#}")).await;
        }
    }
}

/// Executes one task.
pub async fn run_task(ctx: &WorkerContext, task: &Task) -> Result<()> {
    match &task.kind {
        TaskKind::SendEmail { email } => {
            deliver(ctx.mailer.as_ref(), &ctx.db, email)
                .await
                .with_context(|| format!("sending e-mail to {}", email.to))?;
        }
        TaskKind::GenerateDailyReport {
            project_id,
            report_date,
            requested_by,
            send_email,
        } => {
            let request = ReportRequest {
                project_id: *project_id,
                report_date: *report_date,
                requested_by: *requested_by,
                send_email: *send_email,
            };
            generate_daily_report(&ctx.db, &ctx.llm, ctx.queue.as_ref(), &request)
                .await
                .with_context(|| format!("generating report for project {project_id}"))?;
        }
    }
    Ok(())
}

async fn record_failure(conn: &mut MultiplexedConnection, payload: &str, error: &str) {
    let entry = failure_entry(payload, error);
    let pushed: redis::RedisResult<i64> = redis::cmd("LPUSH")
        .arg(FAILED_KEY)
        .arg(entry.to_string())
        .query_async(conn)
        .await;
    if let Err(e) = pushed {
        warn!("Failed to record task failure: {e}");
    }
}

fn failure_entry(payload: &str, error: &str) -> serde_json::Value {
    let task = serde_json::from_str::<serde_json::Value>(payload)
        .unwrap_or_else(|_| serde_json::Value::String(payload.to_string()));
    serde_json::json!({
        "task": task,
        "error": error,
        "failed_at": Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_entry_keeps_structured_task() {
        let entry = failure_entry(r#"{"id": "abc"}"#, "boom");
        assert_eq!(entry["task"]["id"], "abc");
        assert_eq!(entry["error"], "boom");
        assert!(entry["failed_at"].is_string());
    }

    #[test]
    fn test_failure_entry_keeps_raw_garbage() {
        let entry = failure_entry("not json", "decode: bad");
        assert_eq!(entry["task"], "not json");
    }
}
