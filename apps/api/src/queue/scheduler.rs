//! Enqueues the daily report for every active project once per day.
//!
//! Ticks every minute; when the UTC hour matches the configured hour it claims
//! a per-day key in Redis so only one API instance schedules the batch.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::project::ProjectStatus;
use crate::queue::{TaskKind, TaskQueue};

const TICK: Duration = Duration::from_secs(60);
const CLAIM_TTL_SECS: u64 = 86_400;

pub fn claim_key(date: NaiveDate) -> String {
    format!("syncem:scheduler:daily:{date}")
}

pub fn is_due(now: DateTime<Utc>, hour_utc: u32) -> bool {
    now.hour() == hour_utc
}

pub async fn run_scheduler(db: PgPool, queue: Arc<dyn TaskQueue>, hour_utc: u32) {
    info!("Daily report scheduler started (hour {hour_utc:02}:00 UTC)");
    let mut interval = tokio::time::interval(TICK);
    loop {
        interval.tick().await;
        let now = Utc::now();
        if !is_due(now, hour_utc) {
            continue;
        }
        match schedule_day(&db, queue.as_ref(), now.date_naive()).await {
            Ok(Some(count)) => info!("Scheduled {count} daily reports for {}", now.date_naive()),
            Ok(None) => {}
            Err(e) => error!("Daily report scheduling failed: {e}"),
        }
    }
}

/// Returns `None` when the day was already claimed.
pub async fn schedule_day(
    db: &PgPool,
    queue: &dyn TaskQueue,
    date: NaiveDate,
) -> Result<Option<usize>, AppError> {
    schedule_claimed(queue, date, active_project_ids(db)).await
}

async fn active_project_ids(db: &PgPool) -> Result<Vec<Uuid>, AppError> {
    let ids = sqlx::query_scalar("SELECT id FROM projects WHERE status = $1")
        .bind(ProjectStatus::Active.as_str())
        .fetch_all(db)
        .await?;
    Ok(ids)
}

/// Claims the day, then loads and enqueues. A failure after the claim
/// releases it so the next tick retries.
async fn schedule_claimed<F>(
    queue: &dyn TaskQueue,
    date: NaiveDate,
    load_ids: F,
) -> Result<Option<usize>, AppError>
where
    F: Future<Output = Result<Vec<Uuid>, AppError>>,
{
    let key = claim_key(date);
    if !queue.try_claim(&key, CLAIM_TTL_SECS).await? {
        return Ok(None);
    }

    let result = match load_ids.await {
        Ok(project_ids) => enqueue_reports(queue, &project_ids, date).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(count) => Ok(Some(count)),
        Err(e) => {
            if let Err(release_err) = queue.release(&key).await {
                warn!("Failed to release scheduler claim {key}: {release_err}");
            }
            Err(e)
        }
    }
}

async fn enqueue_reports(
    queue: &dyn TaskQueue,
    project_ids: &[Uuid],
    date: NaiveDate,
) -> Result<usize, AppError> {
    for project_id in project_ids {
        queue
            .enqueue(TaskKind::GenerateDailyReport {
                project_id: *project_id,
                report_date: date,
                requested_by: None,
                send_email: true,
            })
            .await?;
    }
    Ok(project_ids.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::MemoryQueue;
    use chrono::TimeZone;

    #[test]
    fn test_is_due_matches_hour_only() {
        let at = Utc.with_ymd_and_hms(2024, 5, 10, 18, 59, 0).unwrap();
        assert!(is_due(at, 18));
        assert!(!is_due(at, 17));
    }

    #[test]
    fn test_claim_key_is_per_day() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        assert_eq!(claim_key(day), "syncem:scheduler:daily:2024-05-10");
    }

    #[tokio::test]
    async fn test_enqueue_reports_sends_email_for_scheduled_runs() {
        let queue = MemoryQueue::default();
        let ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        let day = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();

        assert_eq!(enqueue_reports(&queue, &ids, day).await.unwrap(), 2);

        let tasks = queue.tasks.lock().unwrap();
        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|t| matches!(
            t.kind,
            TaskKind::GenerateDailyReport { send_email: true, requested_by: None, .. }
        )));
    }

    #[tokio::test]
    async fn test_failed_load_releases_the_day() {
        let queue = MemoryQueue::default();
        let day = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();

        let failed = schedule_claimed(&queue, day, async {
            Err(AppError::Internal(anyhow::anyhow!("database unreachable")))
        })
        .await;
        assert!(failed.is_err());

        let ids = vec![Uuid::new_v4()];
        let retried = schedule_claimed(&queue, day, async move { Ok(ids) }).await.unwrap();
        assert_eq!(retried, Some(1));
        assert_eq!(queue.tasks.lock().unwrap().len(), 1);

        let again = schedule_claimed(&queue, day, async { Ok(vec![Uuid::new_v4()]) })
            .await
            .unwrap();
        assert_eq!(again, None);
    }
}
