//! JSON backups of the business tables, stored in S3.
//!
//! A backup is one JSON document `{created_at, tables: {<name>: [rows...]}}`.
//! Password hashes are never exported.

use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::backup::BackupRow;
use crate::pagination::PageParams;
use crate::validation;

/// Table name and the column list exported for it.
const EXPORTED_TABLES: &[(&str, &str)] = &[
    (
        "users",
        "id, email, full_name, role, is_active, created_at, updated_at",
    ),
    ("employees", "*"),
    ("policies", "*"),
    ("projects", "*"),
    ("project_members", "*"),
    ("tasks", "*"),
    ("work_updates", "*"),
    ("reports", "*"),
    ("chat_sessions", "*"),
    ("chat_messages", "*"),
];

#[derive(Debug, Default, Deserialize)]
pub struct BackupCreate {
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
struct BackupDocument {
    created_at: DateTime<Utc>,
    tables: Map<String, Value>,
}

pub fn backup_key(id: Uuid, at: DateTime<Utc>) -> String {
    format!("backups/{}-{}.json", at.format("%Y%m%dT%H%M%SZ"), id)
}

async fn export_table(pool: &PgPool, table: &str, columns: &str) -> Result<Value, AppError> {
    // Table and column names come from EXPORTED_TABLES, never from input.
    let sql = format!(
        "SELECT COALESCE(json_agg(t), '[]'::json) FROM (SELECT {columns} FROM {table}) t"
    );
    Ok(sqlx::query_scalar::<_, Value>(&sql).fetch_one(pool).await?)
}

pub async fn create_backup(
    pool: &PgPool,
    s3: &aws_sdk_s3::Client,
    s3_bucket: &str,
    created_by: Uuid,
    req: BackupCreate,
) -> Result<BackupRow, AppError> {
    let note = validation::optional("note", req.note.as_deref(), 500)?;

    // Step 1: Export
    let created_at = Utc::now();
    let mut tables = Map::new();
    for (table, columns) in EXPORTED_TABLES {
        tables.insert(table.to_string(), export_table(pool, table, columns).await?);
    }
    let table_names: Vec<String> = tables.keys().cloned().collect();
    let body = serde_json::to_vec(&BackupDocument { created_at, tables })
        .map_err(|e| AppError::Internal(e.into()))?;
    let size_bytes = body.len() as i64;

    // Step 2: Upload
    let id = Uuid::new_v4();
    let s3_key = backup_key(id, created_at);
    s3.put_object()
        .bucket(s3_bucket)
        .key(&s3_key)
        .body(ByteStream::from(body))
        .content_type("application/json")
        .send()
        .await
        .map_err(|e| AppError::S3(format!("Backup upload failed: {e}")))?;
    info!("Uploaded backup to s3://{}/{} ({} bytes)", s3_bucket, s3_key, size_bytes);

    // Step 3: Record
    Ok(sqlx::query_as::<_, BackupRow>(
        r#"
        INSERT INTO backups (id, s3_key, size_bytes, tables, note, created_by, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&s3_key)
    .bind(size_bytes)
    .bind(&table_names)
    .bind(note)
    .bind(created_by)
    .bind(created_at)
    .fetch_one(pool)
    .await?)
}

pub async fn get_backup(pool: &PgPool, id: Uuid) -> Result<BackupRow, AppError> {
    sqlx::query_as::<_, BackupRow>("SELECT * FROM backups WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Backup {id} not found")))
}

pub async fn list_backups(pool: &PgPool, page: &PageParams) -> Result<(Vec<BackupRow>, i64), AppError> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM backups")
        .fetch_one(pool)
        .await?;
    let items = sqlx::query_as::<_, BackupRow>(
        "SELECT * FROM backups ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;
    Ok((items, total))
}

pub async fn download_backup(
    s3: &aws_sdk_s3::Client,
    s3_bucket: &str,
    backup: &BackupRow,
) -> Result<Bytes, AppError> {
    let object = s3
        .get_object()
        .bucket(s3_bucket)
        .key(&backup.s3_key)
        .send()
        .await
        .map_err(|e| AppError::S3(format!("Backup download failed: {e}")))?;

    let data = object
        .body
        .collect()
        .await
        .map_err(|e| AppError::S3(format!("Backup read failed: {e}")))?;
    Ok(data.into_bytes())
}

/// Removes the object first so a failed S3 call leaves the row to retry with.
pub async fn delete_backup(
    pool: &PgPool,
    s3: &aws_sdk_s3::Client,
    s3_bucket: &str,
    backup: &BackupRow,
) -> Result<(), AppError> {
    s3.delete_object()
        .bucket(s3_bucket)
        .key(&backup.s3_key)
        .send()
        .await
        .map_err(|e| AppError::S3(format!("Backup delete failed: {e}")))?;

    sqlx::query("DELETE FROM backups WHERE id = $1")
        .bind(backup.id)
        .execute(pool)
        .await?;
    info!("Backup {} deleted", backup.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_backup_key_layout() {
        let id = Uuid::nil();
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(
            backup_key(id, at),
            "backups/20240309T070501Z-00000000-0000-0000-0000-000000000000.json"
        );
    }

    #[test]
    fn test_password_hashes_are_not_exported() {
        let (_, columns) = EXPORTED_TABLES
            .iter()
            .find(|(t, _)| *t == "users")
            .unwrap();
        assert!(!columns.contains("password_hash"));
        assert_ne!(*columns, "*");
    }

    #[test]
    fn test_mail_log_and_backups_not_exported() {
        assert!(EXPORTED_TABLES
            .iter()
            .all(|(t, _)| *t != "backups" && *t != "email_log"));
    }
}
