//! SQLite API-call audit log.
//!
//! One row per attempt made by the retrying client.

use cadence_core::repository::ApiCallLog;
use cadence_types::api_call::ApiCallRecord;
use cadence_types::error::RepositoryError;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, query_error};

/// SQLite-backed implementation of [`ApiCallLog`].
pub struct SqliteApiCallLog {
    pool: DatabasePool,
}

impl SqliteApiCallLog {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types
// ---------------------------------------------------------------------------

struct ApiCallRow {
    id: String,
    endpoint: String,
    component: String,
    attempt: i64,
    request_summary: String,
    success: bool,
    error: Option<String>,
    status_code: Option<i64>,
    backoff_ms: i64,
    created_at: String,
}

impl ApiCallRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            endpoint: row.try_get("endpoint")?,
            component: row.try_get("component")?,
            attempt: row.try_get("attempt")?,
            request_summary: row.try_get("request_summary")?,
            success: row.try_get("success")?,
            error: row.try_get("error")?,
            status_code: row.try_get("status_code")?,
            backoff_ms: row.try_get("backoff_ms")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_record(self) -> Result<ApiCallRecord, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid api call id: {e}")))?;

        Ok(ApiCallRecord {
            id,
            endpoint: self.endpoint,
            component: self.component,
            attempt: self.attempt as u32,
            request_summary: self.request_summary,
            success: self.success,
            error: self.error,
            status_code: self.status_code.map(|s| s as u16),
            backoff_ms: self.backoff_ms as u64,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

impl ApiCallLog for SqliteApiCallLog {
    async fn record(&self, entry: &ApiCallRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO api_call_log (id, endpoint, component, attempt, request_summary, success, error, status_code, backoff_ms, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(entry.id.to_string())
        .bind(&entry.endpoint)
        .bind(&entry.component)
        .bind(entry.attempt as i64)
        .bind(&entry.request_summary)
        .bind(entry.success)
        .bind(&entry.error)
        .bind(entry.status_code.map(|s| s as i64))
        .bind(entry.backoff_ms as i64)
        .bind(format_datetime(&entry.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(())
    }

    async fn recent(&self, limit: i64) -> Result<Vec<ApiCallRecord>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM api_call_log ORDER BY created_at DESC, rowid DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(ApiCallRow::from_row(row).map_err(query_error)?.into_record()?);
        }
        Ok(records)
    }

    async fn count_since(&self, since: DateTime<Utc>) -> Result<i64, RepositoryError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM api_call_log WHERE created_at >= ?")
                .bind(format_datetime(&since))
                .fetch_one(&self.pool.reader)
                .await
                .map_err(query_error)?;

        Ok(count)
    }
}
