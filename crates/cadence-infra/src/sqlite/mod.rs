//! SQLite persistence for conversation records, fetched engagement and the
//! API-call audit log. Every store shares one [`pool::DatabasePool`].
//!
//! Timestamps are stored as RFC 3339 text.

pub mod api_call;
pub mod conversation;
pub mod engagement;
pub mod pool;

use chrono::{DateTime, Utc};

use cadence_types::error::RepositoryError;

pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

pub(crate) fn query_error(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

/// A migrated pool on a fresh temporary database. Keep the `TempDir`
/// alive for as long as the pool is used.
#[cfg(test)]
pub(crate) async fn test_pool() -> (tempfile::TempDir, pool::DatabasePool) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
    let pool = pool::DatabasePool::new(&url).await.unwrap();
    (dir, pool)
}
