//! API-call audit log trait definition.

use cadence_types::api_call::ApiCallRecord;
use cadence_types::error::RepositoryError;
use chrono::{DateTime, Utc};

/// Append-only log of outbound API attempts.
///
/// Used for auditing quota consumption. Nothing reads it for control flow.
pub trait ApiCallLog: Send + Sync {
    /// Append one attempt.
    fn record(
        &self,
        entry: &ApiCallRecord,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Most recent attempts, newest first.
    fn recent(
        &self,
        limit: i64,
    ) -> impl std::future::Future<Output = Result<Vec<ApiCallRecord>, RepositoryError>> + Send;

    /// Number of attempts logged since `since`.
    fn count_since(
        &self,
        since: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<i64, RepositoryError>> + Send;
}
