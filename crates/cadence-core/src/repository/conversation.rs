//! Conversation record repository trait definition.

use cadence_types::conversation::ConversationRecord;
use cadence_types::error::RepositoryError;

/// Repository trait for conversation record persistence.
///
/// Implementations must enforce uniqueness of `source_event_id` and report a
/// duplicate insert as [`RepositoryError::Conflict`].
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait ConversationRepository: Send + Sync {
    /// Whether a record exists for the given source event.
    fn exists(
        &self,
        source_event_id: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Insert a new record. Fails with `Conflict` on a duplicate source event.
    fn insert(
        &self,
        record: &ConversationRecord,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get a record by its source event id.
    fn get(
        &self,
        source_event_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<ConversationRecord>, RepositoryError>> + Send;

    /// Most recent records for one actor, newest first.
    fn recent_for_actor(
        &self,
        actor_id: &str,
        limit: i64,
    ) -> impl std::future::Future<Output = Result<Vec<ConversationRecord>, RepositoryError>> + Send;

    /// Most recent records overall, newest first.
    fn recent(
        &self,
        limit: i64,
    ) -> impl std::future::Future<Output = Result<Vec<ConversationRecord>, RepositoryError>> + Send;

    /// Number of processed records.
    fn count_processed(
        &self,
    ) -> impl std::future::Future<Output = Result<i64, RepositoryError>> + Send;
}
