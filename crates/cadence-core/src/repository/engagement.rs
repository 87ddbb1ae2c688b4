//! Engagement event and fetch cursor repository trait definition.

use cadence_types::engagement::{EngagementEvent, EngagementKind};
use cadence_types::error::RepositoryError;
use chrono::{DateTime, Utc};

/// Which stored events are picked up again for a reply.
#[derive(Debug, Clone)]
pub struct BacklogFilter {
    /// Only events created after this instant.
    pub since: DateTime<Utc>,
    /// Only events of these kinds.
    pub kinds: Vec<EngagementKind>,
    /// Events whose posts were rejected this many times are left out.
    pub max_failures: u32,
    pub limit: i64,
}

/// Repository trait for fetched engagement events and the fetch cursor.
pub trait EngagementRepository: Send + Sync {
    /// Persist fetched events, ignoring ones already stored.
    /// Returns the number of newly stored events.
    fn save_events(
        &self,
        events: &[EngagementEvent],
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Get a stored event by external id.
    fn get(
        &self,
        external_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<EngagementEvent>, RepositoryError>> + Send;

    /// Stored events matching `filter` that have no conversation record,
    /// oldest first.
    fn unanswered(
        &self,
        filter: &BacklogFilter,
    ) -> impl std::future::Future<Output = Result<Vec<EngagementEvent>, RepositoryError>> + Send;

    /// Count a rejected reply post against an event and return the new total.
    fn record_failure(
        &self,
        external_id: &str,
        error: &str,
    ) -> impl std::future::Future<Output = Result<u32, RepositoryError>> + Send;

    /// Load the persisted `since_id` cursor for a search source.
    fn load_cursor(
        &self,
        source: &str,
    ) -> impl std::future::Future<Output = Result<Option<String>, RepositoryError>> + Send;

    /// Store the `since_id` cursor for a search source.
    fn save_cursor(
        &self,
        source: &str,
        since_id: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
