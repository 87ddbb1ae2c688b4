//! Conversation tracking for reply deduplication.
//!
//! `ConversationTracker` answers "have we already replied to this event?"
//! before an expensive generation call, and records completed replies. The
//! repository's unique key on `source_event_id` is what actually prevents
//! double recording across restarts and overlapping runs.

use cadence_types::conversation::ConversationRecord;
use cadence_types::error::RepositoryError;

use crate::repository::ConversationRepository;

/// Deduplicating front for the conversation repository.
pub struct ConversationTracker<C: ConversationRepository> {
    repo: C,
}

impl<C: ConversationRepository> ConversationTracker<C> {
    pub fn new(repo: C) -> Self {
        Self { repo }
    }

    /// Whether the event has already been answered.
    pub async fn is_processed(&self, source_event_id: &str) -> Result<bool, RepositoryError> {
        self.repo.exists(source_event_id).await
    }

    /// Record a completed reply.
    ///
    /// Returns `RepositoryError::Conflict` if the event was already recorded;
    /// callers treat that as "handled by a concurrent or prior run".
    pub async fn record_response(&self, record: &ConversationRecord) -> Result<(), RepositoryError> {
        if !record.is_processed || !record.is_consistent() {
            return Err(RepositoryError::Invalid(format!(
                "record for '{}' must be processed and carry a response id",
                record.source_event_id
            )));
        }
        self.repo.insert(record).await?;
        tracing::debug!(
            event_id = %record.source_event_id,
            response_id = record.response_event_id.as_deref().unwrap_or_default(),
            "conversation recorded"
        );
        Ok(())
    }

    /// Earlier exchanges with the same actor, newest first.
    pub async fn recent_for_actor(
        &self,
        actor_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationRecord>, RepositoryError> {
        self.repo.recent_for_actor(actor_id, limit as i64).await
    }

    /// Most recent records overall, newest first.
    pub async fn recent(&self, limit: usize) -> Result<Vec<ConversationRecord>, RepositoryError> {
        self.repo.recent(limit as i64).await
    }

    pub async fn processed_count(&self) -> Result<i64, RepositoryError> {
        self.repo.count_processed().await
    }
}
