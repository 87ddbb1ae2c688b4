//! Conversation records: persisted proof that an inbound event was answered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engagement::EngagementEvent;

/// A persisted record of the agent's response to one engagement event.
///
/// At most one record exists per `source_event_id`. A processed record
/// always carries the id of the published reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// External id of the event that was answered (unique key).
    pub source_event_id: String,
    pub conversation_id: String,
    pub actor_id: String,
    pub actor_handle: String,
    pub source_text: String,
    /// External id of the published reply.
    pub response_event_id: Option<String>,
    pub response_text: Option<String>,
    pub is_processed: bool,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl ConversationRecord {
    /// Build an unanswered record for an event selected for response.
    pub fn pending(event: &EngagementEvent) -> Self {
        Self {
            source_event_id: event.external_id.clone(),
            conversation_id: event.conversation_key().to_string(),
            actor_id: event.actor_id.clone(),
            actor_handle: event.actor_handle.clone(),
            source_text: event.text.clone().unwrap_or_default(),
            response_event_id: None,
            response_text: None,
            is_processed: false,
            created_at: Utc::now(),
            responded_at: None,
        }
    }

    /// Mark the record answered by the given published reply.
    pub fn mark_answered(
        mut self,
        response_event_id: impl Into<String>,
        response_text: impl Into<String>,
    ) -> Self {
        self.response_event_id = Some(response_event_id.into());
        self.response_text = Some(response_text.into());
        self.is_processed = true;
        self.responded_at = Some(Utc::now());
        self
    }

    /// Whether the processed flag agrees with the presence of a reply id.
    pub fn is_consistent(&self) -> bool {
        !self.is_processed || self.response_event_id.is_some()
    }
}
