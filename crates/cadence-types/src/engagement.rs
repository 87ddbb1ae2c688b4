//! Engagement events fetched from the social platform.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// The kind of inbound interaction an engagement event represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementKind {
    Mention,
    Like,
    Repost,
    Reply,
    Follow,
}

impl fmt::Display for EngagementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngagementKind::Mention => write!(f, "mention"),
            EngagementKind::Like => write!(f, "like"),
            EngagementKind::Repost => write!(f, "repost"),
            EngagementKind::Reply => write!(f, "reply"),
            EngagementKind::Follow => write!(f, "follow"),
        }
    }
}

impl FromStr for EngagementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mention" => Ok(EngagementKind::Mention),
            "like" => Ok(EngagementKind::Like),
            "repost" => Ok(EngagementKind::Repost),
            "reply" => Ok(EngagementKind::Reply),
            "follow" => Ok(EngagementKind::Follow),
            other => Err(format!("invalid engagement kind: '{other}'")),
        }
    }
}

/// An inbound social interaction, immutable once fetched.
///
/// `external_id` is the platform's identifier and is unique per source event.
/// Events are never deleted by the orchestration core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementEvent {
    pub external_id: String,
    pub kind: EngagementKind,
    pub actor_id: String,
    pub actor_handle: String,
    pub text: Option<String>,
    pub created_at: DateTime<Utc>,
    pub conversation_id: Option<String>,
    pub parent_event_id: Option<String>,
}

impl EngagementEvent {
    /// The conversation this event belongs to, falling back to the event
    /// itself when the platform did not report a thread.
    pub fn conversation_key(&self) -> &str {
        self.conversation_id.as_deref().unwrap_or(&self.external_id)
    }
}

/// Parameters for one engagement search call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementQuery {
    /// Platform search expression (e.g. `@handle`).
    pub query: String,
    /// Only return events newer than this id.
    pub since_id: Option<String>,
}

/// One page of search results.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngagementPage {
    pub events: Vec<EngagementEvent>,
    /// Newest id reported by the platform, if any.
    pub cursor: Option<String>,
}

impl EngagementPage {
    /// The cursor to persist after this page: the platform cursor when
    /// supplied, otherwise the greatest event id seen.
    ///
    /// Platform ids are numeric strings of varying length, so they are
    /// compared by length first and then lexically.
    pub fn newest_id(&self) -> Option<String> {
        if let Some(cursor) = &self.cursor {
            return Some(cursor.clone());
        }
        self.events
            .iter()
            .map(|e| e.external_id.as_str())
            .max_by(|a, b| compare_ids(a, b))
            .map(str::to_string)
    }
}

/// Order platform ids (snowflake-style numeric strings).
pub fn compare_ids(a: &str, b: &str) -> std::cmp::Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// A reply to publish through the posting API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRequest {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media_ids: Vec<String>,
    pub reply_to_id: Option<String>,
}

impl PostRequest {
    /// A plain-text reply to the given event.
    pub fn reply(text: impl Into<String>, reply_to_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            media_ids: Vec::new(),
            reply_to_id: Some(reply_to_id.into()),
        }
    }
}

/// The platform's acknowledgement of a published post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedItem {
    pub id: String,
}
