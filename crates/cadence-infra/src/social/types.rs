//! Wire types for the social platform's v2 JSON API.

use std::collections::HashMap;

use cadence_types::engagement::{EngagementEvent, EngagementKind, EngagementPage};
use cadence_types::error::ApiError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of `POST /2/tweets`.
#[derive(Debug, Serialize)]
pub struct CreatePostBody {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<ReplySettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaSettings>,
}

#[derive(Debug, Serialize)]
pub struct ReplySettings {
    pub in_reply_to_tweet_id: String,
}

#[derive(Debug, Serialize)]
pub struct MediaSettings {
    pub media_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePostResponse {
    pub data: CreatedPost,
}

#[derive(Debug, Deserialize)]
pub struct CreatedPost {
    pub id: String,
}

/// Response of `GET /2/tweets/search/recent`.
#[derive(Debug, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub data: Vec<PostObject>,
    #[serde(default)]
    pub includes: Includes,
    #[serde(default)]
    pub meta: SearchMeta,
}

#[derive(Debug, Deserialize)]
pub struct PostObject {
    pub id: String,
    pub text: String,
    pub author_id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub referenced_tweets: Vec<ReferencedPost>,
}

#[derive(Debug, Deserialize)]
pub struct ReferencedPost {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Includes {
    #[serde(default)]
    pub users: Vec<UserObject>,
}

#[derive(Debug, Deserialize)]
pub struct UserObject {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchMeta {
    pub newest_id: Option<String>,
    #[serde(default)]
    pub result_count: u32,
}

impl SearchResponse {
    /// Convert to domain events, resolving author handles from `includes`.
    ///
    /// Posts that reply to another post become `Reply` events; everything
    /// else the search returns is a `Mention`.
    pub fn into_page(self) -> Result<EngagementPage, ApiError> {
        let handles: HashMap<&str, &str> = self
            .includes
            .users
            .iter()
            .map(|u| (u.id.as_str(), u.username.as_str()))
            .collect();

        let mut events = Vec::with_capacity(self.data.len());
        for post in &self.data {
            let created_at = post.created_at.ok_or_else(|| {
                ApiError::Decode(format!("post {} is missing created_at", post.id))
            })?;
            let parent = post
                .referenced_tweets
                .iter()
                .find(|r| r.kind == "replied_to")
                .map(|r| r.id.clone());
            let kind = if parent.is_some() {
                EngagementKind::Reply
            } else {
                EngagementKind::Mention
            };

            events.push(EngagementEvent {
                external_id: post.id.clone(),
                kind,
                actor_id: post.author_id.clone(),
                actor_handle: handles
                    .get(post.author_id.as_str())
                    .map(|h| h.to_string())
                    .unwrap_or_default(),
                text: Some(post.text.clone()),
                created_at,
                conversation_id: post.conversation_id.clone(),
                parent_event_id: parent,
            });
        }

        Ok(EngagementPage {
            events,
            cursor: self.meta.newest_id,
        })
    }
}
