//! Engagement rules: which events deserve a reply.

use cadence_types::engagement::{EngagementEvent, EngagementKind};

/// Kinds that can carry a question worth answering.
pub const REPLY_KINDS: &[EngagementKind] = &[EngagementKind::Mention, EngagementKind::Reply];

/// Decides whether an engagement event is eligible for a reply.
///
/// Ineligible events are still fetched and stored; they are just not
/// answered.
pub trait EngagementRules: Send + Sync {
    fn is_reply_eligible(&self, event: &EngagementEvent) -> bool;

    /// Kinds that may ever be eligible. Used to narrow backlog queries
    /// before `is_reply_eligible` runs.
    fn reply_kinds(&self) -> &[EngagementKind] {
        REPLY_KINDS
    }
}

/// Reply to mentions and replies that carry text, never to the agent itself.
///
/// Likes, reposts and follows are logged but not answered.
#[derive(Debug, Clone)]
pub struct DefaultEngagementRules {
    agent_handle: String,
}

impl DefaultEngagementRules {
    pub fn new(agent_handle: impl Into<String>) -> Self {
        let handle: String = agent_handle.into();
        Self {
            agent_handle: handle.trim_start_matches('@').to_lowercase(),
        }
    }
}

impl EngagementRules for DefaultEngagementRules {
    fn is_reply_eligible(&self, event: &EngagementEvent) -> bool {
        if !self.reply_kinds().contains(&event.kind) {
            return false;
        }
        if event.actor_handle.trim_start_matches('@').to_lowercase() == self.agent_handle {
            return false;
        }
        event
            .text
            .as_deref()
            .is_some_and(|text| !text.trim().is_empty())
    }
}
