//! Quota state exposed for observability and gating decisions.

use serde::{Deserialize, Serialize};

/// Point-in-time view of the daily call budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaSnapshot {
    /// Daily quota (bucket capacity).
    pub capacity: u32,
    /// Whole tokens currently available.
    pub remaining_tokens: u32,
    /// Low-water mark below which emergency mode engages.
    pub emergency_threshold: u32,
    pub is_emergency_mode: bool,
    /// Set after the server answered 429, until the reported reset.
    pub is_rate_limited: bool,
    /// Epoch milliseconds at which the server-side rate limit lifts.
    pub rate_limit_reset_at: Option<i64>,
}

/// Outcome of asking whether an outbound call may proceed now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    /// The server reported a rate limit that has not reset yet.
    RateLimited { reset_at_ms: i64 },
    /// Remaining budget is below the emergency threshold.
    Emergency { remaining: u32 },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }
}
