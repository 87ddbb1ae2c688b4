//! Cycle phases, outcomes and errors.

use std::fmt;

use cadence_types::error::{ApiError, RepositoryError};
use serde::Serialize;
use thiserror::Error;

/// Where a polling cycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    #[default]
    Idle,
    QuotaCheck,
    Fetching,
    Filtering,
    Responding,
    Recording,
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CyclePhase::Idle => write!(f, "idle"),
            CyclePhase::QuotaCheck => write!(f, "quota_check"),
            CyclePhase::Fetching => write!(f, "fetching"),
            CyclePhase::Filtering => write!(f, "filtering"),
            CyclePhase::Responding => write!(f, "responding"),
            CyclePhase::Recording => write!(f, "recording"),
        }
    }
}

/// How a cycle ended. Skips are normal outcomes, not errors.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CycleOutcome {
    #[default]
    Completed,
    SkippedRateLimited { reset_at_ms: i64 },
    SkippedEmergency { remaining: u32 },
    SkippedQuotaExhausted,
    FetchFailed { error: String },
}

impl CycleOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(
            self,
            CycleOutcome::SkippedRateLimited { .. }
                | CycleOutcome::SkippedEmergency { .. }
                | CycleOutcome::SkippedQuotaExhausted
        )
    }
}

/// Counters for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    /// Events returned by the search call.
    pub fetched: usize,
    /// Stored events from earlier cycles still awaiting a reply.
    pub backlog: usize,
    /// Candidates that passed filtering.
    pub eligible: usize,
    pub replied: usize,
    pub skipped_processed: usize,
    pub skipped_ineligible: usize,
    /// Eligible events left for a later cycle because of quota.
    pub skipped_quota: usize,
    /// Eligible events beyond the per-cycle reply cap.
    pub deferred: usize,
    pub generation_failed: usize,
    pub failed: usize,
    /// Events whose reply was rejected too often to be retried again.
    pub abandoned: usize,
    /// Replies whose record already existed.
    pub conflicts: usize,
    /// Shutdown was requested before every candidate was handled.
    pub interrupted: bool,
}

impl CycleReport {
    pub(crate) fn skipped(outcome: CycleOutcome) -> Self {
        Self {
            outcome,
            ..Default::default()
        }
    }
}

/// Errors that end a cycle early and need the caller's attention.
#[derive(Debug, Error)]
pub enum CycleError {
    /// Another cycle is still in flight.
    #[error("an engagement cycle is already running")]
    AlreadyRunning,

    /// Authentication or permission failure; operator action required.
    #[error("fatal platform error: {0}")]
    Fatal(ApiError),

    #[error("storage error: {0}")]
    Repository(#[from] RepositoryError),
}
