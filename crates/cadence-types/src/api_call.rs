//! Audit records for outbound API attempts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Describes an outbound call for logging and auditing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCall {
    /// Logical endpoint name (e.g. `posts.create`).
    pub endpoint: String,
    /// Component issuing the call (e.g. `orchestrator`).
    pub component: String,
    /// Short, secret-free description of the request.
    pub summary: String,
}

impl ApiCall {
    pub fn new(
        endpoint: impl Into<String>,
        component: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            component: component.into(),
            summary: summary.into(),
        }
    }
}

/// One attempt of an outbound call, appended to the API-call log.
///
/// Used to audit quota consumption; never read for control flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiCallRecord {
    pub id: Uuid,
    pub endpoint: String,
    pub component: String,
    /// 1-based attempt number within a single `execute`.
    pub attempt: u32,
    pub request_summary: String,
    pub success: bool,
    /// Error text for failed attempts.
    pub error: Option<String>,
    pub status_code: Option<u16>,
    /// Delay waited before this attempt (0 for the first).
    pub backoff_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl ApiCallRecord {
    /// Build a record for an attempt of `call`.
    pub fn for_attempt(call: &ApiCall, attempt: u32, backoff_ms: u64) -> Self {
        Self {
            id: Uuid::now_v7(),
            endpoint: call.endpoint.clone(),
            component: call.component.clone(),
            attempt,
            request_summary: call.summary.clone(),
            success: true,
            error: None,
            status_code: None,
            backoff_ms,
            created_at: Utc::now(),
        }
    }

    pub fn failed(mut self, error: impl Into<String>, status_code: Option<u16>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self.status_code = status_code;
        self
    }
}
