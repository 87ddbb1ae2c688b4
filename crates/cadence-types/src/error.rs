use thiserror::Error;

/// Errors from repository operations (used by trait definitions in cadence-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid record: {0}")]
    Invalid(String),
}

/// Errors from calls to the external social platform.
///
/// Classification drives retry and quota behavior:
/// - `Timeout` and `BadGateway` are transient and retried with backoff.
/// - `RateLimited` puts the quota monitor into cooldown and is not retried.
/// - `Auth` and `Permission` are fatal for the polling cycle.
/// - everything else fails the single call without retry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("bad gateway: {0}")]
    BadGateway(String),

    #[error("rate limited (reset at {reset_at_epoch_secs:?})")]
    RateLimited { reset_at_epoch_secs: Option<i64> },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("gave up after {retries} retries: {source}")]
    RetriesExhausted {
        retries: u32,
        #[source]
        source: Box<ApiError>,
    },
}

impl ApiError {
    /// Classify a non-success HTTP status.
    ///
    /// `reset_at_epoch_secs` is the platform's rate-limit reset header, if any.
    pub fn from_status(status: u16, body: impl Into<String>, reset_at_epoch_secs: Option<i64>) -> Self {
        let body = body.into();
        match status {
            401 => ApiError::Auth(body),
            403 => ApiError::Permission(body),
            429 => ApiError::RateLimited {
                reset_at_epoch_secs,
            },
            502 => ApiError::BadGateway(body),
            _ => ApiError::Http {
                status,
                message: body,
            },
        }
    }

    /// Whether the failure is worth retrying after a backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Timeout(_) | ApiError::BadGateway(_))
    }

    /// The platform rejected this particular request and will keep doing so,
    /// e.g. the reply target was deleted. Only plain 4xx responses qualify.
    pub fn is_permanent(&self) -> bool {
        match self {
            ApiError::Http { status, .. } => (400..500).contains(status),
            ApiError::RetriesExhausted { source, .. } => source.is_permanent(),
            _ => false,
        }
    }

    /// Authentication and permission failures need operator attention.
    pub fn is_fatal(&self) -> bool {
        match self {
            ApiError::Auth(_) | ApiError::Permission(_) => true,
            ApiError::RetriesExhausted { source, .. } => source.is_fatal(),
            _ => false,
        }
    }

    /// The HTTP status behind this error, when there was one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::BadGateway(_) => Some(502),
            ApiError::RateLimited { .. } => Some(429),
            ApiError::Auth(_) => Some(401),
            ApiError::Permission(_) => Some(403),
            ApiError::Http { status, .. } => Some(*status),
            ApiError::RetriesExhausted { source, .. } => source.status_code(),
            ApiError::Timeout(_) | ApiError::Connection(_) | ApiError::Decode(_) => None,
        }
    }
}

/// Errors from the content-generation collaborator.
///
/// Always non-transient from the orchestrator's point of view: the event is
/// skipped and picked up again on a later cycle.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerationError {
    #[error("provider '{provider}' failed: {message}")]
    Provider { provider: String, message: String },

    #[error("provider '{0}' returned empty content")]
    Empty(String),

    #[error("no content generation providers configured")]
    NoProviders,
}

/// Errors raised while loading or validating configuration at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(String),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("missing required setting: {0}")]
    Missing(String),

    #[error("invalid setting '{field}': {reason}")]
    Invalid { field: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(ApiError::from_status(401, "", None), ApiError::Auth(_)));
        assert!(matches!(ApiError::from_status(403, "", None), ApiError::Permission(_)));
        assert!(matches!(
            ApiError::from_status(429, "", Some(1_700_000_000)),
            ApiError::RateLimited {
                reset_at_epoch_secs: Some(1_700_000_000)
            }
        ));
        assert!(matches!(ApiError::from_status(502, "", None), ApiError::BadGateway(_)));
        assert!(matches!(
            ApiError::from_status(503, "down", None),
            ApiError::Http { status: 503, .. }
        ));
    }

    #[test]
    fn test_only_timeout_and_bad_gateway_are_transient() {
        assert!(ApiError::Timeout("30s".into()).is_transient());
        assert!(ApiError::BadGateway("".into()).is_transient());
        assert!(!ApiError::from_status(500, "", None).is_transient());
        assert!(!ApiError::from_status(429, "", None).is_transient());
        assert!(!ApiError::Connection("refused".into()).is_transient());
    }

    #[test]
    fn test_plain_client_errors_are_permanent() {
        assert!(ApiError::from_status(400, "invalid reply target", None).is_permanent());
        assert!(ApiError::from_status(404, "", None).is_permanent());
        assert!(!ApiError::from_status(401, "", None).is_permanent());
        assert!(!ApiError::from_status(429, "", None).is_permanent());
        assert!(!ApiError::from_status(500, "", None).is_permanent());
        assert!(!ApiError::Decode("truncated".into()).is_permanent());
        assert!(
            !ApiError::RetriesExhausted {
                retries: 3,
                source: Box::new(ApiError::BadGateway("".into())),
            }
            .is_permanent()
        );
    }

    #[test]
    fn test_fatal_looks_through_retries() {
        assert!(ApiError::Auth("bad token".into()).is_fatal());
        assert!(ApiError::Permission("suspended".into()).is_fatal());
        assert!(!ApiError::BadGateway("".into()).is_fatal());
        let wrapped = ApiError::RetriesExhausted {
            retries: 3,
            source: Box::new(ApiError::BadGateway("".into())),
        };
        assert!(!wrapped.is_fatal());
        assert_eq!(wrapped.status_code(), Some(502));
        assert!(wrapped.to_string().contains("3 retries"));
    }
}
