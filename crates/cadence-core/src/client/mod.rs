//! Outbound platform access.
//!
//! - `SocialApi`: posting and engagement-search capability of the platform
//! - `RetryingClient`: backoff, rate-limit handling and audit logging around any call

pub mod retry;
pub mod social;

pub use retry::{RetryPolicy, RetryingClient};
pub use social::SocialApi;
