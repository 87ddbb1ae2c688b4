//! SocialApi trait definition.

use cadence_types::engagement::{EngagementPage, EngagementQuery, PostRequest, PostedItem};
use cadence_types::error::ApiError;

/// The social platform's posting and engagement-search endpoints.
///
/// Implementations classify failures with [`ApiError::from_status`] and map
/// client-side timeouts to [`ApiError::Timeout`] so retry policy can act on
/// them. Implementations live in cadence-infra (e.g., `HttpSocialApi`).
pub trait SocialApi: Send + Sync {
    /// Search for engagement events, optionally newer than `since_id`.
    fn search(
        &self,
        query: &EngagementQuery,
    ) -> impl std::future::Future<Output = Result<EngagementPage, ApiError>> + Send;

    /// Publish a post (typically a reply).
    fn post(
        &self,
        request: &PostRequest,
    ) -> impl std::future::Future<Output = Result<PostedItem, ApiError>> + Send;
}
