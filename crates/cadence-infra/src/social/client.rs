//! HttpSocialApi -- concrete [`SocialApi`] over the platform's v2 REST API.
//!
//! The bearer token is wrapped in [`SecretString`] and only exposed when
//! building the `Authorization` header. Non-success statuses are classified
//! by [`ApiError::from_status`]; the `x-rate-limit-reset` header (epoch
//! seconds) is carried on 429 responses.

use std::time::Duration;

use cadence_core::client::SocialApi;
use cadence_types::engagement::{EngagementPage, EngagementQuery, PostRequest, PostedItem};
use cadence_types::error::ApiError;
use reqwest::header::HeaderMap;
use secrecy::{ExposeSecret, SecretString};

use super::types::{
    CreatePostBody, CreatePostResponse, MediaSettings, ReplySettings, SearchResponse,
};

const RATE_LIMIT_RESET_HEADER: &str = "x-rate-limit-reset";

/// Platform client used by the orchestrator for search and posting.
///
/// Does not derive Debug so the token can never end up in logs.
pub struct HttpSocialApi {
    client: reqwest::Client,
    bearer_token: SecretString,
    base_url: String,
}

impl HttpSocialApi {
    pub fn new(
        base_url: impl Into<String>,
        bearer_token: SecretString,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Connection(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            bearer_token,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let reset = rate_limit_reset(response.headers());
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status.as_u16(), body, reset))
    }
}

/// Map a transport-level reqwest failure.
fn map_send_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout(e.to_string())
    } else {
        ApiError::Connection(e.to_string())
    }
}

/// Parse the rate-limit reset header (epoch seconds).
fn rate_limit_reset(headers: &HeaderMap) -> Option<i64> {
    headers
        .get(RATE_LIMIT_RESET_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

impl SocialApi for HttpSocialApi {
    async fn search(&self, query: &EngagementQuery) -> Result<EngagementPage, ApiError> {
        let mut params: Vec<(&str, &str)> = vec![
            ("query", query.query.as_str()),
            (
                "tweet.fields",
                "author_id,created_at,conversation_id,referenced_tweets",
            ),
            ("expansions", "author_id"),
            ("user.fields", "username"),
        ];
        if let Some(since_id) = &query.since_id {
            params.push(("since_id", since_id.as_str()));
        }

        let response = self
            .client
            .get(self.url("/2/tweets/search/recent"))
            .bearer_auth(self.bearer_token.expose_secret())
            .query(&params)
            .send()
            .await
            .map_err(map_send_error)?;

        let body: SearchResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| ApiError::Decode(format!("failed to parse search response: {e}")))?;

        body.into_page()
    }

    async fn post(&self, request: &PostRequest) -> Result<PostedItem, ApiError> {
        let body = CreatePostBody {
            text: request.text.clone(),
            reply: request.reply_to_id.as_ref().map(|id| ReplySettings {
                in_reply_to_tweet_id: id.clone(),
            }),
            media: (!request.media_ids.is_empty()).then(|| MediaSettings {
                media_ids: request.media_ids.clone(),
            }),
        };

        let response = self
            .client
            .post(self.url("/2/tweets"))
            .bearer_auth(self.bearer_token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;

        let created: CreatePostResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| ApiError::Decode(format!("failed to parse post response: {e}")))?;

        Ok(PostedItem {
            id: created.data.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use httpmock::Method::{GET, POST};
    use httpmock::MockServer;
    use serde_json::json;

    use super::*;

    fn api(base_url: &str) -> HttpSocialApi {
        HttpSocialApi::new(
            base_url,
            SecretString::from("test-token"),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn mentions(since_id: Option<&str>) -> EngagementQuery {
        EngagementQuery {
            query: "@agent".to_string(),
            since_id: since_id.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn post_sends_reply_target_and_returns_created_id() {
        let server = MockServer::start_async().await;
        let created = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/2/tweets")
                    .header("authorization", "Bearer test-token")
                    .json_body(json!({
                        "text": "hello",
                        "reply": {"in_reply_to_tweet_id": "100"}
                    }));
                then.status(201)
                    .header("content-type", "application/json")
                    .body(r#"{"data": {"id": "555", "text": "hello"}}"#);
            })
            .await;

        let posted = api(&server.base_url())
            .post(&PostRequest::reply("hello", "100"))
            .await
            .unwrap();

        assert_eq!(posted.id, "555");
        created.assert_async().await;
    }

    #[tokio::test]
    async fn search_passes_cursor_and_resolves_authors() {
        let server = MockServer::start_async().await;
        let search = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/2/tweets/search/recent")
                    .header("authorization", "Bearer test-token")
                    .query_param("query", "@agent")
                    .query_param("since_id", "10")
                    .query_param("expansions", "author_id");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(
                        r#"{
                            "data": [{"id": "11", "text": "@agent hi", "author_id": "42",
                                      "created_at": "2026-01-01T00:00:00.000Z"}],
                            "includes": {"users": [{"id": "42", "username": "alice"}]},
                            "meta": {"newest_id": "11", "result_count": 1}
                        }"#,
                    );
            })
            .await;

        let page = api(&server.base_url())
            .search(&mentions(Some("10")))
            .await
            .unwrap();

        search.assert_async().await;
        assert_eq!(page.events.len(), 1);
        assert_eq!(page.events[0].external_id, "11");
        assert_eq!(page.events[0].actor_handle, "alice");
        assert_eq!(page.cursor.as_deref(), Some("11"));
    }

    #[tokio::test]
    async fn first_search_omits_cursor() {
        let server = MockServer::start_async().await;
        let search = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/2/tweets/search/recent")
                    .query_param("query", "@agent")
                    .query_param_missing("since_id");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"meta": {"result_count": 0}}"#);
            })
            .await;

        let page = api(&server.base_url()).search(&mentions(None)).await.unwrap();

        search.assert_async().await;
        assert!(page.events.is_empty());
    }

    #[tokio::test]
    async fn rate_limit_carries_reset_header() {
        let server = MockServer::start_async().await;
        let limited = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/2/tweets/search/recent")
                    .header("authorization", "Bearer test-token");
                then.status(429)
                    .header("x-rate-limit-reset", "1700000060")
                    .body("{}");
            })
            .await;

        let err = api(&server.base_url())
            .search(&mentions(None))
            .await
            .unwrap_err();

        limited.assert_async().await;
        assert_eq!(
            err,
            ApiError::RateLimited {
                reset_at_epoch_secs: Some(1_700_000_060)
            }
        );
    }

    #[tokio::test]
    async fn unauthorized_is_auth_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/2/tweets");
                then.status(401).body(r#"{"title": "Unauthorized"}"#);
            })
            .await;

        let err = api(&server.base_url())
            .post(&PostRequest::reply("hello", "100"))
            .await
            .unwrap_err();

        assert!(err.is_fatal());
        assert!(matches!(err, ApiError::Auth(_)));
    }

    #[tokio::test]
    async fn bad_gateway_is_transient() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/2/tweets");
                then.status(502).body("upstream");
            })
            .await;

        let err = api(&server.base_url())
            .post(&PostRequest::reply("hello", "100"))
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert!(!err.is_permanent());
    }

    #[tokio::test]
    async fn malformed_body_is_decode_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/2/tweets/search/recent")
                    .query_param("since_id", "10");
                then.status(200).body("not json");
            })
            .await;

        let err = api(&server.base_url())
            .search(&mentions(Some("10")))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn reset_header_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(rate_limit_reset(&headers), None);

        headers.insert(RATE_LIMIT_RESET_HEADER, "1700000060".parse().unwrap());
        assert_eq!(rate_limit_reset(&headers), Some(1_700_000_060));

        headers.insert(RATE_LIMIT_RESET_HEADER, "soon".parse().unwrap());
        assert_eq!(rate_limit_reset(&headers), None);
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let api = api("https://api.example.com/");
        assert_eq!(api.url("/2/tweets"), "https://api.example.com/2/tweets");
    }
}
