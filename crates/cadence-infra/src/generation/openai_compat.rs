//! Reply generation through any OpenAI-compatible chat completions endpoint.
//!
//! One [`OpenAiCompatGenerator`] serves OpenAI, Mistral, Gemini's compat
//! endpoint or a local server; only the base URL and model differ. Prior
//! exchanges with the same actor are replayed as user/assistant turns.

use std::time::Duration;

use cadence_core::generation::{ContentGenerator, GenerationContext};
use cadence_types::error::GenerationError;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Connection settings for one provider in the generation chain.
pub struct OpenAiCompatConfig {
    /// Name used in logs and fallback reporting (e.g. "openai").
    pub provider_name: String,
    /// API root, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub api_key: SecretString,
    pub model: String,
    pub max_tokens: u32,
}

/// OpenAI-compatible [`ContentGenerator`].
///
/// Does NOT derive Debug; the API key must never be printed.
pub struct OpenAiCompatGenerator {
    client: reqwest::Client,
    provider_name: String,
    base_url: String,
    api_key: SecretString,
    model: String,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl OpenAiCompatGenerator {
    pub fn new(config: OpenAiCompatConfig) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| GenerationError::Provider {
                provider: config.provider_name.clone(),
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            provider_name: config.provider_name,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            model: config.model,
            max_tokens: config.max_tokens,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn provider_error(&self, message: String) -> GenerationError {
        GenerationError::Provider {
            provider: self.provider_name.clone(),
            message,
        }
    }
}

fn system_prompt(context: &GenerationContext) -> String {
    format!(
        "You are {persona}, replying on a public social network. Answer the latest \
         message from @{handle} in one short post (under 280 characters). \
         Stay in character, be friendly, and do not use hashtags.",
        persona = context.persona,
        handle = context.event.actor_handle,
    )
}

/// System prompt, earlier exchanges oldest first, then the event being answered.
fn build_messages(context: &GenerationContext) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage {
        role: "system",
        content: system_prompt(context),
    }];

    for memory in context.memories.iter().rev() {
        messages.push(ChatMessage {
            role: "user",
            content: memory.source_text.clone(),
        });
        if let Some(reply) = &memory.response_text {
            messages.push(ChatMessage {
                role: "assistant",
                content: reply.clone(),
            });
        }
    }

    messages.push(ChatMessage {
        role: "user",
        content: context.event.text.clone().unwrap_or_default(),
    });
    messages
}

impl ContentGenerator for OpenAiCompatGenerator {
    fn name(&self) -> &str {
        &self.provider_name
    }

    async fn generate(&self, context: &GenerationContext) -> Result<String, GenerationError> {
        let body = ChatRequest {
            model: &self.model,
            messages: build_messages(context),
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.provider_error(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(self.provider_error(format!("HTTP {status}: {error_body}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| self.provider_error(format!("failed to parse response: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        tracing::debug!(
            provider = %self.provider_name,
            model = %self.model,
            event_id = %context.event.external_id,
            chars = content.len(),
            "reply generated"
        );
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use cadence_types::conversation::ConversationRecord;
    use cadence_types::engagement::{EngagementEvent, EngagementKind};
    use chrono::Utc;
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::json;

    use super::*;

    fn context(memories: Vec<ConversationRecord>) -> GenerationContext {
        GenerationContext {
            persona: "Ada".to_string(),
            event: EngagementEvent {
                external_id: "300".to_string(),
                kind: EngagementKind::Mention,
                actor_id: "42".to_string(),
                actor_handle: "alice".to_string(),
                text: Some("@agent how are you today?".to_string()),
                created_at: Utc::now(),
                conversation_id: None,
                parent_event_id: None,
            },
            memories,
        }
    }

    fn memory(source: &str, reply: &str) -> ConversationRecord {
        let mut event = context(Vec::new()).event;
        event.external_id = source.to_string();
        event.text = Some(format!("question {source}"));
        ConversationRecord::pending(&event).mark_answered(format!("r-{source}"), reply)
    }

    #[test]
    fn messages_without_memory() {
        let messages = build_messages(&context(Vec::new()));

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains("Ada"));
        assert!(messages[0].content.contains("@alice"));
        assert_eq!(messages[1].content, "@agent how are you today?");
    }

    #[test]
    fn memories_are_replayed_oldest_first() {
        // Memories arrive newest first.
        let ctx = context(vec![memory("200", "second answer"), memory("100", "first answer")]);
        let messages = build_messages(&ctx);

        let roles: Vec<&str> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec!["system", "user", "assistant", "user", "assistant", "user"]
        );
        assert_eq!(messages[1].content, "question 100");
        assert_eq!(messages[2].content, "first answer");
        assert_eq!(messages[4].content, "second answer");
    }

    #[test]
    fn response_without_choices_is_empty() {
        let parsed: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(parsed.choices.is_empty());

        let parsed: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": "hi there"}}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("hi there"));
    }

    fn generator(base_url: String) -> OpenAiCompatGenerator {
        OpenAiCompatGenerator::new(OpenAiCompatConfig {
            provider_name: "local".to_string(),
            base_url,
            api_key: SecretString::from("k"),
            model: "test".to_string(),
            max_tokens: 64,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn generate_posts_chat_request_and_returns_first_choice() {
        let ctx = context(Vec::new());
        let expected = json!({
            "model": "test",
            "messages": build_messages(&ctx),
            "max_tokens": 64
        });

        let server = MockServer::start_async().await;
        let completion = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .header("authorization", "Bearer k")
                    .json_body(expected);
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"choices": [{"message": {"role": "assistant", "content": "hi there"}}]}"#);
            })
            .await;

        let reply = generator(server.base_url()).generate(&ctx).await.unwrap();

        completion.assert_async().await;
        assert_eq!(reply, "hi there");
    }

    #[tokio::test]
    async fn server_error_names_provider_and_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(500).body("overloaded");
            })
            .await;

        let err = generator(server.base_url())
            .generate(&context(Vec::new()))
            .await
            .unwrap_err();

        match err {
            GenerationError::Provider { provider, message } => {
                assert_eq!(provider, "local");
                assert!(message.contains("500"));
                assert!(message.contains("overloaded"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_provider_is_a_provider_error() {
        let err = generator("http://127.0.0.1:9".to_string())
            .generate(&context(Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Provider { provider, .. } if provider == "local"));
    }
}
