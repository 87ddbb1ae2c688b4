//! ContentGenerator trait definition.

use cadence_types::conversation::ConversationRecord;
use cadence_types::engagement::EngagementEvent;
use cadence_types::error::GenerationError;

/// Everything a provider needs to write one reply.
#[derive(Debug, Clone)]
pub struct GenerationContext {
    /// Persona the agent speaks as.
    pub persona: String,
    /// The event being answered.
    pub event: EngagementEvent,
    /// Earlier exchanges with the same actor, newest first.
    pub memories: Vec<ConversationRecord>,
}

/// Trait for reply-writing backends (an LLM endpoint, a template engine, ...).
///
/// Implementations live in cadence-infra (e.g., `OpenAiCompatGenerator`).
pub trait ContentGenerator: Send + Sync {
    /// Provider name used in logs.
    fn name(&self) -> &str;

    /// Produce reply text for the given context.
    fn generate(
        &self,
        context: &GenerationContext,
    ) -> impl std::future::Future<Output = Result<String, GenerationError>> + Send;
}
