//! Ordered content-generation fallback.
//!
//! Providers are tried in order. The first non-empty reply wins; every
//! failure along the way is logged. If all providers fail, the last error is
//! returned and the orchestrator skips the event.

use cadence_types::error::GenerationError;

use super::box_generator::BoxContentGenerator;
use super::generator::GenerationContext;

/// A reply and the provider that wrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedContent {
    pub text: String,
    pub provider_name: String,
    /// True when a provider other than the first produced the reply.
    pub fell_back: bool,
}

/// Ordered list of generation providers behind one interface.
pub struct GenerationChain {
    providers: Vec<BoxContentGenerator>,
}

impl GenerationChain {
    pub fn new(providers: Vec<BoxContentGenerator>) -> Self {
        Self { providers }
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Ask each provider in turn until one produces text.
    pub async fn generate(
        &self,
        context: &GenerationContext,
    ) -> Result<GeneratedContent, GenerationError> {
        let mut last_error = None;

        for (idx, provider) in self.providers.iter().enumerate() {
            let provider_name = provider.name().to_string();
            let err = match provider.generate(context).await {
                Ok(text) if !text.trim().is_empty() => {
                    if idx > 0 {
                        tracing::warn!(
                            provider = %provider_name,
                            event_id = %context.event.external_id,
                            "reply generated by fallback provider"
                        );
                    }
                    return Ok(GeneratedContent {
                        text: text.trim().to_string(),
                        provider_name,
                        fell_back: idx > 0,
                    });
                }
                Ok(_) => GenerationError::Empty(provider_name.clone()),
                Err(err) => err,
            };

            tracing::warn!(
                provider = %provider_name,
                event_id = %context.event.external_id,
                error = %err,
                "generation provider failed, trying next in chain"
            );
            last_error = Some(err);
        }

        Err(last_error.unwrap_or(GenerationError::NoProviders))
    }
}
