//! BoxContentGenerator -- object-safe dynamic dispatch wrapper for ContentGenerator.
//!
//! 1. Define an object-safe `ContentGeneratorDyn` trait with boxed futures
//! 2. Blanket-impl `ContentGeneratorDyn` for all `T: ContentGenerator`
//! 3. `BoxContentGenerator` wraps `Box<dyn ContentGeneratorDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use cadence_types::error::GenerationError;

use super::generator::{ContentGenerator, GenerationContext};

/// Object-safe version of [`ContentGenerator`] with boxed futures.
pub trait ContentGeneratorDyn: Send + Sync {
    fn name(&self) -> &str;

    fn generate_boxed<'a>(
        &'a self,
        context: &'a GenerationContext,
    ) -> Pin<Box<dyn Future<Output = Result<String, GenerationError>> + Send + 'a>>;
}

impl<T: ContentGenerator> ContentGeneratorDyn for T {
    fn name(&self) -> &str {
        ContentGenerator::name(self)
    }

    fn generate_boxed<'a>(
        &'a self,
        context: &'a GenerationContext,
    ) -> Pin<Box<dyn Future<Output = Result<String, GenerationError>> + Send + 'a>> {
        Box::pin(self.generate(context))
    }
}

/// Type-erased content generator for runtime provider selection.
///
/// Since `ContentGenerator` uses RPITIT, it cannot be used as a trait object
/// directly; this wrapper delegates to a `ContentGeneratorDyn` trait object.
pub struct BoxContentGenerator {
    inner: Box<dyn ContentGeneratorDyn + Send + Sync>,
}

impl BoxContentGenerator {
    pub fn new<T: ContentGenerator + 'static>(generator: T) -> Self {
        Self {
            inner: Box::new(generator),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn generate(&self, context: &GenerationContext) -> Result<String, GenerationError> {
        self.inner.generate_boxed(context).await
    }
}
