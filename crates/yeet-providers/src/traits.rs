//! Provider trait definitions.

use async_trait::async_trait;

use yeet_core::{CommitContext, ProviderError};

use crate::pricing::Usage;

/// Callback receiving each text fragment as it arrives.
pub type TokenSink<'a> = &'a mut (dyn FnMut(&str) + Send);

/// The result of one generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    /// Generated text, trimmed
    pub text: String,
    /// Token counts; zero when the provider reported none
    pub usage: Usage,
}

/// A protocol adapter bound to one provider, model and credential.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider name used in errors and logs (e.g., "groq").
    fn id(&self) -> &str;

    /// Model sent with every request.
    fn model(&self) -> &str;

    /// Whether [`Provider::generate_streaming`] delivers text incrementally.
    fn supports_streaming(&self) -> bool {
        false
    }

    /// Generate text in one round trip.
    async fn generate(&self, ctx: &CommitContext) -> Result<Generation, ProviderError>;

    /// Generate text, calling `on_token` for each fragment in arrival order.
    ///
    /// The default delivers the whole answer as a single fragment.
    async fn generate_streaming(
        &self,
        ctx: &CommitContext,
        on_token: TokenSink<'_>,
    ) -> Result<Generation, ProviderError> {
        let generation = self.generate(ctx).await?;
        on_token(&generation.text);
        Ok(generation)
    }
}
