//! The concrete adapter chosen for a resolved provider.

use async_trait::async_trait;

use yeet_core::{CommitContext, Credential, Protocol, ProviderError, ResolvedProvider};

use crate::anthropic::AnthropicProvider;
use crate::ollama::OllamaProvider;
use crate::openai::OpenAIProvider;
use crate::traits::{Generation, Provider, TokenSink};

/// One adapter per wire protocol.
pub enum Adapter {
    Anthropic(AnthropicProvider),
    OpenAi(OpenAIProvider),
    Ollama(OllamaProvider),
}

impl Adapter {
    /// Build the adapter matching `provider.protocol`.
    pub fn for_provider(provider: &ResolvedProvider, credential: Credential) -> Self {
        match provider.protocol {
            Protocol::Anthropic => {
                Adapter::Anthropic(AnthropicProvider::from_resolved(provider, credential))
            }
            Protocol::OpenAi => Adapter::OpenAi(OpenAIProvider::from_resolved(provider, credential)),
            Protocol::Ollama => Adapter::Ollama(OllamaProvider::from_resolved(provider)),
        }
    }

    pub fn protocol(&self) -> Protocol {
        match self {
            Adapter::Anthropic(_) => Protocol::Anthropic,
            Adapter::OpenAi(_) => Protocol::OpenAi,
            Adapter::Ollama(_) => Protocol::Ollama,
        }
    }

    fn inner(&self) -> &dyn Provider {
        match self {
            Adapter::Anthropic(p) => p,
            Adapter::OpenAi(p) => p,
            Adapter::Ollama(p) => p,
        }
    }
}

#[async_trait]
impl Provider for Adapter {
    fn id(&self) -> &str {
        self.inner().id()
    }

    fn model(&self) -> &str {
        self.inner().model()
    }

    fn supports_streaming(&self) -> bool {
        self.inner().supports_streaming()
    }

    async fn generate(&self, ctx: &CommitContext) -> Result<Generation, ProviderError> {
        self.inner().generate(ctx).await
    }

    async fn generate_streaming(
        &self,
        ctx: &CommitContext,
        on_token: TokenSink<'_>,
    ) -> Result<Generation, ProviderError> {
        self.inner().generate_streaming(ctx, on_token).await
    }
}
