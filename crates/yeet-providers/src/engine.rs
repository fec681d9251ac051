//! The generation engine: configuration, credentials and prices in one place.

use yeet_core::{CommitContext, Config, CredentialResolver, ProviderError};

use crate::pricing::{PricingTable, Usage};
use crate::selector::{ProviderSelector, Selection};
use crate::traits::{Generation, TokenSink};

/// Owns everything provider selection and cost reporting need.
pub struct Engine {
    config: Config,
    credentials: CredentialResolver,
    pricing: PricingTable,
}

impl Engine {
    /// Build an engine; `[pricing]` entries in `config` override built-in prices.
    pub fn new(config: Config, credentials: CredentialResolver) -> Self {
        let pricing = PricingTable::default().with_overrides(&config.pricing);
        Self {
            config,
            credentials,
            pricing,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn credentials(&self) -> &CredentialResolver {
        &self.credentials
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    pub fn selector(&self) -> ProviderSelector<'_> {
        ProviderSelector::new(&self.config, &self.credentials, &self.pricing)
    }

    /// Select the configured provider.
    pub fn select(&self) -> Result<Selection, ProviderError> {
        self.selector().select()
    }

    /// Select a provider and generate in one step.
    pub async fn generate(
        &self,
        ctx: &CommitContext,
        on_token: Option<TokenSink<'_>>,
    ) -> Result<Generation, ProviderError> {
        self.select()?.generate(ctx, on_token).await
    }

    /// Cost of `usage`, e.g. `$0.0012`, when the model has a price.
    pub fn cost(&self, usage: &Usage) -> Option<String> {
        self.pricing.cost(usage)
    }
}
