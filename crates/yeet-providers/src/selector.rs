//! Choosing the active provider.
//!
//! A named provider is used directly. `auto` picks the credentialed
//! provider whose model has the lowest input price; models without a known
//! price rank after every priced one, and ties keep enumeration order.

use std::cmp::Ordering;

use tracing::debug;

use yeet_core::{
    CommitContext, Config, Credential, CredentialResolver, CredentialSource, Protocol,
    ProviderError, ResolvedProvider, AUTO_PROVIDER,
};

use crate::adapter::Adapter;
use crate::pricing::PricingTable;
use crate::traits::{Generation, Provider, TokenSink};

/// A provider ready to generate.
pub struct Selection {
    pub adapter: Adapter,
    pub provider: ResolvedProvider,
    pub credential_source: CredentialSource,
}

impl Selection {
    /// Generate with streaming when a sink is given and the adapter streams.
    pub async fn generate(
        &self,
        ctx: &CommitContext,
        on_token: Option<TokenSink<'_>>,
    ) -> Result<Generation, ProviderError> {
        match on_token {
            Some(sink) if self.adapter.supports_streaming() => {
                self.adapter.generate_streaming(ctx, sink).await
            }
            _ => self.adapter.generate(ctx).await,
        }
    }
}

/// A credentialed auto-mode candidate.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub provider: ResolvedProvider,
    pub credential: Credential,
    /// USD per million input tokens, when known
    pub input_cost: Option<f64>,
}

/// Picks a provider from config, credentials and prices.
pub struct ProviderSelector<'a> {
    config: &'a Config,
    credentials: &'a CredentialResolver,
    pricing: &'a PricingTable,
}

impl<'a> ProviderSelector<'a> {
    pub fn new(
        config: &'a Config,
        credentials: &'a CredentialResolver,
        pricing: &'a PricingTable,
    ) -> Self {
        Self {
            config,
            credentials,
            pricing,
        }
    }

    /// Select the configured provider, resolving `auto` to the cheapest candidate.
    pub fn select(&self) -> Result<Selection, ProviderError> {
        if self.config.provider == AUTO_PROVIDER {
            return self.select_auto();
        }
        self.select_named(&self.config.provider)
    }

    /// Select `name` directly.
    pub fn select_named(&self, name: &str) -> Result<Selection, ProviderError> {
        let provider = self.config.try_resolve_provider(name)?;
        let credential = if provider.needs_auth {
            let credential = self
                .credentials
                .resolve(&provider.name, provider.env_var.as_deref());
            if !credential.is_present() {
                return Err(ProviderError::MissingCredential {
                    provider: provider.name.clone(),
                    env_var: provider.env_var.clone(),
                });
            }
            credential
        } else {
            Credential::none()
        };

        debug!(
            provider = %provider.name,
            model = %provider.model,
            source = %credential.source(),
            "selected provider"
        );
        Ok(Selection {
            credential_source: credential.source(),
            adapter: Adapter::for_provider(&provider, credential),
            provider,
        })
    }

    fn select_auto(&self) -> Result<Selection, ProviderError> {
        let candidate = self
            .candidates()
            .into_iter()
            .next()
            .ok_or(ProviderError::NoCandidates)?;
        debug!(
            provider = %candidate.provider.name,
            model = %candidate.provider.model,
            input_cost = ?candidate.input_cost,
            "auto selected provider"
        );
        Ok(Selection {
            credential_source: candidate.credential.source(),
            adapter: Adapter::for_provider(&candidate.provider, candidate.credential),
            provider: candidate.provider,
        })
    }

    /// Every provider auto mode could pick, cheapest first.
    pub fn candidates(&self) -> Vec<Candidate> {
        let imported = self.credentials.list_imported_providers();
        let mut candidates: Vec<Candidate> = self
            .config
            .all_provider_names(&imported)
            .iter()
            .filter(|name| name.as_str() != AUTO_PROVIDER)
            .filter_map(|name| {
                let provider = match self.config.try_resolve_provider(name) {
                    Ok(provider) => provider,
                    Err(e) => {
                        debug!(provider = %name, error = %e, "skipping auto candidate");
                        return None;
                    }
                };
                if provider.protocol == Protocol::Ollama {
                    return None;
                }
                let credential = self
                    .credentials
                    .resolve(&provider.name, provider.env_var.as_deref());
                if !credential.is_present() {
                    return None;
                }
                let input_cost = self.pricing.input_cost_per_million(&provider.model);
                Some(Candidate {
                    provider,
                    credential,
                    input_cost,
                })
            })
            .collect();

        candidates.sort_by(|a, b| by_cost(a.input_cost, b.input_cost));
        candidates
    }

    /// Model `auto` would use, without building an adapter.
    pub fn auto_model_name(&self) -> Option<String> {
        self.candidates()
            .into_iter()
            .next()
            .map(|c| c.provider.model)
    }
}

fn by_cost(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yeet_core::{MemoryStore, ProviderConfig};

    fn resolver(store: MemoryStore, env: &'static [(&'static str, &'static str)]) -> CredentialResolver {
        CredentialResolver::new(Box::new(store))
            .with_env_lookup(move |name: &str| {
                env.iter()
                    .find(|(k, _)| *k == name)
                    .map(|(_, v)| v.to_string())
            })
            .with_imported_path(None)
    }

    fn config(provider: &str) -> Config {
        Config {
            provider: provider.to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn test_auto_selects_cheapest() {
        let mut config = config("auto");
        config.set_model("anthropic", "claude-sonnet-4-6");
        let credentials = resolver(
            MemoryStore::new().with("anthropic", "sk-ant"),
            &[("OPENAI_API_KEY", "sk-openai")],
        );
        let pricing = PricingTable::default();
        let selector = ProviderSelector::new(&config, &credentials, &pricing);

        let selection = selector.select().unwrap();
        assert_eq!(selection.provider.name, "openai");
        assert_eq!(selection.adapter.protocol(), Protocol::OpenAi);
        assert_eq!(selection.credential_source, CredentialSource::Environment);
        assert_eq!(selector.auto_model_name().as_deref(), Some("gpt-4o-mini"));
    }

    #[test]
    fn test_auto_places_unpriced_models_last() {
        let mut config = config("auto");
        config.custom.insert(
            "together".to_string(),
            ProviderConfig {
                model: Some("llama-70b".to_string()),
                url: Some("https://api.together.xyz/v1".to_string()),
                env_var: Some("TOGETHER_API_KEY".to_string()),
            },
        );
        let credentials = resolver(
            MemoryStore::new().with("together", "t").with("anthropic", "a"),
            &[],
        );
        let pricing = PricingTable::default();
        let names: Vec<String> = ProviderSelector::new(&config, &credentials, &pricing)
            .candidates()
            .into_iter()
            .map(|c| c.provider.name)
            .collect();
        assert_eq!(names, vec!["anthropic", "together"]);
    }

    #[test]
    fn test_auto_ties_keep_enumeration_order() {
        let config = config("auto");
        let credentials = resolver(
            MemoryStore::new().with("openai", "o").with("google", "g"),
            &[],
        );
        let mut pricing = PricingTable::empty();
        pricing.set_pricing("gpt-4o-mini", 0.5, 1.0);
        pricing.set_pricing("gemini-3-flash-preview", 0.5, 1.0);
        let names: Vec<String> = ProviderSelector::new(&config, &credentials, &pricing)
            .candidates()
            .into_iter()
            .map(|c| c.provider.name)
            .collect();
        assert_eq!(names, vec!["openai", "google"]);
    }

    #[test]
    fn test_auto_excludes_ollama() {
        let config = config("auto");
        let credentials = resolver(MemoryStore::new().with("ollama", "unused"), &[]);
        let pricing = PricingTable::default();
        let selector = ProviderSelector::new(&config, &credentials, &pricing);
        assert!(selector.candidates().is_empty());
        assert!(matches!(selector.select(), Err(ProviderError::NoCandidates)));
        assert_eq!(selector.auto_model_name(), None);
    }

    #[test]
    fn test_direct_missing_credential() {
        let config = config("anthropic");
        let credentials = resolver(MemoryStore::new(), &[]);
        let pricing = PricingTable::default();
        let err = ProviderSelector::new(&config, &credentials, &pricing)
            .select()
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ProviderError::MissingCredential { ref provider, .. } if provider == "anthropic"
        ));
    }

    #[test]
    fn test_direct_unknown_provider() {
        let config = config("nope");
        let credentials = resolver(MemoryStore::new(), &[]);
        let pricing = PricingTable::default();
        let err = ProviderSelector::new(&config, &credentials, &pricing)
            .select()
            .err()
            .unwrap();
        assert!(matches!(err, ProviderError::UnknownProvider { .. }));
    }

    #[test]
    fn test_direct_ollama_needs_no_credential() {
        let config = config("ollama");
        let credentials = resolver(MemoryStore::new(), &[]);
        let pricing = PricingTable::default();
        let selection = ProviderSelector::new(&config, &credentials, &pricing)
            .select()
            .unwrap();
        assert_eq!(selection.adapter.protocol(), Protocol::Ollama);
        assert_eq!(selection.credential_source, CredentialSource::None);
    }

    #[test]
    fn test_direct_purely_custom_is_openai_compatible() {
        let mut config = config("together");
        config.custom.insert(
            "together".to_string(),
            ProviderConfig {
                model: Some("llama-70b".to_string()),
                url: Some("https://api.together.xyz/v1".to_string()),
                env_var: Some("TOGETHER_API_KEY".to_string()),
            },
        );
        let credentials = resolver(MemoryStore::new(), &[("TOGETHER_API_KEY", "tok")]);
        let pricing = PricingTable::default();
        let selection = ProviderSelector::new(&config, &credentials, &pricing)
            .select()
            .unwrap();
        assert_eq!(selection.adapter.protocol(), Protocol::OpenAi);
        assert!(selection.provider.needs_auth);
        assert_eq!(selection.adapter.id(), "together");
    }
}
