//! Listing the models a provider serves.

use serde::Deserialize;
use tracing::{debug, instrument};

use yeet_core::{Credential, Protocol, ProviderError, ResolvedProvider};

use crate::anthropic::ANTHROPIC_VERSION;
use crate::http::{self, Deadline, LIST_TIMEOUT};

/// Ask the provider which models it serves. Names are sorted.
#[instrument(skip(provider, credential), fields(provider = %provider.name))]
pub async fn fetch_models(
    provider: &ResolvedProvider,
    credential: &Credential,
) -> Result<Vec<String>, ProviderError> {
    let client = http::client();
    let name = provider.name.as_str();

    let mut models = match provider.protocol {
        Protocol::Anthropic => {
            let request = client
                .get(format!("{}/models?limit=100", provider.url))
                .header("x-api-key", credential.expose())
                .header("anthropic-version", ANTHROPIC_VERSION);
            let response = http::send(name, request, Deadline::Total(LIST_TIMEOUT)).await?;
            let list: ModelList = http::read_json(name, response).await?;
            list.data.into_iter().map(|m| m.id).collect::<Vec<_>>()
        }
        Protocol::OpenAi => {
            let mut request = client.get(format!("{}/models", provider.url));
            if let Some(key) = credential.value().filter(|_| provider.needs_auth) {
                request = request.bearer_auth(key);
            }
            let response = http::send(name, request, Deadline::Total(LIST_TIMEOUT)).await?;
            let list: ModelList = http::read_json(name, response).await?;
            list.data.into_iter().map(|m| m.id).collect()
        }
        Protocol::Ollama => {
            let request = client.get(format!("{}/api/tags", provider.url));
            let response = http::send(name, request, Deadline::Total(LIST_TIMEOUT)).await?;
            let tags: OllamaTags = http::read_json(name, response).await?;
            tags.models
                .into_iter()
                .map(|m| m.name.trim_end_matches(":latest").to_string())
                .collect()
        }
    };

    models.sort();
    models.dedup();
    debug!(count = models.len(), "fetched models");
    Ok(models)
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct OllamaTags {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
}
