//! Anthropic (Claude) provider implementation.

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use yeet_core::{CommitContext, Credential, ProviderError, ResolvedProvider};

use crate::http::{self, Deadline, REQUEST_TIMEOUT};
use crate::pricing::Usage;
use crate::sse::{self, SseEvent, StreamFault};
use crate::stream::StreamSession;
use crate::traits::{Generation, Provider, TokenSink};

/// Current Anthropic API version.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API provider.
pub struct AnthropicProvider {
    name: String,
    base_url: String,
    model: String,
    credential: Credential,
}

impl AnthropicProvider {
    /// Create a provider talking to `base_url` (e.g. `https://api.anthropic.com/v1`).
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, credential: Credential) -> Self {
        let base_url: String = base_url.into();
        Self {
            name: "anthropic".to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            credential,
        }
    }

    /// Create from a merged provider record.
    pub fn from_resolved(provider: &ResolvedProvider, credential: Credential) -> Self {
        Self::new(&provider.url, &provider.model, credential).with_name(&provider.name)
    }

    /// Set the provider name used in errors.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn request_body<'a>(
        &'a self,
        ctx: &'a CommitContext,
        user_message: &'a str,
        stream: bool,
    ) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.model,
            max_tokens: ctx.effective_max_tokens(),
            system: ctx.effective_prompt(),
            messages: vec![WireMessage {
                role: "user",
                content: user_message,
            }],
            stream,
        }
    }

    fn post(&self, body: &MessagesRequest<'_>) -> RequestBuilder {
        http::client()
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", self.credential.expose())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body)
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn id(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    #[instrument(skip(self, ctx), fields(provider = %self.name, model = %self.model))]
    async fn generate(&self, ctx: &CommitContext) -> Result<Generation, ProviderError> {
        let user_message = ctx.user_message();
        let body = self.request_body(ctx, &user_message, false);

        debug!("Sending request to Anthropic API");
        let response = http::send(&self.name, self.post(&body), Deadline::Total(REQUEST_TIMEOUT)).await?;
        let api_response: MessagesResponse = http::read_json(&self.name, response).await?;

        let text = api_response
            .content
            .into_iter()
            .next()
            .and_then(|block| block.text)
            .unwrap_or_default();
        let text = text.trim();
        if text.is_empty() {
            return Err(ProviderError::EmptyResponse {
                provider: self.name.clone(),
            });
        }

        Ok(Generation {
            text: text.to_string(),
            usage: Usage {
                model: self.model.clone(),
                input_tokens: api_response.usage.input_tokens,
                output_tokens: api_response.usage.output_tokens,
            },
        })
    }

    #[instrument(skip(self, ctx, on_token), fields(provider = %self.name, model = %self.model))]
    async fn generate_streaming(
        &self,
        ctx: &CommitContext,
        on_token: TokenSink<'_>,
    ) -> Result<Generation, ProviderError> {
        let user_message = ctx.user_message();
        let body = self.request_body(ctx, &user_message, true);

        debug!("Sending streaming request to Anthropic API");
        let response = http::send(&self.name, self.post(&body), Deadline::Open).await?;
        let status = response.status().as_u16();

        let mut session = StreamSession::new(&self.name, &self.model, on_token);
        let outcome = sse::for_each_event(response.bytes_stream(), |event| {
            handle_event(&mut session, status, &event)
        })
        .await;

        match outcome {
            Ok(()) => session.finish(),
            Err(StreamFault::Read(message)) => Err(session.read_failed(message)),
            Err(StreamFault::Handler(err)) => Err(session.abort(err)),
        }
    }
}

/// Apply one stream event to the session.
fn handle_event(
    session: &mut StreamSession<'_>,
    status: u16,
    event: &SseEvent,
) -> Result<(), ProviderError> {
    session.record_event();

    let kind = match &event.event {
        Some(name) => name.clone(),
        None => serde_json::from_str::<TypeTag>(&event.data)
            .map(|tag| tag.kind)
            .unwrap_or_default(),
    };

    match kind.as_str() {
        "message_start" => {
            let start: MessageStart = decode(session.provider(), &event.data)?;
            if let Some(usage) = start.message.usage {
                session.set_input_tokens(usage.input_tokens);
            }
        }
        "content_block_delta" => {
            let delta: ContentBlockDelta = decode(session.provider(), &event.data)?;
            if let Some(text) = delta.delta.text {
                session.push_token(&text);
            }
        }
        "message_delta" => {
            let delta: MessageDelta = decode(session.provider(), &event.data)?;
            if let Some(usage) = delta.usage {
                session.set_output_tokens(usage.output_tokens);
            }
        }
        "error" => {
            let failure: StreamError = decode(session.provider(), &event.data)?;
            return Err(ProviderError::protocol(
                session.provider(),
                status,
                failure.error.message,
            ));
        }
        _ => {} // ping, content_block_start/stop, message_stop
    }
    Ok(())
}

fn decode<T: DeserializeOwned>(provider: &str, data: &str) -> Result<T, ProviderError> {
    serde_json::from_str(data)
        .map_err(|e| ProviderError::parse(provider, format!("invalid stream event: {}", e)))
}

// Anthropic API types

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

// Streaming event types

#[derive(Debug, Deserialize)]
struct TypeTag {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct MessageStart {
    message: StartMessage,
}

#[derive(Debug, Deserialize)]
struct StartMessage {
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlockDelta {
    delta: ContentDelta,
}

#[derive(Debug, Deserialize)]
struct ContentDelta {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageDelta {
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    error: StreamErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StreamErrorDetail {
    #[serde(default)]
    message: Option<String>,
}
