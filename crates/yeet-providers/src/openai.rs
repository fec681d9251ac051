//! OpenAI Chat Completions provider.
//!
//! Also serves every OpenAI-compatible endpoint in the registry (Google,
//! Groq, OpenRouter, Mistral) and user-defined custom providers.

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use yeet_core::{CommitContext, Credential, ProviderError, ResolvedProvider};

use crate::http::{self, Deadline, REQUEST_TIMEOUT};
use crate::pricing::Usage;
use crate::sse::{self, SseEvent, StreamFault};
use crate::stream::StreamSession;
use crate::traits::{Generation, Provider, TokenSink};

/// OpenAI-compatible provider.
pub struct OpenAIProvider {
    name: String,
    base_url: String,
    model: String,
    credential: Credential,
}

impl OpenAIProvider {
    /// Create a provider talking to `base_url` (e.g. `https://api.openai.com/v1`).
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, credential: Credential) -> Self {
        let base_url: String = base_url.into();
        Self {
            name: "openai".to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            credential,
        }
    }

    /// Create from a merged provider record. The key is only sent when the
    /// provider requires auth.
    pub fn from_resolved(provider: &ResolvedProvider, credential: Credential) -> Self {
        let credential = if provider.needs_auth {
            credential
        } else {
            Credential::none()
        };
        Self::new(&provider.url, &provider.model, credential).with_name(&provider.name)
    }

    /// Set the provider name used in errors (for OpenRouter, Groq, etc.).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn request_body<'a>(
        &'a self,
        ctx: &'a CommitContext,
        user_message: &'a str,
        stream: bool,
    ) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                WireMessage {
                    role: "system",
                    content: ctx.effective_prompt(),
                },
                WireMessage {
                    role: "user",
                    content: user_message,
                },
            ],
            stream,
            stream_options: stream.then_some(StreamOptions {
                include_usage: true,
            }),
        }
    }

    fn post(&self, body: &ChatRequest<'_>) -> RequestBuilder {
        let request = http::client()
            .post(format!("{}/chat/completions", self.base_url))
            .json(body);
        match self.credential.value() {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl Provider for OpenAIProvider {
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

        debug!("Sending request to OpenAI-compatible API");
        let response = http::send(&self.name, self.post(&body), Deadline::Total(REQUEST_TIMEOUT)).await?;
        let api_response: ChatResponse = http::read_json(&self.name, response).await?;

        let text = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .unwrap_or_default();
        let text = text.trim();
        if text.is_empty() {
            return Err(ProviderError::EmptyResponse {
                provider: self.name.clone(),
            });
        }

        let usage = api_response.usage.unwrap_or_default();
        Ok(Generation {
            text: text.to_string(),
            usage: Usage {
                model: self.model.clone(),
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
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

        debug!("Sending streaming request to OpenAI-compatible API");
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

/// Apply one stream chunk to the session.
fn handle_event(
    session: &mut StreamSession<'_>,
    status: u16,
    event: &SseEvent,
) -> Result<(), ProviderError> {
    session.record_event();
    if event.is_done() {
        return Ok(());
    }

    let chunk: ChatChunk = serde_json::from_str(&event.data).map_err(|e| {
        ProviderError::parse(session.provider(), format!("invalid stream chunk: {}", e))
    })?;

    if let Some(error) = chunk.error {
        return Err(ProviderError::protocol(
            session.provider(),
            status,
            error.message,
        ));
    }
    if let Some(content) = chunk
        .choices
        .first()
        .and_then(|choice| choice.delta.as_ref())
        .and_then(|delta| delta.content.as_deref())
    {
        session.push_token(content);
    }
    if let Some(usage) = chunk.usage {
        session.set_input_tokens(usage.prompt_tokens);
        session.set_output_tokens(usage.completion_tokens);
    }
    Ok(())
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAIUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
    #[serde(default)]
    error: Option<ChunkError>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkError {
    #[serde(default)]
    message: Option<String>,
}
