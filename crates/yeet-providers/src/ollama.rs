//! Local model provider (Ollama) implementation.
//!
//! Uses the native `/api/chat` endpoint, which streams newline-delimited
//! JSON objects rather than SSE.

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use yeet_core::{CommitContext, ProviderError, ResolvedProvider};

use crate::http::{self, Deadline, REQUEST_TIMEOUT};
use crate::pricing::Usage;
use crate::sse::{self, StreamFault};
use crate::stream::StreamSession;
use crate::traits::{Generation, Provider, TokenSink};

/// Local provider for Ollama models.
pub struct OllamaProvider {
    name: String,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    /// Create a provider for the Ollama server at `base_url` (e.g. `http://localhost:11434`).
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            name: "ollama".to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    /// Create from a merged provider record.
    pub fn from_resolved(provider: &ResolvedProvider) -> Self {
        let mut ollama = Self::new(&provider.url, &provider.model);
        ollama.name = provider.name.clone();
        ollama
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
        }
    }

    fn post(&self, body: &ChatRequest<'_>) -> RequestBuilder {
        http::client()
            .post(format!("{}/api/chat", self.base_url))
            .json(body)
    }

    fn unreachable(&self, err: ProviderError) -> ProviderError {
        match err {
            ProviderError::Transport { provider, message } => ProviderError::Transport {
                provider,
                message: format!("{} (is Ollama running at {}?)", message, self.base_url),
            },
            other => other,
        }
    }
}

#[async_trait]
impl Provider for OllamaProvider {
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

        debug!("Sending request to Ollama");
        let response = http::send(&self.name, self.post(&body), Deadline::Total(REQUEST_TIMEOUT))
            .await
            .map_err(|e| self.unreachable(e))?;
        let status = response.status().as_u16();
        let api_response: ChatResponse = http::read_json(&self.name, response).await?;

        if let Some(message) = api_response.error.filter(|e| !e.is_empty()) {
            return Err(ProviderError::protocol(&self.name, status, Some(message)));
        }

        let text = api_response
            .message
            .map(|m| m.content)
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
                input_tokens: api_response.prompt_eval_count,
                output_tokens: api_response.eval_count,
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

        debug!("Sending streaming request to Ollama");
        let response = http::send(&self.name, self.post(&body), Deadline::Open)
            .await
            .map_err(|e| self.unreachable(e))?;
        let status = response.status().as_u16();

        let mut session = StreamSession::new(&self.name, &self.model, on_token);
        let outcome = sse::for_each_line(response.bytes_stream(), |line| {
            handle_line(&mut session, status, line)
        })
        .await;

        match outcome {
            Ok(()) => session.finish(),
            Err(StreamFault::Read(message)) => Err(session.read_failed(message)),
            Err(StreamFault::Handler(err)) => Err(session.abort(err)),
        }
    }
}

/// Apply one NDJSON line to the session. Lines that are not valid JSON are skipped.
fn handle_line(
    session: &mut StreamSession<'_>,
    status: u16,
    line: &str,
) -> Result<(), ProviderError> {
    session.record_event();

    let chunk: ChatResponse = match serde_json::from_str(line) {
        Ok(chunk) => chunk,
        Err(e) => {
            debug!("Skipping malformed Ollama line: {}", e);
            return Ok(());
        }
    };

    if let Some(message) = chunk.error.filter(|e| !e.is_empty()) {
        return Err(ProviderError::protocol(
            session.provider(),
            status,
            Some(message),
        ));
    }
    if let Some(message) = chunk.message {
        session.push_token(&message.content);
    }
    if chunk.done {
        session.set_input_tokens(chunk.prompt_eval_count);
        session.set_output_tokens(chunk.eval_count);
    }
    Ok(())
}

// Ollama-specific types

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Both the blocking answer and each streamed line.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<ChatMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}
