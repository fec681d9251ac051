//! Shared HTTP client and request plumbing.
//!
//! One client serves the whole process so connections and TLS sessions are
//! reused. Connect (including the TLS handshake) is bounded by the client;
//! the wait for response headers and the blocking-call deadline are applied
//! per request.

use std::time::Duration;

use once_cell::sync::OnceCell;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, error, warn};

use yeet_core::ProviderError;

/// TCP connect plus TLS handshake.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Time allowed between sending a request and receiving its headers.
pub const RESPONSE_HEADER_TIMEOUT: Duration = Duration::from_secs(15);

/// Total deadline for a non-streaming generation.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Total deadline for model listing.
pub const LIST_TIMEOUT: Duration = Duration::from_secs(5);

static CLIENT: OnceCell<Client> = OnceCell::new();

/// The process-wide client.
pub fn client() -> &'static Client {
    CLIENT.get_or_init(|| {
        Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("yeet/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client, using defaults: {}", e);
                Client::new()
            })
    })
}

/// How long the whole exchange may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    /// Fixed total deadline, body included
    Total(Duration),
    /// No total deadline; the caller reads until the stream ends or is dropped
    Open,
}

/// Send `request` and return the response once a 2xx status is seen.
///
/// Non-2xx answers are read once and turned into `ProviderError::Protocol`.
pub async fn send(
    provider: &str,
    request: RequestBuilder,
    deadline: Deadline,
) -> Result<Response, ProviderError> {
    send_within(provider, request, deadline, RESPONSE_HEADER_TIMEOUT).await
}

/// [`send`] with an explicit wait for the response headers.
pub async fn send_within(
    provider: &str,
    request: RequestBuilder,
    deadline: Deadline,
    header_timeout: Duration,
) -> Result<Response, ProviderError> {
    let request = match deadline {
        Deadline::Total(total) => request.timeout(total),
        Deadline::Open => request,
    };

    let response = match tokio::time::timeout(header_timeout, request.send()).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => return Err(transport_error(provider, &e)),
        Err(_) => {
            return Err(ProviderError::transport(
                provider,
                format!("no response within {:.1}s", header_timeout.as_secs_f64()),
            ))
        }
    };

    let status = response.status();
    debug!(provider, status = status.as_u16(), "response headers received");
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    error!("{} API error: {} - {}", provider, status, body);
    Err(ProviderError::protocol(
        provider,
        status.as_u16(),
        error_message(&body),
    ))
}

/// Read the whole body and decode it as JSON.
pub async fn read_json<T: DeserializeOwned>(
    provider: &str,
    response: Response,
) -> Result<T, ProviderError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| transport_error(provider, &e))?;
    serde_json::from_slice(&bytes).map_err(|e| ProviderError::parse(provider, e.to_string()))
}

/// Map a reqwest failure to `ProviderError::Transport`.
pub fn transport_error(provider: &str, e: &reqwest::Error) -> ProviderError {
    let message = if e.is_timeout() {
        format!("timed out: {}", e)
    } else if e.is_connect() {
        format!("could not connect: {}", e)
    } else {
        e.to_string()
    };
    ProviderError::transport(provider, message)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    /// `{"error": {"message": "..."}}` (Anthropic, OpenAI and compatibles)
    Nested { error: ErrorDetail },
    /// `{"error": "..."}` (Ollama)
    Flat { error: String },
    /// `{"message": "..."}`
    Bare { message: String },
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

/// Human-readable message from an error body, when it has one.
pub fn error_message(body: &str) -> Option<String> {
    let message = match serde_json::from_str::<ErrorBody>(body).ok()? {
        ErrorBody::Nested { error } => error.message,
        ErrorBody::Flat { error } => Some(error),
        ErrorBody::Bare { message } => Some(message),
    }?;
    let message = message.trim();
    (!message.is_empty()).then(|| message.to_string())
}
