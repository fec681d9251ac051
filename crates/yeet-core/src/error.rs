//! Error types for yeet.
//!
//! `ProviderError` is the taxonomy surfaced by provider resolution and
//! generation. Every variant is matchable so the CLI can decide whether to
//! offer setup, fall back to manual input, or abort.

use thiserror::Error;

/// Result type alias using the crate-level `Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for yeet.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration could not be read or written
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider resolution or generation error
    #[error("{0}")]
    Provider(#[from] ProviderError),

    /// Credential store write failure
    #[error("Credential store error: {0}")]
    Credential(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No home directory to anchor config and data paths
    #[error("could not determine home directory")]
    NoHomeDir,
}

impl Error {
    /// Get a recovery suggestion for this error.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Error::Config(_) => Some("Check your config file, or run: yeet config edit"),
            Error::Provider(e) => e.recovery_suggestion(),
            Error::Credential(_) => {
                Some("Check that the platform keyring is unlocked, or export the API key instead")
            }
            Error::NoHomeDir => Some("Set HOME or XDG_CONFIG_HOME"),
            _ => None,
        }
    }
}

impl From<figment::Error> for Error {
    fn from(e: figment::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Config(e.to_string())
    }
}

/// Errors raised while resolving a provider or generating text.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Name is neither in the registry nor in the custom map
    #[error("unknown provider: {provider} — add it to [custom.{provider}] in config.toml")]
    UnknownProvider { provider: String },

    /// Known provider whose merged record is unusable
    #[error("provider {provider} has no {field} configured")]
    IncompleteProvider {
        provider: String,
        field: &'static str,
    },

    /// Provider needs auth and no credential was found
    #[error("{provider} API key not found — run: yeet auth set {provider}")]
    MissingCredential {
        provider: String,
        env_var: Option<String>,
    },

    /// Auto mode found no credentialed candidate
    #[error("no API key found for any provider — run: yeet auth set <provider>")]
    NoCandidates,

    /// DNS, connect, TLS, timeout or deadline failure
    #[error("request to {provider} failed: {message}")]
    Transport { provider: String, message: String },

    /// Non-2xx answer from the remote
    #[error("{provider} API error ({status}){}", message.as_ref().map(|m| format!(": {m}")).unwrap_or_default())]
    Protocol {
        provider: String,
        status: u16,
        message: Option<String>,
    },

    /// Successful HTTP exchange with a malformed body or event
    #[error("failed to parse {provider} response: {message}")]
    Parse { provider: String, message: String },

    /// Well-formed answer carrying no text
    #[error("empty response from {provider}")]
    EmptyResponse { provider: String },

    /// I/O failure after the stream produced at least one event
    #[error("stream from {provider} broke off: {message}")]
    StreamRead { provider: String, message: String },
}

impl ProviderError {
    /// Get a recovery suggestion for this error.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            ProviderError::UnknownProvider { .. } => {
                Some("Run 'yeet doctor' to list known providers")
            }
            ProviderError::IncompleteProvider { .. } => {
                Some("Add the missing field to the [custom] entry in config.toml")
            }
            ProviderError::MissingCredential {
                env_var: Some(_), ..
            } => Some("Export the API key environment variable or store it with 'yeet auth set'"),
            ProviderError::MissingCredential { .. } | ProviderError::NoCandidates => {
                Some("Store an API key with 'yeet auth set <provider>'")
            }
            ProviderError::Protocol { status: 401 | 403, .. } => {
                Some("Check that your API key is valid and not expired")
            }
            ProviderError::Protocol { status: 404, .. } => {
                Some("Check the model name with 'yeet models'")
            }
            ProviderError::Protocol { status: 429, .. } => {
                Some("You've hit rate limits. Wait a moment and try again")
            }
            ProviderError::Protocol {
                status: 500..=599, ..
            } => Some("The API service is having issues. Try again later"),
            ProviderError::Transport { .. } | ProviderError::StreamRead { .. } => {
                Some("Check your network connection and the provider URL")
            }
            _ => None,
        }
    }

    /// Create a protocol error from a status code and optional message.
    pub fn protocol(provider: impl Into<String>, status: u16, message: Option<String>) -> Self {
        ProviderError::Protocol {
            provider: provider.into(),
            status,
            message,
        }
    }

    /// Create a transport error.
    pub fn transport(provider: impl Into<String>, message: impl Into<String>) -> Self {
        ProviderError::Transport {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a parse error.
    pub fn parse(provider: impl Into<String>, message: impl Into<String>) -> Self {
        ProviderError::Parse {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// True when nothing was sent because the provider could not be set up.
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            ProviderError::UnknownProvider { .. }
                | ProviderError::IncompleteProvider { .. }
                | ProviderError::MissingCredential { .. }
                | ProviderError::NoCandidates
        )
    }
}

/// Format an error with its recovery suggestion.
pub fn format_error_with_suggestion(error: &Error) -> String {
    let mut output = error.to_string();
    if let Some(suggestion) = error.recovery_suggestion() {
        output.push_str(&format!("\n  Suggestion: {}", suggestion));
    }
    output
}
