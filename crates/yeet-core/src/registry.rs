//! Static table of known LLM providers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Wire protocol spoken by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Anthropic Messages API
    Anthropic,
    /// OpenAI Chat Completions and compatibles
    OpenAi,
    /// Ollama chat API
    Ollama,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Anthropic => "anthropic",
            Protocol::OpenAi => "openai",
            Protocol::Ollama => "ollama",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compile-time defaults for one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderEntry {
    pub name: &'static str,
    pub default_model: &'static str,
    pub default_url: &'static str,
    /// Environment variable holding the API key, if the provider takes one
    pub default_env_var: Option<&'static str>,
    pub protocol: Protocol,
    pub needs_auth: bool,
}

/// Providers with typed slots in the config file. Always listed first.
pub const BUILTIN_PROVIDERS: [&str; 3] = ["anthropic", "openai", "ollama"];

const REGISTRY: &[ProviderEntry] = &[
    ProviderEntry {
        name: "anthropic",
        default_model: "claude-haiku-4-5-20251001",
        default_url: "https://api.anthropic.com/v1",
        default_env_var: Some("ANTHROPIC_API_KEY"),
        protocol: Protocol::Anthropic,
        needs_auth: true,
    },
    ProviderEntry {
        name: "openai",
        default_model: "gpt-4o-mini",
        default_url: "https://api.openai.com/v1",
        default_env_var: Some("OPENAI_API_KEY"),
        protocol: Protocol::OpenAi,
        needs_auth: true,
    },
    ProviderEntry {
        name: "ollama",
        default_model: "llama3",
        default_url: "http://localhost:11434",
        default_env_var: None,
        protocol: Protocol::Ollama,
        needs_auth: false,
    },
    ProviderEntry {
        name: "google",
        default_model: "gemini-3-flash-preview",
        default_url: "https://generativelanguage.googleapis.com/v1beta/openai",
        default_env_var: Some("GOOGLE_API_KEY"),
        protocol: Protocol::OpenAi,
        needs_auth: true,
    },
    ProviderEntry {
        name: "groq",
        default_model: "llama-3.3-70b-versatile",
        default_url: "https://api.groq.com/openai/v1",
        default_env_var: Some("GROQ_API_KEY"),
        protocol: Protocol::OpenAi,
        needs_auth: true,
    },
    ProviderEntry {
        name: "openrouter",
        default_model: "openrouter/auto",
        default_url: "https://openrouter.ai/api/v1",
        default_env_var: Some("OPENROUTER_API_KEY"),
        protocol: Protocol::OpenAi,
        needs_auth: true,
    },
    ProviderEntry {
        name: "mistral",
        default_model: "mistral-small-latest",
        default_url: "https://api.mistral.ai/v1",
        default_env_var: Some("MISTRAL_API_KEY"),
        protocol: Protocol::OpenAi,
        needs_auth: true,
    },
];

/// Look up a provider by its lowercase name.
pub fn lookup(name: &str) -> Option<&'static ProviderEntry> {
    REGISTRY.iter().find(|e| e.name == name)
}

/// All registry names, built-ins first.
pub fn names() -> impl Iterator<Item = &'static str> {
    REGISTRY.iter().map(|e| e.name)
}

/// Whether `name` has a typed slot in the config file.
pub fn is_builtin(name: &str) -> bool {
    BUILTIN_PROVIDERS.contains(&name)
}

/// Model suggestions shown when a provider cannot be asked for its list.
pub fn known_models(provider: &str) -> &'static [&'static str] {
    match provider {
        "anthropic" => &[
            "claude-haiku-4-5-20251001",
            "claude-sonnet-4-6",
            "claude-opus-4-6",
        ],
        "openai" => &[
            "gpt-4.1-nano",
            "gpt-4o-mini",
            "gpt-4.1-mini",
            "gpt-4.1",
            "gpt-4o",
            "o4-mini",
        ],
        "google" => &["gemini-2.5-flash", "gemini-3-flash-preview"],
        "groq" => &[
            "llama-3.1-8b-instant",
            "llama-3.3-70b-versatile",
            "openai/gpt-oss-20b",
        ],
        "mistral" => &[
            "mistral-small-latest",
            "codestral-latest",
            "mistral-large-latest",
        ],
        "ollama" => &["llama3", "qwen2.5-coder", "mistral"],
        "openrouter" => &["openrouter/auto"],
        _ => &[],
    }
}
