//! # yeet-providers
//!
//! LLM provider layer for yeet.
//!
//! This crate provides:
//! - Provider trait with blocking and token-streaming generation
//! - Adapters for the Anthropic Messages, OpenAI Chat Completions and Ollama chat protocols
//! - SSE and NDJSON stream framing
//! - Provider selection, including cheapest-available `auto` mode
//! - Usage accounting and pricing

pub mod adapter;
pub mod anthropic;
pub mod engine;
pub mod http;
pub mod models;
pub mod ollama;
pub mod openai;
pub mod pricing;
pub mod selector;
pub mod sse;
pub mod stream;
pub mod traits;

pub use adapter::Adapter;
pub use anthropic::AnthropicProvider;
pub use engine::Engine;
pub use models::fetch_models;
pub use ollama::OllamaProvider;
pub use openai::OpenAIProvider;
pub use pricing::{ModelPricing, PricingTable, Usage};
pub use selector::{Candidate, ProviderSelector, Selection};
pub use traits::{Generation, Provider, TokenSink};
