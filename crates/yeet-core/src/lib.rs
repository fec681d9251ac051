//! # yeet-core
//!
//! Provider resolution building blocks for yeet.
//!
//! This crate provides:
//! - The static provider registry
//! - The configuration file and its three-layer provider merge
//! - Credential lookup (keyring, environment, imported credentials)
//! - The system prompt store and the per-call `CommitContext`
//! - The error taxonomy shared by every provider

pub mod config;
pub mod context;
pub mod credentials;
pub mod error;
pub mod paths;
pub mod prompt;
pub mod registry;

pub use config::{Config, PricingOverride, ProviderConfig, ResolvedProvider, ValidationIssue, AUTO_PROVIDER};
pub use context::CommitContext;
pub use credentials::{Credential, CredentialResolver, CredentialSource, KeyStatus, KeyringStore, MemoryStore, SecretStore};
pub use error::{Error, ProviderError, Result};
pub use registry::{Protocol, ProviderEntry};
