//! API credential lookup.
//!
//! Keys are looked up in strict order: the platform keyring, the provider's
//! environment variable, then the opencode `auth.json` file. Read faults in
//! any source count as "not found".

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::paths;

/// Keyring service identifier.
pub const SERVICE: &str = "yeet";

/// Get/set/delete access to a secret store keyed by provider name.
pub trait SecretStore: Send + Sync {
    /// Read a secret. `Ok(None)` when there is no entry.
    fn get(&self, provider: &str) -> Result<Option<String>>;

    /// Store or replace a secret.
    fn set(&self, provider: &str, secret: &str) -> Result<()>;

    /// Remove a secret. Returns whether an entry existed.
    fn delete(&self, provider: &str) -> Result<bool>;
}

/// Platform keyring (macOS Keychain, Windows Credential Manager, Secret Service
/// behind a keyutils cache on Linux).
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, provider: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, provider).map_err(|e| Error::Credential(e.to_string()))
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretStore for KeyringStore {
    fn get(&self, provider: &str) -> Result<Option<String>> {
        match self.entry(provider)?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(Error::Credential(e.to_string())),
        }
    }

    fn set(&self, provider: &str, secret: &str) -> Result<()> {
        self.entry(provider)?
            .set_password(secret)
            .map_err(|e| Error::Credential(e.to_string()))?;
        debug!(provider, "stored API key in keyring");
        Ok(())
    }

    fn delete(&self, provider: &str) -> Result<bool> {
        match self.entry(provider)?.delete_credential() {
            Ok(()) => {
                debug!(provider, "deleted API key from keyring");
                Ok(true)
            }
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(Error::Credential(e.to_string())),
        }
    }
}

/// In-process secret store.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an entry.
    pub fn with(self, provider: &str, secret: &str) -> Self {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(provider.to_string(), secret.to_string());
        }
        self
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| Error::Credential("memory store poisoned".to_string()))
    }
}

impl SecretStore for MemoryStore {
    fn get(&self, provider: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(provider).cloned())
    }

    fn set(&self, provider: &str, secret: &str) -> Result<()> {
        self.lock()?.insert(provider.to_string(), secret.to_string());
        Ok(())
    }

    fn delete(&self, provider: &str) -> Result<bool> {
        Ok(self.lock()?.remove(provider).is_some())
    }
}

/// Where a credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Keyring,
    Environment,
    /// opencode's `auth.json`
    ImportedStore,
    None,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CredentialSource::Keyring => "keyring",
            CredentialSource::Environment => "env",
            CredentialSource::ImportedStore => "opencode",
            CredentialSource::None => "none",
        })
    }
}

/// A secret plus its provenance. The source is `None` exactly when the value is empty.
#[derive(Clone)]
pub struct Credential {
    value: SecretString,
    source: CredentialSource,
}

impl Credential {
    /// Wrap a found value; an empty value becomes [`Credential::none`].
    pub fn new(value: impl Into<String>, source: CredentialSource) -> Self {
        let value = value.into();
        if value.is_empty() || source == CredentialSource::None {
            return Self::none();
        }
        Self {
            value: SecretString::from(value),
            source,
        }
    }

    pub fn none() -> Self {
        Self {
            value: SecretString::from(String::new()),
            source: CredentialSource::None,
        }
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    pub fn is_present(&self) -> bool {
        self.source != CredentialSource::None
    }

    /// The raw secret. Only call this when building a request.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    /// The secret, or `None` when absent.
    pub fn value(&self) -> Option<&str> {
        self.is_present().then(|| self.expose())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential([REDACTED], {})", self.source)
    }
}

/// Whether a key was found for a provider, and where.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyStatus {
    pub found: bool,
    pub source: CredentialSource,
}

#[derive(Debug, Deserialize)]
struct ImportedEntry {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    key: String,
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Best-effort, read-only credential lookup chain.
pub struct CredentialResolver {
    store: Box<dyn SecretStore>,
    env: EnvLookup,
    imported_path: Option<PathBuf>,
}

impl CredentialResolver {
    /// Resolver over `store`, the process environment and the default
    /// imported-credentials location.
    pub fn new(store: Box<dyn SecretStore>) -> Self {
        Self {
            store,
            env: Box::new(|name| std::env::var(name).ok()),
            imported_path: paths::imported_credentials_file().ok(),
        }
    }

    /// Resolver backed by the platform keyring.
    pub fn system() -> Self {
        Self::new(Box::new(KeyringStore::new()))
    }

    /// Replace environment variable lookup.
    pub fn with_env_lookup(
        mut self,
        lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.env = Box::new(lookup);
        self
    }

    /// Replace the imported-credentials file location. `None` disables it.
    pub fn with_imported_path(mut self, path: Option<PathBuf>) -> Self {
        self.imported_path = path;
        self
    }

    /// The underlying secret store, for write operations.
    pub fn store(&self) -> &dyn SecretStore {
        self.store.as_ref()
    }

    /// Find a key for `provider`, first hit wins.
    pub fn resolve(&self, provider: &str, env_var: Option<&str>) -> Credential {
        match self.store.get(provider) {
            Ok(Some(secret)) if !secret.is_empty() => {
                debug!(provider, "found API key in keyring");
                return Credential::new(secret, CredentialSource::Keyring);
            }
            Ok(_) => {}
            Err(e) => debug!(provider, error = %e, "keyring lookup failed, treating as not found"),
        }

        if let Some(var) = env_var.filter(|v| !v.is_empty()) {
            if let Some(secret) = (self.env)(var).filter(|s| !s.is_empty()) {
                debug!(provider, env_var = var, "found API key in environment");
                return Credential::new(secret, CredentialSource::Environment);
            }
        }

        if let Some(secret) = self.read_imported().remove(provider) {
            debug!(provider, "found API key in imported credentials");
            return Credential::new(secret, CredentialSource::ImportedStore);
        }

        Credential::none()
    }

    /// Providers with an API-type key in the imported-credentials file, sorted.
    pub fn list_imported_providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read_imported().into_keys().collect();
        names.sort();
        names
    }

    /// Key status for each provider, using `envs` for environment variable names.
    pub fn status(
        &self,
        providers: &[String],
        envs: &BTreeMap<String, String>,
    ) -> BTreeMap<String, KeyStatus> {
        providers
            .iter()
            .map(|p| {
                let credential = self.resolve(p, envs.get(p).map(String::as_str));
                let status = KeyStatus {
                    found: credential.is_present(),
                    source: credential.source(),
                };
                (p.clone(), status)
            })
            .collect()
    }

    fn read_imported(&self) -> HashMap<String, String> {
        let Some(path) = self.imported_path.as_ref() else {
            return HashMap::new();
        };
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no imported credentials");
                return HashMap::new();
            }
        };
        let entries: HashMap<String, ImportedEntry> = match serde_json::from_str(&data) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "malformed imported credentials");
                return HashMap::new();
            }
        };
        entries
            .into_iter()
            .filter(|(_, e)| e.kind == "api" && !e.key.is_empty())
            .map(|(name, e)| (name, e.key))
            .collect()
    }
}
