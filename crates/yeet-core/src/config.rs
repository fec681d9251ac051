//! Configuration file and provider resolution.
//!
//! A provider record is built by overlaying three layers, field by field:
//! registry defaults, the typed slot for the three built-in names, and the
//! `[custom.<name>]` table. Empty strings never override a lower layer.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ProviderError, Result};
use crate::paths;
use crate::registry::{self, Protocol, BUILTIN_PROVIDERS};

/// Sentinel for cheapest-available selection.
pub const AUTO_PROVIDER: &str = "auto";

/// Optional per-provider overrides. Unset fields inherit from the layer below.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Name of the environment variable holding the API key
    #[serde(rename = "env", skip_serializing_if = "Option::is_none")]
    pub env_var: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl ProviderConfig {
    pub fn model(&self) -> Option<&str> {
        non_empty(&self.model)
    }

    pub fn url(&self) -> Option<&str> {
        non_empty(&self.url)
    }

    pub fn env_var(&self) -> Option<&str> {
        non_empty(&self.env_var)
    }
}

/// Per-model price override in USD per million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingOverride {
    pub input: f64,
    pub output: f64,
}

/// Contents of `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Active provider name, or `auto`
    pub provider: String,
    pub anthropic: ProviderConfig,
    pub openai: ProviderConfig,
    pub ollama: ProviderConfig,
    /// Overrides of registry providers and fully user-defined providers
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<String, ProviderConfig>,
    /// Keyed by model id
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub pricing: BTreeMap<String, PricingOverride>,
}

impl Default for Config {
    fn default() -> Self {
        let slot = |name: &str, with_url: bool| {
            let entry = registry::lookup(name);
            ProviderConfig {
                model: entry.map(|e| e.default_model.to_string()),
                url: entry.filter(|_| with_url).map(|e| e.default_url.to_string()),
                env_var: None,
            }
        };
        Self {
            provider: AUTO_PROVIDER.to_string(),
            anthropic: slot("anthropic", false),
            openai: slot("openai", false),
            ollama: slot("ollama", true),
            custom: BTreeMap::new(),
            pricing: BTreeMap::new(),
        }
    }
}

/// Fully merged provider record, ready to hand to an adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProvider {
    pub name: String,
    pub model: String,
    pub url: String,
    /// Absent when the provider takes no key or the key lives only in the keyring
    pub env_var: Option<String>,
    pub protocol: Protocol,
    pub needs_auth: bool,
}

/// A configuration problem that does not stop loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Field path (e.g., "custom.together.url")
    pub field: String,
    /// Human-readable message
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Config path for a `YEET_*` variable, prefix already stripped.
///
/// `OPENAI_MODEL` becomes `openai.model`. Under `CUSTOM_` and `PRICING_` only
/// the last `_` separates the field, so `CUSTOM_MY_LLM_URL` becomes
/// `custom.my_llm.url`.
fn env_path(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    for table in ["custom", "pricing"] {
        let nested = key
            .strip_prefix(table)
            .and_then(|rest| rest.strip_prefix('_'))
            .and_then(|rest| rest.rsplit_once('_'));
        if let Some((name, field)) = nested {
            return format!("{table}.{name}.{field}");
        }
    }
    key.replace('_', ".")
}

impl Config {
    /// Load from the user config file, then `YEET_*` environment overrides.
    pub fn load() -> Result<Self> {
        let path = paths::config_file()?;
        Ok(Self::figment(&path)
            .merge(Env::prefixed("YEET_").map(|key| env_path(key.as_str()).into()))
            .extract()?)
    }

    /// Load defaults overlaid with a specific TOML file. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        Ok(Self::figment(path).extract()?)
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
    }

    /// Load and log validation warnings.
    pub fn load_validated() -> Result<Self> {
        let config = Self::load()?;
        for issue in config.validate() {
            warn!("Config warning - {}: {}", issue.field, issue.message);
        }
        Ok(config)
    }

    /// Write to the user config file.
    pub fn save(&self) -> Result<()> {
        self.save_to(&paths::config_file()?)
    }

    /// Write to `path`, blanking model fields that match the registry default.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let mut out = self.clone();
        out.blank_default_models();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, toml::to_string_pretty(&out)?)?;
        debug!(path = %path.display(), "Saved config");
        Ok(())
    }

    /// Location of the config file, created with defaults when missing.
    pub fn path() -> Result<PathBuf> {
        let path = paths::config_file()?;
        if !path.exists() {
            Config::default().save_to(&path)?;
        }
        Ok(path)
    }

    fn blank_default_models(&mut self) {
        let Config {
            anthropic,
            openai,
            ollama,
            custom,
            ..
        } = self;
        let slots = [
            ("anthropic", anthropic),
            ("openai", openai),
            ("ollama", ollama),
        ];
        let slots = slots
            .into_iter()
            .chain(custom.iter_mut().map(|(name, pc)| (name.as_str(), pc)));
        for (name, pc) in slots {
            let default = registry::lookup(name).map(|e| e.default_model);
            if default.is_some() && pc.model() == default {
                pc.model = None;
            }
        }
    }

    /// Typed slot for a built-in provider name.
    pub fn builtin_slot(&self, name: &str) -> Option<&ProviderConfig> {
        match name {
            "anthropic" => Some(&self.anthropic),
            "openai" => Some(&self.openai),
            "ollama" => Some(&self.ollama),
            _ => None,
        }
    }

    fn builtin_slot_mut(&mut self, name: &str) -> Option<&mut ProviderConfig> {
        match name {
            "anthropic" => Some(&mut self.anthropic),
            "openai" => Some(&mut self.openai),
            "ollama" => Some(&mut self.ollama),
            _ => None,
        }
    }

    /// Whether `name` is in the registry or the custom map.
    pub fn is_known_provider(&self, name: &str) -> bool {
        registry::lookup(name).is_some() || self.custom.contains_key(name)
    }

    /// Known name whose entry exists only in the custom map.
    pub fn is_purely_custom(&self, name: &str) -> bool {
        registry::lookup(name).is_none() && self.custom.contains_key(name)
    }

    /// Merge the three layers for `name`. `None` when the name is unknown or
    /// the merge leaves the model or URL empty.
    pub fn resolve_provider(&self, name: &str) -> Option<ResolvedProvider> {
        self.try_resolve_provider(name).ok()
    }

    /// Like [`Config::resolve_provider`] but says why resolution failed.
    pub fn try_resolve_provider(
        &self,
        name: &str,
    ) -> std::result::Result<ResolvedProvider, ProviderError> {
        let entry = registry::lookup(name);
        let custom = self.custom.get(name);
        if entry.is_none() && custom.is_none() {
            return Err(ProviderError::UnknownProvider {
                provider: name.to_string(),
            });
        }

        let mut model = entry.map(|e| e.default_model).unwrap_or_default();
        let mut url = entry.map(|e| e.default_url).unwrap_or_default();
        let mut env_var = entry.and_then(|e| e.default_env_var);

        for layer in [self.builtin_slot(name), custom].into_iter().flatten() {
            if let Some(m) = layer.model() {
                model = m;
            }
            if let Some(u) = layer.url() {
                url = u;
            }
            if let Some(e) = layer.env_var() {
                env_var = Some(e);
            }
        }

        let incomplete = |field| ProviderError::IncompleteProvider {
            provider: name.to_string(),
            field,
        };
        if model.is_empty() {
            return Err(incomplete("model"));
        }
        if url.is_empty() {
            return Err(incomplete("url"));
        }

        let (protocol, needs_auth) = entry
            .map(|e| (e.protocol, e.needs_auth))
            .unwrap_or((Protocol::OpenAi, true));

        Ok(ResolvedProvider {
            name: name.to_string(),
            model: model.to_string(),
            url: url.trim_end_matches('/').to_string(),
            env_var: env_var.map(str::to_string),
            protocol,
            needs_auth,
        })
    }

    /// Every provider name worth showing: built-ins first, then the sorted
    /// union of registry, custom and imported-credential names.
    pub fn all_provider_names(&self, imported: &[String]) -> Vec<String> {
        let mut rest: Vec<String> = registry::names()
            .map(str::to_string)
            .chain(self.custom.keys().cloned())
            .chain(imported.iter().cloned())
            .filter(|n| !registry::is_builtin(n) && n != AUTO_PROVIDER && !n.is_empty())
            .collect();
        rest.sort();
        rest.dedup();

        BUILTIN_PROVIDERS
            .iter()
            .map(|n| n.to_string())
            .chain(rest)
            .collect()
    }

    /// Environment variable name per known provider, after merging.
    pub fn custom_envs(&self) -> BTreeMap<String, String> {
        registry::names()
            .map(str::to_string)
            .chain(self.custom.keys().cloned())
            .filter_map(|name| {
                let env = self.resolve_env_var(&name)?;
                Some((name, env))
            })
            .collect()
    }

    fn resolve_env_var(&self, name: &str) -> Option<String> {
        let custom = self.custom.get(name).and_then(ProviderConfig::env_var);
        let slot = self.builtin_slot(name).and_then(ProviderConfig::env_var);
        let registry = registry::lookup(name).and_then(|e| e.default_env_var);
        custom.or(slot).or(registry).map(str::to_string)
    }

    /// Warnings about the active provider and custom entries. Never fails.
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if self.provider != AUTO_PROVIDER && !self.is_known_provider(&self.provider) {
            issues.push(ValidationIssue {
                field: "provider".to_string(),
                message: format!(
                    "unknown provider {:?} — add it to [custom.{}] in config.toml or use a known provider",
                    self.provider, self.provider
                ),
            });
        }

        for (name, pc) in &self.custom {
            if registry::lookup(name).is_some() {
                continue;
            }
            if pc.model().is_none() {
                issues.push(ValidationIssue {
                    field: format!("custom.{name}.model"),
                    message: format!("custom provider {name:?} is missing model"),
                });
            }
            if pc.url().is_none() {
                issues.push(ValidationIssue {
                    field: format!("custom.{name}.url"),
                    message: format!("custom provider {name:?} is missing url"),
                });
            }
            if pc.env_var().is_none() {
                issues.push(ValidationIssue {
                    field: format!("custom.{name}.env"),
                    message: format!(
                        "custom provider {name:?} has no env var set (key must be in keyring)"
                    ),
                });
            }
        }

        issues
    }

    /// Make `name` the active provider.
    pub fn set_provider(&mut self, name: &str) {
        self.provider = name.to_string();
    }

    /// Set the model for a provider. Registry providers without a typed slot get
    /// a custom entry seeded with the registry URL and env var.
    pub fn set_model(&mut self, provider: &str, model: &str) {
        let model = Some(model.to_string()).filter(|m| !m.is_empty());
        if let Some(slot) = self.builtin_slot_mut(provider) {
            slot.model = model;
            return;
        }

        let entry = registry::lookup(provider);
        let pc = self.custom.entry(provider.to_string()).or_default();
        pc.model = model;
        if let Some(entry) = entry {
            if pc.url().is_none() {
                pc.url = Some(entry.default_url.to_string());
            }
            if pc.env_var().is_none() {
                pc.env_var = entry.default_env_var.map(str::to_string);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom(model: Option<&str>, url: Option<&str>, env: Option<&str>) -> ProviderConfig {
        ProviderConfig {
            model: model.map(str::to_string),
            url: url.map(str::to_string),
            env_var: env.map(str::to_string),
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.provider, "auto");
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_resolve_registry_defaults() {
        let rp = Config::default().resolve_provider("groq").unwrap();
        assert_eq!(rp.model, "llama-3.3-70b-versatile");
        assert_eq!(rp.url, "https://api.groq.com/openai/v1");
        assert_eq!(rp.env_var.as_deref(), Some("GROQ_API_KEY"));
        assert_eq!(rp.protocol, Protocol::OpenAi);
        assert!(rp.needs_auth);
    }

    #[test]
    fn test_typed_slot_overrides_registry() {
        let mut config = Config::default();
        config.openai.url = Some("https://proxy.example/v1".to_string());
        let rp = config.resolve_provider("openai").unwrap();
        assert_eq!(rp.url, "https://proxy.example/v1");
        assert_eq!(rp.model, "gpt-4o-mini");
        assert_eq!(rp.env_var.as_deref(), Some("OPENAI_API_KEY"));
    }

    #[test]
    fn test_custom_override_inherits_unset_fields() {
        let mut config = Config::default();
        config
            .custom
            .insert("mistral".to_string(), custom(Some("codestral-latest"), None, None));
        let rp = config.resolve_provider("mistral").unwrap();
        assert_eq!(rp.model, "codestral-latest");
        assert_eq!(rp.url, "https://api.mistral.ai/v1");
        assert_eq!(rp.env_var.as_deref(), Some("MISTRAL_API_KEY"));
    }

    #[test]
    fn test_custom_layer_wins_over_typed_slot() {
        let mut config = Config::default();
        config.anthropic.model = Some("claude-sonnet-4-6".to_string());
        config
            .custom
            .insert("anthropic".to_string(), custom(Some("claude-opus-4-6"), None, None));
        assert_eq!(
            config.resolve_provider("anthropic").unwrap().model,
            "claude-opus-4-6"
        );
    }

    #[test]
    fn test_blank_fields_do_not_override() {
        let mut config = Config::default();
        config.openai.model = Some("  ".to_string());
        assert_eq!(config.resolve_provider("openai").unwrap().model, "gpt-4o-mini");
    }

    #[test]
    fn test_purely_custom_is_openai_with_auth() {
        let mut config = Config::default();
        config.custom.insert(
            "together".to_string(),
            custom(
                Some("llama-70b"),
                Some("https://api.together.xyz/v1/"),
                Some("TOGETHER_API_KEY"),
            ),
        );
        let rp = config.resolve_provider("together").unwrap();
        assert_eq!(rp.protocol, Protocol::OpenAi);
        assert!(rp.needs_auth);
        assert_eq!(rp.url, "https://api.together.xyz/v1");
        assert_eq!(rp.env_var.as_deref(), Some("TOGETHER_API_KEY"));
    }

    #[test]
    fn test_unknown_provider_is_missing() {
        let config = Config::default();
        assert!(config.resolve_provider("together").is_none());
        assert!(matches!(
            config.try_resolve_provider("together"),
            Err(ProviderError::UnknownProvider { .. })
        ));
    }

    #[test]
    fn test_custom_without_url_is_incomplete() {
        let mut config = Config::default();
        config
            .custom
            .insert("local-llm".to_string(), custom(Some("phi"), None, None));
        assert!(config.resolve_provider("local-llm").is_none());
        assert!(matches!(
            config.try_resolve_provider("local-llm"),
            Err(ProviderError::IncompleteProvider { field: "url", .. })
        ));
    }

    #[test]
    fn test_all_provider_names_ordering() {
        let mut config = Config::default();
        config
            .custom
            .insert("together".to_string(), custom(Some("m"), Some("u"), Some("E")));
        config
            .custom
            .insert("groq".to_string(), custom(Some("m"), None, None));
        let imported = vec!["deepseek".to_string(), "openai".to_string()];
        let names = config.all_provider_names(&imported);
        assert_eq!(
            names,
            vec![
                "anthropic",
                "openai",
                "ollama",
                "deepseek",
                "google",
                "groq",
                "mistral",
                "openrouter",
                "together",
            ]
        );
    }

    #[test]
    fn test_validate_unknown_active_provider() {
        let mut config = Config::default();
        config.provider = "nope".to_string();
        let issues = config.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, "provider");
        assert!(issues[0].message.contains("[custom.nope]"));
    }

    #[test]
    fn test_validate_purely_custom_missing_fields() {
        let mut config = Config::default();
        config
            .custom
            .insert("together".to_string(), custom(Some("llama-70b"), None, None));
        let fields: Vec<_> = config.validate().into_iter().map(|i| i.field).collect();
        assert_eq!(fields, vec!["custom.together.url", "custom.together.env"]);
    }

    #[test]
    fn test_validate_registry_custom_entry_with_model_only() {
        let mut config = Config::default();
        config
            .custom
            .insert("groq".to_string(), custom(Some("llama-3.1-8b-instant"), None, None));
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_set_model_builtin_and_registry() {
        let mut config = Config::default();
        config.set_model("openai", "gpt-4.1");
        assert_eq!(config.openai.model.as_deref(), Some("gpt-4.1"));

        config.set_model("google", "gemini-2.5-flash");
        let google = &config.custom["google"];
        assert_eq!(google.model.as_deref(), Some("gemini-2.5-flash"));
        assert_eq!(
            google.url.as_deref(),
            Some("https://generativelanguage.googleapis.com/v1beta/openai")
        );
        assert_eq!(google.env_var.as_deref(), Some("GOOGLE_API_KEY"));
    }

    #[test]
    fn test_custom_envs() {
        let mut config = Config::default();
        config
            .custom
            .insert("together".to_string(), custom(Some("m"), Some("u"), Some("TOGETHER_API_KEY")));
        config.openai.env_var = Some("MY_OPENAI".to_string());
        let envs = config.custom_envs();
        assert_eq!(envs["together"], "TOGETHER_API_KEY");
        assert_eq!(envs["openai"], "MY_OPENAI");
        assert_eq!(envs["anthropic"], "ANTHROPIC_API_KEY");
        assert!(!envs.contains_key("ollama"));
    }

    #[test]
    fn test_save_and_reload_defaults_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("yeet").join("config.toml");
        Config::default().save_to(&path).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(!written.contains("claude-haiku-4-5-20251001"));
        assert!(!written.contains("gpt-4o-mini"));

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn test_save_keeps_non_default_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.set_provider("anthropic");
        config.set_model("anthropic", "claude-sonnet-4-6");
        config.pricing.insert(
            "claude-sonnet-4-6".to_string(),
            PricingOverride {
                input: 2.0,
                output: 10.0,
            },
        );
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.provider, "anthropic");
        assert_eq!(loaded.anthropic.model.as_deref(), Some("claude-sonnet-4-6"));
        assert_eq!(loaded.pricing["claude-sonnet-4-6"].input, 2.0);
    }

    #[test]
    fn test_load_ignores_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
provider = "together"
theme = "dark"

[custom.together]
model = "llama-70b"
url = "https://api.together.xyz/v1"
env = "TOGETHER_API_KEY"

[pricing."llama-70b"]
input = 0.9
output = 0.9
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.provider, "together");
        assert_eq!(config.anthropic.model.as_deref(), Some("claude-haiku-4-5-20251001"));
        assert_eq!(
            config.custom["together"].env_var.as_deref(),
            Some("TOGETHER_API_KEY")
        );
        assert_eq!(config.pricing["llama-70b"].output, 0.9);
    }

    #[test]
    fn test_env_path_keeps_underscored_names() {
        assert_eq!(env_path("PROVIDER"), "provider");
        assert_eq!(env_path("OPENAI_MODEL"), "openai.model");
        assert_eq!(env_path("CUSTOM_MY_LLM_URL"), "custom.my_llm.url");
        assert_eq!(env_path("CUSTOM_TOGETHER_ENV"), "custom.together.env");
        assert_eq!(env_path("PRICING_GPT_4O_INPUT"), "pricing.gpt_4o.input");
    }

    #[test]
    #[serial_test::serial]
    fn test_load_env_overrides_custom_provider() {
        let dir = tempfile::tempdir().unwrap();
        temp_env::with_vars(
            [
                ("XDG_CONFIG_HOME", Some(dir.path().to_str().unwrap())),
                ("YEET_PROVIDER", Some("my_llm")),
                ("YEET_OPENAI_MODEL", Some("gpt-4o")),
                ("YEET_CUSTOM_MY_LLM_MODEL", Some("llama-3")),
                ("YEET_CUSTOM_MY_LLM_URL", Some("http://localhost:8080/v1")),
                ("YEET_CUSTOM_MY_LLM_ENV", Some("MY_LLM_KEY")),
            ],
            || {
                let config = Config::load().unwrap();
                assert_eq!(config.provider, "my_llm");
                assert_eq!(config.openai.model.as_deref(), Some("gpt-4o"));

                let resolved = config.resolve_provider("my_llm").unwrap();
                assert_eq!(resolved.model, "llama-3");
                assert_eq!(resolved.url, "http://localhost:8080/v1");
                assert_eq!(resolved.env_var.as_deref(), Some("MY_LLM_KEY"));
            },
        );
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }
}
