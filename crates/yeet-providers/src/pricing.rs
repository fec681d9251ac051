//! Token usage and per-model pricing.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use yeet_core::PricingOverride;

/// Prices are in US dollars.
pub const CURRENCY_SYMBOL: &str = "$";

/// Token counts reported for one generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Model that served the request
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Usage {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    /// Whether the provider reported any counts at all.
    pub fn is_reported(&self) -> bool {
        self.input_tokens > 0 || self.output_tokens > 0
    }

    /// Short form such as `1.2k in / 38 out`.
    pub fn format_tokens(&self) -> String {
        format!(
            "{} in / {} out",
            format_count(self.input_tokens),
            format_count(self.output_tokens)
        )
    }
}

fn format_count(n: u64) -> String {
    if n >= 1000 {
        format!("{:.1}k", n as f64 / 1000.0)
    } else {
        n.to_string()
    }
}

/// Cost per million tokens (USD).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl ModelPricing {
    pub const fn new(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million,
            output_per_million,
        }
    }
}

const DEFAULT_PRICING: &[(&str, ModelPricing)] = &[
    // Anthropic
    ("claude-haiku-4-5-20251001", ModelPricing::new(1.00, 5.00)),
    ("claude-sonnet-4-6", ModelPricing::new(3.00, 15.00)),
    ("claude-opus-4-6", ModelPricing::new(5.00, 25.00)),
    // OpenAI
    ("gpt-4.1-nano", ModelPricing::new(0.10, 0.40)),
    ("gpt-4o-mini", ModelPricing::new(0.15, 0.60)),
    ("gpt-4.1-mini", ModelPricing::new(0.40, 1.60)),
    ("gpt-4.1", ModelPricing::new(2.00, 8.00)),
    ("gpt-4o", ModelPricing::new(2.50, 10.00)),
    ("o4-mini", ModelPricing::new(1.10, 4.40)),
    // Google
    ("gemini-2.5-flash", ModelPricing::new(0.15, 0.60)),
    ("gemini-3-flash-preview", ModelPricing::new(0.50, 3.00)),
    // Groq
    ("llama-3.1-8b-instant", ModelPricing::new(0.05, 0.08)),
    ("llama-3.3-70b-versatile", ModelPricing::new(0.59, 0.79)),
    ("openai/gpt-oss-20b", ModelPricing::new(0.10, 0.75)),
    // Mistral
    ("mistral-small-latest", ModelPricing::new(0.20, 0.60)),
    ("codestral-latest", ModelPricing::new(0.30, 0.90)),
    ("mistral-large-latest", ModelPricing::new(0.50, 1.50)),
];

/// Model id to price lookup, seeded with known public prices.
#[derive(Debug, Clone)]
pub struct PricingTable {
    models: HashMap<String, ModelPricing>,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self {
            models: DEFAULT_PRICING
                .iter()
                .map(|(model, pricing)| (model.to_string(), *pricing))
                .collect(),
        }
    }
}

impl PricingTable {
    /// A table with no prices.
    pub fn empty() -> Self {
        Self {
            models: HashMap::new(),
        }
    }

    /// Apply `[pricing.<model>]` entries from the config file.
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, PricingOverride>) -> Self {
        for (model, price) in overrides {
            self.set_pricing(model, price.input, price.output);
        }
        self
    }

    /// Add or replace the price of a model.
    pub fn set_pricing(&mut self, model: &str, input_per_million: f64, output_per_million: f64) {
        self.models.insert(
            model.to_string(),
            ModelPricing::new(input_per_million, output_per_million),
        );
    }

    pub fn get(&self, model: &str) -> Option<ModelPricing> {
        self.models.get(model).copied()
    }

    /// Input price used to rank auto-mode candidates.
    pub fn input_cost_per_million(&self, model: &str) -> Option<f64> {
        self.get(model).map(|p| p.input_per_million)
    }

    /// Dollar cost of `usage`, or `None` for a model without a price.
    pub fn cost_usd(&self, usage: &Usage) -> Option<f64> {
        let pricing = self.get(&usage.model)?;
        Some(
            usage.input_tokens as f64 * pricing.input_per_million / 1_000_000.0
                + usage.output_tokens as f64 * pricing.output_per_million / 1_000_000.0,
        )
    }

    /// Cost formatted with four decimals, e.g. `$0.0012`.
    pub fn cost(&self, usage: &Usage) -> Option<String> {
        self.cost_usd(usage)
            .map(|usd| format!("{}{:.4}", CURRENCY_SYMBOL, usd))
    }
}
