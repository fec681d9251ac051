//! CLI command implementations.

pub mod auth;
pub mod commit;
pub mod config;
pub mod doctor;
pub mod models;
pub mod pr;
pub mod prompt;

use anyhow::bail;
use yeet_providers::{PricingTable, Usage};

use crate::term;
use crate::AppContext;

/// Every provider name the user could mean, built-ins first.
pub(crate) fn all_providers(ctx: &AppContext) -> Vec<String> {
    let imported = ctx.engine.credentials().list_imported_providers();
    ctx.engine.config().all_provider_names(&imported)
}

/// Lowercase `name` and check it is a provider we know about.
pub(crate) fn known_provider(ctx: &AppContext, name: &str) -> anyhow::Result<String> {
    let name = name.to_lowercase();
    let all = all_providers(ctx);
    if !all.contains(&name) {
        bail!("unknown provider: {} (valid: {})", name, all.join(", "));
    }
    Ok(name)
}

/// "cost · tokens · model", or "tokens · model" without a price.
/// `None` when the provider reported no input tokens.
pub(crate) fn usage_line(pricing: &PricingTable, usage: &Usage) -> Option<String> {
    if usage.input_tokens == 0 {
        return None;
    }
    let tokens = format!("{} · {}", usage.format_tokens(), usage.model);
    Some(match pricing.cost(usage) {
        Some(cost) => format!("{cost} · {tokens}"),
        None => tokens,
    })
}

pub(crate) fn print_usage(ctx: &AppContext, usage: Option<&Usage>) {
    if let Some(line) = usage.and_then(|u| usage_line(ctx.engine.pricing(), u)) {
        let p = term::palette();
        println!("  {}{}{}", p.dim, line, p.reset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(model: &str, input: u64, output: u64) -> Usage {
        Usage {
            model: model.to_string(),
            input_tokens: input,
            output_tokens: output,
        }
    }

    #[test]
    fn test_usage_line_with_cost() {
        let line = usage_line(&PricingTable::default(), &usage("gpt-4o-mini", 2000, 100));
        assert_eq!(
            line.as_deref(),
            Some("$0.0004 · 2.0k in / 100 out · gpt-4o-mini")
        );
    }

    #[test]
    fn test_usage_line_without_price() {
        let line = usage_line(&PricingTable::default(), &usage("mystery-7b", 12, 3));
        assert_eq!(line.as_deref(), Some("12 in / 3 out · mystery-7b"));
    }

    #[test]
    fn test_usage_line_skipped_without_input_tokens() {
        assert_eq!(usage_line(&PricingTable::default(), &usage("gpt-4o", 0, 5)), None);
    }
}
