//! List the models a provider serves.

use yeet_core::{registry, AUTO_PROVIDER};
use yeet_providers::fetch_models;

use crate::term;
use crate::AppContext;

pub async fn run(provider: Option<&str>, ctx: &AppContext) -> anyhow::Result<()> {
    let p = term::palette();
    let config = ctx.engine.config();

    let name = match provider {
        Some(name) => super::known_provider(ctx, name)?,
        None if config.provider == AUTO_PROVIDER => ctx
            .engine
            .selector()
            .candidates()
            .into_iter()
            .next()
            .map(|c| c.provider.name)
            .ok_or_else(|| anyhow::anyhow!("no provider available; name one: yeet models <provider>"))?,
        None => config.provider.clone(),
    };
    let resolved = config.try_resolve_provider(&name)?;
    let credential = ctx
        .engine
        .credentials()
        .resolve(&resolved.name, resolved.env_var.as_deref());

    let spinner = term::Spinner::start(&format!("Fetching models from {name}..."));
    let fetched = fetch_models(&resolved, &credential).await;
    spinner.stop();

    let models: Vec<String> = match fetched {
        Ok(models) if !models.is_empty() => models,
        Ok(_) => known(&name),
        Err(e) => {
            println!("  {}{}{}", p.red, e, p.reset);
            let fallback = known(&name);
            if !fallback.is_empty() {
                println!("  {}Showing known models instead.{}", p.dim, p.reset);
            }
            fallback
        }
    };

    println!("\n  {}{}{}\n", p.bold, name, p.reset);
    if models.is_empty() {
        println!("  {}No models found.{}", p.dim, p.reset);
    }
    for model in &models {
        let marker = if *model == resolved.model { "›" } else { " " };
        match ctx.engine.pricing().get(model) {
            Some(price) => println!(
                "  {} {:<40} {}${:.2} / ${:.2} per 1M{}",
                marker, model, p.dim, price.input_per_million, price.output_per_million, p.reset
            ),
            None => println!("  {} {}", marker, model),
        }
    }
    println!();
    Ok(())
}

fn known(provider: &str) -> Vec<String> {
    registry::known_models(provider)
        .iter()
        .map(|m| m.to_string())
        .collect()
}
