//! Configuration management commands.

use anyhow::{bail, Context};

use yeet_core::{Config, AUTO_PROVIDER};

use crate::term;
use crate::{AppContext, ConfigAction};

pub fn handle(action: ConfigAction, ctx: &AppContext) -> anyhow::Result<()> {
    let p = term::palette();
    match action {
        ConfigAction::Show => show(ctx)?,
        ConfigAction::Edit => {
            let path = Config::path().context("failed to get config path")?;
            term::open_in_editor(&path)?;
            println!("  {}✓{} Config saved.", p.green, p.reset);
        }
        ConfigAction::Path => {
            println!("{}", Config::path()?.display());
        }
        ConfigAction::Provider { name } => {
            let name = name.to_lowercase();
            if name != AUTO_PROVIDER {
                super::known_provider(ctx, &name)?;
            }
            let mut config = editable_config()?;
            config.set_provider(&name);
            config.save()?;
            println!("  {}✓{} Provider set to {}.", p.green, p.reset, name);
        }
        ConfigAction::Model { provider, model } => {
            let provider = super::known_provider(ctx, &provider)?;
            let model = model.trim();
            if model.is_empty() {
                bail!("model name must not be empty");
            }
            let mut config = editable_config()?;
            config.set_model(&provider, model);
            config.save()?;
            println!(
                "  {}✓{} Model for {} set to {}.",
                p.green, p.reset, provider, model
            );
        }
    }
    Ok(())
}

/// The config file on its own, without `YEET_*` overrides, so saving
/// does not persist them.
fn editable_config() -> anyhow::Result<Config> {
    Ok(Config::load_from(&Config::path()?)?)
}

fn show(ctx: &AppContext) -> anyhow::Result<()> {
    let p = term::palette();
    let config = ctx.engine.config();

    println!();
    println!("{}", toml::to_string_pretty(config)?.trim_end());
    println!();

    println!("  {}Providers{}\n", p.bold, p.reset);
    for name in super::all_providers(ctx) {
        let marker = if name == config.provider { "›" } else { " " };
        match config.try_resolve_provider(&name) {
            Ok(rp) => println!(
                "  {} {:<12} {:<30} {}{}  {}{}",
                marker,
                rp.name,
                rp.model,
                p.dim,
                rp.protocol,
                rp.url,
                p.reset
            ),
            Err(e) => println!("  {} {:<12} {}{}{}", marker, name, p.red, e, p.reset),
        }
    }
    if config.provider == AUTO_PROVIDER {
        let picked = ctx
            .engine
            .selector()
            .candidates()
            .into_iter()
            .next()
            .map(|c| format!("{} ({})", c.provider.name, c.provider.model))
            .unwrap_or_else(|| "no provider available".to_string());
        println!("\n  {}auto picks {}{}", p.dim, picked, p.reset);
    }
    println!();
    Ok(())
}
