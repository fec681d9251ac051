//! API key management in the OS keyring.

use anyhow::{bail, Context};

use yeet_core::CredentialSource;

use crate::term;
use crate::{AppContext, AuthAction};

pub fn handle(action: AuthAction, ctx: &AppContext) -> anyhow::Result<()> {
    match action {
        AuthAction::Status => status(ctx),
        AuthAction::Set { provider } => set(ctx, &provider),
        AuthAction::Delete { provider } => delete(ctx, &provider),
        AuthAction::Import { provider } => import(ctx, provider.as_deref()),
        AuthAction::Reset => reset(ctx),
    }
}

fn status(ctx: &AppContext) -> anyhow::Result<()> {
    let p = term::palette();
    let providers = super::all_providers(ctx);
    let envs = ctx.engine.config().custom_envs();
    let status = ctx.engine.credentials().status(&providers, &envs);

    println!("\n  {}API Keys{}\n", p.bold, p.reset);
    for name in &providers {
        match status.get(name) {
            Some(info) if info.found => {
                let mut line = format!(
                    "  {}✓{}  {:<16}{}{}{}",
                    p.green, p.reset, name, p.dim, info.source, p.reset
                );
                if info.source != CredentialSource::Keyring {
                    line.push_str(&format!("  {}← yeet auth import {}{}", p.dim, name, p.reset));
                }
                println!("{line}");
            }
            _ => println!("  {}✗{}  {}", p.red, p.reset, name),
        }
    }
    println!();
    Ok(())
}

fn set(ctx: &AppContext, provider: &str) -> anyhow::Result<()> {
    let provider = super::known_provider(ctx, provider)?;
    let key = term::read_secret(&format!("  Enter API key for {provider}: "))
        .context("failed to read key")?;
    if key.is_empty() {
        bail!("empty key, nothing saved");
    }
    ctx.engine
        .credentials()
        .store()
        .set(&provider, &key)
        .context("failed to save key")?;

    let p = term::palette();
    println!("  {}✓{} API key for {} saved to keyring.", p.green, p.reset, provider);
    Ok(())
}

fn delete(ctx: &AppContext, provider: &str) -> anyhow::Result<()> {
    let provider = super::known_provider(ctx, provider)?;
    let p = term::palette();
    let removed = ctx
        .engine
        .credentials()
        .store()
        .delete(&provider)
        .context("failed to delete key")?;
    if removed {
        println!("  {}✓{} API key for {} removed from keyring.", p.green, p.reset, provider);
    } else {
        println!("  {}No key for {} in keyring.{}", p.dim, provider, p.reset);
    }
    Ok(())
}

fn import(ctx: &AppContext, only: Option<&str>) -> anyhow::Result<()> {
    let p = term::palette();
    let targets = match only {
        Some(name) => vec![super::known_provider(ctx, name)?],
        None => super::all_providers(ctx),
    };
    let envs = ctx.engine.config().custom_envs();
    let credentials = ctx.engine.credentials();
    let verbose = only.is_some();

    let mut imported = 0;
    for name in &targets {
        let credential = credentials.resolve(name, envs.get(name).map(String::as_str));
        let Some(key) = credential.value() else {
            if verbose {
                println!("  {}✗{} {}: no key found to import", p.red, p.reset, name);
            }
            continue;
        };
        if credential.source() == CredentialSource::Keyring {
            if verbose {
                println!("  {}·{} {}: already in keyring", p.dim, p.reset, name);
            }
            continue;
        }
        if let Err(e) = credentials.store().set(name, key) {
            println!("  {}✗{} {}: failed to import: {}", p.red, p.reset, name, e);
            continue;
        }
        println!(
            "  {}✓{} {}: imported from {} to keyring",
            p.green,
            p.reset,
            name,
            credential.source()
        );
        imported += 1;
    }

    if !verbose && imported == 0 {
        println!("  {}Nothing to import.{}", p.dim, p.reset);
    }
    Ok(())
}

fn reset(ctx: &AppContext) -> anyhow::Result<()> {
    let p = term::palette();
    let store = ctx.engine.credentials().store();
    let mut deleted = 0;
    for name in super::all_providers(ctx) {
        if let Ok(true) = store.delete(&name) {
            println!("  {}✓{} {} removed", p.green, p.reset, name);
            deleted += 1;
        }
    }
    if deleted == 0 {
        println!("  {}No keys in keyring.{}", p.dim, p.reset);
    }
    Ok(())
}
