//! Diagnostic command: active provider, config health and key status.

use yeet_core::{registry, Config, AUTO_PROVIDER};

use crate::term;
use crate::AppContext;

pub fn run(ctx: &AppContext) -> anyhow::Result<()> {
    let p = term::palette();
    let config = ctx.engine.config();

    if let Some(e) = &ctx.config_error {
        println!("\n  {}! Could not load config: {}{}", p.red, e, p.reset);
    }

    // Active provider and model
    let model = if config.provider == AUTO_PROVIDER {
        ctx.engine
            .selector()
            .auto_model_name()
            .unwrap_or_else(|| "(no provider available)".to_string())
    } else {
        config
            .resolve_provider(&config.provider)
            .map(|rp| rp.model)
            .unwrap_or_default()
    };

    println!();
    println!("  {}Provider{}  {}", p.bold, p.reset, config.provider);
    println!("  {}Model{}     {}", p.bold, p.reset, model);
    if let Ok(path) = Config::path() {
        println!(
            "  {}Config{}    {}{}{}",
            p.bold,
            p.reset,
            p.dim,
            path.display(),
            p.reset
        );
    }

    let problems = config.validate();
    if !problems.is_empty() {
        println!("\n  {}Warnings{}\n", p.bold, p.reset);
        for problem in &problems {
            println!("  {}!{} {}", p.red, p.reset, problem);
        }
    }

    // Key status
    let providers = super::all_providers(ctx);
    let envs = config.custom_envs();
    let status = ctx.engine.credentials().status(&providers, &envs);

    println!("\n  {}Keys{}\n", p.bold, p.reset);
    for name in &providers {
        let needs_auth = registry::lookup(name).map_or(true, |e| e.needs_auth);
        if !needs_auth {
            println!(
                "  {}·{}  {:<16}{}no auth needed{}",
                p.dim, p.reset, name, p.dim, p.reset
            );
            continue;
        }
        match status.get(name) {
            Some(info) if info.found => println!(
                "  {}✓{}  {:<16}{}{}{}",
                p.green, p.reset, name, p.dim, info.source, p.reset
            ),
            _ => {
                let hint = match envs.get(name) {
                    Some(env) => format!("{env} or yeet auth set {name}"),
                    None => format!("yeet auth set {name}"),
                };
                println!(
                    "  {}✗{}  {:<16}{}not found  ← {}{}",
                    p.red, p.reset, name, p.dim, hint, p.reset
                );
            }
        }
    }

    // Summary
    println!();
    let found = status.values().filter(|s| s.found).count();
    if found == 0 {
        println!(
            "  {}No API keys configured. Run {}yeet auth set <provider>{} to get started.{}",
            p.dim,
            format_args!("{}{}", p.reset, p.bold),
            format_args!("{}{}", p.reset, p.dim),
            p.reset
        );
    } else if problems.is_empty() {
        println!("  {}✓{} Everything looks good.", p.green, p.reset);
    } else {
        println!(
            "  {}{} warning(s), see above.{}",
            p.red,
            problems.len(),
            p.reset
        );
    }
    println!();

    Ok(())
}
