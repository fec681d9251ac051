//! The root command: stage, describe, commit and push.

use std::io::{self, Write};

use anyhow::{anyhow, bail, Context};
use tracing::debug;

use yeet_core::error::format_error_with_suggestion;
use yeet_core::{CommitContext, ProviderError, AUTO_PROVIDER};
use yeet_providers::{Generation, Provider, Selection, TokenSink, Usage};

use crate::git::{self, Git};
use crate::term::{self, Action};
use crate::AppContext;

/// A commit message ready for the confirm loop.
struct Draft {
    message: String,
    usage: Option<Usage>,
    /// Already on screen, printed token by token
    streamed: bool,
}

impl Draft {
    fn typed(message: String) -> Self {
        Self {
            message,
            usage: None,
            streamed: false,
        }
    }
}

pub async fn run(message: Option<String>, ctx: &AppContext) -> anyhow::Result<()> {
    let git = &ctx.git;
    let p = term::palette();

    // Respect what is already staged, otherwise stage everything
    let mut auto_staged = false;
    if !git.has_staged_changes() {
        git.stage_all().context("failed to stage changes")?;
        auto_staged = true;
    }

    let stat = git.diff_stat().context("failed to get diff stat")?;
    if stat.is_empty() {
        println!("\n  {}Nothing to commit.{}", p.dim, p.reset);
        return Ok(());
    }
    println!();
    for line in stat.lines() {
        println!("  {}", term::colorize_diff_stat(line));
    }
    println!();

    let draft = match message {
        Some(message) => Draft::typed(message),
        None => match draft_message(ctx).await? {
            Some(draft) => draft,
            None => return cancel(git, auto_staged),
        },
    };
    let Draft {
        mut message,
        usage,
        streamed,
    } = draft;

    let mut show_message = !streamed;
    loop {
        if show_message {
            term::show_message(&message);
        } else {
            println!();
            show_message = true;
        }
        println!(
            "{}",
            term::keyhints(&[
                ("enter", "commit"),
                ("e", "edit"),
                ("E", "editor"),
                ("esc", "cancel"),
            ])
        );

        match term::wait_for_action()? {
            Action::Cancel => {
                println!();
                return cancel(git, auto_staged);
            }
            Action::Edit => {
                message = term::edit_line(&message)?;
                // message, blank, hints, edit line, cursor
                term::clear_lines(5);
            }
            Action::EditExternal => {
                println!();
                match term::edit_external(&message) {
                    Ok(edited) => {
                        message = edited;
                        term::clear_lines(5);
                    }
                    Err(e) => println!("\n  Editor failed: {e:#}\n"),
                }
            }
            Action::Confirm => {
                println!();
                break;
            }
        }
    }

    let out = git
        .commit(&message)
        .map_err(|e| anyhow!("commit failed: {}", e.output()))?;
    println!("  {}✓{} {}", p.green, p.reset, git::first_line(&out));

    if let Err(e) = git.push() {
        debug!(error = %e, "push failed, retrying with --set-upstream");
        git.push_set_upstream()
            .map_err(|e| anyhow!("push failed: {}", e.output()))?;
    }
    let branch = git.current_branch().unwrap_or_default();
    println!(
        "  {}✓{} {}pushed to{} origin/{}",
        p.green, p.reset, p.dim, p.reset, branch
    );

    super::print_usage(ctx, usage.as_ref());
    Ok(())
}

fn cancel(git: &dyn Git, auto_staged: bool) -> anyhow::Result<()> {
    if auto_staged {
        git.reset().context("failed to unstage changes")?;
    }
    let p = term::palette();
    println!("  {}Cancelled.{}", p.dim, p.reset);
    Ok(())
}

/// Generate a message, or ask for one. `None` when the user cancels.
async fn draft_message(ctx: &AppContext) -> anyhow::Result<Option<Draft>> {
    let selection = match ctx.engine.select() {
        Ok(selection) => selection,
        Err(e) => match offer_setup(ctx, &e)? {
            Some(selection) => selection,
            None => {
                let Some(message) = manual_message("Enter commit message:")? else {
                    return Ok(None);
                };
                let provider = match ctx.engine.config().provider.as_str() {
                    AUTO_PROVIDER => "<provider>",
                    name => name,
                };
                println!("\n  tip: run `yeet auth set {provider}` to enable AI commit messages\n");
                return Ok(Some(Draft::typed(message)));
            }
        },
    };

    let diff = ctx.git.diff_cached().context("failed to get diff")?;
    let commit_ctx = CommitContext::new(diff)
        .with_branch(ctx.git.current_branch().unwrap_or_default())
        .with_recent_commits(ctx.git.log_oneline().unwrap_or_default())
        .with_status(ctx.git.status_short().unwrap_or_default());

    let outcome = if selection.adapter.supports_streaming() {
        generate_streaming(&selection, &commit_ctx).await
    } else {
        generate_blocking(&selection, &commit_ctx).await
    };

    match outcome {
        None => Ok(None),
        Some((Ok(generation), streamed)) => Ok(Some(Draft {
            message: generation.text,
            usage: Some(generation.usage),
            streamed,
        })),
        Some((Err(e), _)) => {
            let p = term::palette();
            print!("\r\x1b[K");
            let shown = format_error_with_suggestion(&e.into());
            println!("  {}{}{}\n", p.red, shown, p.reset);
            Ok(manual_message("Enter commit message manually:")?.map(Draft::typed))
        }
    }
}

type Outcome = Option<(Result<Generation, ProviderError>, bool)>;

/// Print tokens as they arrive. The flag says whether any were printed.
/// `None` when the user pressed Ctrl-C.
async fn generate_streaming(selection: &Selection, commit_ctx: &CommitContext) -> Outcome {
    let p = term::palette();
    let spinner = term::Spinner::start("Generating...");
    let mut started = false;

    let mut on_token = |token: &str| {
        if !started {
            started = true;
            spinner.stop();
            print!("  {}{}› ", p.bold, p.purple);
        }
        print!("{token}");
        let _ = io::stdout().flush();
    };
    let sink: TokenSink<'_> = &mut on_token;

    let result = tokio::select! {
        result = selection.generate(commit_ctx, Some(sink)) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    spinner.stop();
    if started {
        println!("{}", p.reset);
    }
    if result.is_none() {
        println!();
    }
    result.map(|r| (r, started))
}

async fn generate_blocking(selection: &Selection, commit_ctx: &CommitContext) -> Outcome {
    let spinner = term::Spinner::start("Generating commit message...");
    let result = tokio::select! {
        result = selection.generate(commit_ctx, None) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    spinner.stop();
    result.map(|r| (r, false))
}

/// Ask to store a key when the only problem is a missing one.
fn offer_setup(ctx: &AppContext, err: &ProviderError) -> anyhow::Result<Option<Selection>> {
    let p = term::palette();
    let provider = match err {
        ProviderError::MissingCredential { provider, .. } => provider,
        ProviderError::NoCandidates => {
            println!("  No API key found for any provider.\n");
            return Ok(None);
        }
        other => {
            println!("  {}{}{}\n", p.red, other, p.reset);
            return Ok(None);
        }
    };

    println!("  No API key found for {provider}.\n");
    println!("  Set up AI now? (y/n)");
    if !term::wait_for_yes_no()? {
        return Ok(None);
    }
    if let Err(e) = quick_setup(ctx, provider) {
        println!("  Setup failed: {e:#}\n");
        return Ok(None);
    }
    Ok(ctx.engine.select().ok())
}

fn quick_setup(ctx: &AppContext, provider: &str) -> anyhow::Result<()> {
    let key = term::read_secret(&format!("\n  Enter API key for {provider}: "))?;
    if key.is_empty() {
        bail!("empty key");
    }
    ctx.engine
        .credentials()
        .store()
        .set(provider, &key)
        .context("failed to save key")?;
    let p = term::palette();
    println!("  {}✓{} Key saved for {}.\n", p.green, p.reset, provider);
    Ok(())
}

/// Read a message typed by the user. `None` when they interrupt.
fn manual_message(prompt: &str) -> anyhow::Result<Option<String>> {
    println!("  {prompt}");
    let Some(message) = term::read_line()? else {
        return Ok(None);
    };
    println!();
    if message.is_empty() {
        bail!("empty commit message");
    }
    Ok(Some(message))
}
