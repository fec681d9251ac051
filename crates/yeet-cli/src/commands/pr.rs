//! Open a pull/merge request with an AI-written title and body.

use anyhow::{anyhow, bail, Context};
use tracing::debug;

use yeet_core::prompt::PR_PROMPT;
use yeet_core::CommitContext;

use crate::forge;
use crate::git::Git;
use crate::term::{self, Action};
use crate::AppContext;

/// Output budget for a PR title and body.
const PR_MAX_TOKENS: u32 = 1024;

pub async fn run(ctx: &AppContext) -> anyhow::Result<()> {
    let git = &ctx.git;
    let p = term::palette();

    let forge = forge::detect(git)?;

    let branch = git
        .current_branch()
        .context("failed to get current branch")?;
    let base = git
        .default_branch()
        .context("failed to detect default branch")?;
    if branch == base {
        bail!("already on {base}, switch to a feature branch first");
    }

    if !git.has_upstream() {
        println!("\n  {}Pushing {} to origin...{}", p.dim, branch, p.reset);
        git.push_set_upstream()
            .map_err(|e| anyhow!("push failed: {}", e.output()))?;
        println!("  {}✓{} pushed to origin/{}", p.green, p.reset, branch);
    }

    if let Some(existing) = forge.existing_pr(&branch) {
        match existing.url {
            Some(url) => println!("\n  A {} PR already exists: {}\n", forge.name(), url),
            None => println!(
                "\n  A {} PR already exists for branch {}.\n",
                forge.name(),
                branch
            ),
        }
        return Ok(());
    }

    if !git.status_short().unwrap_or_default().is_empty() {
        println!(
            "\n  {}Uncommitted changes detected, run {}yeet{} first, then {}yeet pr{}.{}\n",
            p.dim,
            format_args!("{}{}", p.reset, p.bold),
            format_args!("{}{}", p.reset, p.dim),
            format_args!("{}{}", p.reset, p.bold),
            format_args!("{}{}", p.reset, p.dim),
            p.reset
        );
        return Ok(());
    }

    let commits = git.log_range(&base).unwrap_or_default();
    if commits.is_empty() {
        println!(
            "\n  {}No commits between {} and {}, nothing to open a PR for.{}\n",
            p.dim, base, branch, p.reset
        );
        return Ok(());
    }
    let diff = git.diff_range(&base).context("failed to get diff")?;
    let stat = git
        .diff_stat_range(&base)
        .context("failed to get diff stat")?;

    println!();
    for line in stat.lines() {
        println!("  {}", term::colorize_diff_stat(line));
    }
    println!();

    let selection = ctx
        .engine
        .select()
        .map_err(|e| anyhow!("no AI provider configured: {e}"))?;
    let pr_ctx = CommitContext::new(diff)
        .with_branch(branch.as_str())
        .with_recent_commits(commits)
        .with_system_prompt(PR_PROMPT)
        .with_max_tokens(PR_MAX_TOKENS);

    let spinner = term::Spinner::start("Generating PR description...");
    let generated = tokio::select! {
        result = selection.generate(&pr_ctx, None) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    spinner.stop();
    let Some(generated) = generated else {
        println!("\n  {}Cancelled.{}", p.dim, p.reset);
        return Ok(());
    };
    let generation = generated.context("AI generation failed")?;
    let (mut title, mut body) = parse_pr(&generation.text);

    let mut preview_lines = display_preview(&title, &body);
    loop {
        println!(
            "{}",
            term::keyhints(&[
                ("enter", "create"),
                ("e", "edit title"),
                ("E", "editor"),
                ("q", "cancel"),
            ])
        );

        match term::wait_for_action()? {
            Action::Cancel => {
                println!("\n  {}Cancelled.{}", p.dim, p.reset);
                return Ok(());
            }
            Action::Edit => {
                // preview, hints and the cursor line
                term::clear_lines(preview_lines + 2);
                title = term::edit_line(&title)?;
                term::clear_lines(2);
            }
            Action::EditExternal => {
                term::clear_lines(preview_lines + 2);
                match term::edit_external(&format!("{title}\n\n{body}")) {
                    Ok(edited) => (title, body) = parse_pr(&edited),
                    Err(e) => println!("\n  Editor failed: {e:#}\n"),
                }
            }
            Action::Confirm => {
                println!();
                break;
            }
        }
        preview_lines = display_preview(&title, &body);
    }

    debug!(cli = forge.cli_name(), %base, "creating PR");
    let url = forge
        .create_pr(&title, &body, &base)
        .with_context(|| format!("failed to create {} PR", forge.name()))?;
    println!("  {}✓{} {} PR created: {}", p.green, p.reset, forge.name(), url);

    super::print_usage(ctx, Some(&generation.usage));
    Ok(())
}

/// Split model output into a title (first line) and body (the rest).
pub fn parse_pr(raw: &str) -> (String, String) {
    let raw = raw.trim();
    match raw.split_once('\n') {
        Some((title, body)) => (title.trim().to_string(), body.trim().to_string()),
        None => (raw.to_string(), String::new()),
    }
}

/// Print the title and body. Returns the lines used, including the blank
/// line before the key hints.
fn display_preview(title: &str, body: &str) -> usize {
    let p = term::palette();
    println!("  {}{}# {}{}", p.bold, p.purple, title, p.reset);
    let mut lines = 1;
    if !body.is_empty() {
        println!();
        lines += 1;
        for line in body.lines() {
            println!("  {}{}{}", p.dim, line, p.reset);
            lines += 1;
        }
    }
    println!();
    lines + 1
}
