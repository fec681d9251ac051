//! Pull/merge request creation through the forge CLIs (`gh`, `glab`).

use std::fmt;
use std::process::{Command, Stdio};

use anyhow::{anyhow, bail};
use tracing::debug;

use crate::git::Git;

/// An open PR/MR for a branch. The URL is missing when the CLI did not print one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingPr {
    pub url: Option<String>,
}

/// PR/MR operations on a hosted forge.
pub trait Forge {
    /// Display name, e.g. "GitHub".
    fn name(&self) -> &'static str;
    /// Executable the forge is driven through.
    fn cli_name(&self) -> &'static str;
    fn existing_pr(&self, branch: &str) -> Option<ExistingPr>;
    /// Open a PR against `base`, returning its URL.
    fn create_pr(&self, title: &str, body: &str, base: &str) -> anyhow::Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForgeKind {
    GitHub,
    GitLab,
}

impl ForgeKind {
    /// GitLab when the remote URL mentions it, GitHub otherwise.
    pub fn from_remote(url: &str) -> Self {
        if url.contains("gitlab") {
            ForgeKind::GitLab
        } else {
            ForgeKind::GitHub
        }
    }

    pub fn cli_name(self) -> &'static str {
        match self {
            ForgeKind::GitHub => "gh",
            ForgeKind::GitLab => "glab",
        }
    }
}

impl fmt::Display for ForgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForgeKind::GitHub => f.write_str("GitHub"),
            ForgeKind::GitLab => f.write_str("GitLab"),
        }
    }
}

/// Pick the forge for the `origin` remote and check its CLI is installed.
pub fn detect(git: &dyn Git) -> anyhow::Result<Box<dyn Forge>> {
    let remote = git
        .remote_url("origin")
        .map_err(|_| anyhow!("no git remote 'origin' found"))?;
    let kind = ForgeKind::from_remote(&remote);
    debug!(%remote, forge = %kind, "detected forge");

    if !cli_installed(kind.cli_name()) {
        bail!(
            "{} remote detected but '{}' CLI is not installed",
            kind,
            kind.cli_name()
        );
    }
    Ok(match kind {
        ForgeKind::GitHub => Box::new(GitHub),
        ForgeKind::GitLab => Box::new(GitLab),
    })
}

fn cli_installed(cli: &str) -> bool {
    Command::new(cli)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}

/// Run a forge CLI. `Err` carries its combined output.
fn run(cli: &str, args: &[&str]) -> Result<String, String> {
    debug!(cli, ?args, "running forge CLI");
    let out = Command::new(cli)
        .args(args)
        .output()
        .map_err(|e| e.to_string())?;
    let stdout = String::from_utf8_lossy(&out.stdout).trim().to_string();
    if out.status.success() {
        Ok(stdout)
    } else {
        let stderr = String::from_utf8_lossy(&out.stderr);
        Err(format!("{stdout}\n{stderr}").trim().to_string())
    }
}

/// GitHub through `gh`.
pub struct GitHub;

impl Forge for GitHub {
    fn name(&self) -> &'static str {
        "GitHub"
    }

    fn cli_name(&self) -> &'static str {
        "gh"
    }

    fn existing_pr(&self, branch: &str) -> Option<ExistingPr> {
        let url = run("gh", &["pr", "view", branch, "--json", "url", "--jq", ".url"]).ok()?;
        if url.is_empty() {
            return None;
        }
        Some(ExistingPr { url: Some(url) })
    }

    fn create_pr(&self, title: &str, body: &str, base: &str) -> anyhow::Result<String> {
        let mut args = vec!["pr", "create", "--title", title, "--body", body];
        if !base.is_empty() {
            args.extend(["--base", base]);
        }
        run("gh", &args).map_err(|out| anyhow!(out))
    }
}

/// GitLab through `glab`.
pub struct GitLab;

impl Forge for GitLab {
    fn name(&self) -> &'static str {
        "GitLab"
    }

    fn cli_name(&self) -> &'static str {
        "glab"
    }

    fn existing_pr(&self, branch: &str) -> Option<ExistingPr> {
        let out = run("glab", &["mr", "view", branch]).ok()?;
        if out.is_empty() || out.contains("no open merge request") {
            return None;
        }
        Some(ExistingPr {
            url: url_field(&out),
        })
    }

    fn create_pr(&self, title: &str, body: &str, base: &str) -> anyhow::Result<String> {
        let mut args = vec!["mr", "create", "--fill", "--title", title, "--description", body];
        if !base.is_empty() {
            args.extend(["--target-branch", base]);
        }
        let out = run("glab", &args).map_err(|out| anyhow!(out))?;
        Ok(first_url_line(&out).unwrap_or(&out).to_string())
    }
}

/// The value of a `url:` line in `glab mr view` output.
fn url_field(view: &str) -> Option<String> {
    view.lines().map(str::trim).find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.eq_ignore_ascii_case("url")
            .then(|| value.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

fn first_url_line(out: &str) -> Option<&str> {
    out.lines().map(str::trim).find(|line| line.starts_with("http"))
}
