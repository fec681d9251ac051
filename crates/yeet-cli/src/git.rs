//! Git operations, run through the `git` executable.

use std::path::PathBuf;
use std::process::Command;

use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum GitError {
    /// Git could not be started or exited non-zero. `output` holds what it printed.
    #[error("git {command} failed: {output}")]
    Command { command: String, output: String },

    #[error("could not detect default branch")]
    NoDefaultBranch,
}

impl GitError {
    /// What git printed, for messages like "commit failed: ...".
    pub fn output(&self) -> String {
        match self {
            GitError::Command { output, .. } => output.clone(),
            other => other.to_string(),
        }
    }
}

pub type GitResult<T> = std::result::Result<T, GitError>;

/// The repository operations the commit and PR flows need.
pub trait Git {
    fn has_staged_changes(&self) -> bool;
    fn stage_all(&self) -> GitResult<()>;
    /// Unstage everything.
    fn reset(&self) -> GitResult<()>;
    fn diff_stat(&self) -> GitResult<String>;
    fn diff_cached(&self) -> GitResult<String>;
    fn commit(&self, message: &str) -> GitResult<String>;
    fn push(&self) -> GitResult<String>;
    fn push_set_upstream(&self) -> GitResult<String>;
    fn log_oneline(&self) -> GitResult<String>;
    fn status_short(&self) -> GitResult<String>;
    fn current_branch(&self) -> GitResult<String>;
    /// `main`/`master` style default branch of `origin`.
    fn default_branch(&self) -> GitResult<String>;
    fn log_range(&self, base: &str) -> GitResult<String>;
    fn diff_range(&self, base: &str) -> GitResult<String>;
    fn diff_stat_range(&self, base: &str) -> GitResult<String>;
    fn has_upstream(&self) -> bool;
    fn remote_url(&self, remote: &str) -> GitResult<String>;
}

/// `Git` backed by the `git` CLI.
#[derive(Debug, Clone, Default)]
pub struct ExecGit {
    dir: Option<PathBuf>,
}

impl ExecGit {
    /// Operate on the repository containing the working directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Operate on the repository at `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("git");
        cmd.args(args);
        if let Some(dir) = &self.dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Run git, returning combined stdout and stderr, trimmed.
    fn run(&self, args: &[&str]) -> GitResult<String> {
        debug!(?args, "running git");
        let failed = |output: String| GitError::Command {
            command: args.first().copied().unwrap_or_default().to_string(),
            output,
        };
        let out = self
            .command(args)
            .output()
            .map_err(|e| failed(e.to_string()))?;
        let mut text = String::from_utf8_lossy(&out.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&out.stderr));
        let text = text.trim().to_string();
        if out.status.success() {
            Ok(text)
        } else {
            Err(failed(text))
        }
    }

    fn exit_code(&self, args: &[&str]) -> Option<i32> {
        self.command(args).output().ok().and_then(|o| o.status.code())
    }

    fn succeeds(&self, args: &[&str]) -> bool {
        self.exit_code(args) == Some(0)
    }
}

impl Git for ExecGit {
    fn has_staged_changes(&self) -> bool {
        // --quiet exits 1 when the index differs from HEAD
        self.exit_code(&["diff", "--cached", "--quiet"]) == Some(1)
    }

    fn stage_all(&self) -> GitResult<()> {
        self.run(&["add", "--all"]).map(drop)
    }

    fn reset(&self) -> GitResult<()> {
        self.run(&["reset"]).map(drop)
    }

    fn diff_stat(&self) -> GitResult<String> {
        self.run(&["diff", "--cached", "--stat"])
    }

    fn diff_cached(&self) -> GitResult<String> {
        self.run(&["diff", "--cached"])
    }

    fn commit(&self, message: &str) -> GitResult<String> {
        self.run(&["commit", "-m", message])
    }

    fn push(&self) -> GitResult<String> {
        self.run(&["push"])
    }

    fn push_set_upstream(&self) -> GitResult<String> {
        let branch = self.current_branch()?;
        self.run(&["push", "--set-upstream", "origin", &branch])
    }

    fn log_oneline(&self) -> GitResult<String> {
        self.run(&["log", "--oneline", "-10"])
    }

    fn status_short(&self) -> GitResult<String> {
        self.run(&["status", "--short"])
    }

    fn current_branch(&self) -> GitResult<String> {
        self.run(&["rev-parse", "--abbrev-ref", "HEAD"])
    }

    fn default_branch(&self) -> GitResult<String> {
        if let Ok(out) = self.run(&["symbolic-ref", "refs/remotes/origin/HEAD"]) {
            if let Some(branch) = branch_from_remote_head(&out) {
                return Ok(branch.to_string());
            }
        }
        ["main", "master"]
            .into_iter()
            .find(|name| self.succeeds(&["rev-parse", "--verify", "--quiet", *name]))
            .map(str::to_string)
            .ok_or(GitError::NoDefaultBranch)
    }

    fn log_range(&self, base: &str) -> GitResult<String> {
        self.run(&["log", "--oneline", &format!("{base}..HEAD")])
    }

    fn diff_range(&self, base: &str) -> GitResult<String> {
        self.run(&["diff", &format!("{base}...HEAD")])
    }

    fn diff_stat_range(&self, base: &str) -> GitResult<String> {
        self.run(&["diff", "--stat", &format!("{base}...HEAD")])
    }

    fn has_upstream(&self) -> bool {
        self.succeeds(&["rev-parse", "--abbrev-ref", "--symbolic-full-name", "@{u}"])
    }

    fn remote_url(&self, remote: &str) -> GitResult<String> {
        self.run(&["remote", "get-url", remote])
    }
}

/// `refs/remotes/origin/main` -> `main`.
fn branch_from_remote_head(symbolic_ref: &str) -> Option<&str> {
    symbolic_ref
        .trim()
        .strip_prefix("refs/remotes/origin/")
        .filter(|b| !b.is_empty())
}

/// First line of git's output, e.g. the commit summary.
pub fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}
