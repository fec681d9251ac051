//! Per-call generation input and request assembly helpers.

use std::borrow::Cow;

use crate::prompt;

/// Output token limit when the caller gives none.
pub const DEFAULT_MAX_TOKENS: u32 = 256;

/// Diffs longer than this many lines are cut.
pub const MAX_DIFF_LINES: usize = 8000;

/// Appended to a cut diff.
pub const TRUNCATION_MARKER: &str = "\n... (diff truncated)";

/// Everything one generation call needs to know about the change.
///
/// Empty strings mean "not provided".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitContext {
    pub diff: String,
    pub branch: String,
    pub recent_commits: String,
    /// Short status, one changed file per line
    pub status: String,
    pub system_prompt_override: String,
    /// Zero means use [`DEFAULT_MAX_TOKENS`]
    pub max_tokens_override: u32,
}

impl CommitContext {
    pub fn new(diff: impl Into<String>) -> Self {
        Self {
            diff: diff.into(),
            ..Self::default()
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_recent_commits(mut self, commits: impl Into<String>) -> Self {
        self.recent_commits = commits.into();
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt_override = prompt.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens_override = max_tokens;
        self
    }

    /// The override if set, otherwise the user's prompt file.
    pub fn effective_prompt(&self) -> &str {
        if self.system_prompt_override.is_empty() {
            prompt::cached_prompt()
        } else {
            &self.system_prompt_override
        }
    }

    pub fn effective_max_tokens(&self) -> u32 {
        if self.max_tokens_override > 0 {
            self.max_tokens_override
        } else {
            DEFAULT_MAX_TOKENS
        }
    }

    /// The user message sent to every protocol.
    pub fn user_message(&self) -> String {
        let mut msg = String::new();
        if !self.branch.is_empty() {
            msg.push_str(&format!("Branch: {}\n\n", self.branch));
        }
        if !self.status.is_empty() {
            msg.push_str(&format!("Files changed:\n{}\n\n", self.status));
        }
        if !self.recent_commits.is_empty() {
            msg.push_str(&format!("Recent commits:\n{}\n\n", self.recent_commits));
        }
        if !self.diff.is_empty() {
            msg.push_str("Diff:\n");
            msg.push_str(&truncate_diff(&self.diff));
        }
        msg
    }
}

/// Cut `diff` after its 8,000th line when it has more than 8,000 newlines.
pub fn truncate_diff(diff: &str) -> Cow<'_, str> {
    let mut newlines = diff.match_indices('\n').map(|(i, _)| i);
    match newlines.nth(MAX_DIFF_LINES - 1) {
        Some(cut) if newlines.next().is_some() => {
            Cow::Owned(format!("{}{}", &diff[..cut], TRUNCATION_MARKER))
        }
        _ => Cow::Borrowed(diff),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_full() {
        let ctx = CommitContext::new("+hello")
            .with_branch("feat/greeting")
            .with_status("M src/main.rs")
            .with_recent_commits("abc123 chore: init");
        assert_eq!(
            ctx.user_message(),
            "Branch: feat/greeting\n\nFiles changed:\nM src/main.rs\n\nRecent commits:\nabc123 chore: init\n\nDiff:\n+hello"
        );
    }

    #[test]
    fn test_user_message_skips_empty_sections() {
        let ctx = CommitContext::new("+hello");
        assert_eq!(ctx.user_message(), "Diff:\n+hello");
        assert_eq!(CommitContext::default().user_message(), "");
    }

    #[test]
    fn test_effective_max_tokens() {
        assert_eq!(CommitContext::default().effective_max_tokens(), 256);
        assert_eq!(
            CommitContext::default().with_max_tokens(1024).effective_max_tokens(),
            1024
        );
    }

    #[test]
    fn test_prompt_override_wins() {
        let ctx = CommitContext::new("d").with_system_prompt("be terse");
        assert_eq!(ctx.effective_prompt(), "be terse");
    }

    #[test]
    fn test_whitespace_prompt_override_is_kept() {
        let ctx = CommitContext::new("+x").with_system_prompt("  ");
        assert_eq!(ctx.effective_prompt(), "  ");
    }

    #[test]
    fn test_short_diff_untouched() {
        let diff = "x\n".repeat(MAX_DIFF_LINES);
        assert!(matches!(truncate_diff(&diff), Cow::Borrowed(_)));
        assert_eq!(truncate_diff(&diff), diff);
    }

    #[test]
    fn test_long_diff_truncated_on_line_boundary() {
        let diff = "x\n".repeat(9000);
        let out = truncate_diff(&diff);
        assert_eq!(out.matches('\n').count(), MAX_DIFF_LINES);
        assert!(out.ends_with("x\n... (diff truncated)"));
        let body = out.strip_suffix("... (diff truncated)").unwrap();
        assert!(body.lines().all(|l| l == "x"));
    }

    #[test]
    fn test_truncation_keeps_multibyte_lines_whole() {
        let diff = "ü€\n".repeat(MAX_DIFF_LINES + 5);
        let out = truncate_diff(&diff);
        assert!(out.starts_with("ü€\n"));
        assert_eq!(out.matches("ü€").count(), MAX_DIFF_LINES);
    }
}
