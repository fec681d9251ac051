//! The user-editable system prompt.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing::{debug, warn};

use crate::error::Result;
use crate::paths;

/// Built-in commit message instructions.
pub const DEFAULT_PROMPT: &str = "\
You are a commit message generator. Given git context, generate a single conventional commit message.

Rules:
- Use conventional commit format: type(scope): description
- Types: feat, fix, refactor, docs, style, test, chore, build, ci, perf
- Scope is optional, use it when changes are focused on one area
- Description should be lowercase, imperative mood, no period at the end
- Keep the message under 72 characters
- Prefer to explain WHY something was done from an end user perspective instead of WHAT was done
- Be specific about what user-facing changes were made, avoid generic messages
- Match the style and language of the recent commits when provided
- Use the branch name as a hint for type and scope when relevant
- Return ONLY the commit message, nothing else: no quotes, no explanation";

/// Instructions for pull request descriptions.
pub const PR_PROMPT: &str = "\
You are a pull request description generator. Given the commits and diff of a branch, write a pull request title and body.

Rules:
- The first line is the title: concise, under 72 characters, no trailing period
- Leave one blank line after the title, then write the body in markdown
- Start the body with a short summary of what the change does and why
- Follow with a bullet list of the notable changes
- Mention anything reviewers should pay special attention to
- Do not invent changes that are not in the diff
- Return ONLY the title and body, nothing else: no quotes, no code fences around the whole answer";

/// A prompt file on disk.
#[derive(Debug, Clone)]
pub struct PromptStore {
    path: PathBuf,
}

impl PromptStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<config dir>/prompt.txt`.
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(paths::prompt_file()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the prompt. A missing file is created with the default; a blank
    /// or unreadable file yields the default.
    pub fn load(&self) -> String {
        match fs::read_to_string(&self.path) {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    DEFAULT_PROMPT.to_string()
                } else {
                    text.to_string()
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if let Err(e) = self.write(DEFAULT_PROMPT) {
                    warn!(path = %self.path.display(), error = %e, "could not create prompt file");
                }
                DEFAULT_PROMPT.to_string()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "could not read prompt file");
                DEFAULT_PROMPT.to_string()
            }
        }
    }

    /// Replace the prompt file contents.
    pub fn write(&self, text: &str) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, format!("{}\n", text.trim_end()))?;
        debug!(path = %self.path.display(), "wrote prompt file");
        Ok(())
    }

    /// Restore the built-in default.
    pub fn reset(&self) -> Result<()> {
        self.write(DEFAULT_PROMPT)
    }
}

static PROMPT: OnceCell<String> = OnceCell::new();

/// The user's prompt, read once per process.
pub fn cached_prompt() -> &'static str {
    PROMPT.get_or_init(|| match PromptStore::default_location() {
        Ok(store) => store.load(),
        Err(e) => {
            warn!(error = %e, "no prompt location, using default");
            DEFAULT_PROMPT.to_string()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_created_with_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = PromptStore::new(dir.path().join("yeet").join("prompt.txt"));
        assert_eq!(store.load(), DEFAULT_PROMPT);
        let written = fs::read_to_string(store.path()).unwrap();
        assert_eq!(written, format!("{DEFAULT_PROMPT}\n"));
    }

    #[test]
    fn test_blank_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = PromptStore::new(dir.path().join("prompt.txt"));
        fs::write(store.path(), "  \n\n").unwrap();
        assert_eq!(store.load(), DEFAULT_PROMPT);
    }

    #[test]
    fn test_custom_prompt_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let store = PromptStore::new(dir.path().join("prompt.txt"));
        store.write("Write haiku commits.\n\n").unwrap();
        assert_eq!(store.load(), "Write haiku commits.");
    }

    #[test]
    fn test_reset_restores_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = PromptStore::new(dir.path().join("prompt.txt"));
        store.write("custom").unwrap();
        store.reset().unwrap();
        assert_eq!(store.load(), DEFAULT_PROMPT);
    }
}
