//! Terminal helpers: colors, key-driven prompts, line editing and the spinner.

use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use anyhow::{bail, Context};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use indicatif::{ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;
use regex::Regex;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

/// ANSI escape codes, blank when colors are off.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub bold: &'static str,
    pub dim: &'static str,
    pub red: &'static str,
    pub green: &'static str,
    pub purple: &'static str,
    pub reset: &'static str,
}

impl Palette {
    pub const ANSI: Palette = Palette {
        bold: "\x1b[1m",
        dim: "\x1b[2m",
        red: "\x1b[31m",
        green: "\x1b[32m",
        purple: "\x1b[35m",
        reset: "\x1b[0m",
    };

    pub const PLAIN: Palette = Palette {
        bold: "",
        dim: "",
        red: "",
        green: "",
        purple: "",
        reset: "",
    };
}

static PALETTE: Lazy<Palette> = Lazy::new(|| match env::var_os("NO_COLOR") {
    Some(v) if !v.is_empty() => Palette::PLAIN,
    _ => Palette::ANSI,
});

/// The process palette. `NO_COLOR` turns colors off.
pub fn palette() -> &'static Palette {
    &PALETTE
}

/// A keybinding hint: key in bold, description dim.
pub fn keyhint(key: &str, desc: &str) -> String {
    let p = palette();
    format!("{}{}{}{}{} {}", p.reset, p.bold, key, p.reset, p.dim, desc)
}

/// A row of keybinding hints.
pub fn keyhints(hints: &[(&str, &str)]) -> String {
    let p = palette();
    let row: Vec<String> = hints.iter().map(|(k, d)| keyhint(k, d)).collect();
    format!("  {}{}{}", p.dim, row.join("  ·  "), p.reset)
}

/// Print a commit message the way the confirm loop shows it.
pub fn show_message(message: &str) {
    let p = palette();
    println!("  {}{}› {}{}\n", p.bold, p.purple, message, p.reset);
}

/// Erase the current line and `n - 1` lines above it.
pub fn clear_lines(n: usize) {
    let mut out = String::from("\x1b[2K");
    for _ in 1..n {
        out.push_str("\x1b[1A\x1b[2K");
    }
    out.push('\r');
    print!("{out}");
    let _ = io::stdout().flush();
}

static DIFF_STAT_LINE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^(.*\|[^+-]*?)(\+*)(-*)$").ok());

/// Color one `git diff --stat` line.
pub fn colorize_diff_stat(line: &str) -> String {
    colorize_diff_stat_with(line, palette())
}

fn colorize_diff_stat_with(line: &str, p: &Palette) -> String {
    if line.contains("files changed") || line.contains("file changed") {
        return format!("{}{}{}", p.dim, line, p.reset);
    }
    let Some(caps) = DIFF_STAT_LINE.as_ref().and_then(|re| re.captures(line)) else {
        return line.to_string();
    };
    let mut out = caps[1].to_string();
    if !caps[2].is_empty() {
        out.push_str(&format!("{}{}{}", p.green, &caps[2], p.reset));
    }
    if !caps[3].is_empty() {
        out.push_str(&format!("{}{}{}", p.red, &caps[3], p.reset));
    }
    out
}

/// What the user chose at a confirm prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Confirm,
    Cancel,
    Edit,
    EditExternal,
}

fn is_ctrl_c(key: &KeyEvent) -> bool {
    key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)
}

/// Map a key press to a confirm-loop action.
pub fn action_for(key: &KeyEvent) -> Option<Action> {
    if is_ctrl_c(key) {
        return Some(Action::Cancel);
    }
    match key.code {
        KeyCode::Enter => Some(Action::Confirm),
        KeyCode::Esc | KeyCode::Char('q') => Some(Action::Cancel),
        KeyCode::Char('e') if !key.modifiers.contains(KeyModifiers::CONTROL) => Some(Action::Edit),
        KeyCode::Char('E') => Some(Action::EditExternal),
        _ => None,
    }
}

/// Map a key press to a yes/no answer. Enter means yes.
pub fn answer_for(key: &KeyEvent) -> Option<bool> {
    if is_ctrl_c(key) {
        return Some(false);
    }
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => Some(true),
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => Some(false),
        _ => None,
    }
}

/// Raw mode for as long as the guard lives.
struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(RawMode)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

fn read_key() -> io::Result<KeyEvent> {
    loop {
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                return Ok(key);
            }
        }
    }
}

fn wait_for<T>(map: impl Fn(&KeyEvent) -> Option<T>) -> anyhow::Result<T> {
    let _raw = RawMode::enable().context("failed to set raw terminal")?;
    loop {
        if let Some(value) = map(&read_key()?) {
            return Ok(value);
        }
    }
}

/// Block until the user picks a confirm-loop action.
pub fn wait_for_action() -> anyhow::Result<Action> {
    wait_for(action_for)
}

/// Block until the user answers yes or no.
pub fn wait_for_yes_no() -> anyhow::Result<bool> {
    wait_for(answer_for)
}

const EDIT_PROMPT: &str = "  › ";

/// Edit `initial` in place. Interrupting or blanking the line keeps `initial`.
pub fn edit_line(initial: &str) -> anyhow::Result<String> {
    let mut editor = DefaultEditor::new()?;
    match editor.readline_with_initial(EDIT_PROMPT, (initial, "")) {
        Ok(line) if !line.trim().is_empty() => Ok(line.trim().to_string()),
        Ok(_) | Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
            Ok(initial.to_string())
        }
        Err(e) => Err(e.into()),
    }
}

/// Read one line of free text. `None` when the user interrupts.
pub fn read_line() -> anyhow::Result<Option<String>> {
    let mut editor = DefaultEditor::new()?;
    match editor.readline(EDIT_PROMPT) {
        Ok(line) => Ok(Some(line.trim().to_string())),
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Read a secret without echoing it. Esc or Ctrl-C yields an empty string.
pub fn read_secret(prompt: &str) -> anyhow::Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;

    let mut secret = String::new();
    {
        let _raw = RawMode::enable().context("failed to set raw terminal")?;
        loop {
            let key = read_key()?;
            if is_ctrl_c(&key) {
                secret.clear();
                break;
            }
            match key.code {
                KeyCode::Enter => break,
                KeyCode::Esc => {
                    secret.clear();
                    break;
                }
                KeyCode::Backspace => {
                    secret.pop();
                }
                KeyCode::Char(c) => secret.push(c),
                _ => {}
            }
        }
    }
    println!();
    Ok(secret.trim().to_string())
}

/// `$VISUAL`, then `$EDITOR`, then `vi`.
pub fn editor_command() -> String {
    ["VISUAL", "EDITOR"]
        .iter()
        .filter_map(|var| env::var(var).ok())
        .find(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "vi".to_string())
}

/// Open `path` in the user's editor and wait for it to exit.
pub fn open_in_editor(path: &Path) -> anyhow::Result<()> {
    let command = editor_command();
    let mut parts = command.split_whitespace();
    let Some(program) = parts.next() else {
        bail!("no editor configured");
    };
    let status = Command::new(program)
        .args(parts)
        .arg(path)
        .status()
        .with_context(|| format!("failed to start editor '{program}'"))?;
    if !status.success() {
        bail!("editor exited with {status}");
    }
    Ok(())
}

/// Edit `initial` in the user's editor. An emptied file keeps `initial`.
pub fn edit_external(initial: &str) -> anyhow::Result<String> {
    let mut file = tempfile::Builder::new()
        .prefix("yeet-")
        .suffix(".txt")
        .tempfile()
        .context("failed to create temp file")?;
    file.write_all(initial.as_bytes())?;
    file.flush()?;

    open_in_editor(file.path())?;

    let edited = fs::read_to_string(file.path()).context("failed to read edited file")?;
    let edited = edited.trim();
    Ok(if edited.is_empty() { initial } else { edited }.to_string())
}

const SPINNER_FRAMES: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ";

/// Braille spinner shown while waiting on the model.
pub struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    pub fn start(label: &str) -> Self {
        let style = ProgressStyle::with_template("  {spinner:.dim} {msg:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars(SPINNER_FRAMES);
        let bar = ProgressBar::new_spinner();
        bar.set_style(style);
        bar.set_message(label.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }

    /// Remove the spinner line. Safe to call more than once.
    pub fn stop(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.stop();
    }
}
