//! User-level file locations.
//!
//! Config lives under `$XDG_CONFIG_HOME/yeet` (default `~/.config/yeet`) on
//! every platform so the file is easy to find and share between machines.

use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};

const APP_DIR: &str = "yeet";

fn xdg_dir(var: &str, fallback: &[&str]) -> Result<PathBuf> {
    if let Some(dir) = env::var_os(var).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let mut path = dirs::home_dir().ok_or(Error::NoHomeDir)?;
    path.extend(fallback);
    Ok(path)
}

/// Directory holding `config.toml` and `prompt.txt`.
pub fn config_dir() -> Result<PathBuf> {
    Ok(xdg_dir("XDG_CONFIG_HOME", &[".config"])?.join(APP_DIR))
}

/// Base data directory shared with other developer tools.
pub fn data_dir() -> Result<PathBuf> {
    xdg_dir("XDG_DATA_HOME", &[".local", "share"])
}

pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

pub fn prompt_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("prompt.txt"))
}

/// Credentials written by opencode, read-only for us.
pub fn imported_credentials_file() -> Result<PathBuf> {
    Ok(data_dir()?.join("opencode").join("auth.json"))
}
