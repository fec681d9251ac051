//! # yeet
//!
//! Stage, commit and push in one command, with AI-written commit messages.

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use yeet_core::{Config, CredentialResolver};
use yeet_providers::Engine;

mod commands;
mod forge;
mod git;
mod term;

use git::ExecGit;

/// Application context containing shared state.
pub struct AppContext {
    pub engine: Engine,
    pub git: ExecGit,
    /// Set when the config file could not be loaded and defaults are in use
    pub config_error: Option<String>,
}

/// yeet - git commit & push in one command
#[derive(Parser)]
#[command(name = "yeet")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Commit message; generated from the staged diff when omitted
    #[arg(value_name = "MESSAGE")]
    message: Vec<String>,

    /// Commit message (use when the message collides with a subcommand name)
    #[arg(short = 'm', long = "message", value_name = "MESSAGE")]
    message_flag: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

// Words after a command that takes none are a commit message starting with
// the command's name: `yeet prompt tweaks` commits "prompt tweaks".
#[derive(Subcommand)]
enum Commands {
    /// Create a pull request with an AI-generated description
    Pr,
    /// Check configuration and provider status
    Doctor {
        #[arg(hide = true)]
        words: Vec<String>,
    },
    /// Former name of `doctor`
    #[command(hide = true)]
    Log {
        #[arg(hide = true)]
        words: Vec<String>,
    },
    /// Manage API keys in the OS keyring
    Auth {
        #[command(subcommand)]
        action: Option<AuthAction>,
        #[arg(hide = true)]
        words: Vec<String>,
    },
    /// Configure the provider and models
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
        #[arg(hide = true)]
        words: Vec<String>,
    },
    /// Show or edit the AI system prompt
    Prompt {
        #[command(subcommand)]
        action: Option<PromptAction>,
        #[arg(hide = true)]
        words: Vec<String>,
    },
    /// List the models a provider serves
    Models {
        /// Provider name (defaults to the active provider)
        provider: Option<String>,
    },
}

impl Commands {
    /// The commit message when the command was given stray words.
    fn commit_message(&self) -> Option<String> {
        let (name, words) = match self {
            Commands::Doctor { words } => ("doctor", words),
            Commands::Log { words } => ("log", words),
            Commands::Auth { words, .. } => ("auth", words),
            Commands::Config { words, .. } => ("config", words),
            Commands::Prompt { words, .. } => ("prompt", words),
            Commands::Pr | Commands::Models { .. } => return None,
        };
        (!words.is_empty()).then(|| format!("{} {}", name, words.join(" ")))
    }
}

#[derive(Subcommand)]
enum AuthAction {
    /// Show which providers have a key, and where it comes from
    Status,
    /// Store an API key in the OS keyring
    Set {
        /// Provider name
        provider: String,
    },
    /// Remove an API key from the OS keyring
    Delete {
        /// Provider name
        provider: String,
    },
    /// Copy keys from the environment or opencode into the OS keyring
    Import {
        /// Provider name (all providers when omitted)
        provider: Option<String>,
    },
    /// Remove all API keys from the OS keyring
    Reset,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration and resolved providers
    Show,
    /// Open config.toml in $EDITOR
    Edit,
    /// Print the config file location
    Path,
    /// Set the active provider
    Provider {
        /// Provider name, or "auto" for the cheapest available
        name: String,
    },
    /// Set the model for a provider
    Model {
        /// Provider name
        provider: String,
        /// Model identifier
        model: String,
    },
}

#[derive(Subcommand)]
enum PromptAction {
    /// Show the current prompt
    Show,
    /// Open the prompt in $EDITOR
    Edit,
    /// Reset the prompt to the default
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr and stay quiet unless asked for
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Load configuration
    let (config, config_error) = match Config::load_validated() {
        Ok(config) => (config, None),
        Err(e) => {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            (Config::default(), Some(e.to_string()))
        }
    };

    let ctx = AppContext {
        engine: Engine::new(config, CredentialResolver::system()),
        git: ExecGit::new(),
        config_error,
    };

    if let Some(message) = cli.command.as_ref().and_then(Commands::commit_message) {
        return commands::commit::run(Some(message), &ctx).await;
    }

    match cli.command {
        Some(Commands::Pr) => commands::pr::run(&ctx).await?,
        Some(Commands::Doctor { .. }) => commands::doctor::run(&ctx)?,
        Some(Commands::Log { .. }) => {
            let p = term::palette();
            println!("  {}\"yeet log\" is now \"yeet doctor\".{}\n", p.dim, p.reset);
            commands::doctor::run(&ctx)?
        }
        Some(Commands::Auth { action, .. }) => {
            commands::auth::handle(action.unwrap_or(AuthAction::Status), &ctx)?
        }
        Some(Commands::Config { action, .. }) => {
            commands::config::handle(action.unwrap_or(ConfigAction::Show), &ctx)?
        }
        Some(Commands::Prompt { action, .. }) => {
            commands::prompt::handle(action.unwrap_or(PromptAction::Edit))?
        }
        Some(Commands::Models { provider }) => {
            commands::models::run(provider.as_deref(), &ctx).await?
        }
        None => {
            let message = cli.message_flag.or_else(|| {
                Some(cli.message.join(" ")).filter(|m| !m.trim().is_empty())
            });
            commands::commit::run(message, &ctx).await?
        }
    }

    Ok(())
}
