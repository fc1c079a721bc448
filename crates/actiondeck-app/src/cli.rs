//! CLI argument definitions for the ActionDeck binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

/// ActionDeck: inspect the action catalog, run actions and work the
/// approval queue.
#[derive(Parser, Debug)]
#[command(name = "actiondeck", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate the shipped action catalog.
    Validate,

    /// List the actions a module would offer.
    List {
        #[arg(short = 'm', long)]
        module: String,
        /// Placements to include (repeatable). Defaults to primary and secondary.
        #[arg(short = 'p', long = "placement")]
        placement: Vec<String>,
        /// Only these action ids (comma separated).
        #[arg(long, value_delimiter = ',')]
        whitelist: Option<Vec<String>>,
        /// Never these action ids (comma separated).
        #[arg(long, value_delimiter = ',')]
        blacklist: Option<Vec<String>>,
        /// Context as JSON: a full context object or the module's field bag.
        #[arg(long)]
        context: Option<String>,
    },

    /// Print one catalog entry as JSON.
    Show { id: String },

    /// Resolve an icon name.
    Icon { name: Option<String> },

    /// Check a context against the module's required fields.
    CheckContext {
        #[arg(short = 'm', long)]
        module: String,
        #[arg(long)]
        context: Option<String>,
    },

    /// Dispatch an action through the pipeline against the configured backend.
    Run {
        id: String,
        #[arg(short = 'm', long)]
        module: String,
        #[arg(long)]
        context: Option<String>,
        /// Default config override as JSON.
        #[arg(long = "default-config")]
        default_config: Option<String>,
        #[arg(long, default_value = "cli")]
        source: String,
        /// Print the pending run and exit instead of waiting for a decision.
        #[arg(long)]
        detach: bool,
    },

    /// Work the remote approval queue.
    Approvals {
        #[command(subcommand)]
        command: ApprovalsCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum ApprovalsCommand {
    /// Fetch the queue once.
    List,
    Approve {
        id: Uuid,
        #[arg(long)]
        actor: Option<String>,
    },
    Deny {
        id: Uuid,
        #[arg(long)]
        actor: Option<String>,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Poll the queue until Ctrl-C.
    Watch,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > ACTIONDECK_CONFIG env var > ~/.actiondeck/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("ACTIONDECK_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".actiondeck").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".actiondeck").join("config.toml");
    }
    PathBuf::from("config.toml")
}
