//! CLI argument definitions for the Hark binary.
//!
//! Uses `clap` with derive macros. Priority resolution: CLI args >
//! env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Hark — a speech-recognition session bridge over the platform engine.
#[derive(Parser, Debug)]
#[command(name = "hark", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Use the in-memory mock platform instead of the native engine.
    #[arg(long)]
    pub mock: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List installed recognition engines.
    Engines,
    /// Create a session and poll recognition events until Ctrl-C.
    Listen {
        /// Engine display name to switch to after creation.
        #[arg(short, long)]
        engine: Option<String>,

        /// Maximum events to request per drain call.
        #[arg(long)]
        max: Option<u32>,

        /// Poll interval in milliseconds.
        #[arg(long)]
        interval: Option<u64>,

        /// Print event records as JSON lines.
        #[arg(long)]
        json: bool,
    },
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > HARK_CONFIG env var > ~/.hark/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("HARK_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log level. Priority: --log-level flag > config value.
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
        return PathBuf::from(home).join(".hark").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".hark").join("config.toml");
    }
    PathBuf::from("config.toml")
}
