use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::types::EngineScope;

/// Errors from loading or saving configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Top-level configuration for the Hark application.
///
/// Loaded from `~/.hark/config.toml` by default. Each section corresponds
/// to one concern of the session bridge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarkConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub events: EventConfig,
}

impl HarkConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: HarkConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Recognition-engine selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Display name of the engine to switch to after creation.
    /// `None` keeps the platform default.
    pub name: Option<String>,
    /// Recognizer class: "in_process" or "shared".
    pub scope: EngineScope,
    /// Whether to load and activate a dictation grammar.
    pub dictation: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: None,
            scope: EngineScope::InProcess,
            dictation: true,
        }
    }
}

/// Event polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// Event-kind names to request (snake_case, e.g. "recognition").
    pub kinds: Vec<String>,
    /// Poll cadence for the drain loop, in milliseconds.
    pub poll_interval_ms: u64,
    /// Maximum events to request per drain call.
    pub max_drain: u32,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            kinds: vec!["recognition".to_string()],
            poll_interval_ms: 250,
            max_drain: 8,
        }
    }
}
