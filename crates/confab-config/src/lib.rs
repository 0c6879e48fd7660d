//! Layered TOML configuration for confab.
//!
//! Reads configuration from multiple sources with precedence:
//! CLI flags > env vars > config file > defaults

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use confab_types::ConfigError;

/// The default base URL of the question-answering service.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Resolved configuration for a confab run.
#[derive(Debug, Clone)]
pub struct ConfabConfig {
    pub base_url: String,
    pub config_dir: PathBuf,
}

/// Settings that can be read from a TOML config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub service: ServiceSettings,
}

/// `[service]` section of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceSettings {
    pub base_url: Option<String>,
}

/// CLI overrides that take highest precedence.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub base_url: Option<String>,
}

impl ConfabConfig {
    /// Load configuration from all sources, applying precedence rules.
    ///
    /// Precedence (highest to lowest):
    /// 1. CLI flags
    /// 2. Environment variables
    /// 3. Config file (~/.confab/config.toml)
    /// 4. Defaults
    pub fn load(overrides: CliOverrides) -> Result<Self, ConfigError> {
        let config_dir = config_dir();
        let settings = load_settings_file(&config_dir.join("config.toml"));

        // Resolve the service URL: CLI > env > config file > default
        let base_url = overrides
            .base_url
            .or_else(|| std::env::var("CONFAB_BASE_URL").ok())
            .or(settings.service.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let base_url = base_url.trim().to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                key: "base_url".into(),
                message: format!("'{base_url}' must start with http:// or https://"),
            });
        }

        Ok(ConfabConfig {
            base_url,
            config_dir,
        })
    }
}

/// Get the confab config directory path (~/.confab/).
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CONFAB_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".confab")
}

/// Load and parse a TOML settings file, returning defaults on any error.
fn load_settings_file(path: &std::path::Path) -> SettingsFile {
    match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("Failed to parse {}: {}", path.display(), e);
            SettingsFile::default()
        }),
        Err(_) => SettingsFile::default(),
    }
}
