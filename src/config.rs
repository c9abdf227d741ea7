//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$BUILDSTAT_CONFIG` (environment variable)
//! 2. `~/.config/buildstat/config.toml` (Linux/macOS)
//!    `%APPDATA%\buildstat\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::month::MonthKey;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Archive source settings.
    pub archive: ArchiveConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for archives, the manifest and logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Where and how archives are fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Base URL; archives live at `<base_url>/<YYYY-Month>.txt.gz`.
    pub base_url: String,
    /// Oldest month to fetch, as a label (e.g. "2023-January").
    pub first_month: String,
    /// `User-Agent` sent with requests.
    pub user_agent: String,
    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            base_url: "https://lists.rtems.org/pipermail/build".to_string(),
            first_month: "2023-January".to_string(),
            user_agent: concat!("buildstat/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 600,
        }
    }
}

impl ArchiveConfig {
    /// Parsed `first_month`.
    pub fn first_month(&self) -> crate::error::Result<MonthKey> {
        MonthKey::parse(&self.first_month)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("BUILDSTAT_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("buildstat").join("config.toml"))
}

/// Return the cache directory for archives, the manifest and logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("buildstat")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("buildstat.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert_eq!(cfg.archive.base_url, "https://lists.rtems.org/pipermail/build");
        assert_eq!(cfg.archive.first_month().unwrap(), MonthKey::new(2023, 1).unwrap());
        assert_eq!(cfg.archive.timeout(), Duration::from_secs(600));
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.archive.base_url, cfg.archive.base_url);
        assert_eq!(parsed.archive.first_month, cfg.archive.first_month);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[general]
cache_dir = "/var/cache/buildstat"

[archive]
first_month = "2022-June"
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.general.cache_dir, Some(PathBuf::from("/var/cache/buildstat")));
        assert_eq!(cfg.archive.first_month().unwrap(), MonthKey::new(2022, 6).unwrap());
        assert_eq!(cfg.general.log_level, "warn");
        assert_eq!(cfg.archive.timeout_secs, 600);
        assert_eq!(cache_dir(&cfg), PathBuf::from("/var/cache/buildstat"));
        assert_eq!(log_file_path(&cfg), PathBuf::from("/var/cache/buildstat/buildstat.log"));
    }
}
