//! Application configuration.
//!
//! Stored in TOML at `~/.config/salary-analytics/config.toml` (or XDG
//! equivalent). A missing file yields defaults.
//!
//! # Example Configuration
//!
//! ```toml
//! database_path = "/var/lib/salary/marketstat.db"
//! log_filter = "salary_analytics=info"
//!
//! [reports]
//! target_percentile = 90
//! granularity = "quarter"
//! periods = 8
//! min_record_count = 10
//! include_empty_buckets = true
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analytics::validate;
use crate::analytics::{EngineOptions, Granularity};

const APP_DIR: &str = "salary-analytics";
const CONFIG_FILE: &str = "config.toml";
const DEFAULT_DB_FILE: &str = "salary.db";

/// Errors that can occur when loading or saving configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite database holding the salary star schema.
    pub database_path: Option<PathBuf>,

    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub log_filter: Option<String>,

    /// Defaults for report parameters not given on the command line.
    pub reports: ReportDefaults,
}

/// Per-report defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportDefaults {
    pub target_percentile: i32,
    pub granularity: Granularity,
    pub periods: i32,
    pub min_record_count: i64,
    pub include_empty_buckets: bool,
}

impl Default for ReportDefaults {
    fn default() -> Self {
        Self {
            target_percentile: validate::DEFAULT_TARGET_PERCENTILE,
            granularity: Granularity::default(),
            periods: validate::DEFAULT_PERIODS,
            min_record_count: validate::DEFAULT_MIN_RECORD_COUNT,
            include_empty_buckets: true,
        }
    }
}

impl ReportDefaults {
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            include_empty_buckets: self.include_empty_buckets,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location.
    ///
    /// Returns defaults if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get the default configuration file path.
    ///
    /// Uses XDG conventions:
    /// - Primary: `$XDG_CONFIG_HOME/salary-analytics/config.toml`
    /// - Fallback: platform-specific config dir
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            return Ok(PathBuf::from(xdg_config).join(APP_DIR).join(CONFIG_FILE));
        }

        dirs::config_dir()
            .map(|p| p.join(APP_DIR).join(CONFIG_FILE))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Database path: explicit override (`--db` or `SALARY_ANALYTICS_DB`), then
    /// the config file, then the platform data dir.
    pub fn resolve_database_path(
        &self,
        cli_override: Option<&Path>,
    ) -> Result<PathBuf, ConfigError> {
        if let Some(path) = cli_override {
            return Ok(path.to_path_buf());
        }
        if let Some(path) = &self.database_path {
            return Ok(path.clone());
        }
        dirs::data_dir()
            .map(|p| p.join(APP_DIR).join(DEFAULT_DB_FILE))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Defaults must satisfy the same ranges the engine enforces.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let reports = &self.reports;
        validate::target_percentile(reports.target_percentile)
            .and_then(|_| validate::periods(reports.periods))
            .and_then(|_| validate::min_record_count(reports.min_record_count))
            .map_err(|e| ConfigError::Validation(format!("[reports] {e}")))?;

        if self
            .log_filter
            .as_deref()
            .is_some_and(|f| f.trim().is_empty())
        {
            return Err(ConfigError::Validation(
                "log_filter cannot be empty".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.reports.target_percentile, 90);
        assert_eq!(config.reports.periods, 12);
        assert_eq!(config.reports.min_record_count, 10);
        assert!(config.reports.include_empty_buckets);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[reports]\ngranularity = \"quarter\"\n").unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.reports.granularity, Granularity::Quarter);
        assert_eq!(config.reports.periods, 12);
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.toml");
        let config = AppConfig {
            database_path: Some(PathBuf::from("/var/lib/salary/marketstat.db")),
            log_filter: Some("salary_analytics=debug".into()),
            reports: ReportDefaults {
                target_percentile: 95,
                granularity: Granularity::Year,
                periods: 5,
                min_record_count: 3,
                include_empty_buckets: false,
            },
        };
        config.save_to(&path).unwrap();
        assert_eq!(AppConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_validation_rejects_out_of_range_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[reports]\ntarget_percentile = 100\n").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("targetPercentile"));

        std::fs::write(&path, "[reports]\nperiods = 0\n").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path).unwrap_err(),
            ConfigError::Validation(_)
        ));
    }

    #[test]
    fn test_parse_error_surfaces() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[reports\n").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path).unwrap_err(),
            ConfigError::Parse(_)
        ));
    }

    #[test]
    fn test_cli_database_path_wins() {
        let config = AppConfig {
            database_path: Some(PathBuf::from("/from/config.db")),
            ..Default::default()
        };
        let path = config
            .resolve_database_path(Some(Path::new("/from/cli.db")))
            .unwrap();
        assert_eq!(path, PathBuf::from("/from/cli.db"));
    }

    #[test]
    fn test_engine_options_follow_defaults() {
        let reports = ReportDefaults {
            include_empty_buckets: false,
            ..Default::default()
        };
        assert!(!reports.engine_options().include_empty_buckets);
    }
}
