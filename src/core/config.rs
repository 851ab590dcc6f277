//! Client configuration
//!
//! Settings come from a TOML file (by default `<config_dir>/pvlink/pvlink.toml`)
//! with every key optional:
//!
//! ```toml
//! coalesce_threshold = 1000
//! max_array_bytes = 16384
//! default_priority = 10
//! poll_max_items = 1000
//! poll_interval_ms = 20
//!
//! [logging]
//! level = "info"
//! format = "text"
//! color = false
//! ```
//!
//! `EPICS_CA_MAX_ARRAY_BYTES` in the environment overrides `max_array_bytes`.

use crate::core::error_handling::ContextualError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_COALESCE_THRESHOLD: usize = 1000;
pub const MIN_COALESCE_THRESHOLD: usize = 100;
pub const DEFAULT_MAX_ARRAY_BYTES: usize = 16384;
pub const DEFAULT_PRIORITY: u32 = 10;
pub const MAX_PRIORITY: u32 = 99;
pub const MAX_ARRAY_BYTES_ENV: &str = "EPICS_CA_MAX_ARRAY_BYTES";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration syntax: {message}")]
    Parse { message: String },

    #[error("Invalid configuration value: {message}")]
    Invalid { message: String },
}

impl ContextualError for ConfigError {
    fn is_user_actionable(&self) -> bool {
        matches!(self, ConfigError::Parse { .. } | ConfigError::Invalid { .. })
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ConfigError::Parse { message } | ConfigError::Invalid { message } => Some(message),
            ConfigError::Io { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    /// `text`, `ext` or `json`
    pub format: String,
    pub file: Option<String>,
    pub color: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            file: None,
            color: false,
        }
    }
}

/// Runtime settings for a client context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Queue depth above which superseded updates are coalesced.
    pub coalesce_threshold: usize,
    /// Largest single transfer the service accepts, in bytes.
    pub max_array_bytes: usize,
    /// Priority given to newly created channels.
    pub default_priority: u32,
    /// Items handled per `poll` call by the polling loop.
    pub poll_max_items: usize,
    pub poll_interval_ms: u64,
    pub logging: LoggingConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            coalesce_threshold: DEFAULT_COALESCE_THRESHOLD,
            max_array_bytes: DEFAULT_MAX_ARRAY_BYTES,
            default_priority: DEFAULT_PRIORITY,
            poll_max_items: 1000,
            poll_interval_ms: 20,
            logging: LoggingConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config.normalised())
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Loading client configuration from {}", path.display());
        Self::from_toml_str(&contents)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("pvlink").join("pvlink.toml"))
    }

    /// Load the default file if it exists, then apply the environment.
    pub fn load_default() -> Result<Self, ConfigError> {
        let mut config = match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path)?,
            _ => Self::default(),
        };
        config.apply_environment();
        Ok(config)
    }

    pub fn apply_environment(&mut self) {
        let value = std::env::var(MAX_ARRAY_BYTES_ENV).ok();
        self.apply_max_array_bytes_override(value.as_deref());
    }

    /// Apply an `EPICS_CA_MAX_ARRAY_BYTES` style value. Values below the
    /// default are raised to it; non-numeric values are reported and ignored.
    pub fn apply_max_array_bytes_override(&mut self, value: Option<&str>) {
        let Some(text) = value else {
            return;
        };
        match text.trim().parse::<usize>() {
            Ok(bytes) => self.max_array_bytes = bytes.max(DEFAULT_MAX_ARRAY_BYTES),
            Err(_) => crate::report_error!(
                "{} is not numeric ({:?}), using {}",
                MAX_ARRAY_BYTES_ENV,
                text,
                self.max_array_bytes
            ),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.logging.format.as_str(), "text" | "ext" | "json") {
            return Err(ConfigError::Invalid {
                message: format!(
                    "logging.format must be one of text, ext, json (got '{}')",
                    self.logging.format
                ),
            });
        }
        if self.poll_max_items == 0 {
            return Err(ConfigError::Invalid {
                message: "poll_max_items must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Raise or lower out-of-range values to their nearest permitted value.
    pub fn normalised(mut self) -> Self {
        self.coalesce_threshold = self.coalesce_threshold.max(MIN_COALESCE_THRESHOLD);
        self.max_array_bytes = self.max_array_bytes.max(DEFAULT_MAX_ARRAY_BYTES);
        self.default_priority = self.default_priority.min(MAX_PRIORITY);
        self.poll_interval_ms = self.poll_interval_ms.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{captured_containing, install_capture};
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.coalesce_threshold, 1000);
        assert_eq!(config.max_array_bytes, 16384);
        assert_eq!(config.default_priority, 10);
        assert_eq!(config.logging.format, "text");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = ClientConfig::from_toml_str("poll_interval_ms = 50\n").unwrap();
        assert_eq!(config.poll_interval_ms, 50);
        assert_eq!(config.coalesce_threshold, DEFAULT_COALESCE_THRESHOLD);
    }

    #[test]
    fn test_floors_and_ceilings_applied() {
        let config = ClientConfig::from_toml_str(
            "coalesce_threshold = 5\nmax_array_bytes = 100\ndefault_priority = 250\npoll_interval_ms = 0\n",
        )
        .unwrap();
        assert_eq!(config.coalesce_threshold, MIN_COALESCE_THRESHOLD);
        assert_eq!(config.max_array_bytes, DEFAULT_MAX_ARRAY_BYTES);
        assert_eq!(config.default_priority, MAX_PRIORITY);
        assert_eq!(config.poll_interval_ms, 1);
    }

    #[test]
    fn test_unknown_key_is_parse_error() {
        let err = ClientConfig::from_toml_str("coalesce = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.is_user_actionable());
    }

    #[test]
    fn test_bad_log_format_rejected() {
        let err = ClientConfig::from_toml_str("[logging]\nformat = \"xml\"\n").unwrap_err();
        match err {
            ConfigError::Invalid { message } => assert!(message.contains("xml")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_array_bytes = 100000\n[logging]\nlevel = \"debug\"").unwrap();
        let config = ClientConfig::load(file.path()).unwrap();
        assert_eq!(config.max_array_bytes, 100000);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClientConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(!err.is_user_actionable());
    }

    #[test]
    fn test_array_bytes_override() {
        let mut config = ClientConfig::default();
        config.apply_max_array_bytes_override(Some("2000000"));
        assert_eq!(config.max_array_bytes, 2_000_000);
        config.apply_max_array_bytes_override(Some("10"));
        assert_eq!(config.max_array_bytes, DEFAULT_MAX_ARRAY_BYTES);
        config.apply_max_array_bytes_override(None);
        assert_eq!(config.max_array_bytes, DEFAULT_MAX_ARRAY_BYTES);
    }

    #[test]
    #[serial]
    fn test_non_numeric_override_reported() {
        install_capture();
        let mut config = ClientConfig::default();
        config.apply_max_array_bytes_override(Some("lots"));
        assert_eq!(config.max_array_bytes, DEFAULT_MAX_ARRAY_BYTES);
        assert_eq!(captured_containing("is not numeric (\"lots\")"), 1);
    }
}
