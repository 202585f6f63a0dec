//! Sluice Configuration
//!
//! TOML-based configuration loading with sensible defaults.
//! Minimal config should just work - only specify what you need to change.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use sluice_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[stages.words]\nconcurrency = 4").unwrap();
//! assert_eq!(config.stage("words").concurrency, 4);
//! ```
//!
//! # Example Config
//!
//! ```toml
//! [log]
//! level = "debug"
//!
//! [stages.tokenize]
//! concurrency = 4
//! buffer_size = 64
//!
//! [stages.store]
//! fail_on_error = false
//!
//! [stages.store.batching]
//! strategy = "throttled"
//! max_items = 500
//! interval = "250ms"
//!
//! [queues.delay]
//! driver = "delay"
//! delay = "200ms"
//! ```

mod error;
mod logging;
mod queue;
mod stage;
mod validation;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

pub use error::{ConfigError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel, LogOutput};
pub use queue::{DriverKind, QueueConfig};
pub use stage::{BatchStrategy, BatchingConfig, StageConfig};

/// Main configuration structure
///
/// All sections are optional with sensible defaults. Stages and queues are
/// keyed by the name the application gives them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,

    /// Per-stage settings (concurrency, buffering, error policy, batching)
    pub stages: BTreeMap<String, StageConfig>,

    /// Per-queue settings (driver selection)
    pub queues: BTreeMap<String, QueueConfig>,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, contains invalid TOML, or
    /// fails validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every stage and queue section
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    /// Settings for a stage, falling back to defaults when not configured
    pub fn stage(&self, name: &str) -> StageConfig {
        self.stages.get(name).cloned().unwrap_or_default()
    }

    /// Settings for a queue, falling back to defaults when not configured
    pub fn queue(&self, name: &str) -> QueueConfig {
        self.queues.get(name).cloned().unwrap_or_default()
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_str("").unwrap();
        assert!(config.stages.is_empty());
        assert!(config.queues.is_empty());
        assert_eq!(config.log.level, LogLevel::Info);
    }

    #[test]
    fn test_unknown_stage_falls_back_to_defaults() {
        let config = Config::from_str("").unwrap();
        let stage = config.stage("missing");
        assert_eq!(stage.concurrency, 1);
        assert_eq!(stage.buffer_size, 0);
        assert!(stage.fail_on_error);
        assert_eq!(config.queue("missing").driver, DriverKind::Fifo);
    }

    #[test]
    fn test_full_config() {
        let toml = r#"
[log]
level = "debug"
format = "json"

[stages.tokenize]
concurrency = 4
buffer_size = 64

[stages.store]
fail_on_error = false

[stages.store.batching]
strategy = "debounced"
max_items = 50
interval = "250ms"

[queues.delay]
driver = "delay"
delay = "200ms"
"#;
        let config = Config::from_str(toml).unwrap();

        assert_eq!(config.log.level, LogLevel::Debug);
        assert_eq!(config.log.format, LogFormat::Json);

        let tokenize = config.stage("tokenize");
        assert_eq!(tokenize.concurrency, 4);
        assert_eq!(tokenize.buffer_size, 64);
        assert_eq!(tokenize.batching.strategy, BatchStrategy::Single);

        let store = config.stage("store");
        assert!(!store.fail_on_error);
        assert_eq!(store.batching.strategy, BatchStrategy::Debounced);
        assert_eq!(store.batching.max_items, 50);
        assert_eq!(store.batching.interval, Duration::from_millis(250));

        let queue = config.queue("delay");
        assert_eq!(queue.driver, DriverKind::Delay);
        assert_eq!(queue.delay, Duration::from_millis(200));
    }

    #[test]
    fn test_invalid_toml() {
        let result = Config::from_str("[stages.x\nconcurrency = 1");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_validation_runs_on_parse() {
        let result = Config::from_str("[stages.x]\nconcurrency = 0");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[stages.load]\nconcurrency = 2").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.stage("load").concurrency, 2);
    }

    #[test]
    fn test_from_missing_file() {
        let result = Config::from_file("/nonexistent/sluice.toml");
        match result {
            Err(ConfigError::IoError { path, .. }) => assert!(path.contains("sluice.toml")),
            other => panic!("expected io error, got {:?}", other),
        }
    }
}
