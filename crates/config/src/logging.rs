//! `[log]` section
//!
//! Read by the sluice binary when it installs its subscriber. The stage
//! crates only emit `tracing` events and never look at this.

use serde::Deserialize;

/// Verbosity threshold for sluice's own events
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Per-batch handler detail
    Trace,
    /// Stage and worker start/stop
    Debug,
    /// Pipeline start, signals and the final summary
    #[default]
    Info,
    /// Handler failures that were skipped
    Warn,
    /// Only what ended a stage
    Error,
}

impl LogLevel {
    /// Directive understood by `EnvFilter`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Line format of emitted events
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Console,
    /// One JSON object per event
    Json,
}

/// Stream the subscriber writes to
///
/// Defaults to stderr: the run command prints its word counts on stdout.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    Stdout,
    #[default]
    Stderr,
}

/// Subscriber settings; a missing key keeps its default
///
/// ```toml
/// [log]
/// level = "debug"
/// format = "json"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
}
