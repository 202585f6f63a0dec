//! Stage configuration
//!
//! Settings shared by transformers and loaders. Stage crates convert these
//! into their own immutable config values before constructing a stage.

use serde::Deserialize;
use std::time::Duration;

/// Default maximum number of items per batch
pub const DEFAULT_MAX_ITEMS: usize = 100;

/// Default batching window
pub const DEFAULT_BATCH_INTERVAL: Duration = Duration::from_secs(1);

/// Batching strategy for a batched loader
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BatchStrategy {
    /// One message per batch (default)
    #[default]
    Single,
    /// Block until `max_items` arrive or the input closes
    Fixed,
    /// One blocking receive, then whatever is immediately available
    Drained,
    /// Window anchored at the first item of the batch
    Throttled,
    /// Window restarted by every item
    Debounced,
}

impl BatchStrategy {
    /// Whether this strategy uses `interval`
    #[inline]
    pub fn is_windowed(&self) -> bool {
        matches!(self, Self::Throttled | Self::Debounced)
    }

    /// Strategy name as written in config
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Fixed => "fixed",
            Self::Drained => "drained",
            Self::Throttled => "throttled",
            Self::Debounced => "debounced",
        }
    }
}

/// Batching configuration
///
/// # Example
///
/// ```toml
/// [stages.store.batching]
/// strategy = "throttled"
/// max_items = 500
/// interval = "250ms"
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BatchingConfig {
    /// Strategy (single, fixed, drained, throttled, debounced)
    /// Default: single
    pub strategy: BatchStrategy,

    /// Maximum items per batch
    /// Default: 100
    pub max_items: usize,

    /// Window length for throttled / debounced batching
    /// Default: 1s
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            strategy: BatchStrategy::Single,
            max_items: DEFAULT_MAX_ITEMS,
            interval: DEFAULT_BATCH_INTERVAL,
        }
    }
}

/// Per-stage configuration
///
/// # Example
///
/// ```toml
/// [stages.tokenize]
/// concurrency = 4
/// buffer_size = 64
/// fail_on_error = false
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StageConfig {
    /// Number of workers consuming the stage's input
    /// Default: 1
    pub concurrency: usize,

    /// Output channel buffer size (0 = single-slot hand-off; crossfire has no rendezvous mode)
    /// Default: 0
    pub buffer_size: usize,

    /// Terminate the stage on the first handler error
    /// Default: true
    pub fail_on_error: bool,

    /// Batching (loaders only)
    pub batching: BatchingConfig,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            buffer_size: 0,
            fail_on_error: true,
            batching: BatchingConfig::default(),
        }
    }
}
