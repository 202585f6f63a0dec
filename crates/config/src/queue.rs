//! Queue configuration

use serde::Deserialize;
use std::time::Duration;

/// Queue release policy
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// Forward items immediately in FIFO order (default)
    #[default]
    Fifo,
    /// Hold every item for `delay` before forwarding
    Delay,
}

/// Queue configuration
///
/// # Example
///
/// ```toml
/// [queues.settle]
/// driver = "delay"
/// delay = "200ms"
/// buffer_size = 16
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QueueConfig {
    /// Release policy (fifo, delay)
    /// Default: fifo
    pub driver: DriverKind,

    /// Per-item release delay for the delay driver
    /// Default: 0s
    #[serde(with = "humantime_serde")]
    pub delay: Duration,

    /// Output channel buffer size
    /// Default: 0
    pub buffer_size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_queue_config() {
        let config = QueueConfig::default();
        assert_eq!(config.driver, DriverKind::Fifo);
        assert_eq!(config.delay, Duration::ZERO);
        assert_eq!(config.buffer_size, 0);
    }

    #[test]
    fn test_deserialize_delay_driver() {
        let config: QueueConfig = toml::from_str("driver = \"delay\"\ndelay = \"1s\"").unwrap();
        assert_eq!(config.driver, DriverKind::Delay);
        assert_eq!(config.delay, Duration::from_secs(1));
    }
}
