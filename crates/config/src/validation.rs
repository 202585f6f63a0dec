//! Configuration validation
//!
//! Validates value ranges that serde cannot express:
//! - Stage concurrency and batch sizes are at least 1
//! - Windowed batching strategies have a non-zero interval
//! - The delay driver has a non-zero delay

use crate::Config;
use crate::error::{ConfigError, Result};
use crate::queue::{DriverKind, QueueConfig};
use crate::stage::StageConfig;

#[cfg(test)]
#[path = "validation_test.rs"]
mod tests;

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    for (name, stage) in &config.stages {
        validate_stage(name, stage)?;
    }
    for (name, queue) in &config.queues {
        validate_queue(name, queue)?;
    }
    Ok(())
}

fn validate_stage(name: &str, stage: &StageConfig) -> Result<()> {
    if stage.concurrency == 0 {
        return Err(ConfigError::invalid_value(
            "stage",
            name,
            "concurrency",
            "must be at least 1",
        ));
    }

    let batching = &stage.batching;
    if batching.max_items == 0 {
        return Err(ConfigError::invalid_value(
            "stage",
            name,
            "batching.max_items",
            "must be at least 1",
        ));
    }

    if batching.strategy.is_windowed() && batching.interval.is_zero() {
        return Err(ConfigError::invalid_value(
            "stage",
            name,
            "batching.interval",
            format!("{} batching needs a non-zero interval", batching.strategy.as_str()),
        ));
    }

    Ok(())
}

fn validate_queue(name: &str, queue: &QueueConfig) -> Result<()> {
    if queue.driver == DriverKind::Delay && queue.delay.is_zero() {
        return Err(ConfigError::invalid_value(
            "queue",
            name,
            "delay",
            "delay driver needs a non-zero delay",
        ));
    }
    Ok(())
}
