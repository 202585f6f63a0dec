//! Transformer observers

use async_trait::async_trait;
use sluice_protocol::{BoxError, Inbox, Message, StageError};

/// Hooks around a transformer run
///
/// Observers run in registration order. Any hook error terminates the stage
/// with [`StageError::Hook`] naming the phase.
#[async_trait]
pub trait TransformObserver: Send + Sync {
    /// Called once before workers start, with the stage's input channel
    async fn pre_run(&self, _input: &Inbox) -> Result<(), BoxError> {
        Ok(())
    }

    /// Called for every failed handler invocation
    async fn on_error(&self, _message: &Message, _error: &StageError) -> Result<(), BoxError> {
        Ok(())
    }

    /// Called after each successful send
    async fn on_complete(
        &self,
        _input: &Message,
        _output: &Message,
        _channel: usize,
    ) -> Result<(), BoxError> {
        Ok(())
    }
}
