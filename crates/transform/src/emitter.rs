//! Emitter - the handler's handle on the stage outputs
//!
//! One emitter is built per input message. Payload sends derive a new
//! message that inherits the input's processing start; message sends forward
//! the given message unchanged.
//!
//! Each send:
//! 1. checks the channel index against the stage's outputs
//! 2. sends, racing cancellation
//! 3. runs every on-complete observer; the first failure fails the send

use std::any::Any;
use std::sync::Arc;

use sluice_pipeline::StageMetrics;
use sluice_protocol::{CancellationToken, HookPhase, Message, Outbox, StageError};

use crate::observer::TransformObserver;

/// Sends handler results to the transformer's output channels
pub struct Emitter<'a> {
    input: &'a Message,
    outputs: &'a [Outbox],
    observers: &'a [Arc<dyn TransformObserver>],
    cancel: &'a CancellationToken,
    metrics: &'a StageMetrics,
}

impl<'a> Emitter<'a> {
    pub(crate) fn new(
        input: &'a Message,
        outputs: &'a [Outbox],
        observers: &'a [Arc<dyn TransformObserver>],
        cancel: &'a CancellationToken,
        metrics: &'a StageMetrics,
    ) -> Self {
        Self {
            input,
            outputs,
            observers,
            cancel,
            metrics,
        }
    }

    /// Number of output channels
    #[inline]
    pub fn outputs(&self) -> usize {
        self.outputs.len()
    }

    /// Send a payload to channel 0
    pub async fn send<T: Any + Send + Sync>(&self, payload: T) -> Result<(), StageError> {
        self.send_to(0, payload).await
    }

    /// Send a payload to channel `index`
    pub async fn send_to<T: Any + Send + Sync>(
        &self,
        index: usize,
        payload: T,
    ) -> Result<(), StageError> {
        self.check_range(index)?;
        self.send_message_to(index, self.input.derive(payload)).await
    }

    /// Forward a message to channel 0
    pub async fn send_message(&self, message: Message) -> Result<(), StageError> {
        self.send_message_to(0, message).await
    }

    /// Forward a message to channel `index`
    pub async fn send_message_to(&self, index: usize, message: Message) -> Result<(), StageError> {
        let output = self.check_range(index)?;
        output.send(message.clone(), self.cancel).await?;
        self.metrics.record_emitted();

        for observer in self.observers {
            observer
                .on_complete(self.input, &message, index)
                .await
                .map_err(|e| StageError::hook(HookPhase::OnComplete, e))?;
        }
        Ok(())
    }

    fn check_range(&self, index: usize) -> Result<&'a Outbox, StageError> {
        self.outputs.get(index).ok_or(StageError::OutOfRange {
            index,
            outputs: self.outputs.len(),
        })
    }
}

impl std::fmt::Debug for Emitter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("outputs", &self.outputs.len())
            .finish_non_exhaustive()
    }
}
