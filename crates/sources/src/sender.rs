//! Extract sender - the handler's view of the output channel

use std::any::Any;

use sluice_pipeline::StageMetrics;
use sluice_protocol::{CancellationToken, Message, Outbox, StageError};

/// Creates messages from raw values and sends them downstream
///
/// Every send races the stage's cancellation token.
pub struct ExtractSender<'a> {
    output: &'a Outbox,
    cancel: &'a CancellationToken,
    metrics: &'a StageMetrics,
}

impl<'a> ExtractSender<'a> {
    pub(crate) fn new(
        output: &'a Outbox,
        cancel: &'a CancellationToken,
        metrics: &'a StageMetrics,
    ) -> Self {
        Self {
            output,
            cancel,
            metrics,
        }
    }

    /// Send one value as a new message
    pub async fn send<T: Any + Send + Sync>(&self, payload: T) -> Result<(), StageError> {
        self.output.send(Message::new(payload), self.cancel).await?;
        self.metrics.record_emitted();
        Ok(())
    }

    /// Send every value in order, stopping at the first failure
    pub async fn send_all<T, I>(&self, payloads: I) -> Result<(), StageError>
    where
        T: Any + Send + Sync,
        I: IntoIterator<Item = T>,
        I::IntoIter: Send,
    {
        for payload in payloads {
            self.send(payload).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ExtractSender<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractSender").finish_non_exhaustive()
    }
}
