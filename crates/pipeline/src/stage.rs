//! The `Stage` trait implemented by every runnable pipeline unit

use async_trait::async_trait;
use sluice_protocol::{CancellationToken, StageError};

/// A runnable pipeline unit (source, transform, queue or sink)
///
/// `run` takes `self` by value: a stage runs exactly once, and its output
/// channels close when `run` returns, whatever the outcome.
#[async_trait]
pub trait Stage: Send {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    /// Run until the input is exhausted, the stage fails, or `cancel` fires
    async fn run(self: Box<Self>, cancel: CancellationToken) -> Result<(), StageError>;
}
