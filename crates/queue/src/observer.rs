//! Queue observers - size hooks around the buffer

use async_trait::async_trait;
use sluice_protocol::BoxError;

/// Hooks fired with the buffer size after each enqueue and dequeue
///
/// An error from either hook terminates the queue.
#[async_trait]
pub trait QueueObserver: Send + Sync {
    /// Called after a message was appended, with the new buffer size
    async fn on_enqueue(&self, _size: usize) -> Result<(), BoxError> {
        Ok(())
    }

    /// Called after a message was released, with the size left behind
    async fn on_dequeue(&self, _size: usize) -> Result<(), BoxError> {
        Ok(())
    }
}
