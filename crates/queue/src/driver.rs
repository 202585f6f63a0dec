//! Driver - the buffering policy behind a queue

use sluice_protocol::Message;
use tokio::time::Instant;

/// State of the buffer's front item
#[derive(Debug)]
pub enum Front {
    /// Nothing buffered
    Empty,
    /// Front item removed and ready to forward
    Ready {
        /// The released message
        message: Message,
        /// Items left in the buffer after the removal
        remaining: usize,
    },
    /// Front item is held until the given instant
    Waiting(Instant),
}

/// Buffering and release policy of a [`Queue`](crate::Queue)
///
/// Implementations own the buffer and guard it with a single lock. Both
/// methods are called concurrently from the queue's fill and release loops,
/// so the lock must only be held for the push or pop itself.
pub trait Driver: Send + Sync {
    /// Driver name for logging
    fn name(&self) -> &'static str;

    /// Append a message, returning the buffer size after the push
    fn push(&self, message: Message) -> usize;

    /// Inspect the front item and remove it if it may be released at `now`
    fn pop(&self, now: Instant) -> Front;

    /// Number of buffered items
    fn len(&self) -> usize;

    /// Check if nothing is buffered
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
