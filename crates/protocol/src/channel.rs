//! Inter-stage channel
//!
//! Each stage owns the sending side (`Outbox`) of its output channels and
//! hands out receiving sides (`Inbox`) to downstream stages. Both sides are
//! cloneable: several workers may compete for items on one `Inbox`.
//!
//! A channel has two terminal states. It is open while at least one `Outbox`
//! exists, and closed once the last one is dropped. Consumers observe the
//! closed state as `Received::EndOfStream` after draining buffered items.

use crossfire::{MAsyncRx, MAsyncTx, TryRecvError, mpmc};
use tokio_util::sync::CancellationToken;

use crate::error::StageError;
use crate::message::Message;

/// Create a channel with the given buffer size
///
/// A size of zero is clamped to a single slot since crossfire has no
/// rendezvous mode: the first send completes without a receiver, the next one
/// waits until that item was taken.
pub fn channel(capacity: usize) -> (Outbox, Inbox) {
    let (tx, rx) = mpmc::bounded_async::<Message>(capacity.max(1));
    (Outbox { tx }, Inbox { rx })
}

/// Result of a receive: an item, or the explicit end of the stream
#[derive(Debug)]
pub enum Received {
    /// The next message in the stream
    Item(Message),
    /// The channel is closed and fully drained
    EndOfStream,
}

impl Received {
    /// Convert into an `Option`, mapping end-of-stream to `None`
    #[inline]
    pub fn into_item(self) -> Option<Message> {
        match self {
            Self::Item(msg) => Some(msg),
            Self::EndOfStream => None,
        }
    }
}

/// Sending side of a stage channel
#[derive(Clone)]
pub struct Outbox {
    tx: MAsyncTx<Message>,
}

impl Outbox {
    /// Send a message, waiting for buffer space
    ///
    /// Returns `StageError::Cancelled` if the token fires first and
    /// `StageError::Disconnected` if every receiver is gone.
    pub async fn send(&self, msg: Message, cancel: &CancellationToken) -> Result<(), StageError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StageError::Cancelled),
            sent = self.tx.send(msg) => sent.map_err(|_| StageError::Disconnected),
        }
    }
}

impl std::fmt::Debug for Outbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Outbox").finish_non_exhaustive()
    }
}

/// Receiving side of a stage channel
#[derive(Clone)]
pub struct Inbox {
    rx: MAsyncRx<Message>,
}

impl Inbox {
    /// Receive the next message, waiting until one is available
    ///
    /// Returns `Received::EndOfStream` once the channel is closed and empty,
    /// or `StageError::Cancelled` if the token fires first.
    pub async fn recv(&self, cancel: &CancellationToken) -> Result<Received, StageError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StageError::Cancelled),
            received = self.rx.recv() => Ok(match received {
                Ok(msg) => Received::Item(msg),
                Err(_) => Received::EndOfStream,
            }),
        }
    }

    /// Receive a message only if one is immediately available
    ///
    /// Returns `None` when the channel is open but currently empty.
    pub fn try_recv(&self) -> Option<Received> {
        match self.rx.try_recv() {
            Ok(msg) => Some(Received::Item(msg)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Received::EndOfStream),
        }
    }
}

impl std::fmt::Debug for Inbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inbox").finish_non_exhaustive()
    }
}
