//! Batchers - how a loader worker groups its input
//!
//! A batcher is called repeatedly by each loader worker. An empty batch
//! means the input is closed and drained; the worker then stops.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sluice_config::{BatchStrategy, BatchingConfig};
use sluice_protocol::{CancellationToken, Inbox, Message, Received, StageError};
use tokio::time::Instant;

#[cfg(test)]
#[path = "batcher_test.rs"]
mod tests;

/// Grouping policy for [`LoaderBatched`](crate::LoaderBatched)
#[async_trait]
pub trait Batcher: Send + Sync {
    /// Strategy name for logging
    fn name(&self) -> &'static str;

    /// Collect the next batch
    ///
    /// Must return the partial batch when the input closes and
    /// `StageError::Cancelled` when `cancel` fires while blocked.
    async fn next_batch(
        &self,
        input: &Inbox,
        cancel: &CancellationToken,
    ) -> Result<Vec<Message>, StageError>;
}

/// Wait for the first item of a batch; `None` once the input is exhausted
async fn first(input: &Inbox, cancel: &CancellationToken) -> Result<Option<Message>, StageError> {
    Ok(input.recv(cancel).await?.into_item())
}

/// One message per batch
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleBatcher;

#[async_trait]
impl Batcher for SingleBatcher {
    fn name(&self) -> &'static str {
        "single"
    }

    async fn next_batch(
        &self,
        input: &Inbox,
        cancel: &CancellationToken,
    ) -> Result<Vec<Message>, StageError> {
        Ok(first(input, cancel).await?.into_iter().collect())
    }
}

/// Blocks until `max_items` arrived or the input closed
#[derive(Debug, Clone, Copy)]
pub struct FixedSizeBatcher {
    max_items: usize,
}

impl FixedSizeBatcher {
    /// Create a fixed-size batcher (minimum 1 item)
    pub fn new(max_items: usize) -> Self {
        Self {
            max_items: max_items.max(1),
        }
    }
}

#[async_trait]
impl Batcher for FixedSizeBatcher {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn next_batch(
        &self,
        input: &Inbox,
        cancel: &CancellationToken,
    ) -> Result<Vec<Message>, StageError> {
        let mut batch = Vec::with_capacity(self.max_items);
        while batch.len() < self.max_items {
            match input.recv(cancel).await? {
                Received::Item(message) => batch.push(message),
                Received::EndOfStream => break,
            }
        }
        Ok(batch)
    }
}

/// One blocking receive, then whatever is already waiting
#[derive(Debug, Clone, Copy)]
pub struct DrainedBatcher {
    max_items: usize,
}

impl DrainedBatcher {
    /// Create a draining batcher (minimum 1 item)
    pub fn new(max_items: usize) -> Self {
        Self {
            max_items: max_items.max(1),
        }
    }
}

#[async_trait]
impl Batcher for DrainedBatcher {
    fn name(&self) -> &'static str {
        "drained"
    }

    async fn next_batch(
        &self,
        input: &Inbox,
        cancel: &CancellationToken,
    ) -> Result<Vec<Message>, StageError> {
        let Some(head) = first(input, cancel).await? else {
            return Ok(Vec::new());
        };

        let mut batch = Vec::with_capacity(self.max_items);
        batch.push(head);
        while batch.len() < self.max_items {
            match input.try_recv() {
                Some(Received::Item(message)) => batch.push(message),
                Some(Received::EndOfStream) | None => break,
            }
        }
        Ok(batch)
    }
}

/// Window anchored at the first item
#[derive(Debug, Clone, Copy)]
pub struct ThrottledBatcher {
    interval: Duration,
    max_items: usize,
}

impl ThrottledBatcher {
    /// Create a throttled batcher (minimum 1 item)
    pub fn new(interval: Duration, max_items: usize) -> Self {
        Self {
            interval,
            max_items: max_items.max(1),
        }
    }
}

#[async_trait]
impl Batcher for ThrottledBatcher {
    fn name(&self) -> &'static str {
        "throttled"
    }

    async fn next_batch(
        &self,
        input: &Inbox,
        cancel: &CancellationToken,
    ) -> Result<Vec<Message>, StageError> {
        collect_windowed(input, cancel, self.interval, self.max_items, false).await
    }
}

/// Window restarted by every item
#[derive(Debug, Clone, Copy)]
pub struct DebouncedBatcher {
    interval: Duration,
    max_items: usize,
}

impl DebouncedBatcher {
    /// Create a debounced batcher (minimum 1 item)
    pub fn new(interval: Duration, max_items: usize) -> Self {
        Self {
            interval,
            max_items: max_items.max(1),
        }
    }
}

#[async_trait]
impl Batcher for DebouncedBatcher {
    fn name(&self) -> &'static str {
        "debounced"
    }

    async fn next_batch(
        &self,
        input: &Inbox,
        cancel: &CancellationToken,
    ) -> Result<Vec<Message>, StageError> {
        collect_windowed(input, cancel, self.interval, self.max_items, true).await
    }
}

/// Collect after a first item until the window closes or the batch is full
async fn collect_windowed(
    input: &Inbox,
    cancel: &CancellationToken,
    interval: Duration,
    max_items: usize,
    restart_on_item: bool,
) -> Result<Vec<Message>, StageError> {
    let Some(head) = first(input, cancel).await? else {
        return Ok(Vec::new());
    };

    let mut batch = Vec::with_capacity(max_items.min(1024));
    batch.push(head);

    let window = tokio::time::sleep(interval);
    tokio::pin!(window);

    while batch.len() < max_items {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StageError::Cancelled),
            _ = &mut window => break,
            received = input.recv(cancel) => match received? {
                Received::Item(message) => {
                    batch.push(message);
                    if restart_on_item {
                        window.as_mut().reset(Instant::now() + interval);
                    }
                }
                Received::EndOfStream => break,
            },
        }
    }
    Ok(batch)
}

/// Batching strategy selection for a loader
#[derive(Clone, Default)]
pub enum Batching {
    /// One message per batch
    #[default]
    Single,
    /// [`FixedSizeBatcher`] with the given maximum
    Fixed(usize),
    /// [`DrainedBatcher`] with the given maximum
    Drained(usize),
    /// [`ThrottledBatcher`]
    Throttled {
        /// Window length
        interval: Duration,
        /// Maximum items per batch
        max_items: usize,
    },
    /// [`DebouncedBatcher`]
    Debounced {
        /// Quiet period that closes the batch
        interval: Duration,
        /// Maximum items per batch
        max_items: usize,
    },
    /// User-supplied batcher
    Custom(Arc<dyn Batcher>),
}

impl Batching {
    /// Build the batcher this selection describes
    pub fn batcher(&self) -> Arc<dyn Batcher> {
        match self {
            Self::Single => Arc::new(SingleBatcher),
            Self::Fixed(max_items) => Arc::new(FixedSizeBatcher::new(*max_items)),
            Self::Drained(max_items) => Arc::new(DrainedBatcher::new(*max_items)),
            Self::Throttled {
                interval,
                max_items,
            } => Arc::new(ThrottledBatcher::new(*interval, *max_items)),
            Self::Debounced {
                interval,
                max_items,
            } => Arc::new(DebouncedBatcher::new(*interval, *max_items)),
            Self::Custom(batcher) => Arc::clone(batcher),
        }
    }

    /// Wrap a user-supplied batcher
    pub fn custom(batcher: impl Batcher + 'static) -> Self {
        Self::Custom(Arc::new(batcher))
    }
}

impl From<&BatchingConfig> for Batching {
    fn from(config: &BatchingConfig) -> Self {
        let max_items = config.max_items;
        let interval = config.interval;
        match config.strategy {
            BatchStrategy::Single => Self::Single,
            BatchStrategy::Fixed => Self::Fixed(max_items),
            BatchStrategy::Drained => Self::Drained(max_items),
            BatchStrategy::Throttled => Self::Throttled {
                interval,
                max_items,
            },
            BatchStrategy::Debounced => Self::Debounced {
                interval,
                max_items,
            },
        }
    }
}

impl std::fmt::Debug for Batching {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single => f.write_str("Single"),
            Self::Fixed(n) => f.debug_tuple("Fixed").field(n).finish(),
            Self::Drained(n) => f.debug_tuple("Drained").field(n).finish(),
            Self::Throttled {
                interval,
                max_items,
            } => f
                .debug_struct("Throttled")
                .field("interval", interval)
                .field("max_items", max_items)
                .finish(),
            Self::Debounced {
                interval,
                max_items,
            } => f
                .debug_struct("Debounced")
                .field("interval", interval)
                .field("max_items", max_items)
                .finish(),
            Self::Custom(batcher) => f.debug_tuple("Custom").field(&batcher.name()).finish(),
        }
    }
}
