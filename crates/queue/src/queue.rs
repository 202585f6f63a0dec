//! Queue stage - fill loop, release loop and their shared wakeup

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sluice_pipeline::{Stage, StageMetrics};
use sluice_protocol::{
    CancellationToken, DEFAULT_BUFFER_SIZE, HookPhase, Inbox, Outbox, Received, StageError,
    channel,
};
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::delay::DelayDriver;
use crate::driver::{Driver, Front};
use crate::fifo::FifoDriver;
use crate::observer::QueueObserver;

/// Queue configuration
///
/// Built once with the `with_*` methods and consumed by [`Queue::new`].
#[derive(Clone)]
pub struct QueueConfig {
    /// Stage name used in logs and errors
    pub name: String,

    /// Output channel buffer size (0 = single-slot hand-off; crossfire has no rendezvous mode)
    pub buffer_size: usize,

    /// Per-item release delay; `None` selects the FIFO driver
    pub delay: Option<Duration>,

    /// Enqueue / dequeue size hooks, run in order
    pub observers: Vec<Arc<dyn QueueObserver>>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: "queue".into(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            delay: None,
            observers: Vec::new(),
        }
    }
}

impl QueueConfig {
    /// Set the stage name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the output buffer size
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Use the delay driver with the given per-item delay
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Add a size observer
    pub fn with_observer(mut self, observer: impl QueueObserver + 'static) -> Self {
        self.observers.push(Arc::new(observer));
        self
    }

    /// Build the driver this configuration selects
    pub fn driver(&self) -> Box<dyn Driver> {
        match self.delay {
            Some(delay) => Box::new(DelayDriver::new(delay)),
            None => Box::new(FifoDriver::new()),
        }
    }
}

impl From<&sluice_config::QueueConfig> for QueueConfig {
    fn from(settings: &sluice_config::QueueConfig) -> Self {
        let config = Self::default().with_buffer_size(settings.buffer_size);
        match settings.driver {
            sluice_config::DriverKind::Fifo => config,
            sluice_config::DriverKind::Delay => config.with_delay(settings.delay),
        }
    }
}

impl std::fmt::Debug for QueueConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueConfig")
            .field("name", &self.name)
            .field("buffer_size", &self.buffer_size)
            .field("delay", &self.delay)
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Buffering stage between one input and one output channel
///
/// # Example
///
/// ```ignore
/// let queue = Queue::new(upstream, QueueConfig::default().with_delay(delay));
/// let downstream = queue.output();
/// pipeline.stage(queue);
/// ```
pub struct Queue {
    config: QueueConfig,
    input: Inbox,
    output: Outbox,
    receiver: Inbox,
    driver: Box<dyn Driver>,
    metrics: Arc<StageMetrics>,
}

impl Queue {
    /// Create a queue with the driver selected by `config`
    pub fn new(input: Inbox, config: QueueConfig) -> Self {
        let driver = config.driver();
        Self::with_driver(input, driver, config)
    }

    /// Create a queue around an explicit driver
    pub fn with_driver(input: Inbox, driver: Box<dyn Driver>, config: QueueConfig) -> Self {
        let (output, receiver) = channel(config.buffer_size);
        Self {
            config,
            input,
            output,
            receiver,
            driver,
            metrics: Arc::new(StageMetrics::new()),
        }
    }

    /// Downstream end of the queue
    pub fn output(&self) -> Inbox {
        self.receiver.clone()
    }

    /// Metrics handle, valid after `run` consumed the queue
    pub fn metrics(&self) -> Arc<StageMetrics> {
        Arc::clone(&self.metrics)
    }
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("config", &self.config)
            .field("driver", &self.driver.name())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Stage for Queue {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn run(self: Box<Self>, cancel: CancellationToken) -> Result<(), StageError> {
        let Queue {
            config,
            input,
            output,
            receiver,
            driver,
            metrics,
        } = *self;
        // Only downstream holds receivers from here on, so a vanished
        // consumer surfaces as Disconnected instead of a stuck send.
        drop(receiver);

        let task = QueueTask {
            config,
            input,
            output,
            driver,
            metrics,
            wakeup: Wakeup::default(),
        };

        tracing::debug!(queue = %task.config.name, driver = task.driver.name(), "queue starting");
        let result = tokio::try_join!(task.fill(&cancel), task.release(&cancel)).map(|_| ());
        match &result {
            Ok(()) => tracing::debug!(queue = %task.config.name, "queue drained"),
            Err(err) => tracing::debug!(queue = %task.config.name, error = %err, "queue stopped"),
        }
        result
    }
}

/// Coalescing wakeup plus the end-of-input flag
///
/// `Notify` keeps at most one permit, so a burst of pushes while the release
/// loop is busy produces a single wakeup. The loop therefore drains every
/// releasable item before waiting again.
#[derive(Debug, Default)]
struct Wakeup {
    notify: Notify,
    sealed: AtomicBool,
}

impl Wakeup {
    fn notify(&self) {
        self.notify.notify_one();
    }

    fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }
}

struct QueueTask {
    config: QueueConfig,
    input: Inbox,
    output: Outbox,
    driver: Box<dyn Driver>,
    metrics: Arc<StageMetrics>,
    wakeup: Wakeup,
}

impl QueueTask {
    /// Move input into the driver until the input closes
    async fn fill(&self, cancel: &CancellationToken) -> Result<(), StageError> {
        loop {
            match self.input.recv(cancel).await? {
                Received::Item(message) => {
                    self.metrics.record_received(1);
                    let size = self.driver.push(message);
                    self.wakeup.notify();
                    self.enqueued(size).await?;
                }
                Received::EndOfStream => {
                    self.wakeup.seal();
                    return Ok(());
                }
            }
        }
    }

    /// Forward releasable items until the sealed buffer is empty
    async fn release(&self, cancel: &CancellationToken) -> Result<(), StageError> {
        let timer = tokio::time::sleep_until(Instant::now());
        tokio::pin!(timer);

        loop {
            // Read the flag before popping: every push precedes the seal.
            let sealed = self.wakeup.is_sealed();

            let deadline = match self.driver.pop(Instant::now()) {
                Front::Ready { message, remaining } => {
                    self.output.send(message, cancel).await?;
                    self.metrics.record_emitted();
                    self.dequeued(remaining).await?;
                    continue;
                }
                Front::Empty if sealed => return Ok(()),
                Front::Empty => None,
                Front::Waiting(at) => Some(at),
            };

            if let Some(at) = deadline {
                timer.as_mut().reset(at);
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(StageError::Cancelled),
                _ = self.wakeup.notify.notified() => {}
                _ = &mut timer, if deadline.is_some() => {}
            }
        }
    }

    async fn enqueued(&self, size: usize) -> Result<(), StageError> {
        for observer in &self.config.observers {
            observer
                .on_enqueue(size)
                .await
                .map_err(|e| StageError::hook(HookPhase::Enqueue, e))?;
        }
        Ok(())
    }

    async fn dequeued(&self, size: usize) -> Result<(), StageError> {
        for observer in &self.config.observers {
            observer
                .on_dequeue(size)
                .await
                .map_err(|e| StageError::hook(HookPhase::Dequeue, e))?;
        }
        Ok(())
    }
}
