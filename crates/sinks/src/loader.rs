//! Loader stages - terminal worker pools
//!
//! `LoaderBatched` is the general form: each worker repeatedly asks the
//! batcher for a batch and hands it to the handler. `Loader` is the
//! per-message form, a `LoaderBatched` over single-message batches.

use std::sync::Arc;

use async_trait::async_trait;
use sluice_pipeline::{DEFAULT_CONCURRENCY, Stage, StageMetrics, run_workers};
use sluice_protocol::{BoxError, CancellationToken, HookPhase, Inbox, Message, StageError};

use crate::batcher::{Batcher, Batching};

#[cfg(test)]
#[path = "loader_test.rs"]
mod tests;

/// User logic consuming whole batches
#[async_trait]
pub trait BatchHandler: Send + Sync {
    /// Load one non-empty batch
    async fn load_batch(
        &self,
        cancel: &CancellationToken,
        batch: &[Message],
    ) -> Result<(), StageError>;
}

/// User logic consuming one message at a time
#[async_trait]
pub trait LoadHandler: Send + Sync {
    /// Load one message
    async fn load(&self, cancel: &CancellationToken, message: &Message) -> Result<(), StageError>;
}

/// Hooks around a loader run
///
/// Hooks see the whole batch; for [`Loader`] every batch holds one message.
#[async_trait]
pub trait LoadObserver: Send + Sync {
    /// Called once before workers start, with the loader's input channel
    async fn pre_run(&self, _input: &Inbox) -> Result<(), BoxError> {
        Ok(())
    }

    /// Called for every failed handler invocation
    async fn on_error(&self, _batch: &[Message], _error: &StageError) -> Result<(), BoxError> {
        Ok(())
    }

    /// Called after every successful handler invocation
    async fn on_complete(&self, _batch: &[Message]) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Loader configuration
#[derive(Clone)]
pub struct LoaderConfig {
    /// Stage name used in logs
    pub name: String,

    /// Number of workers sharing the input
    pub concurrency: usize,

    /// Terminate on the first handler error
    pub fail_on_error: bool,

    /// Batching strategy (ignored by [`Loader`])
    pub batching: Batching,

    /// Pre-run, on-error and on-complete hooks, run in order
    pub observers: Vec<Arc<dyn LoadObserver>>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            name: "loader".into(),
            concurrency: DEFAULT_CONCURRENCY,
            fail_on_error: true,
            batching: Batching::Single,
            observers: Vec::new(),
        }
    }
}

impl LoaderConfig {
    /// Set the stage name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set worker count (minimum 1)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set whether handler errors terminate the stage
    pub fn with_fail_on_error(mut self, fail: bool) -> Self {
        self.fail_on_error = fail;
        self
    }

    /// Set the batching strategy
    pub fn with_batching(mut self, batching: Batching) -> Self {
        self.batching = batching;
        self
    }

    /// Add an observer
    pub fn with_observer(mut self, observer: impl LoadObserver + 'static) -> Self {
        self.observers.push(Arc::new(observer));
        self
    }
}

impl From<&sluice_config::StageConfig> for LoaderConfig {
    fn from(settings: &sluice_config::StageConfig) -> Self {
        Self::default()
            .with_concurrency(settings.concurrency)
            .with_fail_on_error(settings.fail_on_error)
            .with_batching(Batching::from(&settings.batching))
    }
}

impl std::fmt::Debug for LoaderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderConfig")
            .field("name", &self.name)
            .field("concurrency", &self.concurrency)
            .field("fail_on_error", &self.fail_on_error)
            .field("batching", &self.batching)
            .field("observers", &self.observers.len())
            .finish()
    }
}

// =============================================================================
// LoaderBatched
// =============================================================================

/// Batched sink stage
pub struct LoaderBatched<H> {
    shared: Arc<Shared<H>>,
}

struct Shared<H> {
    handler: H,
    input: Inbox,
    batcher: Arc<dyn Batcher>,
    config: LoaderConfig,
    metrics: Arc<StageMetrics>,
}

impl<H: BatchHandler + 'static> LoaderBatched<H> {
    /// Create a batched loader using `config.batching`
    pub fn new(input: Inbox, handler: H, config: LoaderConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                handler,
                input,
                batcher: config.batching.batcher(),
                config,
                metrics: Arc::new(StageMetrics::new()),
            }),
        }
    }

    /// Metrics handle, valid after `run` consumed the stage
    pub fn metrics(&self) -> Arc<StageMetrics> {
        Arc::clone(&self.shared.metrics)
    }
}

impl<H> std::fmt::Debug for LoaderBatched<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderBatched")
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<H: BatchHandler + 'static> Stage for LoaderBatched<H> {
    fn name(&self) -> &str {
        &self.shared.config.name
    }

    async fn run(self: Box<Self>, cancel: CancellationToken) -> Result<(), StageError> {
        let shared = self.shared;

        for observer in &shared.config.observers {
            observer
                .pre_run(&shared.input)
                .await
                .map_err(|e| StageError::hook(HookPhase::PreRun, e))?;
        }

        let name = shared.config.name.clone();
        let concurrency = shared.config.concurrency;
        tracing::debug!(
            stage = %name,
            concurrency,
            batching = shared.batcher.name(),
            "loader starting"
        );

        let result = run_workers(&name, concurrency, &cancel, |worker_id, worker_cancel| {
            work(Arc::clone(&shared), worker_id, worker_cancel)
        })
        .await;

        let snapshot = shared.metrics.snapshot();
        match &result {
            Ok(()) => tracing::debug!(
                stage = %name,
                batches = snapshot.batches,
                received = snapshot.received,
                skipped = snapshot.skipped,
                "loader finished"
            ),
            Err(err) => tracing::debug!(stage = %name, error = %err, "loader stopped"),
        }
        result
    }
}

/// One worker: batch, load, apply the error policy
async fn work<H: BatchHandler>(
    shared: Arc<Shared<H>>,
    worker_id: usize,
    cancel: CancellationToken,
) -> Result<(), StageError> {
    let config = &shared.config;

    loop {
        let batch = shared.batcher.next_batch(&shared.input, &cancel).await?;
        if batch.is_empty() {
            return Ok(());
        }
        shared.metrics.record_batch(batch.len() as u64);

        match shared.handler.load_batch(&cancel, &batch).await {
            Ok(()) => {
                for observer in &config.observers {
                    observer
                        .on_complete(&batch)
                        .await
                        .map_err(|e| StageError::hook(HookPhase::OnComplete, e))?;
                }
            }
            Err(err) => {
                shared.metrics.record_failed();
                for observer in &config.observers {
                    observer
                        .on_error(&batch, &err)
                        .await
                        .map_err(|e| StageError::hook(HookPhase::OnError, e))?;
                }

                if config.fail_on_error || !err.is_tolerable() {
                    return Err(err);
                }

                shared.metrics.record_skipped();
                tracing::warn!(
                    stage = %config.name,
                    worker = worker_id,
                    size = batch.len(),
                    error = %err,
                    "handler failed, batch skipped"
                );
            }
        }
    }
}

// =============================================================================
// Loader
// =============================================================================

/// Adapts a per-message handler to single-message batches
struct PerMessage<H>(H);

#[async_trait]
impl<H: LoadHandler> BatchHandler for PerMessage<H> {
    async fn load_batch(
        &self,
        cancel: &CancellationToken,
        batch: &[Message],
    ) -> Result<(), StageError> {
        for message in batch {
            self.0.load(cancel, message).await?;
        }
        Ok(())
    }
}

/// Per-message sink stage
///
/// Hooks, concurrency and error policy behave as in [`LoaderBatched`]; the
/// configured batching is replaced by one message per call.
pub struct Loader<H> {
    inner: LoaderBatched<PerMessage<H>>,
}

impl<H: LoadHandler + 'static> Loader<H> {
    /// Create a per-message loader
    pub fn new(input: Inbox, handler: H, config: LoaderConfig) -> Self {
        let config = config.with_batching(Batching::Single);
        Self {
            inner: LoaderBatched::new(input, PerMessage(handler), config),
        }
    }

    /// Metrics handle, valid after `run` consumed the stage
    pub fn metrics(&self) -> Arc<StageMetrics> {
        self.inner.metrics()
    }
}

impl<H> std::fmt::Debug for Loader<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("config", &self.inner.shared.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<H: LoadHandler + 'static> Stage for Loader<H> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn run(self: Box<Self>, cancel: CancellationToken) -> Result<(), StageError> {
        Box::new(self.inner).run(cancel).await
    }
}
