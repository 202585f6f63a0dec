//! Transformer stage - worker pool over one input, M outputs

use std::sync::Arc;

use async_trait::async_trait;
use sluice_pipeline::{DEFAULT_CONCURRENCY, Stage, StageMetrics, run_workers};
use sluice_protocol::{
    CancellationToken, DEFAULT_BUFFER_SIZE, HookPhase, Inbox, Message, Outbox, Received,
    StageError, channel,
};

use crate::emitter::Emitter;
use crate::observer::TransformObserver;

#[cfg(test)]
#[path = "transformer_test.rs"]
mod tests;

/// User logic applied to every input message
#[async_trait]
pub trait TransformHandler: Send + Sync {
    /// Process one message, emitting zero or more results
    ///
    /// Errors from the emitter should be propagated: they are never
    /// tolerated, even with `fail_on_error` disabled.
    async fn handle(
        &self,
        cancel: &CancellationToken,
        message: &Message,
        emitter: &Emitter<'_>,
    ) -> Result<(), StageError>;
}

/// Transformer configuration
///
/// # Example
///
/// ```ignore
/// let config = TransformerConfig::default()
///     .with_name("tokenize")
///     .with_concurrency(4)
///     .with_fail_on_error(false);
/// ```
#[derive(Clone)]
pub struct TransformerConfig {
    /// Stage name used in logs
    pub name: String,

    /// Number of workers sharing the input
    pub concurrency: usize,

    /// Output channel buffer size (0 = single-slot hand-off; crossfire has no rendezvous mode)
    pub buffer_size: usize,

    /// Terminate on the first handler error
    pub fail_on_error: bool,

    /// Pre-run, on-error and on-complete hooks, run in order
    pub observers: Vec<Arc<dyn TransformObserver>>,
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            name: "transformer".into(),
            concurrency: DEFAULT_CONCURRENCY,
            buffer_size: DEFAULT_BUFFER_SIZE,
            fail_on_error: true,
            observers: Vec::new(),
        }
    }
}

impl TransformerConfig {
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

    /// Set the output buffer size
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Set whether handler errors terminate the stage
    pub fn with_fail_on_error(mut self, fail: bool) -> Self {
        self.fail_on_error = fail;
        self
    }

    /// Add an observer
    pub fn with_observer(mut self, observer: impl TransformObserver + 'static) -> Self {
        self.observers.push(Arc::new(observer));
        self
    }
}

impl From<&sluice_config::StageConfig> for TransformerConfig {
    fn from(settings: &sluice_config::StageConfig) -> Self {
        Self::default()
            .with_concurrency(settings.concurrency)
            .with_buffer_size(settings.buffer_size)
            .with_fail_on_error(settings.fail_on_error)
    }
}

impl std::fmt::Debug for TransformerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformerConfig")
            .field("name", &self.name)
            .field("concurrency", &self.concurrency)
            .field("buffer_size", &self.buffer_size)
            .field("fail_on_error", &self.fail_on_error)
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Transform stage
///
/// Created once and consumed by [`Stage::run`]; all outputs close when `run`
/// returns, after every worker has stopped.
pub struct Transformer<H> {
    shared: Arc<Shared<H>>,
    receivers: Vec<Inbox>,
}

/// State shared by all workers
///
/// Holds the only long-lived senders of the outputs, so the outputs close
/// when the last worker drops its handle.
struct Shared<H> {
    handler: H,
    input: Inbox,
    outputs: Vec<Outbox>,
    config: TransformerConfig,
    metrics: Arc<StageMetrics>,
}

impl<H: TransformHandler + 'static> Transformer<H> {
    /// Create a single-output transformer
    pub fn new(input: Inbox, handler: H, config: TransformerConfig) -> Self {
        Self::demux(input, handler, 1, config)
    }

    /// Create a transformer with `outputs` output channels
    pub fn demux(input: Inbox, handler: H, outputs: usize, config: TransformerConfig) -> Self {
        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..outputs).map(|_| channel(config.buffer_size)).unzip();

        Self {
            shared: Arc::new(Shared {
                handler,
                input,
                outputs: senders,
                config,
                metrics: Arc::new(StageMetrics::new()),
            }),
            receivers,
        }
    }

    /// Output channel `index`
    pub fn output(&self, index: usize) -> Result<Inbox, StageError> {
        self.receivers
            .get(index)
            .cloned()
            .ok_or(StageError::OutOfRange {
                index,
                outputs: self.receivers.len(),
            })
    }

    /// Number of output channels
    #[inline]
    pub fn output_count(&self) -> usize {
        self.receivers.len()
    }

    /// Metrics handle, valid after `run` consumed the stage
    pub fn metrics(&self) -> Arc<StageMetrics> {
        Arc::clone(&self.shared.metrics)
    }
}

impl<H> std::fmt::Debug for Transformer<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transformer")
            .field("config", &self.shared.config)
            .field("outputs", &self.receivers.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<H: TransformHandler + 'static> Stage for Transformer<H> {
    fn name(&self) -> &str {
        &self.shared.config.name
    }

    async fn run(self: Box<Self>, cancel: CancellationToken) -> Result<(), StageError> {
        let Transformer { shared, receivers } = *self;
        drop(receivers);

        for observer in &shared.config.observers {
            observer
                .pre_run(&shared.input)
                .await
                .map_err(|e| StageError::hook(HookPhase::PreRun, e))?;
        }

        let name = shared.config.name.clone();
        let concurrency = shared.config.concurrency;
        tracing::debug!(stage = %name, concurrency, outputs = shared.outputs.len(), "transformer starting");

        let result = run_workers(&name, concurrency, &cancel, |worker_id, worker_cancel| {
            work(Arc::clone(&shared), worker_id, worker_cancel)
        })
        .await;

        let snapshot = shared.metrics.snapshot();
        drop(shared);

        match &result {
            Ok(()) => tracing::debug!(
                stage = %name,
                received = snapshot.received,
                emitted = snapshot.emitted,
                skipped = snapshot.skipped,
                "transformer finished"
            ),
            Err(err) => tracing::debug!(stage = %name, error = %err, "transformer stopped"),
        }
        result
    }
}

/// One worker: receive, handle, apply the error policy
async fn work<H: TransformHandler>(
    shared: Arc<Shared<H>>,
    worker_id: usize,
    cancel: CancellationToken,
) -> Result<(), StageError> {
    let config = &shared.config;

    loop {
        let message = match shared.input.recv(&cancel).await? {
            Received::Item(message) => message,
            Received::EndOfStream => return Ok(()),
        };
        shared.metrics.record_received(1);

        let emitter = Emitter::new(
            &message,
            &shared.outputs,
            &config.observers,
            &cancel,
            &shared.metrics,
        );
        let Err(err) = shared.handler.handle(&cancel, &message, &emitter).await else {
            continue;
        };
        shared.metrics.record_failed();

        for observer in &config.observers {
            observer
                .on_error(&message, &err)
                .await
                .map_err(|e| StageError::hook(HookPhase::OnError, e))?;
        }

        if config.fail_on_error || !err.is_tolerable() {
            return Err(err);
        }

        shared.metrics.record_skipped();
        tracing::warn!(stage = %config.name, worker = worker_id, error = %err, "handler failed, message skipped");
    }
}
