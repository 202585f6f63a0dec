//! Extractor - source stage driven by a single handler call

use std::sync::Arc;

use async_trait::async_trait;
use sluice_pipeline::{Stage, StageMetrics};
use sluice_protocol::{
    BoxError, CancellationToken, DEFAULT_BUFFER_SIZE, HookPhase, Inbox, Outbox, StageError,
    channel,
};

use crate::sender::ExtractSender;

#[cfg(test)]
#[path = "extractor_test.rs"]
mod tests;

/// User logic producing the pipeline's input
#[async_trait]
pub trait ExtractHandler: Send + Sync {
    /// Produce values until the source is exhausted
    ///
    /// Returning `Ok` closes the output channel and ends the stream for
    /// downstream stages. Returning an error fails the stage.
    async fn extract(
        &self,
        cancel: &CancellationToken,
        sender: &ExtractSender<'_>,
    ) -> Result<(), StageError>;
}

/// Hooks around an extractor run
#[async_trait]
pub trait ExtractObserver: Send + Sync {
    /// Called once before the handler, with the stage's output channel
    async fn pre_run(&self, _output: &Outbox) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Extractor configuration
#[derive(Clone)]
pub struct ExtractorConfig {
    /// Stage name used in logs
    pub name: String,

    /// Output channel buffer size (0 = single-slot hand-off; crossfire has no rendezvous mode)
    pub buffer_size: usize,

    /// Pre-run hooks, run in order
    pub observers: Vec<Arc<dyn ExtractObserver>>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            name: "extractor".into(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            observers: Vec::new(),
        }
    }
}

impl ExtractorConfig {
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

    /// Add a pre-run observer
    pub fn with_observer(mut self, observer: impl ExtractObserver + 'static) -> Self {
        self.observers.push(Arc::new(observer));
        self
    }
}

impl From<&sluice_config::StageConfig> for ExtractorConfig {
    fn from(settings: &sluice_config::StageConfig) -> Self {
        Self::default().with_buffer_size(settings.buffer_size)
    }
}

impl std::fmt::Debug for ExtractorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorConfig")
            .field("name", &self.name)
            .field("buffer_size", &self.buffer_size)
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Source stage
pub struct Extractor<H> {
    handler: H,
    config: ExtractorConfig,
    output: Outbox,
    receiver: Inbox,
    metrics: Arc<StageMetrics>,
}

impl<H: ExtractHandler> Extractor<H> {
    /// Create an extractor around `handler`
    pub fn new(handler: H, config: ExtractorConfig) -> Self {
        let (output, receiver) = channel(config.buffer_size);
        Self {
            handler,
            config,
            output,
            receiver,
            metrics: Arc::new(StageMetrics::new()),
        }
    }

    /// Downstream end of the extractor
    pub fn output(&self) -> Inbox {
        self.receiver.clone()
    }

    /// Metrics handle, valid after `run` consumed the stage
    pub fn metrics(&self) -> Arc<StageMetrics> {
        Arc::clone(&self.metrics)
    }
}

#[async_trait]
impl<H: ExtractHandler + 'static> Stage for Extractor<H> {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn run(self: Box<Self>, cancel: CancellationToken) -> Result<(), StageError> {
        let Extractor {
            handler,
            config,
            output,
            receiver,
            metrics,
        } = *self;
        drop(receiver);

        for observer in &config.observers {
            observer
                .pre_run(&output)
                .await
                .map_err(|e| StageError::hook(HookPhase::PreRun, e))?;
        }

        tracing::debug!(stage = %config.name, "extractor starting");
        let sender = ExtractSender::new(&output, &cancel, &metrics);
        let result = handler.extract(&cancel, &sender).await;

        match &result {
            Ok(()) => tracing::debug!(
                stage = %config.name,
                emitted = metrics.snapshot().emitted,
                "extractor finished"
            ),
            Err(err) => tracing::debug!(stage = %config.name, error = %err, "extractor stopped"),
        }
        result
    }
}
