//! Orchestrator - runs a set of stages concurrently
//!
//! Every stage runs on its own task under a child of the caller's token.
//! The first stage to fail cancels the others; its error is the only one
//! returned. Errors from stages that fail afterwards (usually because they
//! observed the cancellation) are discarded.

use sluice_protocol::{CancellationToken, StageError};
use tokio::task::JoinSet;

use crate::stage::Stage;

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;

/// Run all stages concurrently and return the first failure
pub async fn run_all(
    cancel: &CancellationToken,
    stages: Vec<Box<dyn Stage>>,
) -> Result<(), StageError> {
    let run_cancel = cancel.child_token();
    let mut set = JoinSet::new();

    for stage in stages {
        let name = stage.name().to_string();
        let stage_cancel = run_cancel.clone();
        set.spawn(async move { (name, stage.run(stage_cancel).await) });
    }

    let mut first_error: Option<StageError> = None;
    while let Some(joined) = set.join_next().await {
        let (name, result) = match joined {
            Ok(outcome) => outcome,
            Err(e) => ("<unknown>".to_string(), Err(StageError::Worker(e.to_string()))),
        };

        match result {
            Ok(()) => tracing::debug!(stage = %name, "stage finished"),
            Err(err) if first_error.is_none() => {
                if err.is_cancelled() {
                    tracing::info!(stage = %name, "stage cancelled");
                } else {
                    tracing::error!(stage = %name, error = %err, "stage failed, cancelling pipeline");
                }
                run_cancel.cancel();
                first_error = Some(err);
            }
            Err(err) => tracing::debug!(stage = %name, error = %err, "stage stopped after cancellation"),
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Builder collecting the stages of one pipeline run
///
/// # Example
///
/// ```ignore
/// let result = Pipeline::new()
///     .stage(extractor)
///     .stage(loader)
///     .run(cancel)
///     .await;
/// ```
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    /// Create an empty pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stage
    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Add an already boxed stage
    pub fn boxed(mut self, stage: Box<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Number of stages
    #[inline]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Check if no stages were added
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Names of all stages in insertion order
    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage until all finish or the first one fails
    pub async fn run(self, cancel: CancellationToken) -> Result<(), StageError> {
        tracing::info!(stages = ?self.names(), "pipeline starting");
        let result = run_all(&cancel, self.stages).await;
        tracing::info!(ok = result.is_ok(), "pipeline stopped");
        result
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.names())
            .finish()
    }
}
