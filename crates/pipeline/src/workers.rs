//! Worker pool shared by the multi-worker stages
//!
//! Transformers and loaders fan out into W workers that compete for items on
//! one input channel. The pool waits for every worker before returning, so
//! the owning stage can close its outputs exactly once afterwards.

use std::future::Future;

use sluice_protocol::{CancellationToken, StageError};
use tokio::task::JoinSet;

#[cfg(test)]
#[path = "workers_test.rs"]
mod tests;

/// Run `concurrency` workers and wait for all of them
///
/// Each worker receives its index and a token derived from `cancel`. The
/// first worker error cancels the remaining workers and is returned once
/// they have all stopped. With `concurrency <= 1` the single worker runs
/// inline on the calling task.
pub async fn run_workers<F, Fut>(
    stage: &str,
    concurrency: usize,
    cancel: &CancellationToken,
    worker: F,
) -> Result<(), StageError>
where
    F: Fn(usize, CancellationToken) -> Fut,
    Fut: Future<Output = Result<(), StageError>> + Send + 'static,
{
    if concurrency <= 1 {
        return worker(0, cancel.clone()).await;
    }

    let worker_cancel = cancel.child_token();
    let mut set = JoinSet::new();
    for worker_id in 0..concurrency {
        set.spawn(worker(worker_id, worker_cancel.clone()));
    }

    tracing::debug!(stage, concurrency, "workers started");

    let mut first_error: Option<StageError> = None;
    while let Some(joined) = set.join_next().await {
        let result = joined.unwrap_or_else(|e| Err(StageError::Worker(e.to_string())));

        if let Err(err) = result
            && first_error.is_none()
        {
            tracing::debug!(stage, error = %err, "worker failed, stopping siblings");
            worker_cancel.cancel();
            first_error = Some(err);
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
