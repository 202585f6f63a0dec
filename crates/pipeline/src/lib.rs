//! Sluice Pipeline - Stage lifecycle and orchestration
//!
//! Runs stages concurrently under one shared cancellation token.
//!
//! # Architecture
//!
//! ```text
//! [Extractor] ──Inbox──→ [Transformer] ──Inbox──→ [Queue] ──Inbox──→ [Loader]
//!      │                     │ × W workers             │                  │ × W workers
//!      └─────────────────────┴──── CancellationToken ──┴──────────────────┘
//! ```
//!
//! # Key Design
//!
//! - **One-shot stages**: `Stage::run` consumes the stage, so a stage can
//!   never be restarted
//! - **Fan-out workers**: `run_workers` spawns W tasks competing for one input
//!   and cancels the siblings when the first one fails
//! - **First error wins**: `run_all` / `Pipeline::run` cancel every stage on
//!   the first failure and return only that failure
//! - **Metrics handles**: `StageMetrics` stays readable after `run` consumes
//!   the stage
//!
//! # Example
//!
//! ```ignore
//! use sluice_pipeline::Pipeline;
//! use sluice_protocol::CancellationToken;
//!
//! let pipeline = Pipeline::new()
//!     .stage(extractor)
//!     .stage(transformer)
//!     .stage(loader);
//!
//! pipeline.run(CancellationToken::new()).await?;
//! ```

mod metrics;
mod orchestrator;
mod stage;
mod workers;

pub use metrics::{MetricsSnapshot, StageMetrics};
pub use orchestrator::{Pipeline, run_all};
pub use stage::Stage;
pub use workers::run_workers;

/// Default number of workers per stage
pub const DEFAULT_CONCURRENCY: usize = 1;
