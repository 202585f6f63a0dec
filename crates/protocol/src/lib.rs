//! Sluice Protocol - Core types that flow between pipeline stages
//!
//! This crate provides the foundational types every stage shares:
//! - `Message` - Immutable unit of data with an opaque `Payload`
//! - `Outbox` / `Inbox` - The channel connecting one stage to the next
//! - `Received` - Explicit item / end-of-stream result of a receive
//! - `StageError` - Closed set of failure kinds a stage can produce
//!
//! # Design Principles
//!
//! - **Payload-agnostic**: Stages never inspect payloads; only handlers do,
//!   via `Message::downcast`, which reports `StageError::TypeMismatch`
//! - **Cancellation everywhere**: Every blocking send/receive races a
//!   `CancellationToken`
//! - **Close by drop**: A channel ends when its last `Outbox` is dropped

mod channel;
mod error;
mod message;

pub use channel::{Inbox, Outbox, Received, channel};
pub use error::{BoxError, HookPhase, StageError};
pub use message::{Message, Payload};

// Re-export for convenience, every stage API takes one
pub use tokio_util::sync::CancellationToken;

/// Result type for stage operations
pub type Result<T> = std::result::Result<T, StageError>;

/// Default output channel buffer size (single-slot hand-off; crossfire has no rendezvous mode)
pub const DEFAULT_BUFFER_SIZE: usize = 0;
