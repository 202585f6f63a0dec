//! Stage error types
//!
//! The closed set of failures a stage can produce. Only `Handler` errors
//! are subject to a stage's fail-on-error policy; everything else is fatal.

use std::fmt;

use thiserror::Error;

/// Boxed error returned by user handlers and observers
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Lifecycle point at which an observer hook ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    /// Before the stage starts consuming input
    PreRun,
    /// After a handler failure
    OnError,
    /// After a successful send or load
    OnComplete,
    /// After a queue enqueue
    Enqueue,
    /// After a queue dequeue
    Dequeue,
}

impl HookPhase {
    /// Short name used in error messages and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreRun => "pre-run",
            Self::OnError => "on-error",
            Self::OnComplete => "on-complete",
            Self::Enqueue => "enqueue",
            Self::Dequeue => "dequeue",
        }
    }
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while a stage runs
#[derive(Debug, Error)]
pub enum StageError {
    /// A send targeted an output channel index outside `[0, outputs)`
    #[error("output channel {index} out of range: stage has {outputs} output(s)")]
    OutOfRange { index: usize, outputs: usize },

    /// A handler could not interpret the payload it received
    #[error("payload type mismatch: expected {expected}")]
    TypeMismatch { expected: &'static str },

    /// Any other failure returned by a user handler
    #[error("handler failed: {0}")]
    Handler(#[source] BoxError),

    /// An observer hook returned an error
    #[error("{phase} hook failed: {source}")]
    Hook {
        phase: HookPhase,
        #[source]
        source: BoxError,
    },

    /// Every receiver of a downstream channel has been dropped
    #[error("downstream channel closed")]
    Disconnected,

    /// The shared cancellation token fired
    #[error("operation cancelled")]
    Cancelled,

    /// A worker task panicked or was aborted
    #[error("worker task failed: {0}")]
    Worker(String),
}

impl StageError {
    /// Wrap an arbitrary handler failure
    #[inline]
    pub fn handler(err: impl Into<BoxError>) -> Self {
        Self::Handler(err.into())
    }

    /// Wrap an observer failure with the phase it happened in
    #[inline]
    pub fn hook(phase: HookPhase, err: impl Into<BoxError>) -> Self {
        Self::Hook {
            phase,
            source: err.into(),
        }
    }

    /// Create a type mismatch error for the expected payload type
    #[inline]
    pub fn type_mismatch<T: ?Sized>() -> Self {
        Self::TypeMismatch {
            expected: std::any::type_name::<T>(),
        }
    }

    /// Check if this is a cancellation
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Check if a stage with fail-on-error disabled may skip this error
    ///
    /// Only plain handler failures are tolerable. Type mismatches, range
    /// errors, hook failures and cancellation always terminate the stage.
    #[inline]
    pub fn is_tolerable(&self) -> bool {
        matches!(self, Self::Handler(_))
    }
}
