//! Message - the immutable unit of data flowing between stages
//!
//! A `Message` carries an opaque payload plus two timestamps. The
//! `processing_started_at` timestamp is set once when a value first enters
//! the pipeline and is inherited by every message derived from it, so the
//! last stage can measure end-to-end latency.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::StageError;

/// Opaque, shareable payload
///
/// Only the handler that receives a payload knows its concrete type.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Immutable message passed between stages
///
/// Cloning is cheap: the payload is reference counted.
///
/// # Example
///
/// ```
/// use sluice_protocol::Message;
///
/// let msg = Message::new(42u64);
/// assert_eq!(*msg.downcast::<u64>().unwrap(), 42);
///
/// let derived = msg.derive("forty-two");
/// assert_eq!(derived.processing_started_at(), msg.processing_started_at());
/// ```
#[derive(Clone)]
pub struct Message {
    payload: Payload,
    created_at: DateTime<Utc>,
    processing_started_at: DateTime<Utc>,
}

impl Message {
    /// Create a message entering the pipeline now
    pub fn new<T: Any + Send + Sync>(payload: T) -> Self {
        Self::from_payload(Arc::new(payload))
    }

    /// Create a message from an already shared payload
    pub fn from_payload(payload: Payload) -> Self {
        let now = Utc::now();
        Self {
            payload,
            created_at: now,
            processing_started_at: now,
        }
    }

    /// Override the processing start timestamp
    pub fn with_processing_started_at(mut self, at: DateTime<Utc>) -> Self {
        self.processing_started_at = at;
        self
    }

    /// Create a new message that inherits this message's processing start
    #[inline]
    pub fn derive<T: Any + Send + Sync>(&self, payload: T) -> Self {
        Self::new(payload).with_processing_started_at(self.processing_started_at)
    }

    /// Get the opaque payload
    #[inline]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Interpret the payload as `T`
    ///
    /// Returns `StageError::TypeMismatch` if the payload is of another type.
    /// Handlers should propagate this error: it always terminates the stage.
    pub fn downcast<T: Any>(&self) -> Result<&T, StageError> {
        self.payload
            .downcast_ref::<T>()
            .ok_or_else(StageError::type_mismatch::<T>)
    }

    /// Check whether the payload is of type `T`
    #[inline]
    pub fn is<T: Any>(&self) -> bool {
        self.payload.is::<T>()
    }

    /// When this message was constructed
    #[inline]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the value this message derives from entered the pipeline
    #[inline]
    pub fn processing_started_at(&self) -> DateTime<Utc> {
        self.processing_started_at
    }

    /// Time elapsed since processing started
    pub fn latency(&self) -> chrono::Duration {
        Utc::now() - self.processing_started_at
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("created_at", &self.created_at)
            .field("processing_started_at", &self.processing_started_at)
            .finish_non_exhaustive()
    }
}
