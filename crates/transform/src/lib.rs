//! Sluice Transform - N-to-M message processing
//!
//! A [`Transformer`] consumes one input channel with a pool of workers and
//! calls a user [`TransformHandler`] once per message. The handler routes
//! results with an [`Emitter`] to any of the stage's output channels.
//!
//! # Overview
//!
//! ```text
//!                    ┌── worker 0 ──┐      ┌──► output 0
//! input ──(compete)──┼── worker 1 ──┼──────┼──► output 1
//!                    └── worker W ──┘      └──► output M-1
//! ```
//!
//! - **Unary**: [`Transformer::new`] has a single output
//! - **Demux**: [`Transformer::demux`] has M outputs, chosen per send
//!
//! # Error Policy
//!
//! A handler error runs the on-error observers, then:
//! - terminates the stage if `fail_on_error` is set (the default)
//! - terminates the stage if the error is anything but a handler failure
//!   (type mismatch, range, hook, cancellation)
//! - otherwise skips the message and continues
//!
//! # Ordering
//!
//! With concurrency 1 outputs preserve input order. With more workers only
//! per-worker order holds.

mod emitter;
mod observer;
mod transformer;

pub use emitter::Emitter;
pub use observer::TransformObserver;
pub use transformer::{TransformHandler, Transformer, TransformerConfig};
