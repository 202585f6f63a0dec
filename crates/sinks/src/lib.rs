//! Sluice Sinks - terminal stages
//!
//! Loaders consume their input with a worker pool and hand messages to user
//! handlers. They have no output channel.
//!
//! # Available Loaders
//!
//! - **LoaderBatched** - one [`BatchHandler`] call per batch; grouping is
//!   delegated to a [`Batcher`]
//! - **Loader** - one [`LoadHandler`] call per message
//!
//! # Batching Strategies
//!
//! | Strategy | Returns when |
//! |----------|--------------|
//! | Single | one message arrived |
//! | Fixed | `max_items` arrived |
//! | Drained | nothing more is immediately available, or `max_items` |
//! | Throttled | `interval` after the first item, or `max_items` |
//! | Debounced | `interval` without a new item, or `max_items` |
//!
//! Every strategy returns the partial batch when the input closes, and an
//! empty batch once the closed input is exhausted.

mod batcher;
mod loader;

pub use batcher::{
    Batcher, Batching, DebouncedBatcher, DrainedBatcher, FixedSizeBatcher, SingleBatcher,
    ThrottledBatcher,
};
pub use loader::{BatchHandler, LoadHandler, LoadObserver, Loader, LoaderBatched, LoaderConfig};
