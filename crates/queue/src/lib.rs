//! Sluice Queue - rate decoupling between two stages
//!
//! A [`Queue`] sits between one upstream channel and one downstream channel.
//! It drains its input into an internal buffer as fast as the producer sends
//! and releases items downstream at the pace the consumer (and the driver's
//! policy) allows.
//!
//! # Drivers
//!
//! The buffer and its release policy live behind the [`Driver`] trait:
//!
//! - [`FifoDriver`]: releases items immediately, in arrival order
//! - [`DelayDriver`]: holds every item for a fixed delay after it arrived
//!
//! # Lifecycle
//!
//! ```text
//! input ──► fill loop ──push──► Driver buffer ──pop──► release loop ──► output
//!               │                                          ▲
//!               └──────────── wakeup (coalesced) ──────────┘
//! ```
//!
//! When the input closes the buffer is sealed. The release loop keeps going
//! until the sealed buffer is empty, then `run` returns and the output closes.

mod delay;
mod driver;
mod fifo;
mod observer;
mod queue;

pub use delay::DelayDriver;
pub use driver::{Driver, Front};
pub use fifo::FifoDriver;
pub use observer::QueueObserver;
pub use queue::{Queue, QueueConfig};
