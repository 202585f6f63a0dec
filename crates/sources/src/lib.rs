//! Sluice Sources - the first stage of a pipeline
//!
//! An [`Extractor`] owns one output channel and calls a user
//! [`ExtractHandler`] exactly once. The handler pushes values downstream with
//! an [`ExtractSender`]; every value becomes a fresh [`Message`] whose
//! processing clock starts at that moment.
//!
//! # Available Handlers
//!
//! - **Lines** - [`LineSource`] emits one `String` per line of any async reader
//!
//! # Example
//!
//! ```ignore
//! use sluice_sources::{Extractor, ExtractorConfig, LineSource};
//!
//! let source = Extractor::new(LineSource::new(tokio::io::stdin()), ExtractorConfig::default());
//! let lines = source.output();
//! pipeline.stage(source);
//! ```
//!
//! [`Message`]: sluice_protocol::Message

mod extractor;
mod lines;
mod sender;

pub use extractor::{ExtractHandler, ExtractObserver, Extractor, ExtractorConfig};
pub use lines::LineSource;
pub use sender::ExtractSender;
