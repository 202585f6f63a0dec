//! Word-count pipeline
//!
//! ```text
//! [lines] ──→ [tokenize] ──0──→ [settle] ──→ [long-words]  (batched)
//!                  │
//!                  └──────1─────────────────→ [short-words] (per message)
//! ```
//!
//! Stage and queue names double as keys into `[stages.*]` / `[queues.*]`.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use sluice_config::Config;
use sluice_pipeline::{MetricsSnapshot, Pipeline, StageMetrics};
use sluice_protocol::{BoxError, CancellationToken, Message, StageError};
use sluice_queue::{Queue, QueueConfig, QueueObserver};
use sluice_sinks::{BatchHandler, LoadHandler, Loader, LoaderBatched, LoaderConfig};
use sluice_sources::{Extractor, ExtractorConfig, LineSource};
use sluice_transform::{Emitter, TransformHandler, Transformer, TransformerConfig};
use tokio::io::AsyncBufRead;

#[cfg(test)]
#[path = "wordcount_test.rs"]
mod tests;

pub const LINES: &str = "lines";
pub const TOKENIZE: &str = "tokenize";
pub const SETTLE: &str = "settle";
pub const LONG_WORDS: &str = "long-words";
pub const SHORT_WORDS: &str = "short-words";

/// Words with at least this many characters take the long route
pub const LONG_WORD_CHARS: usize = 6;

const LONG_ROUTE: usize = 0;
const SHORT_ROUTE: usize = 1;

/// Splits a line into lowercase words and routes them by length
struct Tokenize;

#[async_trait]
impl TransformHandler for Tokenize {
    async fn handle(
        &self,
        _cancel: &CancellationToken,
        message: &Message,
        emitter: &Emitter<'_>,
    ) -> Result<(), StageError> {
        let line = message.downcast::<String>()?;
        for word in line
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            let route = if word.chars().count() >= LONG_WORD_CHARS {
                LONG_ROUTE
            } else {
                SHORT_ROUTE
            };
            emitter.send_to(route, word).await?;
        }
        Ok(())
    }
}

/// Shared word counts
#[derive(Debug, Default)]
pub struct Tally {
    counts: Mutex<HashMap<String, u64>>,
}

impl Tally {
    fn add(&self, word: &str) {
        *self.counts.lock().entry(word.to_string()).or_default() += 1;
    }

    /// Total number of words counted
    pub fn total(&self) -> u64 {
        self.counts.lock().values().sum()
    }

    /// Number of distinct words
    pub fn distinct(&self) -> usize {
        self.counts.lock().len()
    }

    /// The `n` most frequent words, ties broken alphabetically
    pub fn top(&self, n: usize) -> Vec<(String, u64)> {
        let mut words: Vec<(String, u64)> = self
            .counts
            .lock()
            .iter()
            .map(|(w, c)| (w.clone(), *c))
            .collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        words.truncate(n);
        words
    }
}

struct CountBatch(Arc<Tally>);

#[async_trait]
impl BatchHandler for CountBatch {
    async fn load_batch(
        &self,
        _cancel: &CancellationToken,
        batch: &[Message],
    ) -> Result<(), StageError> {
        for message in batch {
            self.0.add(message.downcast::<String>()?);
        }
        tracing::trace!(size = batch.len(), "counted batch");
        Ok(())
    }
}

struct CountWord(Arc<Tally>);

#[async_trait]
impl LoadHandler for CountWord {
    async fn load(&self, _cancel: &CancellationToken, message: &Message) -> Result<(), StageError> {
        self.0.add(message.downcast::<String>()?);
        Ok(())
    }
}

/// Tracks the deepest the settle queue got
#[derive(Debug, Clone, Default)]
pub struct PeakDepth(Arc<AtomicUsize>);

impl PeakDepth {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl QueueObserver for PeakDepth {
    async fn on_enqueue(&self, size: usize) -> Result<(), BoxError> {
        self.0.fetch_max(size, Ordering::Relaxed);
        Ok(())
    }
}

/// Results of a word-count run, readable after the pipeline finishes
pub struct Report {
    pub long_words: Arc<Tally>,
    pub short_words: Arc<Tally>,
    pub queue_peak: PeakDepth,
    metrics: Vec<(&'static str, Arc<StageMetrics>)>,
}

impl Report {
    /// Per-stage metrics in pipeline order
    pub fn metrics(&self) -> Vec<(&'static str, MetricsSnapshot)> {
        self.metrics
            .iter()
            .map(|(name, m)| (*name, m.snapshot()))
            .collect()
    }
}

/// Wire every stage over `reader`, applying per-stage settings from `config`
pub fn build<R>(config: &Config, reader: R) -> Result<(Pipeline, Report), StageError>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let long_words = Arc::new(Tally::default());
    let short_words = Arc::new(Tally::default());
    let queue_peak = PeakDepth::default();

    let lines = Extractor::new(
        LineSource::new(reader),
        ExtractorConfig::from(&config.stage(LINES)).with_name(LINES),
    );
    let tokenize = Transformer::demux(
        lines.output(),
        Tokenize,
        2,
        TransformerConfig::from(&config.stage(TOKENIZE)).with_name(TOKENIZE),
    );
    let settle = Queue::new(
        tokenize.output(LONG_ROUTE)?,
        QueueConfig::from(&config.queue(SETTLE))
            .with_name(SETTLE)
            .with_observer(queue_peak.clone()),
    );
    let long = LoaderBatched::new(
        settle.output(),
        CountBatch(Arc::clone(&long_words)),
        LoaderConfig::from(&config.stage(LONG_WORDS)).with_name(LONG_WORDS),
    );
    let short = Loader::new(
        tokenize.output(SHORT_ROUTE)?,
        CountWord(Arc::clone(&short_words)),
        LoaderConfig::from(&config.stage(SHORT_WORDS)).with_name(SHORT_WORDS),
    );

    let report = Report {
        long_words,
        short_words,
        queue_peak,
        metrics: vec![
            (LINES, lines.metrics()),
            (TOKENIZE, tokenize.metrics()),
            (SETTLE, settle.metrics()),
            (LONG_WORDS, long.metrics()),
            (SHORT_WORDS, short.metrics()),
        ],
    };

    let pipeline = Pipeline::new()
        .stage(lines)
        .stage(tokenize)
        .stage(settle)
        .stage(long)
        .stage(short);

    Ok((pipeline, report))
}
