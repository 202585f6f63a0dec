//! End-to-end tests wiring real stages into pipelines
//!
//! Every test builds extractor → (transformer | queue) → loader chains and
//! drives them through `Pipeline::run`, checking ordering, batching timing,
//! error policy and cancellation as a caller sees them.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sluice_pipeline::Pipeline;
use sluice_protocol::{BoxError, CancellationToken, Message, StageError};
use sluice_queue::{Queue, QueueConfig};
use sluice_sinks::{
    BatchHandler, Batching, LoadHandler, LoadObserver, Loader, LoaderBatched, LoaderConfig,
};
use sluice_sources::{ExtractHandler, ExtractSender, Extractor, ExtractorConfig};
use sluice_transform::{Emitter, TransformHandler, Transformer, TransformerConfig};
use tokio::time::{Instant, timeout};

const WAIT: Duration = Duration::from_secs(30);

// ============================================================================
// Handlers
// ============================================================================

/// Sends each value after sleeping its offset from the previous one, then
/// keeps the channel open for `linger`
struct Timed {
    items: Vec<(Duration, u32)>,
    linger: Duration,
}

impl Timed {
    fn immediate(values: impl IntoIterator<Item = u32>) -> Self {
        Self {
            items: values.into_iter().map(|v| (Duration::ZERO, v)).collect(),
            linger: Duration::ZERO,
        }
    }
}

#[async_trait]
impl ExtractHandler for Timed {
    async fn extract(
        &self,
        cancel: &CancellationToken,
        sender: &ExtractSender<'_>,
    ) -> Result<(), StageError> {
        for (gap, value) in &self.items {
            if !gap.is_zero() {
                tokio::time::sleep(*gap).await;
            }
            sender.send(*value).await?;
        }
        tokio::select! {
            _ = cancel.cancelled() => Err(StageError::Cancelled),
            _ = tokio::time::sleep(self.linger) => Ok(()),
        }
    }
}

/// Counts upward until cancelled
struct Endless;

#[async_trait]
impl ExtractHandler for Endless {
    async fn extract(
        &self,
        _cancel: &CancellationToken,
        sender: &ExtractSender<'_>,
    ) -> Result<(), StageError> {
        let mut next = 0u32;
        loop {
            sender.send(next).await?;
            next = next.wrapping_add(1);
        }
    }
}

struct Triple;

#[async_trait]
impl TransformHandler for Triple {
    async fn handle(
        &self,
        _cancel: &CancellationToken,
        message: &Message,
        emitter: &Emitter<'_>,
    ) -> Result<(), StageError> {
        emitter.send(*message.downcast::<u32>()? * 3).await
    }
}

/// Routes even values to output 0, odd values to output 1
struct Parity;

#[async_trait]
impl TransformHandler for Parity {
    async fn handle(
        &self,
        _cancel: &CancellationToken,
        message: &Message,
        emitter: &Emitter<'_>,
    ) -> Result<(), StageError> {
        let value = *message.downcast::<u32>()?;
        emitter.send_to((value % 2) as usize, value).await
    }
}

/// Expects `String` payloads
struct Shout;

#[async_trait]
impl TransformHandler for Shout {
    async fn handle(
        &self,
        _cancel: &CancellationToken,
        message: &Message,
        emitter: &Emitter<'_>,
    ) -> Result<(), StageError> {
        emitter.send(message.downcast::<String>()?.to_uppercase()).await
    }
}

/// Records every batch with its arrival time relative to `start`
#[derive(Clone)]
struct Batches {
    start: Instant,
    seen: Arc<Mutex<Vec<(Duration, Vec<u32>)>>>,
}

impl Batches {
    fn new() -> Self {
        Self {
            start: Instant::now(),
            seen: Arc::default(),
        }
    }

    fn values(&self) -> Vec<Vec<u32>> {
        self.seen.lock().iter().map(|(_, b)| b.clone()).collect()
    }

    fn flattened(&self) -> Vec<u32> {
        self.values().into_iter().flatten().collect()
    }

    fn arrivals(&self) -> Vec<Duration> {
        self.seen.lock().iter().map(|(at, _)| *at).collect()
    }
}

#[async_trait]
impl BatchHandler for Batches {
    async fn load_batch(
        &self,
        _cancel: &CancellationToken,
        batch: &[Message],
    ) -> Result<(), StageError> {
        let values = batch
            .iter()
            .map(|m| m.downcast::<u32>().copied())
            .collect::<Result<Vec<_>, _>>()?;
        self.seen.lock().push((self.start.elapsed(), values));
        Ok(())
    }
}

#[async_trait]
impl LoadHandler for Batches {
    async fn load(&self, cancel: &CancellationToken, message: &Message) -> Result<(), StageError> {
        self.load_batch(cancel, std::slice::from_ref(message)).await
    }
}

/// Fails on values matching `fail`, records the rest
struct FailOn {
    fail: fn(u32) -> bool,
    loaded: Arc<Mutex<Vec<u32>>>,
}

#[async_trait]
impl LoadHandler for FailOn {
    async fn load(&self, _cancel: &CancellationToken, message: &Message) -> Result<(), StageError> {
        let value = *message.downcast::<u32>()?;
        if (self.fail)(value) {
            return Err(StageError::handler(format!("refused {value}")));
        }
        self.loaded.lock().push(value);
        Ok(())
    }
}

#[derive(Clone, Default)]
struct ErrorCount(Arc<AtomicUsize>);

#[async_trait]
impl LoadObserver for ErrorCount {
    async fn on_error(&self, _batch: &[Message], _error: &StageError) -> Result<(), BoxError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

async fn run(pipeline: Pipeline) -> Result<(), StageError> {
    timeout(WAIT, pipeline.run(CancellationToken::new()))
        .await
        .expect("pipeline did not finish")
}

fn source<H: ExtractHandler + 'static>(handler: H) -> Extractor<H> {
    Extractor::new(handler, ExtractorConfig::default().with_name("source"))
}

// ============================================================================
// Ordering and routing
// ============================================================================

#[tokio::test]
async fn test_single_worker_preserves_order() {
    let extractor = source(Timed::immediate(0..200));
    let transformer = Transformer::new(
        extractor.output(),
        Triple,
        TransformerConfig::default().with_name("triple"),
    );
    let sink = Batches::new();
    let loader = Loader::new(
        transformer.output(0).unwrap(),
        sink.clone(),
        LoaderConfig::default(),
    );

    run(Pipeline::new()
        .stage(extractor)
        .stage(transformer)
        .stage(loader))
    .await
    .unwrap();

    let expected: Vec<u32> = (0..200).map(|v| v * 3).collect();
    assert_eq!(sink.flattened(), expected);
}

#[tokio::test]
async fn test_demux_routes_to_independent_sinks() {
    let extractor = source(Timed::immediate(0..50));
    let parity = Transformer::demux(
        extractor.output(),
        Parity,
        2,
        TransformerConfig::default().with_concurrency(4),
    );
    let evens = Batches::new();
    let odds = Batches::new();
    let even_loader = Loader::new(parity.output(0).unwrap(), evens.clone(), LoaderConfig::default());
    let odd_loader = Loader::new(parity.output(1).unwrap(), odds.clone(), LoaderConfig::default());

    run(Pipeline::new()
        .stage(extractor)
        .stage(parity)
        .stage(even_loader)
        .stage(odd_loader))
    .await
    .unwrap();

    let mut even_values = evens.flattened();
    let mut odd_values = odds.flattened();
    even_values.sort_unstable();
    odd_values.sort_unstable();
    assert_eq!(even_values, (0..50).filter(|v| v % 2 == 0).collect::<Vec<_>>());
    assert_eq!(odd_values, (0..50).filter(|v| v % 2 == 1).collect::<Vec<_>>());
}

// ============================================================================
// Batching
// ============================================================================

#[tokio::test]
async fn test_fixed_batches_deliver_trailing_partial() {
    let extractor = source(Timed::immediate([1, 2, 3]));
    let sink = Batches::new();
    let loader = LoaderBatched::new(
        extractor.output(),
        sink.clone(),
        LoaderConfig::default().with_batching(Batching::Fixed(2)),
    );

    run(Pipeline::new().stage(extractor).stage(loader))
        .await
        .unwrap();

    assert_eq!(sink.values(), vec![vec![1, 2], vec![3]]);
}

#[tokio::test(start_paused = true)]
async fn test_throttle_flushes_when_full() {
    let extractor = source(Timed {
        items: vec![
            (Duration::ZERO, 1),
            (Duration::from_millis(100), 2),
        ],
        linger: Duration::from_secs(5),
    });
    let sink = Batches::new();
    let loader = LoaderBatched::new(
        extractor.output(),
        sink.clone(),
        LoaderConfig::default().with_batching(Batching::Throttled {
            interval: Duration::from_secs(1),
            max_items: 2,
        }),
    );

    run(Pipeline::new().stage(extractor).stage(loader))
        .await
        .unwrap();

    assert_eq!(sink.values(), vec![vec![1, 2]]);
    let flushed = sink.arrivals()[0];
    assert!(flushed >= Duration::from_millis(100));
    assert!(flushed < Duration::from_millis(200), "flushed at {flushed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_throttle_flushes_when_window_expires() {
    let extractor = source(Timed {
        items: vec![
            (Duration::ZERO, 1),
            (Duration::from_millis(100), 2),
        ],
        linger: Duration::from_secs(5),
    });
    let sink = Batches::new();
    let loader = LoaderBatched::new(
        extractor.output(),
        sink.clone(),
        LoaderConfig::default().with_batching(Batching::Throttled {
            interval: Duration::from_secs(1),
            max_items: 10,
        }),
    );

    run(Pipeline::new().stage(extractor).stage(loader))
        .await
        .unwrap();

    assert_eq!(sink.values(), vec![vec![1, 2]]);
    let flushed = sink.arrivals()[0];
    assert!(flushed >= Duration::from_secs(1));
    assert!(flushed < Duration::from_millis(1100), "flushed at {flushed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_debounce_extends_window_through_burst() {
    let burst = (1..=5)
        .map(|v| {
            let gap = if v == 1 { Duration::ZERO } else { Duration::from_millis(100) };
            (gap, v)
        })
        .collect();
    let extractor = source(Timed {
        items: burst,
        linger: Duration::from_secs(5),
    });
    let sink = Batches::new();
    let loader = LoaderBatched::new(
        extractor.output(),
        sink.clone(),
        LoaderConfig::default().with_batching(Batching::Debounced {
            interval: Duration::from_secs(1),
            max_items: 100,
        }),
    );

    run(Pipeline::new().stage(extractor).stage(loader))
        .await
        .unwrap();

    // last item lands at 400ms, then one quiet second
    assert_eq!(sink.values(), vec![vec![1, 2, 3, 4, 5]]);
    let flushed = sink.arrivals()[0];
    assert!(flushed >= Duration::from_millis(1400));
    assert!(flushed < Duration::from_millis(1500), "flushed at {flushed:?}");
}

// ============================================================================
// Error policy
// ============================================================================

#[tokio::test]
async fn test_tolerated_failures_finish_cleanly() {
    let extractor = source(Timed::immediate(1..=5));
    let errors = ErrorCount::default();
    let loaded = Arc::new(Mutex::new(Vec::new()));
    let loader = Loader::new(
        extractor.output(),
        FailOn {
            fail: |_| true,
            loaded: Arc::clone(&loaded),
        },
        LoaderConfig::default()
            .with_fail_on_error(false)
            .with_observer(errors.clone()),
    );
    let metrics = loader.metrics();

    run(Pipeline::new().stage(extractor).stage(loader))
        .await
        .unwrap();

    assert_eq!(errors.0.load(Ordering::SeqCst), 5);
    assert!(loaded.lock().is_empty());
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.failed, 5);
    assert_eq!(snapshot.skipped, 5);
}

#[tokio::test]
async fn test_first_failure_stops_pipeline() {
    let extractor = source(Endless);
    let loaded = Arc::new(Mutex::new(Vec::new()));
    let errors = ErrorCount::default();
    let loader = Loader::new(
        extractor.output(),
        FailOn {
            fail: |v| v == 3,
            loaded: Arc::clone(&loaded),
        },
        LoaderConfig::default().with_observer(errors.clone()),
    );

    let err = run(Pipeline::new().stage(extractor).stage(loader))
        .await
        .unwrap_err();

    assert!(matches!(err, StageError::Handler(_)), "got {err:?}");
    assert!(err.to_string().contains("refused 3"));
    assert_eq!(*loaded.lock(), vec![0, 1, 2]);
    assert_eq!(errors.0.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_type_mismatch_is_fatal_even_when_tolerating() {
    let extractor = source(Endless);
    let shout = Transformer::new(
        extractor.output(),
        Shout,
        TransformerConfig::default().with_fail_on_error(false),
    );
    let loader = Loader::new(shout.output(0).unwrap(), Batches::new(), LoaderConfig::default());

    let err = run(Pipeline::new().stage(extractor).stage(shout).stage(loader))
        .await
        .unwrap_err();

    assert!(matches!(err, StageError::TypeMismatch { .. }), "got {err:?}");
}

// ============================================================================
// Queue
// ============================================================================

#[tokio::test]
async fn test_fifo_queue_keeps_order_under_load() {
    let extractor = Extractor::new(
        Timed::immediate(0..1000),
        ExtractorConfig::default().with_buffer_size(8),
    );
    let queue = Queue::new(
        extractor.output(),
        QueueConfig::default().with_buffer_size(3),
    );
    let sink = Batches::new();
    let loader = LoaderBatched::new(
        queue.output(),
        sink.clone(),
        LoaderConfig::default().with_batching(Batching::Drained(16)),
    );

    run(Pipeline::new().stage(extractor).stage(queue).stage(loader))
        .await
        .unwrap();

    assert_eq!(sink.flattened(), (0..1000).collect::<Vec<_>>());
}

#[tokio::test(start_paused = true)]
async fn test_delay_queue_releases_after_delay() {
    let extractor = source(Timed::immediate([7]));
    let queue = Queue::new(
        extractor.output(),
        QueueConfig::default().with_delay(Duration::from_millis(200)),
    );
    let sink = Batches::new();
    let loader = Loader::new(queue.output(), sink.clone(), LoaderConfig::default());

    run(Pipeline::new().stage(extractor).stage(queue).stage(loader))
        .await
        .unwrap();

    assert_eq!(sink.values(), vec![vec![7]]);
    let released = sink.arrivals()[0];
    assert!(released >= Duration::from_millis(200));
    assert!(released < Duration::from_millis(250), "released at {released:?}");
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancel_unblocks_stalled_stages() {
    // blocked on send: nothing ever reads the transformer's output
    let extractor = source(Endless);
    let triple = Transformer::new(extractor.output(), Triple, TransformerConfig::default());
    let _stalled = triple.output(0).unwrap();

    // blocked on receive: the source stays open but silent
    let idle = Extractor::new(
        Timed {
            items: Vec::new(),
            linger: Duration::from_secs(3600),
        },
        ExtractorConfig::default().with_name("idle"),
    );
    let loader = Loader::new(idle.output(), Batches::new(), LoaderConfig::default());

    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            Pipeline::new()
                .stage(extractor)
                .stage(triple)
                .stage(idle)
                .stage(loader)
                .run(cancel)
                .await
        }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let result = timeout(Duration::from_secs(5), handle)
        .await
        .expect("stages stayed blocked after cancel")
        .unwrap();
    assert!(matches!(result, Err(StageError::Cancelled)));
}
