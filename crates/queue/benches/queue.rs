//! Queue benchmark suite
//!
//! Measures end-to-end throughput of a FIFO queue stage between a producer
//! and a draining consumer.
//!
//! Run with: `cargo bench -p sluice-queue`

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use sluice_pipeline::Stage;
use sluice_protocol::{CancellationToken, Message, channel};
use sluice_queue::{Queue, QueueConfig};
use tokio::runtime::Runtime;

/// Push `count` messages through a fresh queue and drain the output
async fn pump(count: u64, buffer_size: usize) -> u64 {
    let cancel = CancellationToken::new();
    let (tx, rx) = channel(buffer_size);
    let queue = Queue::new(rx, QueueConfig::default().with_buffer_size(buffer_size));
    let output = queue.output();

    let stage = {
        let cancel = cancel.clone();
        tokio::spawn(async move { Box::new(queue).run(cancel).await })
    };
    let producer = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            for i in 0..count {
                if tx.send(Message::new(i), &cancel).await.is_err() {
                    break;
                }
            }
        })
    };

    let mut received = 0;
    while let Ok(next) = output.recv(&cancel).await {
        match next.into_item() {
            Some(msg) => {
                black_box(msg);
                received += 1;
            }
            None => break,
        }
    }

    let _ = producer.await;
    let _ = stage.await;
    received
}

/// Benchmark FIFO throughput at different output buffer sizes
fn bench_fifo_throughput(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    const MESSAGES: u64 = 10_000;

    let mut group = c.benchmark_group("fifo_throughput");
    group.throughput(Throughput::Elements(MESSAGES));

    for buffer_size in [0, 16, 256] {
        group.bench_with_input(
            BenchmarkId::from_parameter(buffer_size),
            &buffer_size,
            |b, &size| {
                b.to_async(&rt).iter(|| pump(MESSAGES, size));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_fifo_throughput);
criterion_main!(benches);
