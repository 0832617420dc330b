use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use kinesis_tail::prelude::*;
use tokio::runtime::Runtime;

const RECORDS_PER_SHARD: usize = 1_000;

fn record(shard: &ShardId, i: usize) -> Record {
    Record {
        shard_id: shard.clone(),
        sequence_number: format!("{:020}", i),
        partition_key: "bench".to_string(),
        approximate_arrival: None,
        data: vec![b'x'; 256],
    }
}

/// Records moved through the sink by concurrent producers
fn bench_sink_fan_in(c: &mut Criterion) {
    let mut group = c.benchmark_group("sink_fan_in");
    let runtime = Runtime::new().unwrap();

    for producers in [1, 4, 16] {
        group.throughput(Throughput::Elements((producers * RECORDS_PER_SHARD) as u64));

        for (label, capacity) in [
            ("unbounded", SinkCapacity::Unbounded),
            ("bounded_64", SinkCapacity::Bounded(NonZeroUsize::new(64).unwrap())),
        ] {
            group.bench_with_input(BenchmarkId::new(label, producers), &producers, |b, &producers| {
                b.to_async(&runtime).iter(|| async move {
                    let (tx, mut rx) = fan_in(capacity);

                    for p in 0..producers {
                        let tx = tx.clone();
                        tokio::spawn(async move {
                            let shard = ShardId::new(format!("shardId-{p}"));
                            for i in 0..RECORDS_PER_SHARD {
                                if tx.emit(record(&shard, i)).await.is_err() {
                                    break;
                                }
                            }
                        });
                    }
                    drop(tx);

                    let mut received = 0usize;
                    while let Some(record) = rx.recv().await {
                        black_box(record);
                        received += 1;
                    }
                    assert_eq!(received, producers * RECORDS_PER_SHARD);
                });
            });
        }
    }

    group.finish();
}

/// Full session against the in-memory service, from start to the last record
fn bench_tail_session(c: &mut Criterion) {
    let mut group = c.benchmark_group("tail_session");
    let runtime = Runtime::new().unwrap();

    for shards in [1, 4, 16] {
        group.throughput(Throughput::Elements((shards * RECORDS_PER_SHARD) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(shards), &shards, |b, &shards| {
            b.to_async(&runtime).iter_batched(
                || {
                    let ids: Vec<String> = (0..shards).map(|s| format!("shardId-{s}")).collect();
                    let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
                    let service = InMemoryStreamService::with_shards("bench", &refs);
                    for id in &ids {
                        for i in 0..RECORDS_PER_SHARD {
                            service.append(id, format!("record-{i}"));
                        }
                    }
                    Arc::new(service)
                },
                |service| async move {
                    let config = TailerConfig::new("bench")
                        .with_start_position(StartPosition::TrimHorizon)
                        .with_interval(Duration::from_millis(1));
                    let mut session = StreamTailer::new(service, config, FailFast)
                        .start()
                        .await
                        .unwrap();

                    for _ in 0..shards * RECORDS_PER_SHARD {
                        black_box(session.next_record().await.unwrap());
                    }
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_sink_fan_in, bench_tail_session);
criterion_main!(benches);
