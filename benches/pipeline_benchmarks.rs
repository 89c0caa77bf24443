use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use widgetweld::prelude::*;

fn bench_full_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_run");
    let runtime = tokio::runtime::Runtime::new().unwrap();

    for (producers, consumers) in [(1, 1), (4, 4), (8, 2), (2, 8)] {
        let total = producers * 1000;
        group.throughput(Throughput::Elements(total as u64));

        group.bench_with_input(
            BenchmarkId::new("count_sink", format!("{}p{}c", producers, consumers)),
            &(producers, consumers),
            |b, &(producers, consumers)| {
                b.iter(|| {
                    runtime.block_on(async {
                        let config = PipelineConfig::default()
                            .producers(producers)
                            .consumers(consumers)
                            .widgets_per_producer(1000)
                            .broken_per_batch(100);

                        let summary = Pipeline::new(config)
                            .unwrap()
                            .run_with(|_| CountSink::new())
                            .await
                            .unwrap();
                        black_box(summary);
                    })
                });
            },
        );
    }

    group.finish();
}

fn bench_batch_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_generation");

    for broken in [0i64, 10, 500, 999] {
        group.throughput(Throughput::Elements(1000));
        group.bench_with_input(BenchmarkId::new("broken", broken), &broken, |b, &broken| {
            let mut producer = Producer::with_seed(0, 42);
            b.iter(|| black_box(producer.batch(1000, black_box(broken))));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_full_run, bench_batch_generation);
criterion_main!(benches);
