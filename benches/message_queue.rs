//! Message queue benchmarks: enqueue placement and drain throughput.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use syndicate::domain::models::MessageQueue;

fn bench_enqueue(c: &mut Criterion) {
    let mut group = c.benchmark_group("enqueue");
    for size in [100usize, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let mut queue = MessageQueue::new();
                for i in 0..size {
                    // Cycle priorities so insertion hits interior positions
                    queue.enqueue(black_box(i), (i % 5) as u8 + 1);
                }
                queue
            });
        });
    }
    group.finish();
}

fn bench_enqueue_dequeue_cycle(c: &mut Criterion) {
    c.bench_function("enqueue_dequeue_1000", |b| {
        b.iter(|| {
            let mut queue = MessageQueue::new();
            for i in 0..1_000usize {
                queue.enqueue(black_box(i), (i % 5) as u8 + 1);
            }
            let mut drained = 0usize;
            while queue.dequeue().is_some() {
                drained += 1;
            }
            black_box(drained)
        });
    });
}

criterion_group!(benches, bench_enqueue, bench_enqueue_dequeue_cycle);
criterion_main!(benches);
