//! Scratch pool and slot table benchmarks.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use slotline::buffer::ClientBuffer;
use slotline::format::MediaFormat;
use slotline::memory::{LinearBlock, ScratchPool};
use slotline::slots::FlexSlots;
use std::sync::Arc;

fn bench_scratch_acquire_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("scratch_acquire_release");

    for block_size in [1024, 64 * 1024, 1920 * 1080 * 3 / 2] {
        let pool = ScratchPool::new(block_size * 16);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(block_size), &pool, |b, pool| {
            b.iter(|| {
                let block = pool.acquire(block_size).expect("pool not exhausted");
                drop(block);
            });
        });
    }

    group.finish();
}

fn bench_scratch_concurrent(c: &mut Criterion) {
    let mut group = c.benchmark_group("scratch_concurrent");

    let pool = ScratchPool::new(1024 * 1024);

    group.throughput(Throughput::Elements(100));
    group.bench_function("4_threads_100_ops_each", |b| {
        b.iter(|| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let pool = Arc::clone(&pool);
                    std::thread::spawn(move || {
                        for _ in 0..100 {
                            if let Some(block) = pool.acquire(1024) {
                                std::hint::black_box(block.as_slice().as_ptr());
                            }
                        }
                    })
                })
                .collect();

            for h in handles {
                h.join().unwrap();
            }
        });
    });

    group.finish();
}

fn bench_flex_assign_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("flex_assign_release");
    let format = Arc::new(MediaFormat::audio("audio/raw"));

    for live in [4, 16, 64] {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(live), &live, |b, &live| {
            let mut slots = FlexSlots::new();
            let held: Vec<_> = (0..live)
                .map(|_| {
                    let buffer = ClientBuffer::linear(Arc::clone(&format), LinearBlock::heap(64));
                    slots.assign(buffer.clone());
                    buffer
                })
                .collect();
            b.iter(|| {
                let buffer = ClientBuffer::linear(Arc::clone(&format), LinearBlock::heap(64));
                slots.assign(buffer.clone());
                let engine = slots.release(&buffer).expect("just assigned");
                drop(engine);
            });
            std::hint::black_box(held);
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_scratch_acquire_release,
    bench_scratch_concurrent,
    bench_flex_assign_release
);
criterion_main!(benches);
