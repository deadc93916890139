// benches/pool_bench.rs
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use north_core::{Pool, TokenAllocator};
use std::hint::black_box;

fn bench_single_alloc_free(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_single");
    for &capacity in &[256usize, 4096, 65536] {
        group.bench_with_input(BenchmarkId::new("alloc_free", capacity), &capacity, |b, &capacity| {
            let pool = Pool::new(64, capacity).unwrap();
            b.iter(|| {
                let p = pool.alloc().unwrap();
                pool.free(black_box(p));
            });
        });
    }
    group.finish();
}

fn bench_batch_alloc_free(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_batch");
    for &k in &[16usize, 64, 256] {
        group.bench_with_input(BenchmarkId::new("batch", k), &k, |b, &k| {
            let pool = Pool::new(64, 100_000).unwrap();
            b.iter(|| {
                let got = pool.alloc_batch(k);
                pool.free_batch(black_box(&got));
            });
        });
    }
    group.finish();
}

fn bench_contended_pool(c: &mut Criterion) {
    use std::sync::Arc;
    use std::thread;

    c.bench_function("pool_8_threads_contended", |b| {
        b.iter(|| {
            let pool = Arc::new(Pool::new(64, 4096).unwrap());
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let pool = Arc::clone(&pool);
                    thread::spawn(move || {
                        for _ in 0..1000 {
                            if let Some(p) = pool.alloc() {
                                pool.free(p);
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
}

fn bench_token_allocator(c: &mut Criterion) {
    c.bench_function("token_alloc_free", |b| {
        let allocator = TokenAllocator::new();
        b.iter(|| {
            let t = allocator.alloc().unwrap();
            allocator.free(black_box(t));
        });
    });

    c.bench_function("token_growth_1024_unreleased", |b| {
        b.iter(|| {
            let allocator = TokenAllocator::new();
            for _ in 0..1024 {
                black_box(allocator.alloc().unwrap());
            }
        });
    });
}

criterion_group!(
    benches,
    bench_single_alloc_free,
    bench_batch_alloc_free,
    bench_contended_pool,
    bench_token_allocator
);
criterion_main!(benches);
