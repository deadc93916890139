// demos/network_simulation.rs
//! Multi-threaded pool contention, matching the specification's
//! "8 threads, capacity 16, one million alloc/free pairs" scenario at a
//! smaller, demo-friendly scale, plus a reaper keeping idle caches drained.

use north_core::{Pool, Reaper};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

fn main() {
    println!("=== Concurrent Pool Stress ===\n");

    let pool = Arc::new(Pool::new(16, 16).unwrap());
    let reaper = Reaper::start(Arc::clone(&pool));

    let num_threads = 8;
    let iters_per_thread = 100_000;
    let start = Instant::now();

    let handles: Vec<_> = (0..num_threads)
        .map(|id| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                let mut local_exhaustions = 0u64;
                for _ in 0..iters_per_thread {
                    match pool.alloc() {
                        Some(p) => pool.free(p),
                        None => local_exhaustions += 1,
                    }
                }
                (id, local_exhaustions)
            })
        })
        .collect();

    let mut total_exhaustions = 0u64;
    for h in handles {
        let (id, exhaustions) = h.join().unwrap();
        println!("thread {id}: {exhaustions} transient exhaustions");
        total_exhaustions += exhaustions;
    }

    let elapsed = start.elapsed();
    reaper.stop();

    let stats = pool.stats();
    println!("\nElapsed: {elapsed:?}");
    println!("Pool stats: {stats:?}");
    println!("CAS success rate: {:.2}%", stats.cas_success_rate());
    println!("Total transient exhaustions across all threads: {total_exhaustions}");
    assert_eq!(stats.alloc_count, stats.free_count);
    println!("\nalloc_count == free_count holds after join, as required.");
}
