use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use futures::future::try_join_all;
use registrar::{
    FixedClock, IdGenerator, MemoryStore, RetryConfig, RollNumberScheme, ThreadRandom,
    TokioSleep,
    codec::{confusable_free_suffix, format_checked_invoice_id, format_invoice_id, format_roll_number},
    simulate_roll_numbers,
};
use std::{sync::Arc, time::Instant};
use tokio::runtime::Builder;

// Number of identifiers formatted or issued per benchmark iteration.
const TOTAL_IDS: usize = 4096;

fn clock() -> FixedClock {
    FixedClock::new(chrono::DateTime::parse_from_rfc3339("2025-03-14T09:00:00+00:00").unwrap())
}

/// Benchmarks the pure formatters.
fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    group.bench_function(format!("roll/elems/{}", TOTAL_IDS), |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();
            for _ in 0..iters {
                for i in 0..TOTAL_IDS {
                    let seq = (i % 99) as u64 + 1;
                    black_box(format_roll_number("250314", (i % 10) as u8, seq).unwrap());
                }
            }
            start.elapsed()
        });
    });

    group.bench_function(format!("invoice/elems/{}", TOTAL_IDS), |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();
            for _ in 0..iters {
                for i in 0..TOTAL_IDS {
                    let suffix = confusable_free_suffix(3, &ThreadRandom);
                    black_box(format_invoice_id("AB2503", i as u64, 4, &suffix).unwrap());
                }
            }
            start.elapsed()
        });
    });

    group.bench_function(format!("checked/elems/{}", TOTAL_IDS), |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();
            for _ in 0..iters {
                for i in 0..TOTAL_IDS {
                    black_box(format_checked_invoice_id("250314", i as u64, 4).unwrap());
                }
            }
            start.elapsed()
        });
    });

    group.finish();
}

/// Benchmarks forward simulation across many digit rotations.
fn bench_simulation(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulate");
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    group.bench_function(format!("elems/{}", TOTAL_IDS), |b| {
        b.iter(|| black_box(simulate_roll_numbers("250314", TOTAL_IDS, 1, 0, 99).unwrap()));
    });

    group.finish();
}

/// Benchmarks issuing roll numbers against the in-memory store with many
/// callers contending for the same counter.
fn bench_generate_tokio(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate/tokio");
    group.sample_size(10);
    group.sampling_mode(criterion::SamplingMode::Flat);
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    for callers in [1, 8, 64] {
        let per_caller = TOTAL_IDS / callers;
        group.bench_function(format!("elems/{}/callers/{}", TOTAL_IDS, callers), |b| {
            let rt = Builder::new_multi_thread().enable_all().build().unwrap();

            b.to_async(&rt).iter_custom(move |iters| async move {
                let start = Instant::now();
                for _ in 0..iters {
                    // A fresh store per iteration keeps every identifier clear.
                    let generator: IdGenerator<_, _, _, TokioSleep> = IdGenerator::new(
                        Arc::new(MemoryStore::new()),
                        RollNumberScheme::default(),
                        RetryConfig::default(),
                        clock(),
                    );
                    let generator = &generator;
                    try_join_all((0..callers).map(|_| async move {
                        for _ in 0..per_caller {
                            black_box(generator.generate_one().await?);
                        }
                        Ok::<_, registrar::Error>(())
                    }))
                    .await
                    .unwrap();
                }
                start.elapsed()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_codec, bench_simulation, bench_generate_tokio);
criterion_main!(benches);
