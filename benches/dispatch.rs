//! Dispatch throughput benchmarks.
//!
//! Measures the per-change cost of fetching context and invoking
//! subscribers, and the cost of name-based execution.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use keyward::client::MemoryClient;
use keyward::prelude::*;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn sentinel_with_subscribers(count: usize) -> (Sentinel, Vec<String>) {
    let client = Arc::new(MemoryClient::new());
    client
        .set(
            &["sentinel", "web"],
            json!({ "port": 8080, "upstreams": ["a", "b", "c"], "tls": { "enabled": true } }),
        )
        .expect("seed value");

    let calls = Arc::new(AtomicUsize::new(0));
    let mut sentinel = Sentinel::new(client);
    let mut names = Vec::with_capacity(count);
    for i in 0..count {
        let calls = Arc::clone(&calls);
        let name = format!("executor-{}", i);
        sentinel.add(
            ["web"],
            Arc::new(FnExecutor::new(name.clone(), move |context| {
                black_box(context);
                calls.fetch_add(1, Ordering::Relaxed);
                Ok(())
            })),
        );
        names.push(name);
    }
    (sentinel, names)
}

/// Benchmark dispatching one change to a growing number of subscribers
fn benchmark_execute_key(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("runtime");
    let mut group = c.benchmark_group("execute_key");

    for subscribers in [1usize, 8, 64] {
        let (sentinel, _) = sentinel_with_subscribers(subscribers);
        group.throughput(Throughput::Elements(subscribers as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(subscribers),
            &subscribers,
            |b, _| {
                b.to_async(&rt).iter(|| async {
                    let errors = sentinel.execute_key("web").await;
                    black_box(errors);
                });
            },
        );
    }
    group.finish();
}

/// Benchmark on-demand execution by name
fn benchmark_execute_by_name(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("runtime");
    let (sentinel, names) = sentinel_with_subscribers(16);

    let mut group = c.benchmark_group("execute_by_name");
    group.throughput(Throughput::Elements(names.len() as u64));
    group.bench_function("sixteen_names", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(sentinel.execute(names.as_slice()).await).expect("execute");
        });
    });
    group.finish();
}

/// Benchmark a dispatch with no subscribers (lookup only)
fn benchmark_unsubscribed_key(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("runtime");
    let (sentinel, _) = sentinel_with_subscribers(4);

    c.bench_function("unsubscribed_key", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(sentinel.execute_key("cache").await);
        });
    });
}

criterion_group!(
    benches,
    benchmark_execute_key,
    benchmark_execute_by_name,
    benchmark_unsubscribed_key
);

criterion_main!(benches);
