// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Benchmarks for the command path.
//!
//! These benchmark the work added to every host command:
//! - Chain composition and dispatch
//! - Capability attribute derivation
//! - Session registry reconciliation
//!
//! Run with: `cargo bench --bench delegation`

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;
use std::hint::black_box;

use session_telemetry::config::TelemetryConfig;
use session_telemetry::session::SessionRegistry;
use session_telemetry::telemetry::attributes::{capabilities_to_attributes, to_snake_case};
use session_telemetry::telemetry::{InMemoryTracer, MetricsRegistry};
use session_telemetry::{next_fn, Capabilities, CommandResponse, DriverRef, SessionCapabilities, TelemetryRuntime};

fn capabilities() -> Capabilities {
    json!({
        "platformName": "Android",
        "deviceName": "Pixel 8",
        "appPackage": "com.example.app",
        "newCommandTimeout": 120,
        "UDID": "emulator-5554",
    })
    .as_object()
    .cloned()
    .unwrap()
}

/// Benchmark a command through the full plugin chain.
fn bench_dispatch(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(1));

    for semantic in ["command", "http"] {
        let config = TelemetryConfig {
            semantic: semantic.to_string(),
            attributes_in_caps: vec!["platformName".to_string(), "deviceName".to_string()],
            ..Default::default()
        };
        let registry = MetricsRegistry::new();
        let runtime = TelemetryRuntime::new(&config, Arc::new(InMemoryTracer::new()), &registry);
        let plugin = runtime.new_plugin();
        let driver = DriverRef::for_session("bench");

        rt.block_on(async {
            plugin
                .create_session(
                    next_fn(|| async { Ok(CommandResponse::session_created("bench", capabilities())) }),
                    &driver,
                    SessionCapabilities::default(),
                )
                .await
                .unwrap();
        });

        group.bench_with_input(BenchmarkId::new("handle", semantic), &plugin, |b, plugin| {
            b.iter(|| {
                rt.block_on(async {
                    plugin
                        .handle(
                            next_fn(|| async { Ok(CommandResponse::new(json!(null))) }),
                            &driver,
                            black_box("click"),
                            Vec::new(),
                        )
                        .await
                })
            });
        });
    }

    group.finish();
}

/// Benchmark capability attribute derivation.
fn bench_attributes(c: &mut Criterion) {
    let mut group = c.benchmark_group("attributes");
    let caps = capabilities();
    let targets: Vec<String> = caps.keys().cloned().collect();

    group.bench_function("to_snake_case", |b| {
        b.iter(|| black_box(to_snake_case(black_box("newCommandTimeout"))));
    });

    group.bench_function("capabilities_to_attributes", |b| {
        b.iter(|| black_box(capabilities_to_attributes(Some(&caps), &targets)));
    });

    group.finish();
}

/// Benchmark registry reconciliation with different sizes.
fn bench_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile");

    for size in [10usize, 100, 1000] {
        let now = Utc::now();
        let live: HashSet<String> = (0..size).step_by(2).map(|i| format!("s{}", i)).collect();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_batched(
                || {
                    let registry = SessionRegistry::new(Duration::milliseconds(300));
                    for i in 0..size {
                        registry.on_session_created(&format!("s{}", i), Capabilities::new(), now - Duration::seconds(10));
                    }
                    registry
                },
                |registry| black_box(registry.observe(&live, now)),
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_dispatch, bench_attributes, bench_reconcile);

criterion_main!(benches);
