// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! In-process metrics registry and periodic reader.
//!
//! Provides a lightweight [`Meter`] without an external exporter stack:
//! counters aggregate per attribute set, gauges are pulled from their
//! callbacks on every [`MetricsRegistry::collect`], and [`PeriodicReader`]
//! drives collection on a fixed interval.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::attributes::Attributes;
use super::meter::{Counter, GaugeCallback, Meter, ObservableGauge};

/// How counter values are reported across collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Temporality {
    /// Running totals since the registry was created.
    #[default]
    Cumulative,
    /// Increments since the previous collection.
    Delta,
}

/// Kind of instrument a data point came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentKind {
    Counter,
    Gauge,
}

/// A single collected value.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    pub name: String,
    pub kind: InstrumentKind,
    pub attributes: Attributes,
    pub value: f64,
}

#[derive(Debug)]
struct CounterPoint {
    attributes: Attributes,
    value: u64,
}

#[derive(Debug)]
struct CounterInstrument {
    name: String,
    points: Mutex<BTreeMap<String, CounterPoint>>,
}

impl Counter for CounterInstrument {
    fn add(&self, amount: u64, attributes: &Attributes) {
        let key = serde_json::to_string(attributes).unwrap_or_default();
        let mut points = self.points.lock().unwrap_or_else(PoisonError::into_inner);
        points
            .entry(key)
            .or_insert_with(|| CounterPoint {
                attributes: attributes.clone(),
                value: 0,
            })
            .value += amount;
    }
}

struct GaugeInstrument {
    name: String,
    callbacks: RwLock<Vec<GaugeCallback>>,
}

impl ObservableGauge for GaugeInstrument {
    fn add_callback(&self, callback: GaugeCallback) {
        self.callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(callback);
    }
}

/// Meter name used when none is configured.
pub const DEFAULT_REGISTRY_NAME: &str = "appium-otel-plugin";

/// Shortest interval a [`PeriodicReader`] ticks at.
pub const MIN_READER_INTERVAL: Duration = Duration::from_millis(1);

/// In-process [`Meter`].
pub struct MetricsRegistry {
    name: String,
    temporality: Temporality,
    counters: RwLock<Vec<Arc<CounterInstrument>>>,
    gauges: RwLock<Vec<Arc<GaugeInstrument>>>,
    start_time: Instant,
}

impl MetricsRegistry {
    /// Create a registry reporting cumulative counters.
    pub fn new() -> Self {
        Self::named(DEFAULT_REGISTRY_NAME)
    }

    /// Create a cumulative registry with the given meter name.
    pub fn named(name: impl Into<String>) -> Self {
        Self::with_temporality(Temporality::Cumulative).with_name(name)
    }

    /// Create a registry with the given counter temporality.
    pub fn with_temporality(temporality: Temporality) -> Self {
        Self {
            name: DEFAULT_REGISTRY_NAME.to_string(),
            temporality,
            counters: RwLock::new(Vec::new()),
            gauges: RwLock::new(Vec::new()),
            start_time: Instant::now(),
        }
    }

    /// Rename the meter.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Counter temporality.
    pub fn temporality(&self) -> Temporality {
        self.temporality
    }

    /// Get uptime since the registry was created.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Collect every instrument once.
    ///
    /// Gauge callbacks run sequentially in registration order, so callbacks
    /// registered together observe the same tick.
    pub async fn collect(&self) -> MetricsSnapshot {
        let mut points = Vec::new();

        let counters = self
            .counters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for counter in counters {
            let mut counter_points = counter.points.lock().unwrap_or_else(PoisonError::into_inner);
            points.extend(counter_points.values().map(|p| DataPoint {
                name: counter.name.clone(),
                kind: InstrumentKind::Counter,
                attributes: p.attributes.clone(),
                value: p.value as f64,
            }));
            if self.temporality == Temporality::Delta {
                counter_points.clear();
            }
        }

        let gauges: Vec<(String, Vec<GaugeCallback>)> = self
            .gauges
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|g| {
                let callbacks = g
                    .callbacks
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                (g.name.clone(), callbacks)
            })
            .collect();
        for (name, callbacks) in gauges {
            for callback in callbacks {
                let observation = callback().await;
                points.push(DataPoint {
                    name: name.clone(),
                    kind: InstrumentKind::Gauge,
                    attributes: observation.attributes,
                    value: observation.value,
                });
            }
        }

        MetricsSnapshot {
            meter: self.name.clone(),
            points,
            uptime: self.uptime(),
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Meter for MetricsRegistry {
    fn create_counter(&self, name: &str) -> Arc<dyn Counter> {
        let mut counters = self.counters.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = counters.iter().find(|c| c.name == name) {
            return existing.clone();
        }
        let counter = Arc::new(CounterInstrument {
            name: name.to_string(),
            points: Mutex::new(BTreeMap::new()),
        });
        counters.push(Arc::clone(&counter));
        counter
    }

    fn create_observable_gauge(&self, name: &str) -> Arc<dyn ObservableGauge> {
        let mut gauges = self.gauges.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = gauges.iter().find(|g| g.name == name) {
            return existing.clone();
        }
        let gauge = Arc::new(GaugeInstrument {
            name: name.to_string(),
            callbacks: RwLock::new(Vec::new()),
        });
        gauges.push(Arc::clone(&gauge));
        gauge
    }
}

/// All data points from one collection.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Name of the registry that produced the snapshot.
    pub meter: String,

    pub points: Vec<DataPoint>,

    /// Registry uptime when the snapshot was taken.
    pub uptime: Duration,
}

impl MetricsSnapshot {
    /// Data points for the named instrument.
    pub fn points_named(&self, name: &str) -> Vec<&DataPoint> {
        self.points.iter().filter(|p| p.name == name).collect()
    }

    /// Values for the named instrument.
    pub fn values(&self, name: &str) -> Vec<f64> {
        self.points_named(name).iter().map(|p| p.value).collect()
    }

    /// Sum of all values for the named instrument.
    pub fn total(&self, name: &str) -> f64 {
        self.values(name).iter().sum()
    }

    /// Format as a human-readable report.
    pub fn format_report(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Metrics Report ===\n\n");
        report.push_str(&format!("Meter: {}\n", self.meter));
        report.push_str(&format!("Uptime: {:.2?}\n\n", self.uptime));

        for kind in [InstrumentKind::Counter, InstrumentKind::Gauge] {
            let points: Vec<&DataPoint> = self.points.iter().filter(|p| p.kind == kind).collect();
            if points.is_empty() {
                continue;
            }
            report.push_str(match kind {
                InstrumentKind::Counter => "Counters:\n",
                InstrumentKind::Gauge => "Gauges:\n",
            });
            for point in points {
                let attrs = point
                    .attributes
                    .iter()
                    .map(|(k, v)| match v {
                        serde_json::Value::String(s) => format!("{}={}", k, s),
                        other => format!("{}={}", k, other),
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                report.push_str(&format!("  {} {{{}}}: {}\n", point.name, attrs, point.value));
            }
            report.push('\n');
        }

        report
    }
}

/// Background task collecting a registry on a fixed interval.
///
/// Each snapshot is logged at debug level; a final collection runs on
/// shutdown so the last increments are not lost.
pub struct PeriodicReader {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl PeriodicReader {
    /// Spawn the reader on the current tokio runtime.
    ///
    /// Intervals shorter than [`MIN_READER_INTERVAL`] are raised to it.
    pub fn spawn(registry: Arc<MetricsRegistry>, interval: Duration) -> Self {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        if interval < MIN_READER_INTERVAL {
            warn!(interval_ms = interval.as_millis() as u64, "metrics interval too short, clamping");
        }
        let interval = interval.max(MIN_READER_INTERVAL);
        info!(
            meter = registry.name(),
            interval_ms = interval.as_millis() as u64,
            "metrics reader started"
        );

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let snapshot = registry.collect().await;
                        debug!(points = snapshot.points.len(), report = %snapshot.format_report(), "metrics collected");
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            let snapshot = registry.collect().await;
            debug!(points = snapshot.points.len(), report = %snapshot.format_report(), "final metrics collection");
        });

        Self { shutdown, handle }
    }

    /// Stop the reader and wait for its final collection.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.handle.await {
            warn!(error = %err, "metrics reader task failed");
        }
        info!("metrics reader stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::meter::{GaugeFuture, GaugeObservation};
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect()
    }

    #[tokio::test]
    async fn test_counter_aggregates_per_attribute_set() {
        let registry = MetricsRegistry::new();
        let counter = registry.create_counter("requests");

        counter.add(1, &attrs(&[("status", "success")]));
        counter.add(2, &attrs(&[("status", "success")]));
        counter.add(1, &attrs(&[("status", "error")]));

        let snapshot = registry.collect().await;
        assert_eq!(snapshot.points_named("requests").len(), 2);
        assert_eq!(snapshot.total("requests"), 4.0);
    }

    #[tokio::test]
    async fn test_cumulative_keeps_totals() {
        let registry = MetricsRegistry::new();
        let counter = registry.create_counter("requests");
        counter.add(1, &Attributes::new());

        assert_eq!(registry.collect().await.values("requests"), vec![1.0]);
        counter.add(1, &Attributes::new());
        assert_eq!(registry.collect().await.values("requests"), vec![2.0]);
    }

    #[tokio::test]
    async fn test_delta_resets_between_collections() {
        let registry = MetricsRegistry::with_temporality(Temporality::Delta);
        let counter = registry.create_counter("requests");
        counter.add(3, &Attributes::new());

        assert_eq!(registry.collect().await.values("requests"), vec![3.0]);
        assert!(registry.collect().await.values("requests").is_empty());
    }

    #[tokio::test]
    async fn test_same_name_returns_same_instrument() {
        let registry = MetricsRegistry::new();
        registry.create_counter("c").add(1, &Attributes::new());
        registry.create_counter("c").add(1, &Attributes::new());

        assert_eq!(registry.collect().await.values("c"), vec![2.0]);
    }

    #[tokio::test]
    async fn test_gauge_callbacks_evaluated_per_collect() {
        let registry = MetricsRegistry::new();
        let calls = Arc::new(AtomicU64::new(0));
        let gauge = registry.create_observable_gauge("sessions");

        let counted = Arc::clone(&calls);
        gauge.add_callback(Arc::new(move || -> GaugeFuture {
            let n = counted.fetch_add(1, Ordering::SeqCst) + 1;
            Box::pin(async move { GaugeObservation::new(n as f64, Attributes::new()) })
        }));

        assert_eq!(registry.collect().await.values("sessions"), vec![1.0]);
        assert_eq!(registry.collect().await.values("sessions"), vec![2.0]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_format_report() {
        let registry = MetricsRegistry::new();
        registry
            .create_counter("appium.command.responses")
            .add(1, &attrs(&[("command", "click")]));

        let report = registry.collect().await.format_report();
        assert!(report.contains("Meter: appium-otel-plugin"));
        assert!(report.contains("Counters:"));
        assert!(report.contains("appium.command.responses {command=click}: 1"));
    }

    #[tokio::test]
    async fn test_periodic_reader_collects_and_stops() {
        let registry = Arc::new(MetricsRegistry::new());
        let calls = Arc::new(AtomicU64::new(0));
        let counted = Arc::clone(&calls);
        registry
            .create_observable_gauge("ticks")
            .add_callback(Arc::new(move || -> GaugeFuture {
                counted.fetch_add(1, Ordering::SeqCst);
                Box::pin(async { GaugeObservation::new(0.0, Attributes::new()) })
            }));

        let reader = PeriodicReader::spawn(Arc::clone(&registry), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        reader.shutdown().await;

        assert!(calls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_named_registry() {
        let registry = MetricsRegistry::named("custom-meter");
        registry.create_counter("c").add(1, &Attributes::new());

        let snapshot = registry.collect().await;
        assert_eq!(registry.name(), "custom-meter");
        assert_eq!(snapshot.meter, "custom-meter");
        assert!(snapshot.format_report().contains("Meter: custom-meter"));
    }

    #[tokio::test]
    async fn test_periodic_reader_zero_interval_is_clamped() {
        let registry = Arc::new(MetricsRegistry::new());
        let calls = Arc::new(AtomicU64::new(0));
        let counted = Arc::clone(&calls);
        registry
            .create_observable_gauge("ticks")
            .add_callback(Arc::new(move || -> GaugeFuture {
                counted.fetch_add(1, Ordering::SeqCst);
                Box::pin(async { GaugeObservation::new(0.0, Attributes::new()) })
            }));

        let reader = PeriodicReader::spawn(Arc::clone(&registry), Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(20)).await;
        reader.shutdown().await;

        assert!(calls.load(Ordering::SeqCst) >= 2);
    }
}
