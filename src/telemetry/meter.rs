// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Meter collaborator contract: counters and pull-evaluated gauges.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::attributes::Attributes;

/// One value reported by a gauge callback.
#[derive(Debug, Clone, PartialEq)]
pub struct GaugeObservation {
    pub value: f64,
    pub attributes: Attributes,
}

impl GaugeObservation {
    pub fn new(value: f64, attributes: Attributes) -> Self {
        Self { value, attributes }
    }
}

/// Future returned by a gauge callback.
pub type GaugeFuture = Pin<Box<dyn Future<Output = GaugeObservation> + Send>>;

/// Callback evaluated once per export tick.
pub type GaugeCallback = Arc<dyn Fn() -> GaugeFuture + Send + Sync>;

/// Monotonic counter.
pub trait Counter: Send + Sync {
    fn add(&self, amount: u64, attributes: &Attributes);
}

/// Gauge whose value is computed by callbacks at export time.
pub trait ObservableGauge: Send + Sync {
    fn add_callback(&self, callback: GaugeCallback);
}

/// Creates instruments.
pub trait Meter: Send + Sync {
    fn create_counter(&self, name: &str) -> Arc<dyn Counter>;

    fn create_observable_gauge(&self, name: &str) -> Arc<dyn ObservableGauge>;
}
