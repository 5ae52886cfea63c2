// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Plugin front: builds the active delegates and routes host callbacks
//! through them.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::config::TelemetryConfig;
use crate::delegate::{dispatch, Delegate, Next};
use crate::host::{Command, CommandResult, DriverRef, SessionCapabilities};
use crate::metrics::{Collector, CollectorSettings, MetricsDelegate};
use crate::telemetry::{Meter, Tracer};
use crate::trace::{RequestHooks, TraceStrategy};

/// Process-wide telemetry state shared by every session.
pub struct TelemetryRuntime {
    tracer: Arc<dyn Tracer>,
    strategy: Option<TraceStrategy>,
    collector: Option<Arc<Collector>>,
}

impl TelemetryRuntime {
    /// Build the collector and the correlation strategy enabled by `config`.
    pub fn new(config: &TelemetryConfig, tracer: Arc<dyn Tracer>, meter: &dyn Meter) -> Self {
        let base_attributes = config.base_attributes();

        let collector = config.metrics_enabled.then(|| {
            Collector::new(
                meter,
                CollectorSettings {
                    attributes_in_caps: config.attributes_in_caps.clone(),
                    observe_interval: config.export_interval(),
                    grace_ticks: config.eviction_grace_ticks,
                    base_attributes: base_attributes.clone(),
                },
            )
        });

        let strategy = config.trace_enabled.then(|| {
            TraceStrategy::from_selector(&config.semantic, config.attributes_in_caps.clone(), base_attributes)
        });

        info!(
            metrics = collector.is_some(),
            semantic = strategy.as_ref().map(TraceStrategy::name).unwrap_or("disabled"),
            trace_exporter = %config.trace_exporter,
            metrics_exporter = %config.metrics_exporter,
            meter = %config.meter_name,
            "telemetry runtime initialized"
        );

        Self {
            tracer,
            strategy,
            collector,
        }
    }

    pub fn collector(&self) -> Option<&Arc<Collector>> {
        self.collector.as_ref()
    }

    pub fn strategy(&self) -> Option<&TraceStrategy> {
        self.strategy.as_ref()
    }

    /// Hooks for the request-interception layer, when the active strategy
    /// uses them.
    pub fn request_hooks(&self) -> Option<RequestHooks> {
        self.strategy.as_ref().and_then(TraceStrategy::request_hooks)
    }

    /// Fresh delegates for one session: metrics first, tracing last, so the
    /// tracing delegate is outermost.
    pub fn new_delegates(&self) -> Vec<Arc<dyn Delegate>> {
        let mut delegates: Vec<Arc<dyn Delegate>> = Vec::with_capacity(2);
        if let Some(collector) = &self.collector {
            delegates.push(Arc::new(MetricsDelegate::new(Arc::clone(collector))));
        }
        if let Some(strategy) = &self.strategy {
            delegates.push(strategy.new_delegate(&self.tracer));
        }
        delegates
    }

    /// A plugin instance for one session.
    pub fn new_plugin(&self) -> TelemetryPlugin {
        TelemetryPlugin::new(self.new_delegates())
    }
}

/// Per-session entry point for host command callbacks.
pub struct TelemetryPlugin {
    delegates: Vec<Arc<dyn Delegate>>,
}

impl TelemetryPlugin {
    pub fn new(delegates: Vec<Arc<dyn Delegate>>) -> Self {
        Self { delegates }
    }

    pub fn delegates(&self) -> &[Arc<dyn Delegate>] {
        &self.delegates
    }

    pub async fn create_session(&self, next: Next, driver: &DriverRef, caps: SessionCapabilities) -> CommandResult {
        dispatch(&self.delegates, driver, Command::CreateSession(caps), next).await
    }

    pub async fn delete_session(&self, next: Next, driver: &DriverRef, session_id: &str) -> CommandResult {
        let command = Command::DeleteSession {
            session_id: session_id.to_string(),
        };
        dispatch(&self.delegates, driver, command, next).await
    }

    pub async fn handle(&self, next: Next, driver: &DriverRef, command: &str, args: Vec<Value>) -> CommandResult {
        dispatch(&self.delegates, driver, Command::execute(command, args), next).await
    }

    /// Notify every delegate, in order, that the session ended without a
    /// delete command.
    pub async fn on_unexpected_shutdown(&self, driver: &DriverRef, cause: &str) {
        for delegate in &self.delegates {
            debug!(delegate = delegate.name(), cause, "unexpected shutdown");
            delegate.on_unexpected_shutdown(driver, cause).await;
        }
    }
}
