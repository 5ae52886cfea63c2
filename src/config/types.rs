// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration type definitions.
//!
//! [`TelemetryConfigFile`] mirrors a JSON or YAML config file where every
//! field is optional; [`TelemetryConfig`] is the fully resolved result.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::telemetry::{Attributes, MetricsRegistry};

/// Default correlation strategy selector.
pub const DEFAULT_SEMANTIC: &str = "http";
/// Default service name reported on spans.
pub const DEFAULT_SERVICE_NAME: &str = "appium";
/// Default meter name.
pub const DEFAULT_METER_NAME: &str = crate::telemetry::metrics::DEFAULT_REGISTRY_NAME;
/// Default exporter for traces and metrics.
pub const DEFAULT_EXPORTER: &str = "otlp";
/// Default metrics export interval.
pub const DEFAULT_EXPORT_INTERVAL_MILLIS: u64 = 10_000;
/// Default number of export intervals an absent session survives.
pub const DEFAULT_EVICTION_GRACE_TICKS: u32 = 3;

/// Telemetry configuration as written in a config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryConfigFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_enabled: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_enabled: Option<bool>,

    /// Correlation strategy: "command" or "http"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_exporter: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,

    /// Attributes added to every span and data point
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<BTreeMap<String, String>>,

    /// Capability names mirrored into attributes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes_in_caps: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_exporter: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_export_interval_millis: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub eviction_grace_ticks: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub meter_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
}

/// Resolved telemetry configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryConfig {
    pub trace_enabled: bool,
    pub metrics_enabled: bool,
    pub semantic: String,
    pub trace_exporter: String,
    pub service_name: String,
    pub attributes: BTreeMap<String, String>,
    pub attributes_in_caps: Vec<String>,
    pub metrics_exporter: String,
    pub metrics_export_interval_millis: u64,
    pub eviction_grace_ticks: u32,
    pub meter_name: String,
    pub debug: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            trace_enabled: true,
            metrics_enabled: true,
            semantic: DEFAULT_SEMANTIC.to_string(),
            trace_exporter: DEFAULT_EXPORTER.to_string(),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            attributes: BTreeMap::new(),
            attributes_in_caps: vec!["platformName".to_string()],
            metrics_exporter: DEFAULT_EXPORTER.to_string(),
            metrics_export_interval_millis: DEFAULT_EXPORT_INTERVAL_MILLIS,
            eviction_grace_ticks: DEFAULT_EVICTION_GRACE_TICKS,
            meter_name: DEFAULT_METER_NAME.to_string(),
            debug: false,
        }
    }
}

impl TelemetryConfig {
    /// Metrics export interval as a [`Duration`].
    pub fn export_interval(&self) -> Duration {
        Duration::from_millis(self.metrics_export_interval_millis)
    }

    /// In-process meter named after `meter_name`.
    pub fn metrics_registry(&self) -> MetricsRegistry {
        MetricsRegistry::named(&self.meter_name)
    }

    /// Base attributes as span/metric attributes.
    pub fn base_attributes(&self) -> Attributes {
        self.attributes
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect()
    }

    /// Overlay the fields set in `file`.
    pub fn apply_file(&mut self, file: &TelemetryConfigFile) {
        if let Some(v) = file.trace_enabled {
            self.trace_enabled = v;
        }
        if let Some(v) = file.metrics_enabled {
            self.metrics_enabled = v;
        }
        if let Some(v) = &file.semantic {
            self.semantic = v.clone();
        }
        if let Some(v) = &file.trace_exporter {
            self.trace_exporter = v.clone();
        }
        if let Some(v) = &file.service_name {
            self.service_name = v.clone();
        }
        if let Some(v) = &file.attributes {
            self.attributes = v.clone();
        }
        if let Some(v) = &file.attributes_in_caps {
            self.attributes_in_caps = v.clone();
        }
        if let Some(v) = &file.metrics_exporter {
            self.metrics_exporter = v.clone();
        }
        if let Some(v) = file.metrics_export_interval_millis {
            self.metrics_export_interval_millis = v;
        }
        if let Some(v) = file.eviction_grace_ticks {
            self.eviction_grace_ticks = v;
        }
        if let Some(v) = &file.meter_name {
            self.meter_name = v.clone();
        }
        if let Some(v) = file.debug {
            self.debug = v;
        }
    }
}
