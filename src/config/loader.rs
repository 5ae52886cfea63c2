// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration loading from files and environment variables.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{error, info};

use crate::error::ConfigError;

use super::types::{TelemetryConfig, TelemetryConfigFile};

pub const ENV_TRACE_ENABLED: &str = "APPIUM_OTEL_TRACE_ENABLED";
pub const ENV_METRICS_ENABLED: &str = "APPIUM_OTEL_METRICS_ENABLED";
pub const ENV_TRACE_SEMANTIC: &str = "APPIUM_OTEL_TRACE_SEMANTIC";
pub const ENV_TRACE_EXPORTER: &str = "APPIUM_OTEL_TRACE_EXPORTER";
pub const ENV_SERVICE_NAME: &str = "APPIUM_OTEL_SERVICE_NAME";
pub const ENV_ATTRIBUTES: &str = "APPIUM_OTEL_ATTRIBUTES";
pub const ENV_ATTRIBUTES_IN_CAPS: &str = "APPIUM_OTEL_ATTRIBUTES_IN_CAPS";
pub const ENV_METRICS_EXPORTER: &str = "APPIUM_OTEL_METRICS_EXPORTER";
pub const ENV_METRICS_EXPORT_INTERVAL_MILLIS: &str = "APPIUM_OTEL_METRICS_EXPORT_INTERVAL_MILLIS";
pub const ENV_EVICTION_GRACE_TICKS: &str = "APPIUM_OTEL_EVICTION_GRACE_TICKS";
pub const ENV_METER_NAME: &str = "METER_NAME";
pub const ENV_DEBUG: &str = "DEBUG";

/// Load a configuration file (JSON or YAML).
pub fn load_config_file(path: &Path) -> Result<TelemetryConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    match extension.to_lowercase().as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&content).map_err(ConfigError::from),
        _ => serde_json::from_str(&content).map_err(ConfigError::from),
    }
}

/// Parse `k=v,k2=v2`. Malformed pairs are logged and skipped.
pub fn parse_attribute_pairs(raw: &str) -> BTreeMap<String, String> {
    let mut attributes = BTreeMap::new();
    if raw.is_empty() {
        return attributes;
    }
    for pair in raw.split(',') {
        match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() && !value.is_empty() => {
                attributes.insert(key.to_string(), value.to_string());
            }
            _ => error!(value = raw, "invalid {} format", ENV_ATTRIBUTES),
        }
    }
    attributes
}

fn parse_bool(raw: &str) -> bool {
    raw.eq_ignore_ascii_case("true")
}

fn parse_number<T: std::str::FromStr>(field: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        message: format!("expected a non-negative integer, got {:?}", raw),
    })
}

impl TelemetryConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides_with(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Overlay variables returned by `lookup`.
    pub fn apply_env_overrides_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_TRACE_ENABLED) {
            self.trace_enabled = parse_bool(&v);
        }
        if let Some(v) = lookup(ENV_METRICS_ENABLED) {
            self.metrics_enabled = parse_bool(&v);
        }
        if let Some(v) = lookup(ENV_TRACE_SEMANTIC) {
            self.semantic = v;
        }
        if let Some(v) = lookup(ENV_TRACE_EXPORTER) {
            self.trace_exporter = v;
        }
        if let Some(v) = lookup(ENV_SERVICE_NAME) {
            self.service_name = v;
        }
        if let Some(v) = lookup(ENV_ATTRIBUTES) {
            self.attributes = parse_attribute_pairs(&v);
        }
        if let Some(v) = lookup(ENV_ATTRIBUTES_IN_CAPS) {
            self.attributes_in_caps = v.split(',').map(str::to_string).collect();
            info!(attributes_in_caps = ?self.attributes_in_caps, "attributes in capabilities");
        }
        if let Some(v) = lookup(ENV_METRICS_EXPORTER) {
            self.metrics_exporter = v;
        }
        if let Some(v) = lookup(ENV_METRICS_EXPORT_INTERVAL_MILLIS) {
            self.metrics_export_interval_millis = parse_number(ENV_METRICS_EXPORT_INTERVAL_MILLIS, &v)?;
        }
        if let Some(v) = lookup(ENV_EVICTION_GRACE_TICKS) {
            self.eviction_grace_ticks = parse_number(ENV_EVICTION_GRACE_TICKS, &v)?;
        }
        if let Some(v) = lookup(ENV_METER_NAME) {
            self.meter_name = v;
        }
        if let Some(v) = lookup(ENV_DEBUG) {
            self.debug = parse_bool(&v);
        }
        Ok(())
    }
}
