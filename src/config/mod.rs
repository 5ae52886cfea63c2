// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration module.
//!
//! Resolves the telemetry configuration from multiple sources:
//! - Config file: JSON or YAML, camelCase keys
//! - Environment: `APPIUM_OTEL_*`, `METER_NAME`, `DEBUG`
//! - CLI options: command-line arguments
//!
//! Configuration is merged with precedence (CLI > env > file > defaults).

mod loader;
mod merger;
mod types;

pub use loader::{
    load_config_file, parse_attribute_pairs, ENV_ATTRIBUTES, ENV_ATTRIBUTES_IN_CAPS, ENV_DEBUG,
    ENV_EVICTION_GRACE_TICKS, ENV_METER_NAME, ENV_METRICS_ENABLED, ENV_METRICS_EXPORTER,
    ENV_METRICS_EXPORT_INTERVAL_MILLIS, ENV_SERVICE_NAME, ENV_TRACE_ENABLED, ENV_TRACE_EXPORTER,
    ENV_TRACE_SEMANTIC,
};
pub use merger::{merge_config, CliOptions};
pub use types::{
    TelemetryConfig, TelemetryConfigFile, DEFAULT_EVICTION_GRACE_TICKS, DEFAULT_EXPORTER,
    DEFAULT_EXPORT_INTERVAL_MILLIS, DEFAULT_METER_NAME, DEFAULT_SEMANTIC, DEFAULT_SERVICE_NAME,
};

use crate::error::ConfigError;
use std::path::Path;

/// Load and merge all configuration sources.
///
/// This is the main entry point for configuration loading.
pub fn load_config(config_path: Option<&Path>, cli_options: CliOptions) -> Result<TelemetryConfig, ConfigError> {
    let file = config_path.map(load_config_file).transpose()?;
    merge_config(file, |name| std::env::var(name).ok(), cli_options)
}
