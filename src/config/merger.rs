// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration merging.
//!
//! Handles merging configurations from different sources with proper precedence.

use crate::error::ConfigError;

use super::types::{TelemetryConfig, TelemetryConfigFile};

/// CLI options that can override configuration.
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub semantic: Option<String>,
    pub attributes_in_caps: Option<Vec<String>>,
    pub metrics_export_interval_millis: Option<u64>,
    pub debug: Option<bool>,
}

/// Merge configuration sources with precedence.
///
/// Precedence (highest to lowest):
/// 1. CLI options
/// 2. Environment variables (through `lookup`)
/// 3. Config file
/// 4. Default values
pub fn merge_config<F>(
    file: Option<TelemetryConfigFile>,
    lookup: F,
    cli: CliOptions,
) -> Result<TelemetryConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = TelemetryConfig::default();

    if let Some(file) = file {
        result.apply_file(&file);
    }

    result.apply_env_overrides_with(lookup)?;

    if let Some(semantic) = cli.semantic {
        result.semantic = semantic;
    }
    if let Some(caps) = cli.attributes_in_caps {
        result.attributes_in_caps = caps;
    }
    if let Some(interval) = cli.metrics_export_interval_millis {
        result.metrics_export_interval_millis = interval;
    }
    if let Some(debug) = cli.debug {
        result.debug = debug;
    }

    if result.metrics_export_interval_millis == 0 {
        return Err(ConfigError::InvalidValue {
            field: "metricsExportIntervalMillis".to_string(),
            message: "must be greater than zero".to_string(),
        });
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_merge_defaults() {
        let config = merge_config(None, no_env, CliOptions::default()).unwrap();
        assert_eq!(config, TelemetryConfig::default());
    }

    #[test]
    fn test_merge_precedence() {
        let file = TelemetryConfigFile {
            semantic: Some("command".to_string()),
            service_name: Some("from-file".to_string()),
            meter_name: Some("file-meter".to_string()),
            ..Default::default()
        };
        let env = |name: &str| match name {
            "APPIUM_OTEL_SERVICE_NAME" => Some("from-env".to_string()),
            "APPIUM_OTEL_TRACE_SEMANTIC" => Some("http".to_string()),
            _ => None,
        };
        let cli = CliOptions {
            semantic: Some("command".to_string()),
            ..Default::default()
        };

        let config = merge_config(Some(file), env, cli).unwrap();

        assert_eq!(config.semantic, "command"); // CLI wins
        assert_eq!(config.service_name, "from-env");
        assert_eq!(config.meter_name, "file-meter");
    }

    #[test]
    fn test_merge_rejects_zero_interval() {
        let cli = CliOptions {
            metrics_export_interval_millis: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            merge_config(None, no_env, cli),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
