// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Logging initialization for the engine and the demo binary.

use std::io;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Configuration for the `tracing` subscriber.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default log level if RUST_LOG is not set.
    pub default_level: Level,

    /// Whether to log span close events, including the correlator spans
    /// emitted by `TracingTracer`.
    pub include_span_events: bool,

    /// Whether to include file/line information.
    pub include_file_line: bool,

    /// Whether to use ANSI colors in output.
    pub ansi_colors: bool,

    /// Whether to use compact log format.
    pub compact: bool,

    /// Custom filter directive (overrides RUST_LOG and default_level).
    pub filter_directive: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_level: Level::INFO,
            include_span_events: false,
            include_file_line: false,
            ansi_colors: true,
            compact: true,
            filter_directive: None,
        }
    }
}

impl LoggingConfig {
    /// Verbose output with span close events, for local debugging.
    pub fn development() -> Self {
        Self {
            default_level: Level::DEBUG,
            include_span_events: true,
            include_file_line: true,
            ansi_colors: true,
            compact: false,
            filter_directive: None,
        }
    }

    /// Warnings only, no colors; for running embedded in a host.
    pub fn production() -> Self {
        Self {
            default_level: Level::WARN,
            include_span_events: false,
            include_file_line: false,
            ansi_colors: false,
            compact: true,
            filter_directive: None,
        }
    }

    /// Quiet output for test runs.
    pub fn testing() -> Self {
        Self {
            default_level: Level::WARN,
            include_span_events: false,
            include_file_line: true,
            ansi_colors: false,
            compact: true,
            filter_directive: Some("session_telemetry=debug,warn".to_string()),
        }
    }

    /// Pick the preset matching the `debug` configuration flag.
    pub fn for_debug(debug: bool) -> Self {
        if debug {
            Self::development()
        } else {
            Self::default()
        }
    }

    /// Set the default log level.
    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    /// Set a custom filter directive.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter_directive = Some(filter.into());
        self
    }

    /// Enable or disable ANSI colors.
    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi_colors = ansi;
        self
    }

    fn env_filter(&self) -> EnvFilter {
        let fallback = || EnvFilter::new(self.default_level.to_string());
        match &self.filter_directive {
            Some(directive) => EnvFilter::try_new(directive).unwrap_or_else(|_| fallback()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback()),
        }
    }
}

/// Guard returned by [`init_logging`].
///
/// Keep this guard alive for the duration of your program.
#[must_use]
pub struct LoggingGuard {
    _private: (),
}

/// Install the global `tracing` subscriber.
///
/// Call once at startup; a second call returns an error instead of
/// replacing the installed subscriber.
///
/// # Example
///
/// ```rust,ignore
/// use session_telemetry::telemetry::{init_logging, LoggingConfig};
///
/// let _guard = init_logging(&LoggingConfig::development())?;
/// ```
pub fn init_logging(config: &LoggingConfig) -> io::Result<LoggingGuard> {
    let span_events = if config.include_span_events {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let fmt_layer = fmt::layer()
        .with_ansi(config.ansi_colors)
        .with_file(config.include_file_line)
        .with_line_number(config.include_file_line)
        .with_span_events(span_events);

    let installed = if config.compact {
        tracing_subscriber::registry()
            .with(config.env_filter())
            .with(fmt_layer.compact())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(config.env_filter())
            .with(fmt_layer)
            .try_init()
    };
    installed.map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

    Ok(LoggingGuard { _private: () })
}
