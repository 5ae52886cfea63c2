// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session-correlated tracing and metrics for command-processing hosts.
//!
//! A host (such as a WebDriver server) runs client commands: create session,
//! delete session and arbitrary named actions. This crate wraps every command
//! in a chain of delegates that record spans and metrics tagged with the
//! session that issued it.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`host`] - Commands, responses, driver references and the live-session query
//! - [`delegate`] - Delegate contract and chain composition
//! - [`session`] - Session registry with grace-period eviction
//! - [`metrics`] - Command counters and session gauges
//! - [`trace`] - Correlation strategies (nested spans, out-of-band)
//! - [`plugin`] - Runtime and per-session plugin front
//! - [`telemetry`] - Tracer/Meter collaborators, attributes and logging
//! - [`config`] - Configuration loading and merging
//! - [`error`] - Error types and result aliases
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use session_telemetry::config::{load_config, CliOptions};
//! use session_telemetry::plugin::TelemetryRuntime;
//! use session_telemetry::telemetry::{MetricsRegistry, PeriodicReader, TracingTracer};
//!
//! let config = load_config(None, CliOptions::default())?;
//! let registry = Arc::new(MetricsRegistry::new());
//! let runtime = TelemetryRuntime::new(&config, Arc::new(TracingTracer::new(&config.service_name)), registry.as_ref());
//! let reader = PeriodicReader::spawn(Arc::clone(&registry), config.export_interval());
//!
//! // One plugin per session.
//! let plugin = runtime.new_plugin();
//! ```

pub mod config;
pub mod delegate;
pub mod error;
pub mod host;
pub mod metrics;
pub mod plugin;
pub mod session;
pub mod telemetry;
pub mod trace;

// Re-export commonly used types at crate root
pub use delegate::{compose, dispatch, next_fn, Delegate, Next};
pub use error::{CommandError, ConfigError, HostError, ResponseShapeError, Result};
pub use host::{
    Capabilities, Command, CommandKind, CommandResponse, CommandResult, CreatedSession, DriverRef, LiveSession,
    SessionCapabilities, SessionHost, SessionId,
};
pub use plugin::{TelemetryPlugin, TelemetryRuntime};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_public_exports() {
        let command = Command::execute("click", vec![]);
        assert_eq!(command.kind(), CommandKind::Execute);
        let _driver = DriverRef::for_session("s1");
    }
}
