// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Telemetry collaborators and logging infrastructure.
//!
//! This module provides everything the correlators and the metrics
//! collector talk to, without tying them to an exporter stack:
//!
//! - **Tracer**: the [`Tracer`]/[`Span`] contract, a `tracing`-backed
//!   implementation and an in-memory recorder
//! - **Meter**: the [`Meter`] contract and an in-process [`MetricsRegistry`]
//!   with a [`PeriodicReader`]
//! - **Attributes**: attribute keys, metric names and capability-derived
//!   attributes
//! - **Logging**: `tracing-subscriber` initialization
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use session_telemetry::telemetry::{init_logging, LoggingConfig, MetricsRegistry, TracingTracer};
//!
//! let _guard = init_logging(&LoggingConfig::default())?;
//! let tracer = Arc::new(TracingTracer::new("appium"));
//! let registry = Arc::new(MetricsRegistry::new());
//! ```

pub mod attributes;
mod init;
mod memory;
pub mod meter;
pub mod metrics;
mod span_id;
mod spans;
pub mod tracer;

pub use attributes::Attributes;
pub use init::{init_logging, LoggingConfig, LoggingGuard};
pub use memory::{InMemoryTracer, SpanData};
pub use meter::{Counter, GaugeCallback, GaugeFuture, GaugeObservation, Meter, ObservableGauge};
pub use metrics::{DataPoint, InstrumentKind, MetricsRegistry, MetricsSnapshot, PeriodicReader, Temporality};
pub use span_id::SpanId;
pub use spans::{TracingSpan, TracingTracer};
pub use tracer::{Span, SpanExt, SpanRef, SpanStatus, Tracer};
