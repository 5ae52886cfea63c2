// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tracer backed by `tracing` spans.
//!
//! Attribute sets are dynamic while `tracing` fields are declared up front,
//! so merged attributes are recorded as one JSON `attributes` field. `end`
//! closes the span logically; the `tracing` span itself closes when the last
//! handle drops.

use std::any::Any;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{field, info_span};

use super::attributes::Attributes;
use super::span_id::SpanId;
use super::tracer::{Span, SpanRef, SpanStatus, Tracer};

/// Production [`Tracer`] emitting `tracing` spans.
#[derive(Debug, Clone)]
pub struct TracingTracer {
    service_name: String,
}

impl TracingTracer {
    /// Create a tracer for the given service.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    /// Service name recorded on every span.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl Tracer for TracingTracer {
    fn start_span(&self, name: &str, parent: Option<&SpanRef>) -> SpanRef {
        let parent = parent.and_then(|p| p.as_any().downcast_ref::<TracingSpan>());
        Arc::new(TracingSpan::start(name, &self.service_name, parent))
    }
}

#[derive(Debug, Default)]
struct SpanState {
    attributes: Attributes,
    status: SpanStatus,
    ended: bool,
}

/// A span started by [`TracingTracer`].
#[derive(Debug)]
pub struct TracingSpan {
    id: SpanId,
    name: String,
    span: tracing::Span,
    state: Mutex<SpanState>,
}

impl TracingSpan {
    fn start(name: &str, service_name: &str, parent: Option<&TracingSpan>) -> Self {
        let id = SpanId::new();
        let parent_id = parent.and_then(|p| p.span.id());
        let span = info_span!(
            parent: parent_id,
            "command",
            otel.name = %name,
            service.name = %service_name,
            span.id = %id.short(),
            parent_span.id = field::Empty,
            otel.status_code = field::Empty,
            otel.status_message = field::Empty,
            attributes = field::Empty,
        );
        if let Some(parent) = parent {
            span.record("parent_span.id", parent.id.short().as_str());
        }

        Self {
            id,
            name: name.to_string(),
            span,
            state: Mutex::new(SpanState::default()),
        }
    }

    /// Get the underlying tracing span.
    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut SpanState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }
}

impl Span for TracingSpan {
    fn id(&self) -> SpanId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_attributes(&self, attributes: &Attributes) {
        let merged = self.with_state(|state| {
            if state.ended {
                return None;
            }
            state.attributes.extend(attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
            serde_json::to_string(&state.attributes).ok()
        });
        if let Some(json) = merged {
            self.span.record("attributes", json.as_str());
        }
    }

    fn set_status(&self, status: SpanStatus) {
        let recorded = self.with_state(|state| {
            if state.ended {
                return false;
            }
            state.status = status.clone();
            true
        });
        if recorded {
            self.span.record("otel.status_code", status.code());
            if let Some(message) = status.message() {
                self.span.record("otel.status_message", message);
            }
        }
    }

    fn end(&self) {
        let first = self.with_state(|state| !std::mem::replace(&mut state.ended, true));
        if first {
            tracing::debug!(parent: &self.span, name = %self.name, "span ended");
        }
    }

    fn is_ended(&self) -> bool {
        self.with_state(|state| state.ended)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
