// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! In-memory tracer that records finished spans.
//!
//! Used by tests and by the demo binary to inspect the span tree the
//! correlators produce.

use std::any::Any;
use std::sync::{Arc, Mutex, PoisonError};

use super::attributes::Attributes;
use super::span_id::SpanId;
use super::tracer::{Span, SpanRef, SpanStatus, Tracer};

/// A finished span as recorded by [`InMemoryTracer`].
#[derive(Debug, Clone, PartialEq)]
pub struct SpanData {
    pub id: SpanId,
    pub parent_id: Option<SpanId>,
    pub name: String,
    pub attributes: Attributes,
    pub status: SpanStatus,
}

#[derive(Debug, Default)]
struct Sink {
    started: usize,
    finished: Vec<SpanData>,
}

/// [`Tracer`] keeping every finished span in memory, in end order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTracer {
    sink: Arc<Mutex<Sink>>,
}

impl InMemoryTracer {
    /// Create an empty tracer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spans that have ended, in the order they ended.
    pub fn finished_spans(&self) -> Vec<SpanData> {
        self.lock().finished.clone()
    }

    /// Finished spans with the given name.
    pub fn spans_named(&self, name: &str) -> Vec<SpanData> {
        self.lock()
            .finished
            .iter()
            .filter(|s| s.name == name)
            .cloned()
            .collect()
    }

    /// Number of spans started but not yet ended.
    pub fn open_span_count(&self) -> usize {
        let sink = self.lock();
        sink.started - sink.finished.len()
    }

    /// Drop every recorded span.
    pub fn reset(&self) {
        let mut sink = self.lock();
        sink.started -= sink.finished.len();
        sink.finished.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Sink> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Tracer for InMemoryTracer {
    fn start_span(&self, name: &str, parent: Option<&SpanRef>) -> SpanRef {
        self.lock().started += 1;
        Arc::new(RecordingSpan {
            id: SpanId::new(),
            parent_id: parent.map(|p| p.id()),
            name: name.to_string(),
            state: Mutex::new(RecordingState::default()),
            sink: Arc::clone(&self.sink),
        })
    }
}

#[derive(Debug, Default)]
struct RecordingState {
    attributes: Attributes,
    status: SpanStatus,
    ended: bool,
}

#[derive(Debug)]
struct RecordingSpan {
    id: SpanId,
    parent_id: Option<SpanId>,
    name: String,
    state: Mutex<RecordingState>,
    sink: Arc<Mutex<Sink>>,
}

impl RecordingSpan {
    fn state(&self) -> std::sync::MutexGuard<'_, RecordingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Span for RecordingSpan {
    fn id(&self) -> SpanId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_attributes(&self, attributes: &Attributes) {
        let mut state = self.state();
        if state.ended {
            return;
        }
        state
            .attributes
            .extend(attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    fn set_status(&self, status: SpanStatus) {
        let mut state = self.state();
        if !state.ended {
            state.status = status;
        }
    }

    fn end(&self) {
        let data = {
            let mut state = self.state();
            if state.ended {
                return;
            }
            state.ended = true;
            SpanData {
                id: self.id,
                parent_id: self.parent_id,
                name: self.name.clone(),
                attributes: state.attributes.clone(),
                status: state.status.clone(),
            }
        };
        self.sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .finished
            .push(data);
    }

    fn is_ended(&self) -> bool {
        self.state().ended
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_records_finished_spans_in_end_order() {
        let tracer = InMemoryTracer::new();
        let parent = tracer.start_span("session", None);
        let child = tracer.start_span("createSession", Some(&parent));

        assert_eq!(tracer.open_span_count(), 2);
        child.end();
        parent.end();

        let spans = tracer.finished_spans();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].name, "createSession");
        assert_eq!(spans[0].parent_id, Some(parent.id()));
        assert_eq!(spans[1].name, "session");
        assert_eq!(spans[1].parent_id, None);
        assert_eq!(tracer.open_span_count(), 0);
    }

    #[test]
    fn test_attributes_and_status() {
        let tracer = InMemoryTracer::new();
        let span = tracer.start_span("cmd", None);
        span.set_attributes(&[("a".to_string(), json!("x"))].into());
        span.set_attributes(&[("b".to_string(), json!(2))].into());
        span.set_status(SpanStatus::Error("err".to_string()));
        span.end();

        let spans = tracer.spans_named("cmd");
        let data = &spans[0];
        assert_eq!(data.attributes.len(), 2);
        assert_eq!(data.status, SpanStatus::Error("err".to_string()));
    }

    #[test]
    fn test_end_twice_records_once() {
        let tracer = InMemoryTracer::new();
        let span = tracer.start_span("cmd", None);
        span.end();
        span.end();
        span.set_status(SpanStatus::Ok);

        assert_eq!(tracer.finished_spans().len(), 1);
        assert_eq!(tracer.finished_spans()[0].status, SpanStatus::Unset);
    }

    #[test]
    fn test_reset() {
        let tracer = InMemoryTracer::new();
        let open = tracer.start_span("open", None);
        tracer.start_span("closed", None).end();
        tracer.reset();

        assert!(tracer.finished_spans().is_empty());
        assert_eq!(tracer.open_span_count(), 1);
        open.end();
        assert_eq!(tracer.open_span_count(), 0);
    }
}
