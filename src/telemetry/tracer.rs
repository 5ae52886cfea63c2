// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tracer and span collaborator contracts.
//!
//! The correlators only ever talk to these traits. Parent/child scoping is
//! explicit: a span started with `parent: Some(&span)` becomes its child.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::attributes::Attributes;
use super::span_id::SpanId;
use crate::error::CommandError;

/// Shared handle to a started span.
///
/// Spans are shared because the same span may be held by the request
/// pipeline and, for a while, by a correlator waiting to backfill it.
pub type SpanRef = Arc<dyn Span>;

/// Terminal status of a span.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SpanStatus {
    #[default]
    Unset,
    Ok,
    Error(String),
}

impl SpanStatus {
    /// Status code as exported (`UNSET`, `OK`, `ERROR`).
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unset => "UNSET",
            Self::Ok => "OK",
            Self::Error(_) => "ERROR",
        }
    }

    /// Error description, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Error(message) => Some(message),
            _ => None,
        }
    }
}

impl fmt::Display for SpanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(message) => write!(f, "ERROR: {}", message),
            other => f.write_str(other.code()),
        }
    }
}

/// A started span. All methods take `&self`; implementations use interior
/// mutability so a span can be shared across tasks.
pub trait Span: Send + Sync + fmt::Debug {
    /// Unique id of this span.
    fn id(&self) -> SpanId;

    /// Operation name.
    fn name(&self) -> &str;

    /// Merge attributes into the span. Ignored once the span has ended.
    fn set_attributes(&self, attributes: &Attributes);

    /// Set the terminal status. Ignored once the span has ended.
    fn set_status(&self, status: SpanStatus);

    /// Close the span. Closing twice is a no-op.
    fn end(&self);

    /// Whether `end` has been called.
    fn is_ended(&self) -> bool;

    /// Downcast hook for tracers that need their own span type back.
    fn as_any(&self) -> &dyn Any;
}

/// Creates spans.
pub trait Tracer: Send + Sync {
    /// Start a span, as a child of `parent` when one is given.
    fn start_span(&self, name: &str, parent: Option<&SpanRef>) -> SpanRef;

    /// Start a span carrying initial attributes.
    fn start_span_with_attributes(
        &self,
        name: &str,
        parent: Option<&SpanRef>,
        attributes: &Attributes,
    ) -> SpanRef {
        let span = self.start_span(name, parent);
        if !attributes.is_empty() {
            span.set_attributes(attributes);
        }
        span
    }
}

/// Extension trait for closing spans from command outcomes.
pub trait SpanExt {
    /// Record the result of a command (OK or ERROR with its description).
    fn record_result<T>(&self, result: &Result<T, CommandError>);

    /// Record the result and close the span.
    fn finish_with_result<T>(&self, result: &Result<T, CommandError>);
}

impl<S: Span + ?Sized> SpanExt for S {
    fn record_result<T>(&self, result: &Result<T, CommandError>) {
        match result {
            Ok(_) => self.set_status(SpanStatus::Ok),
            Err(err) => self.set_status(SpanStatus::Error(err.to_string())),
        }
    }

    fn finish_with_result<T>(&self, result: &Result<T, CommandError>) {
        self.record_result(result);
        self.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_status_code() {
        assert_eq!(SpanStatus::Unset.code(), "UNSET");
        assert_eq!(SpanStatus::Ok.code(), "OK");
        assert_eq!(SpanStatus::Error("boom".to_string()).code(), "ERROR");
    }

    #[test]
    fn test_span_status_message() {
        assert_eq!(SpanStatus::Ok.message(), None);
        assert_eq!(SpanStatus::Error("boom".to_string()).message(), Some("boom"));
    }

    #[test]
    fn test_span_status_display() {
        assert_eq!(SpanStatus::Ok.to_string(), "OK");
        assert_eq!(SpanStatus::Error("boom".to_string()).to_string(), "ERROR: boom");
    }
}
