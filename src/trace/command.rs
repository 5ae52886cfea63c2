// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Nested-span correlation: one `session` span per session, one child span
//! per command.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::delegate::{Delegate, Next};
use crate::host::{CommandResult, CreatedSession, DriverRef, SessionCapabilities, CREATE_SESSION, DELETE_SESSION};
use crate::telemetry::attributes::{merge_attributes, session_attributes};
use crate::telemetry::{Attributes, SpanExt, SpanRef, Tracer};

/// Name of the span covering a whole session.
pub const SESSION_SPAN_NAME: &str = "session";

#[derive(Debug)]
struct SessionState {
    session_span: Option<SpanRef>,
    common_attributes: Attributes,
}

/// Delegate wrapping every command of one session in a child of the
/// session span.
///
/// Serves one session at a time. Attributes derived from the create-session
/// response are set once on the session span and copied onto every later
/// command span; they reset when the session span closes.
pub struct CommandCorrelator {
    tracer: Arc<dyn Tracer>,
    attributes_in_caps: Vec<String>,
    base_attributes: Attributes,
    state: Mutex<SessionState>,
}

impl CommandCorrelator {
    pub fn new(tracer: Arc<dyn Tracer>, attributes_in_caps: Vec<String>, base_attributes: Attributes) -> Self {
        Self {
            tracer,
            attributes_in_caps,
            state: Mutex::new(SessionState {
                session_span: None,
                common_attributes: base_attributes.clone(),
            }),
            base_attributes,
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a session span is open.
    pub fn has_session(&self) -> bool {
        self.state().session_span.is_some()
    }

    /// Attributes copied onto command spans.
    pub fn common_attributes(&self) -> Attributes {
        self.state().common_attributes.clone()
    }

    /// Close the session span, if any, and reset per-session state.
    pub fn finish_session(&self) {
        let span = {
            let mut state = self.state();
            state.common_attributes = self.base_attributes.clone();
            state.session_span.take()
        };
        if let Some(span) = span {
            span.end();
        }
    }

    fn open_session(&self) -> SpanRef {
        let span = self.tracer.start_span(SESSION_SPAN_NAME, None);
        let stale = {
            let mut state = self.state();
            state.common_attributes = self.base_attributes.clone();
            state.session_span.replace(Arc::clone(&span))
        };
        if let Some(stale) = stale {
            debug!(span_id = %stale.id(), "closing session span left open by a previous session");
            stale.end();
        }
        span
    }

    /// Run `next` inside a child span of the open session, or untraced when
    /// there is none.
    async fn traced(&self, next: Next, command: &str) -> CommandResult {
        let context = {
            let state = self.state();
            state
                .session_span
                .as_ref()
                .map(|span| (Arc::clone(span), state.common_attributes.clone()))
        };
        let Some((session_span, attributes)) = context else {
            debug!(command, "session span is not found");
            return next().await;
        };

        let span = self
            .tracer
            .start_span_with_attributes(command, Some(&session_span), &attributes);
        let result = next().await;
        span.finish_with_result(&result);
        result
    }
}

#[async_trait]
impl Delegate for CommandCorrelator {
    fn name(&self) -> &str {
        "command-tracer"
    }

    async fn create_session(&self, next: Next, _driver: &DriverRef, _caps: &SessionCapabilities) -> CommandResult {
        let session_span = self.open_session();
        let span = self.tracer.start_span(CREATE_SESSION, Some(&session_span));

        let result = next().await;
        match &result {
            Ok(response) => {
                match CreatedSession::decode(response) {
                    Ok(created) => {
                        let common = {
                            let mut state = self.state();
                            let identity =
                                session_attributes(&created.session_id, &created.capabilities, &self.attributes_in_caps);
                            state.common_attributes = merge_attributes([&state.common_attributes, &identity]);
                            state.common_attributes.clone()
                        };
                        session_span.set_attributes(&common);
                        span.set_attributes(&common);
                    }
                    Err(err) => info!(error = %err, "skip saving session id"),
                }
                span.finish_with_result(&result);
            }
            Err(_) => {
                span.finish_with_result(&result);
                self.finish_session();
            }
        }
        result
    }

    async fn delete_session(&self, next: Next, _driver: &DriverRef, _session_id: &str) -> CommandResult {
        let result = self.traced(next, DELETE_SESSION).await;
        self.finish_session();
        result
    }

    async fn handle(&self, next: Next, _driver: &DriverRef, command: &str, _args: &[Value]) -> CommandResult {
        self.traced(next, command).await
    }

    async fn on_unexpected_shutdown(&self, driver: &DriverRef, cause: &str) {
        debug!(session_id = ?driver.session_id(), cause, "session ended without delete");
        self.finish_session();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegate::next_fn;
    use crate::error::CommandError;
    use crate::host::CommandResponse;
    use crate::telemetry::{InMemoryTracer, SpanStatus};
    use serde_json::json;

    fn correlator(tracer: &InMemoryTracer) -> CommandCorrelator {
        CommandCorrelator::new(
            Arc::new(tracer.clone()),
            vec!["deviceName".to_string(), "app".to_string()],
            [("appium.env".to_string(), json!("ci"))].into_iter().collect(),
        )
    }

    fn created_response() -> Next {
        next_fn(|| async {
            Ok(CommandResponse::new(
                json!(["sid1", {"deviceName": "dev", "app": "foo.apk", "udid": "123"}]),
            ))
        })
    }

    fn ok() -> Next {
        next_fn(|| async { Ok(CommandResponse::new(Value::Null)) })
    }

    fn fail(message: &'static str) -> Next {
        next_fn(move || async move { Err(CommandError::failed("cmd", message)) })
    }

    async fn start_session(c: &CommandCorrelator) {
        c.create_session(created_response(), &DriverRef::default(), &SessionCapabilities::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_session_attributes_on_both_spans() {
        let tracer = InMemoryTracer::new();
        let c = correlator(&tracer);
        start_session(&c).await;

        let create = tracer.spans_named(CREATE_SESSION);
        assert_eq!(create.len(), 1);
        let attrs = &create[0].attributes;
        assert_eq!(attrs["appium.caps.device_name"], json!("dev"));
        assert_eq!(attrs["appium.caps.app"], json!("foo.apk"));
        assert_eq!(attrs["appium.session.id"], json!("sid1"));
        assert_eq!(attrs["appium.env"], json!("ci"));
        assert!(!attrs.contains_key("appium.caps.udid"));
        assert_eq!(create[0].status, SpanStatus::Ok);

        assert!(c.has_session());
        c.finish_session();
        let session = tracer.spans_named(SESSION_SPAN_NAME);
        assert_eq!(session[0].attributes, *attrs);
        assert_eq!(create[0].parent_id, Some(session[0].id));
    }

    #[tokio::test]
    async fn test_create_session_malformed_response() {
        let tracer = InMemoryTracer::new();
        let c = correlator(&tracer);

        c.create_session(
            next_fn(|| async { Ok(CommandResponse::new(json!({"sessionId": "x"}))) }),
            &DriverRef::default(),
            &SessionCapabilities::default(),
        )
        .await
        .unwrap();

        let create = tracer.spans_named(CREATE_SESSION);
        assert_eq!(create[0].status, SpanStatus::Ok);
        assert!(!create[0].attributes.contains_key("appium.session.id"));
        assert!(c.has_session());
    }

    #[tokio::test]
    async fn test_create_session_failure_leaves_no_open_span() {
        let tracer = InMemoryTracer::new();
        let c = correlator(&tracer);

        let result = c
            .create_session(fail("no device"), &DriverRef::default(), &SessionCapabilities::default())
            .await;

        assert_eq!(result.unwrap_err(), CommandError::failed("cmd", "no device"));
        assert_eq!(tracer.open_span_count(), 0);
        assert!(!c.has_session());
        let create = tracer.spans_named(CREATE_SESSION);
        assert_eq!(create[0].status, SpanStatus::Error("cmd failed: no device".to_string()));

        c.on_unexpected_shutdown(&DriverRef::default(), "crash").await;
        c.delete_session(ok(), &DriverRef::default(), "sid1").await.unwrap();
        assert_eq!(tracer.spans_named(SESSION_SPAN_NAME).len(), 1);
    }

    #[tokio::test]
    async fn test_command_without_session_bypasses_tracing() {
        let tracer = InMemoryTracer::new();
        let c = correlator(&tracer);

        c.handle(ok(), &DriverRef::default(), "click", &[]).await.unwrap();

        assert!(tracer.finished_spans().is_empty());
        assert_eq!(tracer.open_span_count(), 0);
    }

    #[tokio::test]
    async fn test_command_spans_carry_common_attributes() {
        let tracer = InMemoryTracer::new();
        let c = correlator(&tracer);
        start_session(&c).await;

        c.handle(ok(), &DriverRef::default(), "click", &[]).await.unwrap();
        let err = c
            .handle(fail("stale"), &DriverRef::default(), "getText", &[])
            .await
            .unwrap_err();
        assert_eq!(err, CommandError::failed("cmd", "stale"));

        let click = tracer.spans_named("click").remove(0);
        assert_eq!(click.attributes["appium.session.id"], json!("sid1"));
        assert_eq!(click.status, SpanStatus::Ok);
        let text = tracer.spans_named("getText").remove(0);
        assert_eq!(text.status, SpanStatus::Error("cmd failed: stale".to_string()));
        assert_eq!(text.parent_id, click.parent_id);
    }

    #[tokio::test]
    async fn test_delete_session_closes_session_even_on_failure() {
        let tracer = InMemoryTracer::new();
        let c = correlator(&tracer);
        start_session(&c).await;

        let result = c.delete_session(fail("gone"), &DriverRef::default(), "sid1").await;

        assert!(result.is_err());
        assert!(!c.has_session());
        assert_eq!(tracer.open_span_count(), 0);
        assert_eq!(tracer.spans_named(DELETE_SESSION).len(), 1);
        assert_eq!(c.common_attributes().len(), 1);
    }

    #[tokio::test]
    async fn test_unexpected_shutdown_closes_session() {
        let tracer = InMemoryTracer::new();
        let c = correlator(&tracer);
        start_session(&c).await;

        c.on_unexpected_shutdown(&DriverRef::for_session("sid1"), "crash").await;

        assert!(!c.has_session());
        assert_eq!(tracer.spans_named(SESSION_SPAN_NAME).len(), 1);
        assert_eq!(tracer.open_span_count(), 0);
    }

    #[tokio::test]
    async fn test_reused_correlator_does_not_leak_attributes() {
        let tracer = InMemoryTracer::new();
        let c = correlator(&tracer);
        start_session(&c).await;
        c.delete_session(ok(), &DriverRef::default(), "sid1").await.unwrap();

        c.create_session(
            next_fn(|| async { Ok(CommandResponse::new(json!(["sid2", {}]))) }),
            &DriverRef::default(),
            &SessionCapabilities::default(),
        )
        .await
        .unwrap();
        c.finish_session();

        let sessions = tracer.spans_named(SESSION_SPAN_NAME);
        let second = &sessions[1].attributes;
        assert_eq!(second["appium.session.id"], json!("sid2"));
        assert!(!second.contains_key("appium.caps.device_name"));
    }
}
