// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Out-of-band correlation for spans created by request interception.
//!
//! Request spans are started by a transport layer that knows nothing about
//! sessions. The [`HttpCorrelator`] stores each session's attributes in a
//! shared [`SessionStore`] once the create-session response arrives, and
//! [`RequestHooks`] attach them to request spans by session id. The
//! create-session request itself is bridged through a single pending slot.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::delegate::{Delegate, Next};
use crate::host::{CommandKind, CommandResult, CreatedSession, DriverRef, SessionCapabilities, SessionId};
use crate::telemetry::attributes::{merge_attributes, session_attributes};
use crate::telemetry::{Attributes, SpanRef};

static SESSION_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/session/([^/\s]+)").expect("valid regex"));
static CREATE_SESSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/session$").expect("valid regex"));
static DELETE_SESSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/session/([^/\s]+)$").expect("valid regex"));

/// An intercepted HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInfo {
    pub method: String,
    pub path: String,
}

impl RequestInfo {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
        }
    }

    /// `POST .../session`
    pub fn is_create_session(&self) -> bool {
        self.method.eq_ignore_ascii_case("POST") && CREATE_SESSION_RE.is_match(&self.path)
    }

    /// `DELETE .../session/<id>`
    pub fn is_delete_session(&self) -> bool {
        self.method.eq_ignore_ascii_case("DELETE") && DELETE_SESSION_RE.is_match(&self.path)
    }

    pub fn session_id(&self) -> Option<&str> {
        extract_session_id(&self.path)
    }
}

/// Session id from a `/session/<id>/...` path.
pub fn extract_session_id(path: &str) -> Option<&str> {
    SESSION_ID_RE
        .captures(path)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Attributes bound to every request span of one session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionData {
    pub attributes: Attributes,
}

impl SessionData {
    pub fn new(attributes: Attributes) -> Self {
        Self { attributes }
    }
}

/// Store shared between the correlator and the request hooks.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, SessionData>>,
    pending_create_span: Mutex<Option<SpanRef>>,
    base_attributes: Attributes,
}

impl SessionStore {
    pub fn new(base_attributes: Attributes) -> Self {
        Self {
            base_attributes,
            ..Default::default()
        }
    }

    pub fn get(&self, session_id: &str) -> Option<SessionData> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .cloned()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remember the span of the latest create-session request, replacing
    /// any span still waiting.
    pub fn put_pending_create_span(&self, span: SpanRef) {
        let previous = self
            .pending_create_span
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(span);
        if previous.is_some() {
            debug!("replaced unconsumed create-session span");
        }
    }

    pub fn has_pending_create_span(&self) -> bool {
        self.pending_create_span
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Set the stored attributes of `session_id` on `span`.
    ///
    /// Returns whether session data was found.
    pub fn bind_session_attributes(&self, span: &SpanRef, session_id: &str) -> bool {
        let Some(data) = self.get(session_id) else {
            info!(session_id, "session information not found");
            return false;
        };
        span.set_attributes(&merge_attributes([&self.base_attributes, &data.attributes]));
        true
    }

    /// Store session data and backfill the pending create-session span.
    pub fn add_session(&self, session_id: &str, data: SessionData) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session_id.to_string(), data);

        let pending = self
            .pending_create_span
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match pending {
            Some(span) => {
                self.bind_session_attributes(&span, session_id);
            }
            None => debug!(session_id, "no pending create-session span to backfill"),
        }
    }

    pub fn remove_session(&self, session_id: &str) -> Option<SessionData> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id)
    }
}

/// Delegate publishing session attributes into a [`SessionStore`].
#[derive(Debug)]
pub struct HttpCorrelator {
    attributes_in_caps: Vec<String>,
    store: Arc<SessionStore>,
}

impl HttpCorrelator {
    pub fn new(attributes_in_caps: Vec<String>, store: Arc<SessionStore>) -> Self {
        Self {
            attributes_in_caps,
            store,
        }
    }
}

#[async_trait]
impl Delegate for HttpCorrelator {
    fn name(&self) -> &str {
        "http-tracer"
    }

    fn intercepts(&self, kind: CommandKind) -> bool {
        kind == CommandKind::CreateSession
    }

    async fn create_session(&self, next: Next, _driver: &DriverRef, _caps: &SessionCapabilities) -> CommandResult {
        let result = next().await;
        if let Ok(response) = &result {
            match CreatedSession::decode(response) {
                Ok(created) => {
                    let attributes =
                        session_attributes(&created.session_id, &created.capabilities, &self.attributes_in_caps);
                    self.store
                        .add_session(&created.session_id, SessionData::new(attributes));
                }
                Err(err) => info!(error = %err, "skip saving session id"),
            }
        }
        result
    }

    async fn on_unexpected_shutdown(&self, driver: &DriverRef, cause: &str) {
        if let Some(session_id) = driver.session_id() {
            if self.store.remove_session(session_id).is_some() {
                debug!(session_id, cause, "dropped session data after unexpected shutdown");
            }
        }
    }
}

/// Hooks called by the request-interception layer around each request span.
#[derive(Debug, Clone)]
pub struct RequestHooks {
    store: Arc<SessionStore>,
}

impl RequestHooks {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }

    /// Before the request is handled.
    pub fn on_request_start(&self, span: &SpanRef, request: &RequestInfo) {
        if request.is_create_session() {
            self.store.put_pending_create_span(Arc::clone(span));
        }
    }

    /// After the response is produced.
    pub fn on_response(&self, span: &SpanRef, request: &RequestInfo) {
        let Some(session_id) = request.session_id() else {
            return;
        };
        self.store.bind_session_attributes(span, session_id);
        if request.is_delete_session() {
            self.store.remove_session(session_id);
        }
    }
}
