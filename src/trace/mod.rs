// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session correlation strategies.
//!
//! - **command**: [`CommandCorrelator`], a `session` span per session with a
//!   child span per command
//! - **http**: [`HttpCorrelator`] plus [`RequestHooks`], session attributes
//!   attached to request spans created elsewhere
//!
//! Any other selector resolves to [`TraceStrategy::Noop`].

pub mod command;
pub mod http;

pub use command::{CommandCorrelator, SESSION_SPAN_NAME};
pub use http::{extract_session_id, HttpCorrelator, RequestHooks, RequestInfo, SessionData, SessionStore};

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::delegate::Delegate;
use crate::host::CommandKind;
use crate::telemetry::{Attributes, Tracer};

/// Selector for the nested-span strategy.
pub const SEMANTIC_COMMAND: &str = "command";
/// Selector for the out-of-band strategy.
pub const SEMANTIC_HTTP: &str = "http";

/// The active correlation strategy.
#[derive(Debug, Clone)]
pub enum TraceStrategy {
    Command {
        attributes_in_caps: Vec<String>,
        base_attributes: Attributes,
    },
    OutOfBand {
        attributes_in_caps: Vec<String>,
        store: Arc<SessionStore>,
    },
    Noop,
}

impl TraceStrategy {
    /// Resolve a selector string. Unknown selectors fall back to
    /// [`TraceStrategy::Noop`].
    pub fn from_selector(selector: &str, attributes_in_caps: Vec<String>, base_attributes: Attributes) -> Self {
        match selector {
            SEMANTIC_COMMAND => Self::Command {
                attributes_in_caps,
                base_attributes,
            },
            SEMANTIC_HTTP => Self::OutOfBand {
                attributes_in_caps,
                store: Arc::new(SessionStore::new(base_attributes)),
            },
            other => {
                warn!(semantic = other, "unknown trace semantic, tracing disabled");
                Self::Noop
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Command { .. } => SEMANTIC_COMMAND,
            Self::OutOfBand { .. } => SEMANTIC_HTTP,
            Self::Noop => "noop",
        }
    }

    /// Build the delegate for one session.
    ///
    /// Out-of-band delegates all share the strategy's store.
    pub fn new_delegate(&self, tracer: &Arc<dyn Tracer>) -> Arc<dyn Delegate> {
        match self {
            Self::Command {
                attributes_in_caps,
                base_attributes,
            } => Arc::new(CommandCorrelator::new(
                Arc::clone(tracer),
                attributes_in_caps.clone(),
                base_attributes.clone(),
            )),
            Self::OutOfBand {
                attributes_in_caps,
                store,
            } => Arc::new(HttpCorrelator::new(attributes_in_caps.clone(), Arc::clone(store))),
            Self::Noop => Arc::new(NoopDelegate),
        }
    }

    /// Request hooks for the interception layer; only the out-of-band
    /// strategy has any.
    pub fn request_hooks(&self) -> Option<RequestHooks> {
        match self {
            Self::OutOfBand { store, .. } => Some(RequestHooks::new(Arc::clone(store))),
            _ => None,
        }
    }
}

/// Delegate that observes nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDelegate;

#[async_trait]
impl Delegate for NoopDelegate {
    fn name(&self) -> &str {
        "noop"
    }

    fn intercepts(&self, _kind: CommandKind) -> bool {
        false
    }
}
