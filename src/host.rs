// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Host-side types: commands, responses, driver references and the
//! live-session query the metrics collector reconciles against.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CommandError, HostError, ResponseShapeError};

/// Session identifier assigned by the host.
pub type SessionId = String;

/// Session capabilities (`name -> value`).
pub type Capabilities = serde_json::Map<String, Value>;

/// Outcome of a host command.
pub type CommandResult = Result<CommandResponse, CommandError>;

/// Command name used for session creation.
pub const CREATE_SESSION: &str = "createSession";
/// Command name used for session deletion.
pub const DELETE_SESSION: &str = "deleteSession";

/// A live session as reported by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveSession {
    pub id: SessionId,
    #[serde(default)]
    pub capabilities: Capabilities,
}

/// Authoritative source of live sessions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionHost: Send + Sync {
    /// List sessions the host currently considers live.
    async fn list_live_sessions(&self) -> Result<Vec<LiveSession>, HostError>;
}

/// The driver a command was dispatched to.
///
/// Only the top-level driver that owns every session carries a host handle;
/// per-session drivers carry their session id.
#[derive(Clone, Default)]
pub struct DriverRef {
    session_id: Option<SessionId>,
    host: Option<Arc<dyn SessionHost>>,
}

impl DriverRef {
    /// The top-level driver, able to list live sessions.
    pub fn umbrella(host: Arc<dyn SessionHost>) -> Self {
        Self {
            session_id: None,
            host: Some(host),
        }
    }

    /// A driver bound to one session.
    pub fn for_session(session_id: impl Into<SessionId>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            host: None,
        }
    }

    /// Attach a session id.
    pub fn with_session_id(mut self, session_id: impl Into<SessionId>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn host(&self) -> Option<&Arc<dyn SessionHost>> {
        self.host.as_ref()
    }
}

impl fmt::Debug for DriverRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverRef")
            .field("session_id", &self.session_id)
            .field("has_host", &self.host.is_some())
            .finish()
    }
}

/// Capabilities supplied with a create-session command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionCapabilities {
    pub desired: Value,
    pub required: Value,
    pub merged: Value,
}

/// Which hook a command is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    CreateSession,
    DeleteSession,
    Execute,
}

/// A command flowing through the delegation chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateSession(SessionCapabilities),
    DeleteSession { session_id: SessionId },
    Execute { name: String, args: Vec<Value> },
}

impl Command {
    /// Create a generic named command.
    pub fn execute(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self::Execute {
            name: name.into(),
            args,
        }
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Self::CreateSession(_) => CommandKind::CreateSession,
            Self::DeleteSession { .. } => CommandKind::DeleteSession,
            Self::Execute { .. } => CommandKind::Execute,
        }
    }

    /// Command name as used in span names and metric attributes.
    pub fn name(&self) -> &str {
        match self {
            Self::CreateSession(_) => CREATE_SESSION,
            Self::DeleteSession { .. } => DELETE_SESSION,
            Self::Execute { name, .. } => name,
        }
    }
}

/// Response of a host command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub value: Value,
}

impl CommandResponse {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    /// The response a host returns for a created session:
    /// `[sessionId, capabilities]`.
    pub fn session_created(session_id: &str, capabilities: Capabilities) -> Self {
        Self::new(Value::Array(vec![
            Value::String(session_id.to_string()),
            Value::Object(capabilities),
        ]))
    }
}

/// Session identity decoded from a create-session response.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedSession {
    pub session_id: SessionId,
    pub capabilities: Capabilities,
}

impl CreatedSession {
    /// Decode `[sessionId, capabilities, ...]` from a create-session response.
    ///
    /// The value must be an array of at least two elements. The first
    /// element is the id: a non-empty string, or a number which is
    /// stringified. A second element that is not an object decodes as empty
    /// capabilities.
    pub fn decode(response: &CommandResponse) -> Result<Self, ResponseShapeError> {
        let items = response
            .value
            .as_array()
            .ok_or(ResponseShapeError::NotAnArray)?;
        if items.len() < 2 {
            return Err(ResponseShapeError::TooShort(items.len()));
        }
        let session_id = match &items[0] {
            Value::String(id) if !id.is_empty() => id.clone(),
            Value::Number(id) => id.to_string(),
            _ => return Err(ResponseShapeError::InvalidSessionId),
        };

        Ok(Self {
            session_id,
            capabilities: items[1].as_object().cloned().unwrap_or_default(),
        })
    }
}
