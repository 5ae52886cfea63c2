// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session metadata types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::host::{Capabilities, SessionId};

/// Metadata for a session the collector believes is live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMeta {
    /// Host-assigned session identifier.
    pub session_id: SessionId,
    /// Capabilities returned when the session was created.
    pub capabilities: Capabilities,
    /// When the create-session command succeeded.
    pub created_at: DateTime<Utc>,
}

impl SessionMeta {
    pub fn new(session_id: impl Into<SessionId>, capabilities: Capabilities, created_at: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.into(),
            capabilities,
            created_at,
        }
    }

    /// Age at `now`, clamped to zero if `now` precedes creation.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).max(Duration::zero())
    }
}
