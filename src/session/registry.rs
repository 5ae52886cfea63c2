// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Lock-guarded session registry with grace-period eviction.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::types::SessionMeta;
use crate::host::{Capabilities, SessionId};

/// Result of one reconcile-and-measure pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Sessions removed because the host no longer lists them.
    pub evicted: Vec<SessionId>,
    /// Oldest remaining session age, zero when empty.
    pub oldest_age: Duration,
}

/// Sessions the engine believes are live, keyed by session id.
///
/// Command hooks and the metrics tick touch the registry concurrently; every
/// access goes through the internal lock.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionMeta>>,
    grace: Duration,
}

impl SessionRegistry {
    /// Create a registry whose stale entries survive for `grace` before
    /// eviction.
    pub fn new(grace: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            grace,
        }
    }

    /// Grace period `interval * ticks`.
    pub fn with_interval(interval: std::time::Duration, ticks: u32) -> Self {
        let millis = interval.as_millis().saturating_mul(u128::from(ticks));
        Self::new(Duration::milliseconds(i64::try_from(millis).unwrap_or(i64::MAX / 1_000)))
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<SessionId, SessionMeta>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<SessionId, SessionMeta>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a created session. An existing entry is replaced.
    pub fn on_session_created(&self, session_id: &str, capabilities: Capabilities, now: DateTime<Utc>) {
        let meta = SessionMeta::new(session_id, capabilities, now);
        if self.write().insert(session_id.to_string(), meta).is_some() {
            debug!(session_id, "replaced existing session entry");
        }
    }

    /// Forget a session. Unknown ids are ignored.
    pub fn on_session_deleted(&self, session_id: &str) {
        self.write().remove(session_id);
    }

    /// Maximum age over all entries, or zero.
    pub fn oldest_session_age(&self, now: DateTime<Utc>) -> Duration {
        oldest_age(&self.read(), now)
    }

    /// Evict entries absent from `live_ids` and older than the grace period.
    ///
    /// Returns the evicted ids.
    pub fn reconcile(&self, live_ids: &HashSet<SessionId>, now: DateTime<Utc>) -> Vec<SessionId> {
        evict_stale(&mut self.write(), live_ids, now, self.grace)
    }

    /// Reconcile and measure the oldest age under a single lock.
    pub fn observe(&self, live_ids: &HashSet<SessionId>, now: DateTime<Utc>) -> Observation {
        let mut sessions = self.write();
        let evicted = evict_stale(&mut sessions, live_ids, now, self.grace);
        Observation {
            evicted,
            oldest_age: oldest_age(&sessions, now),
        }
    }

    pub fn get(&self, session_id: &str) -> Option<SessionMeta> {
        self.read().get(session_id).cloned()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.read().contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Copy of every entry, in no particular order.
    pub fn snapshot(&self) -> Vec<SessionMeta> {
        self.read().values().cloned().collect()
    }
}

fn oldest_age(sessions: &HashMap<SessionId, SessionMeta>, now: DateTime<Utc>) -> Duration {
    sessions
        .values()
        .map(|meta| meta.age(now))
        .max()
        .unwrap_or_else(Duration::zero)
}

fn evict_stale(
    sessions: &mut HashMap<SessionId, SessionMeta>,
    live_ids: &HashSet<SessionId>,
    now: DateTime<Utc>,
    grace: Duration,
) -> Vec<SessionId> {
    let stale: Vec<SessionId> = sessions
        .values()
        .filter(|meta| !live_ids.contains(&meta.session_id) && meta.age(now) > grace)
        .map(|meta| meta.session_id.clone())
        .collect();

    for session_id in &stale {
        sessions.remove(session_id);
        debug!(session_id = %session_id, "evicted stale session");
    }
    stale
}
