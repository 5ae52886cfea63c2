// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session bookkeeping for the metrics collector.
//!
//! - **Types**: [`SessionMeta`], one entry per session believed live
//! - **Registry**: [`SessionRegistry`], the lock-guarded map reconciled
//!   against the host's live-session list on every gauge tick
//!
//! The registry may briefly hold sessions the host has already dropped;
//! [`SessionRegistry::reconcile`] evicts them once they are both absent from
//! the host and older than the grace period.

pub mod registry;
pub mod types;

pub use registry::{Observation, SessionRegistry};
pub use types::SessionMeta;
