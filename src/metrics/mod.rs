// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Command and session metrics.
//!
//! One [`Collector`] is shared by every session; each session gets its own
//! [`MetricsDelegate`] that remembers the session's capabilities and feeds
//! the collector.

pub mod collector;
mod delegate;

pub use collector::{Clock, Collector, CollectorSettings, CommandOutcome};
pub use delegate::MetricsDelegate;
