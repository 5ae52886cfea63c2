// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Delegate contract and chain composition.
//!
//! A [`Delegate`] wraps the execution of a host command: it receives a
//! [`Next`] continuation for everything downstream and decides what to
//! observe before and after invoking it. Delegates are composed by
//! [`compose`] into a single continuation.
//!
//! # Example
//!
//! ```rust,ignore
//! use session_telemetry::delegate::{Delegate, Next};
//!
//! struct Logging;
//!
//! #[async_trait]
//! impl Delegate for Logging {
//!     fn name(&self) -> &str {
//!         "logging"
//!     }
//!
//!     async fn handle(&self, next: Next, _driver: &DriverRef, command: &str, _args: &[Value]) -> CommandResult {
//!         tracing::info!(command, "running");
//!         next().await
//!     }
//! }
//! ```

mod chain;

pub use chain::{compose, dispatch};

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use serde_json::Value;

use crate::host::{CommandKind, CommandResult, DriverRef, SessionCapabilities};

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Zero-argument continuation producing the downstream command result.
pub type Next = Box<dyn FnOnce() -> BoxFuture<'static, CommandResult> + Send>;

/// Box an async closure into a [`Next`].
pub fn next_fn<F, Fut>(f: F) -> Next
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = CommandResult> + Send + 'static,
{
    Box::new(move || -> BoxFuture<'static, CommandResult> { Box::pin(f()) })
}

/// An observer wrapping command execution.
///
/// Every hook defaults to invoking `next` unchanged. A delegate must return
/// the downstream result as-is: it may observe errors, never recover them.
#[async_trait]
pub trait Delegate: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Whether this delegate takes part in commands of `kind`.
    ///
    /// Delegates that return `false` are skipped by [`compose`].
    fn intercepts(&self, _kind: CommandKind) -> bool {
        true
    }

    async fn create_session(
        &self,
        next: Next,
        _driver: &DriverRef,
        _caps: &SessionCapabilities,
    ) -> CommandResult {
        next().await
    }

    async fn delete_session(&self, next: Next, _driver: &DriverRef, _session_id: &str) -> CommandResult {
        next().await
    }

    /// Any command other than session creation or deletion.
    async fn handle(&self, next: Next, _driver: &DriverRef, _command: &str, _args: &[Value]) -> CommandResult {
        next().await
    }

    /// The session ended without a delete command.
    async fn on_unexpected_shutdown(&self, _driver: &DriverRef, _cause: &str) {}
}
