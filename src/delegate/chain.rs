// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Delegation chain composition.

use std::sync::Arc;

use super::{BoxFuture, Delegate, Next};
use crate::host::{Command, CommandResult, DriverRef};

/// Fold `delegates` around `terminal` into one continuation.
///
/// The fold runs left to right, each step wrapping the previous
/// continuation, so the last delegate is entered first and the first
/// delegate sits closest to the terminal. Delegates that do not intercept
/// the command's kind are left out of the chain.
pub fn compose(
    delegates: &[Arc<dyn Delegate>],
    driver: &DriverRef,
    command: &Arc<Command>,
    terminal: Next,
) -> Next {
    let kind = command.kind();
    delegates
        .iter()
        .filter(|delegate| delegate.intercepts(kind))
        .fold(terminal, |current, delegate| {
            let delegate = Arc::clone(delegate);
            let driver = driver.clone();
            let command = Arc::clone(command);
            Box::new(move || -> BoxFuture<'static, CommandResult> {
                Box::pin(async move { invoke(delegate.as_ref(), current, &driver, &command).await })
            })
        })
}

/// Compose the chain for `command` and run it.
pub async fn dispatch(
    delegates: &[Arc<dyn Delegate>],
    driver: &DriverRef,
    command: Command,
    terminal: Next,
) -> CommandResult {
    let chain = compose(delegates, driver, &Arc::new(command), terminal);
    chain().await
}

async fn invoke(delegate: &dyn Delegate, next: Next, driver: &DriverRef, command: &Command) -> CommandResult {
    match command {
        Command::CreateSession(caps) => delegate.create_session(next, driver, caps).await,
        Command::DeleteSession { session_id } => delegate.delete_session(next, driver, session_id).await,
        Command::Execute { name, args } => delegate.handle(next, driver, name, args).await,
    }
}
