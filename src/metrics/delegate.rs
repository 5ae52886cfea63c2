// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Per-session delegate feeding the collector.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use super::collector::{Collector, CommandOutcome};
use crate::delegate::{Delegate, Next};
use crate::host::{
    Capabilities, CommandResult, CreatedSession, DriverRef, SessionCapabilities, CREATE_SESSION, DELETE_SESSION,
};

/// Counts every command of one session and keeps the registry in step with
/// session creation and deletion.
#[derive(Debug)]
pub struct MetricsDelegate {
    collector: Arc<Collector>,
    capabilities: Mutex<Option<Capabilities>>,
}

impl MetricsDelegate {
    pub fn new(collector: Arc<Collector>) -> Self {
        Self {
            collector,
            capabilities: Mutex::new(None),
        }
    }

    /// Capabilities of the session this delegate serves, once created.
    pub fn capabilities(&self) -> Option<Capabilities> {
        self.capabilities.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set_capabilities(&self, capabilities: Option<Capabilities>) {
        *self.capabilities.lock().unwrap_or_else(PoisonError::into_inner) = capabilities;
    }

    fn count(&self, command: &str, result: &CommandResult) {
        let caps = self.capabilities();
        self.collector
            .count_command(command, CommandOutcome::from_result(result), caps.as_ref());
    }
}

#[async_trait]
impl Delegate for MetricsDelegate {
    fn name(&self) -> &str {
        "metrics"
    }

    async fn create_session(&self, next: Next, driver: &DriverRef, _caps: &SessionCapabilities) -> CommandResult {
        if let Some(host) = driver.host() {
            self.collector.put_host(host);
        }
        self.set_capabilities(None);

        let result = next().await;
        if let Ok(response) = &result {
            match CreatedSession::decode(response) {
                Ok(created) => {
                    self.collector
                        .on_session_created(&created.session_id, created.capabilities.clone());
                    self.set_capabilities(Some(created.capabilities));
                }
                Err(err) => info!(error = %err, "skip saving session id"),
            }
        }
        self.count(CREATE_SESSION, &result);
        result
    }

    async fn delete_session(&self, next: Next, _driver: &DriverRef, session_id: &str) -> CommandResult {
        let result = next().await;
        self.count(DELETE_SESSION, &result);
        if result.is_ok() {
            self.collector.on_session_deleted(session_id);
            self.set_capabilities(None);
        }
        result
    }

    async fn handle(&self, next: Next, _driver: &DriverRef, command: &str, _args: &[Value]) -> CommandResult {
        let result = next().await;
        self.count(command, &result);
        result
    }

    async fn on_unexpected_shutdown(&self, _driver: &DriverRef, _cause: &str) {
        self.set_capabilities(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegate::next_fn;
    use crate::error::CommandError;
    use crate::host::{CommandResponse, MockSessionHost, SessionHost};
    use crate::metrics::collector::CollectorSettings;
    use crate::telemetry::attributes::METRIC_KEY_COMMAND_RESPONSES;
    use crate::telemetry::{Attributes, MetricsRegistry, MetricsSnapshot};
    use serde_json::json;

    fn setup() -> (MetricsRegistry, MetricsDelegate) {
        let registry = MetricsRegistry::new();
        let collector = Collector::new(&registry, CollectorSettings::default());
        (registry, MetricsDelegate::new(collector))
    }

    fn created(session_id: &'static str) -> Next {
        next_fn(move || async move {
            Ok(CommandResponse::session_created(
                session_id,
                json!({"platformName": "iOS"}).as_object().cloned().unwrap(),
            ))
        })
    }

    #[tokio::test]
    async fn test_create_session_registers_and_counts() {
        let (registry, delegate) = setup();
        let host: Arc<dyn SessionHost> = Arc::new(MockSessionHost::new());

        let result = delegate
            .create_session(created("s1"), &DriverRef::umbrella(host), &SessionCapabilities::default())
            .await;

        assert!(result.is_ok());
        assert!(delegate.collector.registry().contains("s1"));
        assert!(delegate.collector.has_host());
        assert_eq!(delegate.capabilities().unwrap()["platformName"], json!("iOS"));

        let snapshot = registry.collect().await;
        let point = snapshot.points_named(METRIC_KEY_COMMAND_RESPONSES)[0];
        assert_eq!(point.attributes["command"], json!("createSession"));
        assert_eq!(point.attributes["status"], json!("success"));
        assert_eq!(point.attributes["platform_name"], json!("iOS"));
    }

    #[tokio::test]
    async fn test_create_session_malformed_response() {
        let (registry, delegate) = setup();

        let result = delegate
            .create_session(
                next_fn(|| async { Ok(CommandResponse::new(json!(["only-id"]))) }),
                &DriverRef::default(),
                &SessionCapabilities::default(),
            )
            .await;

        assert!(result.is_ok());
        assert!(delegate.collector.registry().is_empty());
        let snapshot = registry.collect().await;
        let point = snapshot.points_named(METRIC_KEY_COMMAND_RESPONSES)[0];
        assert_eq!(point.attributes["status"], json!("success"));
        assert!(!point.attributes.contains_key("platform_name"));
    }

    #[tokio::test]
    async fn test_create_session_failure_counts_error() {
        let (registry, delegate) = setup();
        let err = CommandError::failed("createSession", "no device");
        let returned = err.clone();

        let result = delegate
            .create_session(
                next_fn(move || async move { Err(returned) }),
                &DriverRef::default(),
                &SessionCapabilities::default(),
            )
            .await;

        assert_eq!(result.unwrap_err(), err);
        let snapshot = registry.collect().await;
        assert_eq!(
            snapshot.points_named(METRIC_KEY_COMMAND_RESPONSES)[0].attributes["status"],
            json!("error")
        );
    }

    #[tokio::test]
    async fn test_commands_tagged_with_session_caps() {
        let (registry, delegate) = setup();
        let driver = DriverRef::for_session("s1");
        delegate
            .create_session(created("s1"), &driver, &SessionCapabilities::default())
            .await
            .unwrap();

        let _ = delegate
            .handle(
                next_fn(|| async { Err(CommandError::failed("click", "stale")) }),
                &driver,
                "click",
                &[],
            )
            .await;

        let snapshot = registry.collect().await;
        let click = snapshot
            .points_named(METRIC_KEY_COMMAND_RESPONSES)
            .into_iter()
            .find(|p| p.attributes["command"] == json!("click"))
            .unwrap();
        assert_eq!(click.attributes["status"], json!("error"));
        assert_eq!(click.attributes["platform_name"], json!("iOS"));
    }

    #[tokio::test]
    async fn test_delete_session_removes_on_success_only() {
        let (_registry, delegate) = setup();
        let driver = DriverRef::for_session("s1");
        delegate
            .create_session(created("s1"), &driver, &SessionCapabilities::default())
            .await
            .unwrap();

        let failed = delegate
            .delete_session(
                next_fn(|| async { Err(CommandError::SessionNotFound("s1".to_string())) }),
                &driver,
                "s1",
            )
            .await;
        assert!(failed.is_err());
        assert!(delegate.collector.registry().contains("s1"));

        delegate
            .delete_session(
                next_fn(|| async { Ok(CommandResponse::new(Value::Null)) }),
                &driver,
                "s1",
            )
            .await
            .unwrap();
        assert!(!delegate.collector.registry().contains("s1"));
    }

    fn status_point(snapshot: &MetricsSnapshot, command: &str) -> Attributes {
        snapshot
            .points_named(METRIC_KEY_COMMAND_RESPONSES)
            .into_iter()
            .find(|p| p.attributes["command"] == json!(command))
            .map(|p| p.attributes.clone())
            .unwrap()
    }

    #[tokio::test]
    async fn test_commands_after_delete_carry_no_caps() {
        let (registry, delegate) = setup();
        let driver = DriverRef::for_session("s1");
        delegate
            .create_session(created("s1"), &driver, &SessionCapabilities::default())
            .await
            .unwrap();
        delegate
            .delete_session(
                next_fn(|| async { Ok(CommandResponse::new(Value::Null)) }),
                &driver,
                "s1",
            )
            .await
            .unwrap();

        delegate
            .handle(
                next_fn(|| async { Ok(CommandResponse::new(Value::Null)) }),
                &DriverRef::default(),
                "getStatus",
                &[],
            )
            .await
            .unwrap();
        let _ = delegate
            .create_session(
                next_fn(|| async { Err(CommandError::failed("createSession", "no device")) }),
                &DriverRef::default(),
                &SessionCapabilities::default(),
            )
            .await;

        assert!(delegate.capabilities().is_none());
        let snapshot = registry.collect().await;
        let delete = status_point(&snapshot, DELETE_SESSION);
        assert_eq!(delete["platform_name"], json!("iOS"));
        assert!(!status_point(&snapshot, "getStatus").contains_key("platform_name"));
        let failed_create = snapshot
            .points_named(METRIC_KEY_COMMAND_RESPONSES)
            .into_iter()
            .find(|p| p.attributes["command"] == json!(CREATE_SESSION) && p.attributes["status"] == json!("error"))
            .unwrap();
        assert!(!failed_create.attributes.contains_key("platform_name"));
    }

    #[tokio::test]
    async fn test_unexpected_shutdown_clears_caps() {
        let (registry, delegate) = setup();
        let driver = DriverRef::for_session("s1");
        delegate
            .create_session(created("s1"), &driver, &SessionCapabilities::default())
            .await
            .unwrap();

        delegate.on_unexpected_shutdown(&driver, "crash").await;
        delegate
            .handle(
                next_fn(|| async { Ok(CommandResponse::new(Value::Null)) }),
                &driver,
                "getStatus",
                &[],
            )
            .await
            .unwrap();

        assert!(delegate.capabilities().is_none());
        assert!(delegate.collector.registry().contains("s1"));
        let snapshot = registry.collect().await;
        assert!(!status_point(&snapshot, "getStatus").contains_key("platform_name"));
    }
}
