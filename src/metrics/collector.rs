// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Metrics collector: command counters and session gauges.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use crate::host::{Capabilities, SessionHost, SessionId};
use crate::session::SessionRegistry;
use crate::telemetry::attributes::{
    capabilities_to_metric_attributes, merge_attributes, METRIC_ATTR_COMMAND_NAME, METRIC_ATTR_ERROR,
    METRIC_ATTR_STATUS, METRIC_ATTR_SUCCESS, METRIC_KEY_COMMAND_RESPONSES, METRIC_KEY_OLDEST_SESSION_AGE,
    METRIC_KEY_SESSION_NUM_TOTAL,
};
use crate::telemetry::{Attributes, Counter, GaugeFuture, GaugeObservation, Meter};

/// Source of the current time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Whether a command succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Success,
    Error,
}

impl CommandOutcome {
    pub fn from_result<T, E>(result: &Result<T, E>) -> Self {
        if result.is_ok() {
            Self::Success
        } else {
            Self::Error
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => METRIC_ATTR_SUCCESS,
            Self::Error => METRIC_ATTR_ERROR,
        }
    }
}

/// Collector configuration.
#[derive(Debug, Clone)]
pub struct CollectorSettings {
    /// Capability names mirrored into metric attributes.
    pub attributes_in_caps: Vec<String>,
    /// Gauge observation interval.
    pub observe_interval: StdDuration,
    /// Observation ticks an absent session survives before eviction.
    pub grace_ticks: u32,
    /// Attributes added to every data point.
    pub base_attributes: Attributes,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            attributes_in_caps: vec!["platformName".to_string()],
            observe_interval: StdDuration::from_millis(10_000),
            grace_ticks: 3,
            base_attributes: Attributes::new(),
        }
    }
}

/// Counts command outcomes and answers the session gauges.
///
/// Gauges are pulled: on every tick the total-sessions callback lists the
/// host's live sessions, reconciles the registry, and caches the oldest age
/// so the oldest-age callback of the same tick reports the same snapshot.
pub struct Collector {
    responses: Arc<dyn Counter>,
    registry: SessionRegistry,
    host: RwLock<Option<Arc<dyn SessionHost>>>,
    attributes_in_caps: Vec<String>,
    base_attributes: Attributes,
    clock: Clock,
    observed_oldest: Mutex<Option<Duration>>,
}

impl Collector {
    /// Create the collector and register its instruments on `meter`.
    pub fn new(meter: &dyn Meter, settings: CollectorSettings) -> Arc<Self> {
        Self::with_clock(meter, settings, Arc::new(Utc::now))
    }

    /// Like [`Collector::new`] with an explicit clock.
    pub fn with_clock(meter: &dyn Meter, settings: CollectorSettings, clock: Clock) -> Arc<Self> {
        let collector = Arc::new(Self {
            responses: meter.create_counter(METRIC_KEY_COMMAND_RESPONSES),
            registry: SessionRegistry::with_interval(settings.observe_interval, settings.grace_ticks),
            host: RwLock::new(None),
            attributes_in_caps: settings.attributes_in_caps,
            base_attributes: settings.base_attributes,
            clock,
            observed_oldest: Mutex::new(None),
        });

        let weak = Arc::downgrade(&collector);
        meter
            .create_observable_gauge(METRIC_KEY_SESSION_NUM_TOTAL)
            .add_callback(Arc::new(move || -> GaugeFuture {
                let weak: Weak<Collector> = weak.clone();
                Box::pin(async move {
                    match weak.upgrade() {
                        Some(collector) => collector.observe_total_sessions().await,
                        None => GaugeObservation::new(0.0, Attributes::new()),
                    }
                })
            }));

        let weak = Arc::downgrade(&collector);
        meter
            .create_observable_gauge(METRIC_KEY_OLDEST_SESSION_AGE)
            .add_callback(Arc::new(move || -> GaugeFuture {
                let observation = match weak.upgrade() {
                    Some(collector) => collector.observe_oldest_session_age(),
                    None => GaugeObservation::new(0.0, Attributes::new()),
                };
                Box::pin(async move { observation })
            }));

        collector
    }

    /// Adopt the host used for live-session queries. The first host wins.
    pub fn put_host(&self, host: &Arc<dyn SessionHost>) -> bool {
        let mut slot = self.host.write().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return false;
        }
        *slot = Some(Arc::clone(host));
        debug!("collector adopted session host");
        true
    }

    pub fn has_host(&self) -> bool {
        self.host.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub fn on_session_created(&self, session_id: &str, capabilities: Capabilities) {
        self.registry.on_session_created(session_id, capabilities, self.now());
    }

    pub fn on_session_deleted(&self, session_id: &str) {
        self.registry.on_session_deleted(session_id);
    }

    /// Count one command response.
    pub fn count_command(&self, command: &str, outcome: CommandOutcome, capabilities: Option<&Capabilities>) {
        let mut status = Attributes::new();
        status.insert(METRIC_ATTR_COMMAND_NAME.to_string(), Value::String(command.to_string()));
        status.insert(METRIC_ATTR_STATUS.to_string(), Value::String(outcome.as_str().to_string()));
        let caps = capabilities_to_metric_attributes(capabilities, &self.attributes_in_caps);

        self.responses
            .add(1, &merge_attributes([&self.base_attributes, &status, &caps]));
    }

    /// Evaluate the total-sessions gauge.
    ///
    /// Reports zero without reconciling when no host has been adopted or the
    /// host cannot be queried.
    pub async fn observe_total_sessions(&self) -> GaugeObservation {
        let host = self.host.read().unwrap_or_else(PoisonError::into_inner).clone();
        let Some(host) = host else {
            return self.observation(0.0);
        };

        let sessions = match host.list_live_sessions().await {
            Ok(sessions) => sessions,
            Err(err) => {
                warn!(error = %err, "failed to list live sessions, reporting zero");
                return self.observation(0.0);
            }
        };

        let live_ids: HashSet<SessionId> = sessions.iter().map(|s| s.id.clone()).collect();
        let observation = self.registry.observe(&live_ids, self.now());
        if !observation.evicted.is_empty() {
            debug!(evicted = observation.evicted.len(), "reconciled session registry");
        }
        *self.observed_oldest.lock().unwrap_or_else(PoisonError::into_inner) = Some(observation.oldest_age);

        self.observation(sessions.len() as f64)
    }

    /// Evaluate the oldest-session-age gauge, in seconds.
    pub fn observe_oldest_session_age(&self) -> GaugeObservation {
        let cached = self
            .observed_oldest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let age = cached.unwrap_or_else(|| self.registry.oldest_session_age(self.now()));
        self.observation(age.num_milliseconds() as f64 / 1000.0)
    }

    fn observation(&self, value: f64) -> GaugeObservation {
        GaugeObservation::new(value, self.base_attributes.clone())
    }
}

impl fmt::Debug for Collector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collector")
            .field("sessions", &self.registry.len())
            .field("has_host", &self.has_host())
            .field("attributes_in_caps", &self.attributes_in_caps)
            .finish()
    }
}
