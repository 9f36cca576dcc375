//! Metrics facade.
//!
//! The narrow interface the socket server uses to reach the registry:
//! `register`, `update` and `snapshot`. It owns the current `MetricSet`
//! and is shared by every connection handler behind an `Arc`.
//!
//! # Consistency
//!
//! ```text
//!   update ──┐  shared   ┌──────────────┐
//!   update ──┼─────────▶ │ RwLock<Set>  │ ◀───────── snapshot / register
//!   update ──┘           └──────────────┘  exclusive
//! ```
//!
//! Updates only touch atomic metric primitives, so they may run in
//! parallel under the shared side of the lock. A snapshot takes the
//! exclusive side while gathering, so it never sees an update that has
//! incremented the request counter without its histogram observations.

mod set;

pub use set::{MetricSet, MAX_SERVER_METRICS};

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;
use tracing::{debug, error, info};

use promstat_core::{MetricScope, SchemaError, StatusConfig};
use promstat_protocol::PayloadError;

/// Errors raised by the registry.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Metrics are not registered")]
    NotRegistered,

    #[error("Invalid schema: {0}")]
    Schema(#[from] SchemaError),

    #[error("Invalid payload: {0}")]
    Payload(#[from] PayloadError),

    #[error("Counter {name} cannot decrease (got {value})")]
    NegativeCounter { name: String, value: f64 },

    #[error("Server metric limit of {limit} names reached")]
    TooManyServerMetrics { limit: usize },

        #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Shared entry point into the metrics registry.
#[derive(Default)]
pub struct MetricsFacade {
    current: RwLock<Option<MetricSet>>,
}

impl MetricsFacade {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a fresh registry built from `config`.
    ///
    /// Replaces whatever a previous registration installed. On error the
    /// previous registry stays in place.
    pub fn register(&self, config: &StatusConfig) -> Result<(), MetricsError> {
        let set = MetricSet::new(config)?;
        let labels: Vec<&str> = set.label_names().iter().collect();
        info!(
            namespace = config.namespace(),
            labels = ?labels,
            "Metrics registered"
        );
        *self.write() = Some(set);
        Ok(())
    }

    /// Returns true once a registration has succeeded.
    pub fn is_registered(&self) -> bool {
        self.read().is_some()
    }

    /// Applies an update, dropping it if it cannot be applied.
    ///
    /// Malformed payloads never reach the caller; they are logged and
    /// discarded.
    pub fn update(&self, scope: MetricScope, payload: &str) {
        if let Err(e) = self.try_update(scope, payload) {
            debug!(scope = %scope, payload, error = %e, "Dropped metric update");
        }
    }

    /// Applies an update, reporting why it was rejected.
    pub fn try_update(&self, scope: MetricScope, payload: &str) -> Result<(), MetricsError> {
        let guard = self.read();
        let set = guard.as_ref().ok_or(MetricsError::NotRegistered)?;
        match scope {
            MetricScope::Server => set.apply_server(payload),
            MetricScope::Request => set.apply_request(payload),
        }
    }

    /// Full text exposition of the current registry.
    ///
    /// Empty before the first registration.
    pub fn snapshot(&self) -> Vec<u8> {
        let guard = self.write();
        match guard.as_ref() {
            Some(set) => set.encode().unwrap_or_else(|e| {
                error!(error = %e, "Failed to encode metrics");
                Vec::new()
            }),
            None => Vec::new(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<MetricSet>> {
        self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<MetricSet>> {
        self.current.write().unwrap_or_else(PoisonError::into_inner)
    }
}
