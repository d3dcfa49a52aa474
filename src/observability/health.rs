use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::checker::{CheckerState, StateHandle};
use crate::repositories::Store;

/// Health of a single dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Aggregated view served by `/healthz`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub checker: String,
    pub version: String,
    pub dependencies: Vec<DependencyHealth>,
}

impl HealthReport {
    /// Healthy iff the store is reachable and the checker has not stopped.
    pub fn is_healthy(&self) -> bool {
        self.status.is_healthy()
    }
}

/// Aggregates store reachability with the checker lifecycle.
pub struct HealthChecker {
    store: Arc<dyn Store>,
    checker_state: StateHandle,
}

impl HealthChecker {
    pub fn new(store: Arc<dyn Store>, checker_state: StateHandle) -> Self {
        Self {
            store,
            checker_state,
        }
    }

    pub async fn check(&self) -> HealthReport {
        let store = self.check_store().await;
        let checker = self.checker_state.get();

        let healthy = store.status.is_healthy() && checker != CheckerState::Stopped;
        HealthReport {
            status: if healthy {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unhealthy
            },
            checker: checker.as_str().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            dependencies: vec![store],
        }
    }

    async fn check_store(&self) -> DependencyHealth {
        let start = std::time::Instant::now();
        match tokio::time::timeout(Duration::from_secs(1), self.store.ping()).await {
            Ok(Ok(())) => DependencyHealth {
                name: "database".to_string(),
                status: HealthStatus::Healthy,
                latency_ms: Some(start.elapsed().as_secs_f64() * 1000.0),
                message: None,
            },
            Ok(Err(e)) => DependencyHealth {
                name: "database".to_string(),
                status: HealthStatus::Unhealthy,
                latency_ms: None,
                message: Some(format!("ping failed: {e}")),
            },
            Err(_) => DependencyHealth {
                name: "database".to_string(),
                status: HealthStatus::Unhealthy,
                latency_ms: None,
                message: Some("ping timeout".to_string()),
            },
        }
    }
}
