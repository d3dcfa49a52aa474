use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};

/// Per-host mutual exclusion for probes.
///
/// Each host maps to a one-permit semaphore, created on first reference and
/// kept for the process lifetime; the map is bounded by the active host set.
/// Holding the returned permit is the "one in-flight probe per host"
/// invariant. Waiters on the same host are served in FIFO order; across
/// hosts there is no ordering.
pub struct HostGate {
    hosts: DashMap<String, Arc<Semaphore>>,
}

impl HostGate {
    pub fn new() -> Self {
        Self {
            hosts: DashMap::new(),
        }
    }

    /// Blocks until the host is free or shutdown is signalled.
    pub async fn acquire(
        &self,
        host: &str,
        shutdown: &CancellationToken,
    ) -> Result<OwnedSemaphorePermit> {
        let semaphore = self
            .hosts
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(1)))
            .clone();

        tokio::select! {
            permit = semaphore.acquire_owned() => {
                // The semaphore is never closed.
                permit.map_err(|_| AppError::Cancelled)
            }
            _ = shutdown.cancelled() => Err(AppError::Cancelled),
        }
    }

    #[cfg(test)]
    fn tracked_hosts(&self) -> usize {
        self.hosts.len()
    }
}

impl Default for HostGate {
    fn default() -> Self {
        Self::new()
    }
}
