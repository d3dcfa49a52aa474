pub mod host_gate;
pub mod prober;

pub use host_gate::HostGate;
pub use prober::Prober;

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::models::Cursor;
use crate::repositories::Store;

/// Targets fetched per enumeration page.
const PAGE_SIZE: i64 = 500;

/// One probe to perform.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub url: String,
    pub host: String,
}

/// Lifecycle of the checker as exposed by `/healthz`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckerState {
    Starting,
    Running,
    Stopped,
}

impl CheckerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckerState::Starting => "starting",
            CheckerState::Running => "running",
            CheckerState::Stopped => "stopped",
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => CheckerState::Running,
            2 => CheckerState::Stopped,
            _ => CheckerState::Starting,
        }
    }
}

/// Shared, lock-free view of the checker lifecycle.
#[derive(Debug, Clone)]
pub struct StateHandle(Arc<AtomicU8>);

impl StateHandle {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU8::new(CheckerState::Starting as u8)))
    }

    pub fn get(&self) -> CheckerState {
        CheckerState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: CheckerState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

impl Default for StateHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Knobs for the scheduler and worker pool.
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    pub workers: usize,
    pub check_interval: Duration,
    pub http_timeout: Duration,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            check_interval: Duration::from_secs(15),
            http_timeout: Duration::from_secs(5),
        }
    }
}

/// The scheduled checker: a paging scheduler feeding a bounded job queue
/// drained by a fixed pool of workers, with per-host serialization.
pub struct Checker {
    store: Arc<dyn Store>,
    gate: HostGate,
    prober: Prober,
    state: StateHandle,
    config: CheckerConfig,
}

impl Checker {
    pub fn new(store: Arc<dyn Store>, config: CheckerConfig) -> Result<Self> {
        let client = build_client(config.http_timeout)?;
        Ok(Self {
            gate: HostGate::new(),
            prober: Prober::new(client, Arc::clone(&store)),
            state: StateHandle::new(),
            store,
            config,
        })
    }

    pub fn state(&self) -> StateHandle {
        self.state.clone()
    }

    /// Runs until `shutdown` fires, then closes the queue, drains the
    /// workers, and flips the state to `stopped`.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        self.state.set(CheckerState::Running);
        info!(
            workers = self.config.workers,
            interval_secs = self.config.check_interval.as_secs(),
            "checker started"
        );

        let (tx, rx) = mpsc::channel::<Job>(self.config.workers * 4);
        let rx = Arc::new(Mutex::new(rx));

        let mut workers = Vec::with_capacity(self.config.workers);
        for worker in 0..self.config.workers {
            let checker = Arc::clone(&self);
            let rx = Arc::clone(&rx);
            let shutdown = shutdown.clone();
            workers.push(tokio::spawn(async move {
                checker.worker_loop(worker, rx, shutdown).await;
            }));
        }

        // The first tick completes immediately, so enumeration starts on
        // launch rather than one interval later.
        let mut ticker = tokio::time::interval(self.config.check_interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => self.enqueue_all(&tx, &shutdown).await,
            }
        }

        // Closing the queue lets workers drain whatever is already enqueued
        // and exit on the next receive.
        drop(tx);
        for handle in workers {
            let _ = handle.await;
        }

        self.state.set(CheckerState::Stopped);
        info!("checker stopped");
    }

    /// Enumerates every registered target and enqueues one job each.
    ///
    /// A full queue blocks the send; that backpressure is intentional and
    /// only shutdown may interrupt it. Overlap with a still-draining previous
    /// enumeration is fine: the host gate prevents duplicate in-flight
    /// probes.
    async fn enqueue_all(&self, tx: &mpsc::Sender<Job>, shutdown: &CancellationToken) {
        let mut after: Option<Cursor> = None;
        loop {
            let (targets, next) = match self.store.list_targets(None, after.as_ref(), PAGE_SIZE).await
            {
                Ok(page) => page,
                Err(e) => {
                    warn!(error = %e, "target enumeration failed; skipping tick");
                    return;
                }
            };

            for target in targets {
                let job = Job {
                    id: target.id,
                    url: target.url,
                    host: target.host,
                };
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    sent = tx.send(job) => {
                        if sent.is_err() {
                            return;
                        }
                    }
                }
            }

            match next {
                Some(cursor) => after = Some(cursor),
                None => break,
            }
        }
    }

    async fn worker_loop(
        &self,
        worker: usize,
        rx: Arc<Mutex<mpsc::Receiver<Job>>>,
        shutdown: CancellationToken,
    ) {
        loop {
            let job = {
                let mut rx = rx.lock().await;
                rx.recv().await
            };
            let Some(job) = job else {
                debug!(worker, "job queue closed");
                return;
            };

            let permit = match self.gate.acquire(&job.host, &shutdown).await {
                Ok(permit) => permit,
                Err(AppError::Cancelled) => continue,
                Err(e) => {
                    warn!(worker, host = %job.host, error = %e, "host gate failed");
                    continue;
                }
            };

            self.prober.check(&job, &shutdown).await;
            drop(permit);
        }
    }
}

/// HTTP client for probes: total timeout covers redirects; up to five hops
/// are followed and the sixth 3xx is returned as the final response.
fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    let redirect = reqwest::redirect::Policy::custom(|attempt| {
        if attempt.previous().len() > 5 {
            attempt.stop()
        } else {
            attempt.follow()
        }
    });

    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::ACCEPT,
        reqwest::header::HeaderValue::from_static("*/*"),
    );

    reqwest::Client::builder()
        .user_agent("linkwatch/1.0 (+https://example)")
        .default_headers(headers)
        .timeout(timeout)
        .redirect(redirect)
        .build()
        .map_err(|e| AppError::Internal(anyhow!("failed to build probe client: {e}")))
}
