use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::models::CheckResult;
use crate::observability::get_metrics;
use crate::repositories::Store;

use super::Job;

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_millis(200);

/// Issues one probe (up to three attempts) and appends its outcome.
pub struct Prober {
    client: reqwest::Client,
    store: Arc<dyn Store>,
}

/// Terminal state of the final attempt.
struct Outcome {
    status_code: Option<i32>,
    latency_ms: i64,
    error: Option<String>,
}

impl Prober {
    pub fn new(client: reqwest::Client, store: Arc<dyn Store>) -> Self {
        Self { client, store }
    }

    /// Runs the attempt loop and records the outcome.
    ///
    /// Probe failures are data: transport errors and 5xx responses end up in
    /// the result log, never as a worker error. The append deliberately does
    /// not observe `shutdown`, so an outcome seen during shutdown is still
    /// persisted.
    pub async fn check(&self, job: &Job, shutdown: &CancellationToken) {
        let Some(outcome) = self.run_attempts(job, shutdown).await else {
            return;
        };

        let record = CheckResult {
            target_id: job.id.clone(),
            checked_at: Utc::now(),
            status_code: outcome.status_code,
            latency_ms: Some(outcome.latency_ms),
            error: outcome.error,
        };

        get_metrics().record_probe(record.status_code, record.latency_ms);
        if let Err(e) = self.store.append_check_result(&record).await {
            error!(target_id = %job.id, error = %e, "failed to append check result");
        }
    }

    /// Returns `None` when shutdown arrived before any attempt completed;
    /// otherwise the last-known outcome.
    async fn run_attempts(&self, job: &Job, shutdown: &CancellationToken) -> Option<Outcome> {
        let mut outcome: Option<Outcome> = None;

        for attempt in 1..=MAX_ATTEMPTS {
            if shutdown.is_cancelled() && outcome.is_none() {
                return None;
            }

            let started = Instant::now();
            let response = tokio::select! {
                response = self.client.get(&job.url).send() => response,
                _ = shutdown.cancelled() => {
                    // Abort the in-flight attempt but keep what it cost us.
                    if outcome.is_none() {
                        outcome = Some(Outcome {
                            status_code: None,
                            latency_ms: started.elapsed().as_millis() as i64,
                            error: Some("request aborted: shutdown in progress".to_string()),
                        });
                    }
                    break;
                }
            };
            let latency_ms = started.elapsed().as_millis() as i64;

            match response {
                Ok(response) => {
                    let status = response.status().as_u16() as i32;
                    outcome = Some(Outcome {
                        status_code: Some(status),
                        latency_ms,
                        error: None,
                    });
                    if (500..=599).contains(&status) && attempt < MAX_ATTEMPTS {
                        debug!(target_id = %job.id, status, attempt, "retrying after 5xx");
                        get_metrics().record_probe_retry();
                        if !backoff(attempt, shutdown).await {
                            break;
                        }
                        continue;
                    }
                    break;
                }
                Err(e) => {
                    outcome = Some(Outcome {
                        status_code: None,
                        latency_ms,
                        error: Some(e.to_string()),
                    });
                    if attempt < MAX_ATTEMPTS {
                        debug!(target_id = %job.id, error = %e, attempt, "retrying after transport error");
                        get_metrics().record_probe_retry();
                        if !backoff(attempt, shutdown).await {
                            break;
                        }
                        continue;
                    }
                    break;
                }
            }
        }

        outcome
    }
}

/// Sleeps `200ms × 2^(attempt-1)`, returning false when shutdown cut the
/// sleep short.
async fn backoff(attempt: u32, shutdown: &CancellationToken) -> bool {
    let delay = BACKOFF_BASE * 2u32.pow(attempt - 1);
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = shutdown.cancelled() => false,
    }
}
