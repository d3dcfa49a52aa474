use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Metrics recorder for registrations and probes.
///
/// All recording goes through the `metrics` facade, so calls are no-ops
/// until an exporter is installed; tests can use the same paths freely.
#[derive(Debug, Clone, Default)]
pub struct Metrics;

impl Metrics {
    pub fn record_registration(&self, created: bool) {
        let outcome = if created { "created" } else { "existing" };
        counter!("linkwatch_registrations_total", "outcome" => outcome).increment(1);
    }

    pub fn record_probe(&self, status_code: Option<i32>, latency_ms: Option<i64>) {
        let outcome = match status_code {
            Some(s) if (200..400).contains(&s) => "ok",
            Some(s) if (400..500).contains(&s) => "client_error",
            Some(_) => "server_error",
            None => "transport_error",
        };
        counter!("linkwatch_probes_total", "outcome" => outcome).increment(1);
        if let Some(ms) = latency_ms {
            histogram!("linkwatch_probe_duration_ms").record(ms as f64);
        }
    }

    pub fn record_probe_retry(&self) {
        counter!("linkwatch_probe_retries_total").increment(1);
    }
}

/// Installs the Prometheus recorder and registers metric descriptions.
/// Returns the handle used by the `/metrics` endpoint.
pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    describe_counter!(
        "linkwatch_registrations_total",
        Unit::Count,
        "Target registrations by outcome"
    );
    describe_counter!(
        "linkwatch_probes_total",
        Unit::Count,
        "Completed probes by outcome"
    );
    describe_counter!(
        "linkwatch_probe_retries_total",
        Unit::Count,
        "Probe attempts retried after a 5xx or transport error"
    );
    describe_histogram!(
        "linkwatch_probe_duration_ms",
        Unit::Milliseconds,
        "Latency of the final probe attempt"
    );

    handle
}

pub fn get_metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::default)
}
