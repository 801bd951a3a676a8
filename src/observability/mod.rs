//! Logging setup and queue metrics
//!
//! Metrics are recorded through the global OpenTelemetry meter provider. Until
//! the host installs one, every instrument is a no-op.

use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram, Meter},
};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::errors::SubmitErrorKind;
use crate::job_scheduling::JobOutcome;

const METER_NAME: &str = "delayq";

/// Install a `fmt` subscriber filtered by `RUST_LOG`, falling back to
/// `delayq=<default_level>`. Does nothing if a subscriber is already set.
pub fn init_tracing(default_level: &str) {
    let log_filter = format!("delayq={default_level}");
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Pre-built instruments for the job submitter
#[derive(Clone)]
pub struct QueueMetrics {
    pub jobs_submitted: Counter<u64>,
    pub jobs_rejected: Counter<u64>,
    pub job_retries: Counter<u64>,
    pub jobs_exhausted: Counter<u64>,
    pub job_executions: Counter<u64>,
    pub job_execution_duration: Histogram<f64>,
}

impl QueueMetrics {
    pub fn new() -> Self {
        Self::with_meter(global::meter(METER_NAME))
    }

    pub fn with_meter(meter: Meter) -> Self {
        let jobs_submitted = meter
            .u64_counter("jobs_submitted_total")
            .with_description("Jobs admitted to a queue")
            .build();
        let jobs_rejected = meter
            .u64_counter("jobs_rejected_total")
            .with_description("Submissions that were refused")
            .build();
        let job_retries = meter
            .u64_counter("job_retries_total")
            .with_description("Retry submissions")
            .build();
        let jobs_exhausted = meter
            .u64_counter("jobs_exhausted_total")
            .with_description("Jobs that failed with no retries left")
            .build();
        let job_executions = meter
            .u64_counter("job_executions_total")
            .with_description("Scheduled callbacks that ran")
            .build();
        let job_execution_duration = meter
            .f64_histogram("job_execution_duration_seconds")
            .with_description("Time spent invoking procedures")
            .build();

        Self {
            jobs_submitted,
            jobs_rejected,
            job_retries,
            jobs_exhausted,
            job_executions,
            job_execution_duration,
        }
    }

    pub fn record_submitted(&self, queue: &str) {
        self.jobs_submitted
            .add(1, &[KeyValue::new("queue", queue.to_string())]);
    }

    pub fn record_rejected(&self, queue: &str, reason: SubmitErrorKind) {
        self.jobs_rejected.add(
            1,
            &[
                KeyValue::new("queue", queue.to_string()),
                KeyValue::new("reason", reason.as_str()),
            ],
        );
    }

    pub fn record_retry(&self, queue: &str) {
        self.job_retries
            .add(1, &[KeyValue::new("queue", queue.to_string())]);
    }

    pub fn record_exhausted(&self, queue: &str) {
        self.jobs_exhausted
            .add(1, &[KeyValue::new("queue", queue.to_string())]);
    }

    pub fn record_execution(&self, queue: &str, outcome: JobOutcome, elapsed: Duration) {
        let attributes = [
            KeyValue::new("queue", queue.to_string()),
            KeyValue::new("outcome", outcome.as_str()),
        ];
        self.job_executions.add(1, &attributes);
        self.job_execution_duration
            .record(elapsed.as_secs_f64(), &attributes);
    }
}

impl Default for QueueMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for QueueMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueMetrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_provider_is_a_no_op() {
        let metrics = QueueMetrics::new();
        metrics.record_submitted("Default");
        metrics.record_rejected("Default", SubmitErrorKind::Validation);
        metrics.record_retry("Default");
        metrics.record_exhausted("Default");
        metrics.record_execution("Default", JobOutcome::Succeeded, Duration::from_millis(12));
    }

    #[test]
    fn test_init_tracing_twice_is_harmless() {
        init_tracing("debug");
        init_tracing("info");
        tracing::info!("tracing initialised");
    }
}
