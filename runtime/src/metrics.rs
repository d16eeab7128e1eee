//! Prometheus metrics for observability and monitoring.
//!
//! Every metric herald emits is described here, and each subsystem records
//! through a small static recorder (`JobMetrics`, `PollMetrics`, ...), so the
//! metric names live in one place.
//!
//! # Example
//!
//! ```rust,no_run
//! use herald_runtime::metrics::MetricsServer;
//!
//! let mut server = MetricsServer::new();
//! server.start()?;
//! let body = server.render();
//! # Ok::<(), herald_runtime::metrics::MetricsError>(())
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other crates
pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder whose output is served by the HTTP surface.
#[derive(Default)]
pub struct MetricsServer {
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create an uninstalled recorder.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Describe all metrics and install the global recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a recorder is already installed (e.g., in tests), this logs a
    /// warning and leaves [`MetricsServer::render`] returning `None`.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if the recorder hasn't been installed by this instance.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    // Job Metrics
    describe_counter!("herald_jobs_enqueued_total", "Jobs enqueued, by job name");
    describe_counter!("herald_jobs_completed_total", "Jobs that finished successfully");
    describe_counter!("herald_jobs_failed_total", "Job executions that returned an error, by kind");
    describe_counter!("herald_jobs_retried_total", "Jobs rescheduled after a retryable failure");
    describe_counter!(
        "herald_jobs_dropped_total",
        "Jobs acknowledged without success (malformed, not found, exhausted)"
    );
    describe_histogram!("herald_job_duration_seconds", "Time spent executing a job handler");
    describe_gauge!("herald_dlq_size", "Jobs currently held in the dead letter queue");

    // Poll Metrics
    describe_counter!("herald_poll_cycles_total", "Completed liveness poll cycles");
    describe_gauge!("herald_poll_subjects_online", "Subjects reported online by the last poll");
    describe_counter!("herald_poll_batch_errors_total", "Status API batches that failed");

    // Representation Metrics
    describe_counter!(
        "herald_representations_total",
        "Downstream writes by representation kind and operation"
    );

    // Cache Metrics
    describe_counter!("herald_cache_lookups_total", "Read-through cache lookups by result");
}

/// Job execution metrics recorder.
pub struct JobMetrics;

impl JobMetrics {
    /// Record an enqueue.
    pub fn record_enqueued(job: &str) {
        counter!("herald_jobs_enqueued_total", "job" => job.to_string()).increment(1);
    }

    /// Record a successful execution.
    pub fn record_completed(job: &str, duration: Duration) {
        counter!("herald_jobs_completed_total", "job" => job.to_string()).increment(1);
        histogram!("herald_job_duration_seconds", "job" => job.to_string()).record(duration.as_secs_f64());
    }

    /// Record a failed execution.
    pub fn record_failed(job: &str, kind: &'static str, duration: Duration) {
        counter!("herald_jobs_failed_total", "job" => job.to_string(), "kind" => kind).increment(1);
        histogram!("herald_job_duration_seconds", "job" => job.to_string()).record(duration.as_secs_f64());
    }

    /// Record a reschedule.
    pub fn record_retried(job: &str) {
        counter!("herald_jobs_retried_total", "job" => job.to_string()).increment(1);
    }

    /// Record a job acknowledged without success.
    pub fn record_dropped(job: &str, reason: &'static str) {
        counter!("herald_jobs_dropped_total", "job" => job.to_string(), "reason" => reason).increment(1);
    }
}

/// Dead letter queue metrics recorder.
pub struct DlqMetrics;

impl DlqMetrics {
    /// Record the current queue size.
    #[allow(clippy::cast_precision_loss)]
    pub fn record_size(size: usize) {
        gauge!("herald_dlq_size").set(size as f64);
    }
}

/// Liveness poll metrics recorder.
pub struct PollMetrics;

impl PollMetrics {
    /// Record a completed cycle and how many subjects were online.
    #[allow(clippy::cast_precision_loss)]
    pub fn record_cycle(online: usize) {
        counter!("herald_poll_cycles_total").increment(1);
        gauge!("herald_poll_subjects_online").set(online as f64);
    }

    /// Record a failed status batch.
    pub fn record_batch_error() {
        counter!("herald_poll_batch_errors_total").increment(1);
    }
}

/// Downstream representation metrics recorder.
pub struct RepresentationMetrics;

impl RepresentationMetrics {
    /// Record a write; `kind` is `starboard` or `stream`, `op` is
    /// `create`, `update`, `finalize` or `orphan_deleted`.
    pub fn record(kind: &'static str, op: &'static str) {
        counter!("herald_representations_total", "kind" => kind, "op" => op).increment(1);
    }
}

/// Read-through cache metrics recorder.
pub struct CacheMetrics;

impl CacheMetrics {
    /// Record a cache hit.
    pub fn record_hit() {
        counter!("herald_cache_lookups_total", "result" => "hit").increment(1);
    }

    /// Record a miss served by the loader.
    pub fn record_miss() {
        counter!("herald_cache_lookups_total", "result" => "miss").increment(1);
    }

    /// Record a cache failure that fell back to the loader.
    pub fn record_error() {
        counter!("herald_cache_lookups_total", "result" => "error").increment(1);
    }
}
