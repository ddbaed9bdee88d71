//! Prometheus metrics for queue workers

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::time::Duration;
use tracing::info;

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Initialize Prometheus metrics
///
/// Call this once at startup. Subsequent calls are no-ops.
pub fn init_metrics() {
    let _ = PROMETHEUS_HANDLE.get_or_init(|| {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("Failed to install Prometheus recorder");
        info!("Prometheus metrics initialized");
        handle
    });
}

/// Get the Prometheus handle for rendering metrics
pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

/// Render metrics in Prometheus format
pub fn render_metrics() -> String {
    prometheus_handle().map(|h| h.render()).unwrap_or_default()
}

/// Outcome label for processed jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Success,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
        }
    }
}

/// Record a job processing outcome
pub fn record_job_processed(topic: &str, status: JobStatus) {
    counter!(
        "job_queue_jobs_processed_total",
        "topic" => topic.to_string(),
        "status" => status.as_str()
    )
    .increment(1);
}

/// Record how long a job took to process
pub fn record_job_duration(topic: &str, duration: Duration) {
    histogram!(
        "job_queue_job_duration_seconds",
        "topic" => topic.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a retry being scheduled
pub fn record_retry(topic: &str) {
    counter!(
        "job_queue_job_retries_total",
        "topic" => topic.to_string()
    )
    .increment(1);
}

/// Record the size of a leased batch
pub fn record_batch_size(topic: &str, size: usize) {
    histogram!(
        "job_queue_batch_size",
        "topic" => topic.to_string()
    )
    .record(size as f64);
}

/// Track currently-processing jobs
pub fn set_in_flight_jobs(topic: &str, count: f64) {
    gauge!(
        "job_queue_in_flight_jobs",
        "topic" => topic.to_string()
    )
    .set(count);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_labels() {
        assert_eq!(JobStatus::Success.as_str(), "success");
        assert_eq!(JobStatus::Failed.as_str(), "failed");
    }

    #[test]
    fn test_render_without_init_is_empty() {
        // Recording before init must not panic, and rendering without a
        // handle yields an empty string rather than an error.
        record_job_processed("test", JobStatus::Success);
        let _ = render_metrics();
    }
}
