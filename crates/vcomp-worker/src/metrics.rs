//! Prometheus metrics for the composer.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;

/// Install the Prometheus recorder with an HTTP scrape listener on `addr`.
pub fn install_prometheus(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()
}

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_COMPLETED_TOTAL: &str = "vcomp_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "vcomp_jobs_failed_total";
    pub const JOB_DURATION_SECONDS: &str = "vcomp_job_duration_seconds";

    pub const CLIPS_PROCESSED_TOTAL: &str = "vcomp_clips_processed_total";
    pub const STAGE_DURATION_SECONDS: &str = "vcomp_stage_duration_seconds";
    pub const SILENCE_INJECTED_TOTAL: &str = "vcomp_silence_injected_total";
    pub const STANDARDIZE_SKIPPED_TOTAL: &str = "vcomp_standardize_skipped_total";
    pub const ALIGNMENT_ACTIONS_TOTAL: &str = "vcomp_alignment_actions_total";
    pub const CLEANUP_FAILURES_TOTAL: &str = "vcomp_cleanup_failures_total";
}

pub fn record_job_completed(duration_secs: f64) {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
    histogram!(names::JOB_DURATION_SECONDS).record(duration_secs);
}

pub fn record_job_failed(stage: &str) {
    let labels = [("stage", stage.to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

pub fn record_clip_processed() {
    counter!(names::CLIPS_PROCESSED_TOTAL).increment(1);
}

pub fn record_stage_duration(stage: &str, duration_secs: f64) {
    let labels = [("stage", stage.to_string())];
    histogram!(names::STAGE_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_silence_injected() {
    counter!(names::SILENCE_INJECTED_TOTAL).increment(1);
}

pub fn record_standardize_skipped() {
    counter!(names::STANDARDIZE_SKIPPED_TOTAL).increment(1);
}

pub fn record_alignment_action(action: &str) {
    let labels = [("action", action.to_string())];
    counter!(names::ALIGNMENT_ACTIONS_TOTAL, &labels).increment(1);
}

pub fn record_cleanup_failure() {
    counter!(names::CLEANUP_FAILURES_TOTAL).increment(1);
}
