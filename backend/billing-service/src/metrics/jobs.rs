//! Prometheus metrics for background jobs

use once_cell::sync::Lazy;
use prometheus::{register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec};
use std::time::Duration;

/// Job cycles run, by job and status (success/error)
static JOB_RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "billing_job_runs_total",
        "Background job cycles segmented by job and status",
        &["job", "status"]
    )
    .expect("failed to register billing_job_runs_total")
});

/// Job cycle duration by job
static JOB_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "billing_job_duration_seconds",
        "Background job cycle duration",
        &["job"],
        vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0]
    )
    .expect("failed to register billing_job_duration_seconds")
});

/// Items handled per job cycle (reaped intents, expired purchases, grants)
static JOB_ITEMS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "billing_job_items_total",
        "Items processed by background jobs",
        &["job", "item"]
    )
    .expect("failed to register billing_job_items_total")
});

pub fn record_run(job: &str, status: &str) {
    JOB_RUNS_TOTAL.with_label_values(&[job, status]).inc();
}

pub fn record_duration(job: &str, duration: Duration) {
    JOB_DURATION_SECONDS
        .with_label_values(&[job])
        .observe(duration.as_secs_f64());
}

pub fn record_items(job: &str, item: &str, count: u64) {
    JOB_ITEMS_TOTAL.with_label_values(&[job, item]).inc_by(count);
}
