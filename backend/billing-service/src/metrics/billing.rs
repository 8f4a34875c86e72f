//! Prometheus metrics for the admission and purchase paths

use once_cell::sync::Lazy;
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};

/// Admission checks and reservation attempts by outcome (allowed/denied)
static ADMISSIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "billing_admissions_total",
        "Admission decisions segmented by outcome",
        &["outcome"]
    )
    .expect("failed to register billing_admissions_total")
});

/// Blocks moved through the ledger by action (reserve/release/commit)
static RESERVED_BLOCKS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "billing_ledger_blocks_total",
        "Blocks moved through ledger operations segmented by action",
        &["action"]
    )
    .expect("failed to register billing_ledger_blocks_total")
});

/// Uploads parked in pending_block_shortfall at finalize
static SHORTFALLS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "billing_finalize_shortfalls_total",
        "Finalize attempts parked for lack of blocks"
    )
    .expect("failed to register billing_finalize_shortfalls_total")
});

/// Payment webhook deliveries by outcome (confirmed/failed/expired/replay/ignored)
static WEBHOOKS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "billing_payment_webhooks_total",
        "Payment webhook deliveries segmented by outcome",
        &["outcome"]
    )
    .expect("failed to register billing_payment_webhooks_total")
});

pub fn record_admission(outcome: &str) {
    ADMISSIONS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_reservation(action: &str, blocks: i64) {
    RESERVED_BLOCKS_TOTAL
        .with_label_values(&[action])
        .inc_by(blocks.max(0) as u64);
}

pub fn record_shortfall() {
    SHORTFALLS_TOTAL.inc();
}

pub fn record_webhook(outcome: &str) {
    WEBHOOKS_TOTAL.with_label_values(&[outcome]).inc();
}
