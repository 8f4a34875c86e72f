//! Purchase expirer background job
//!
//! Pending purchases whose checkout was abandoned stay pending forever
//! without this sweep. Expiry never touches the ledger; nothing was credited
//! for an unpaid purchase.

use crate::config::JobsConfig;
use crate::db::purchase_repo;
use crate::error::Result;
use crate::metrics::jobs as metrics;
use chrono::{Duration as ChronoDuration, Utc};
use sqlx::PgPool;
use std::time::{Duration, Instant};
use tokio::time::sleep;

pub struct PurchaseExpirer {
    pool: PgPool,
    ttl_hours: i64,
    interval: Duration,
}

impl PurchaseExpirer {
    pub fn new(pool: PgPool, jobs: &JobsConfig) -> Self {
        Self {
            pool,
            ttl_hours: jobs.purchase_ttl_hours,
            interval: Duration::from_secs(jobs.expirer_interval_secs),
        }
    }

    pub async fn run(self) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            ttl_hours = self.ttl_hours,
            "starting purchase expirer"
        );

        loop {
            sleep(self.interval).await;

            let cycle_start = Instant::now();
            match self.run_cycle().await {
                Ok(expired) => {
                    metrics::record_run("purchase_expirer", "success");
                    metrics::record_duration("purchase_expirer", cycle_start.elapsed());
                    metrics::record_items("purchase_expirer", "expired", expired);
                }
                Err(e) => {
                    metrics::record_run("purchase_expirer", "error");
                    metrics::record_duration("purchase_expirer", cycle_start.elapsed());
                    tracing::error!(error = %e, "purchase expirer cycle failed");
                }
            }
        }
    }

    /// One expirer pass. Returns the number of purchases expired.
    pub async fn run_cycle(&self) -> Result<u64> {
        let cutoff = Utc::now() - ChronoDuration::hours(self.ttl_hours);
        let expired = purchase_repo::expire_pending_before(&self.pool, cutoff).await?;
        if expired > 0 {
            tracing::info!(expired, "expired abandoned pending purchases");
        }
        Ok(expired)
    }
}
