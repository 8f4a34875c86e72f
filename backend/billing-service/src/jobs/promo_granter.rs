//! Promotional campaign granter background job
//!
//! During campaign months (January, May) every creator receives the seasonal
//! credit once; the same cycle also sweeps expired credits. Both operations
//! are idempotent, so the cycle can run as often as the interval fires.

use crate::config::JobsConfig;
use crate::error::Result;
use crate::metrics::jobs as metrics;
use crate::services::GrantService;
use block_core::BillingPolicy;
use chrono::Utc;
use sqlx::PgPool;
use std::time::{Duration, Instant};
use tokio::time::sleep;

pub struct PromoGranter {
    grants: GrantService,
    interval: Duration,
}

impl PromoGranter {
    pub fn new(pool: PgPool, policy: BillingPolicy, jobs: &JobsConfig) -> Self {
        Self {
            grants: GrantService::new(pool, policy),
            interval: Duration::from_secs(jobs.promo_interval_secs),
        }
    }

    pub async fn run(self) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "starting promo granter"
        );

        loop {
            sleep(self.interval).await;

            let cycle_start = Instant::now();
            match self.run_cycle().await {
                Ok((granted, swept)) => {
                    metrics::record_run("promo_granter", "success");
                    metrics::record_duration("promo_granter", cycle_start.elapsed());
                    metrics::record_items("promo_granter", "granted", granted);
                    metrics::record_items("promo_granter", "swept", swept);
                }
                Err(e) => {
                    metrics::record_run("promo_granter", "error");
                    metrics::record_duration("promo_granter", cycle_start.elapsed());
                    tracing::error!(error = %e, "promo granter cycle failed");
                }
            }
        }
    }

    /// One granter pass: campaign grants plus the expired-credit sweep.
    pub async fn run_cycle(&self) -> Result<(u64, u64)> {
        let now = Utc::now();
        let granted = self.grants.run_campaign_cycle(now).await?;
        let swept = self.grants.expire_credits(now).await?;
        Ok((granted, swept))
    }
}
