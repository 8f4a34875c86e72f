//! Reservation reaper background job
//!
//! Uploads that abort without a callback (client crash, disconnect) leave
//! their intent in reserved/uploading with capacity held. The reaper releases
//! any such intent that has not progressed within the stale timeout, and
//! cancels estimated intents that never reserved.

use crate::config::JobsConfig;
use crate::error::Result;
use crate::metrics::jobs as metrics;
use crate::models::IntentState;
use crate::services::AdmissionService;
use crate::db::intent_repo;
use block_core::BillingPolicy;
use chrono::{Duration as ChronoDuration, Utc};
use sqlx::PgPool;
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Stale intents processed per cycle
const BATCH_SIZE: i64 = 100;

pub struct ReservationReaper {
    pool: PgPool,
    admission: AdmissionService,
    stale_after_minutes: i64,
    interval: Duration,
}

impl ReservationReaper {
    pub fn new(pool: PgPool, policy: BillingPolicy, jobs: &JobsConfig) -> Self {
        let admission = AdmissionService::new(pool.clone(), policy);
        Self {
            pool,
            admission,
            stale_after_minutes: jobs.stale_reservation_minutes,
            interval: Duration::from_secs(jobs.reaper_interval_secs),
        }
    }

    pub async fn run(self) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            stale_after_minutes = self.stale_after_minutes,
            "starting reservation reaper"
        );

        loop {
            sleep(self.interval).await;

            let cycle_start = Instant::now();
            match self.run_cycle().await {
                Ok(released) => {
                    metrics::record_run("reservation_reaper", "success");
                    metrics::record_duration("reservation_reaper", cycle_start.elapsed());
                    if released > 0 {
                        tracing::info!(released, "reaper cycle released stale reservations");
                    }
                }
                Err(e) => {
                    metrics::record_run("reservation_reaper", "error");
                    metrics::record_duration("reservation_reaper", cycle_start.elapsed());
                    tracing::error!(error = %e, "reservation reaper cycle failed");
                }
            }
        }
    }

    /// One reaper pass. Returns the number of reservations released.
    pub async fn run_cycle(&self) -> Result<u64> {
        let cutoff = Utc::now() - ChronoDuration::minutes(self.stale_after_minutes);

        let stale = intent_repo::find_stale_holding(&self.pool, cutoff, BATCH_SIZE).await?;
        let mut released = 0u64;

        for intent in stale {
            match self
                .admission
                .release_for_intent(intent.id, IntentState::Failed)
                .await
            {
                Ok(_) => {
                    released += 1;
                    tracing::warn!(
                        intent_id = %intent.id,
                        creator_id = %intent.creator_id,
                        blocks = intent.reserved_blocks,
                        state = %intent.state,
                        "reaped stale reservation"
                    );
                }
                Err(e) => {
                    // Skip and retry next cycle; another path may have just
                    // finalized it.
                    tracing::warn!(intent_id = %intent.id, error = %e, "failed to reap intent");
                }
            }
        }

        let cancelled = intent_repo::cancel_stale_estimated(&self.pool, cutoff).await?;

        metrics::record_items("reservation_reaper", "released", released);
        metrics::record_items("reservation_reaper", "cancelled_estimated", cancelled);

        Ok(released)
    }
}
