/// Admission control - gates uploads against the creator's block ledger
///
/// Every mutating path runs one short transaction: lock the creator's ledger
/// row, apply block-core arithmetic, write back, update the intent. No
/// network I/O happens while the row lock is held.
use crate::db::{credit_repo, intent_repo, ledger_repo};
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{IntentState, PromotionalCredit, UploadIntent};
use block_core::{self, BillingPolicy, LedgerError, LedgerSnapshot, Quote};
use chrono::Utc;
use rand::Rng;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

/// Attempts against a contended ledger row before giving up
const LEDGER_RETRY_ATTEMPTS: u32 = 3;
const LEDGER_RETRY_BASE_BACKOFF_MS: u64 = 25;

/// Outcome of a read-only admission check
#[derive(Debug, Clone, serde::Serialize)]
pub struct AdmissionDecision {
    pub can_upload: bool,
    pub blocks_needed: i64,
    pub missing_blocks: i64,
    pub quote: Quote,
    pub reason: Option<String>,
}

pub struct AdmissionService {
    pool: PgPool,
    policy: BillingPolicy,
}

impl AdmissionService {
    pub fn new(pool: PgPool, policy: BillingPolicy) -> Self {
        Self { pool, policy }
    }

    /// Read-only admission check. Works off an unlocked snapshot; the answer
    /// can go stale and is re-validated when the reservation is taken.
    pub async fn check_upload(&self, creator_id: Uuid, size_gb: f64) -> Result<AdmissionDecision> {
        let blocks_needed = block_core::blocks_needed(&self.policy, size_gb)?;

        let ledger = ledger_repo::find_ledger(&self.pool, creator_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("no ledger for creator {}", creator_id)))?;

        let now = Utc::now();
        let credits = credit_repo::active_credits(&self.pool, creator_id, now).await?;
        let promo: Vec<_> = credits.iter().map(Into::into).collect();

        let quote = block_core::quote(&self.policy, blocks_needed, &ledger.snapshot(), &promo, now);

        let missing_blocks = (blocks_needed - ledger.available_blocks()).max(0);
        let can_upload = missing_blocks == 0;
        if !can_upload {
            metrics::billing::record_admission("denied");
        } else {
            metrics::billing::record_admission("allowed");
        }

        Ok(AdmissionDecision {
            can_upload,
            blocks_needed,
            missing_blocks,
            quote,
            reason: (!can_upload).then(|| {
                format!(
                    "{} more block(s) required; purchase them to continue",
                    missing_blocks
                )
            }),
        })
    }

    /// Reserve blocks for an intent. Atomic per creator; concurrent calls
    /// serialize on the ledger row lock and the loser of a capacity race gets
    /// `InsufficientBlocks` with no partial mutation.
    pub async fn reserve_for_intent(
        &self,
        intent_id: Uuid,
        blocks_needed: i64,
    ) -> Result<UploadIntent> {
        self.with_ledger_retry(move || self.try_reserve(intent_id, blocks_needed))
            .await
    }

    async fn try_reserve(&self, intent_id: Uuid, blocks_needed: i64) -> Result<UploadIntent> {
        if blocks_needed < 1 {
            return Err(AppError::ValidationError(
                "blocks_needed must be at least 1".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let intent = intent_repo::lock_intent(&mut tx, intent_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("intent {} not found", intent_id)))?;

        match intent.get_state() {
            IntentState::Estimated => {}
            // reservation already taken; report it rather than double-reserve
            IntentState::Reserved | IntentState::Uploading => return Ok(intent),
            other => {
                return Err(AppError::Conflict(format!(
                    "cannot reserve from state {}",
                    other.as_str()
                )))
            }
        }

        let ledger = ledger_repo::lock_ledger(&mut tx, intent.creator_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("no ledger for creator {}", intent.creator_id))
            })?;

        let now = Utc::now();
        let mut snapshot = ledger.snapshot();

        // Materialize promotional capacity before admitting, cheapest-to-lose
        // credits first.
        let credits = credit_repo::lock_active_credits(&mut tx, intent.creator_id, now).await?;
        let consumed = cover_with_credits(&mut snapshot, &credits, blocks_needed);

        if let Err(err) = snapshot.reserve(blocks_needed) {
            drop(tx);
            if matches!(err, LedgerError::InsufficientBlocks { .. }) {
                metrics::billing::record_admission("denied");
            }
            return Err(err.into());
        }

        credit_repo::consume_credits(&mut tx, &consumed, now).await?;
        ledger_repo::store_snapshot(&mut tx, intent.creator_id, &snapshot).await?;
        intent_repo::mark_reserved(&mut tx, intent.id, blocks_needed).await?;

        tx.commit().await?;

        metrics::billing::record_reservation("reserve", blocks_needed);
        tracing::info!(
            intent_id = %intent.id,
            creator_id = %intent.creator_id,
            blocks = blocks_needed,
            promo_credits_consumed = consumed.len(),
            "blocks reserved for upload intent"
        );

        intent_repo::find_intent(&self.pool, intent_id)
            .await?
            .ok_or_else(|| AppError::Internal("intent vanished after reserve".to_string()))
    }

    /// Release an intent's hold. Callable defensively from any failure path:
    /// already-released intents are a no-op, not an error.
    pub async fn release_for_intent(
        &self,
        intent_id: Uuid,
        terminal: IntentState,
    ) -> Result<UploadIntent> {
        debug_assert!(matches!(
            terminal,
            IntentState::Failed | IntentState::Cancelled
        ));

        let mut tx = self.pool.begin().await?;

        let intent = intent_repo::lock_intent(&mut tx, intent_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("intent {} not found", intent_id)))?;

        let state = intent.get_state();
        if state.is_terminal() {
            return Ok(intent);
        }

        if state.holds_reservation() && intent.reserved_blocks > 0 {
            let ledger = ledger_repo::lock_ledger(&mut tx, intent.creator_id)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("no ledger for creator {}", intent.creator_id))
                })?;

            let mut snapshot = ledger.snapshot();
            snapshot.release(intent.reserved_blocks);
            ledger_repo::store_snapshot(&mut tx, intent.creator_id, &snapshot).await?;
            metrics::billing::record_reservation("release", intent.reserved_blocks);
        }

        intent_repo::mark_state(&mut tx, intent.id, terminal).await?;
        tx.commit().await?;

        tracing::info!(
            intent_id = %intent.id,
            creator_id = %intent.creator_id,
            state = terminal.as_str(),
            released_blocks = intent.reserved_blocks,
            "upload intent released"
        );

        intent_repo::find_intent(&self.pool, intent_id)
            .await?
            .ok_or_else(|| AppError::Internal("intent vanished after release".to_string()))
    }

    /// Finalize an intent against the authoritative size. When the actual
    /// size exceeds the reservation and the difference cannot be covered, the
    /// intent parks in `pending_block_shortfall` with its hold intact; bytes
    /// are already at the host and completion waits for a purchase plus a
    /// finalize retry.
    pub async fn finalize_for_intent(
        &self,
        intent_id: Uuid,
        actual_size_gb: f64,
    ) -> Result<UploadIntent> {
        self.with_ledger_retry(move || self.try_finalize(intent_id, actual_size_gb))
            .await
    }

    async fn try_finalize(&self, intent_id: Uuid, actual_size_gb: f64) -> Result<UploadIntent> {
        let actual_blocks = block_core::blocks_needed(&self.policy, actual_size_gb)?;

        let mut tx = self.pool.begin().await?;

        let intent = intent_repo::lock_intent(&mut tx, intent_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("intent {} not found", intent_id)))?;

        match intent.get_state() {
            IntentState::Reserved
            | IntentState::Uploading
            | IntentState::PendingBlockShortfall => {}
            IntentState::Completed => return Ok(intent),
            other => {
                return Err(AppError::Conflict(format!(
                    "cannot finalize from state {}",
                    other.as_str()
                )))
            }
        }

        let ledger = ledger_repo::lock_ledger(&mut tx, intent.creator_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("no ledger for creator {}", intent.creator_id))
            })?;

        let now = Utc::now();
        let mut snapshot = ledger.snapshot();
        let mut reserved = intent.reserved_blocks;
        let mut consumed = Vec::new();

        if actual_blocks > reserved {
            let extra = actual_blocks - reserved;
            let credits = credit_repo::lock_active_credits(&mut tx, intent.creator_id, now).await?;
            consumed = cover_with_credits(&mut snapshot, &credits, extra);

            if let Err(err) = snapshot.reserve(extra) {
                // Park the shortfall instead of silently exceeding quota.
                intent_repo::mark_state(&mut tx, intent.id, IntentState::PendingBlockShortfall)
                    .await?;
                tx.commit().await?;

                metrics::billing::record_shortfall();
                tracing::warn!(
                    intent_id = %intent.id,
                    creator_id = %intent.creator_id,
                    reserved,
                    actual_blocks,
                    error = %err,
                    "finalize shortfall; intent parked until blocks are purchased"
                );

                return intent_repo::find_intent(&self.pool, intent_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::Internal("intent vanished after shortfall".to_string())
                    });
            }
            reserved += extra;
        }

        snapshot.commit_usage(reserved, actual_blocks)?;

        credit_repo::consume_credits(&mut tx, &consumed, now).await?;
        ledger_repo::store_snapshot(&mut tx, intent.creator_id, &snapshot).await?;
        intent_repo::mark_completed(&mut tx, intent.id, actual_size_gb, actual_blocks).await?;

        tx.commit().await?;

        metrics::billing::record_reservation("commit", actual_blocks);
        tracing::info!(
            intent_id = %intent.id,
            creator_id = %intent.creator_id,
            actual_size_gb,
            actual_blocks,
            "upload intent finalized"
        );

        intent_repo::find_intent(&self.pool, intent_id)
            .await?
            .ok_or_else(|| AppError::Internal("intent vanished after finalize".to_string()))
    }

    /// Bounded retry for transactions that can lose a serialization race on
    /// the ledger row. Exhaustion surfaces as `ConcurrentModification`.
    async fn with_ledger_retry<F, Fut>(&self, mut op: F) -> Result<UploadIntent>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<UploadIntent>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Err(AppError::DatabaseError(msg)) if is_transient_conflict(&msg) => {
                    attempt += 1;
                    if attempt >= LEDGER_RETRY_ATTEMPTS {
                        return Err(AppError::ConcurrentModification(msg));
                    }
                    let jitter = rand::thread_rng().gen_range(0..LEDGER_RETRY_BASE_BACKOFF_MS);
                    let backoff =
                        LEDGER_RETRY_BASE_BACKOFF_MS * 2u64.pow(attempt - 1) + jitter;
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
                other => return other,
            }
        }
    }
}

/// Consume promotional credits (soonest-expiring first, already ordered by
/// the repository) until the snapshot can cover `blocks_needed`. Returns the
/// ids to mark consumed if the surrounding transaction commits.
fn cover_with_credits(
    snapshot: &mut LedgerSnapshot,
    credits: &[PromotionalCredit],
    blocks_needed: i64,
) -> Vec<Uuid> {
    let mut consumed = Vec::new();
    for credit in credits {
        if snapshot.available_blocks() >= blocks_needed {
            break;
        }
        if snapshot.credit(credit.blocks).is_ok() {
            consumed.push(credit.id);
        }
    }
    consumed
}

/// Postgres serialization_failure / deadlock_detected, surfaced through the
/// stringly sqlx error conversion.
fn is_transient_conflict(msg: &str) -> bool {
    msg.contains("40001") || msg.contains("40P01") || msg.contains("deadlock")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn snapshot(total: i64, used: i64, reserved: i64) -> LedgerSnapshot {
        LedgerSnapshot {
            total_blocks: total,
            used_blocks: used,
            reserved_blocks: reserved,
            grace_end: Utc::now() - ChronoDuration::days(1),
        }
    }

    fn credit(blocks: i64) -> PromotionalCredit {
        let now = Utc::now();
        PromotionalCredit {
            id: Uuid::new_v4(),
            creator_id: Uuid::new_v4(),
            blocks,
            campaign: "january-2026".to_string(),
            granted_at: now,
            expires_at: now + ChronoDuration::days(30),
            consumed_at: None,
        }
    }

    #[test]
    fn test_cover_with_credits_stops_once_covered() {
        let mut snap = snapshot(1, 0, 0);
        let credits = vec![credit(1), credit(1), credit(1)];
        let consumed = cover_with_credits(&mut snap, &credits, 2);
        assert_eq!(consumed.len(), 1);
        assert_eq!(snap.available_blocks(), 2);
    }

    #[test]
    fn test_cover_with_credits_no_credits_needed() {
        let mut snap = snapshot(5, 0, 0);
        let consumed = cover_with_credits(&mut snap, &[credit(1)], 3);
        assert!(consumed.is_empty());
        assert_eq!(snap.total_blocks, 5);
    }

    #[test]
    fn test_cover_with_credits_exhausts_and_still_short() {
        let mut snap = snapshot(0, 0, 0);
        let consumed = cover_with_credits(&mut snap, &[credit(1)], 3);
        assert_eq!(consumed.len(), 1);
        assert_eq!(snap.available_blocks(), 1);
        assert!(snap.reserve(3).is_err());
    }

    #[test]
    fn test_transient_conflict_detection() {
        assert!(is_transient_conflict("error code 40001: serialization"));
        assert!(is_transient_conflict("deadlock detected"));
        assert!(!is_transient_conflict("unique constraint violation"));
    }
}
