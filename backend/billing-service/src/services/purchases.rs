/// Purchase orchestration - checkout sessions and webhook reconciliation
use crate::clients::{CheckoutRequest, PaymentGateway};
use crate::db::{ledger_repo, purchase_repo};
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{BlockPurchase, PurchaseStatus};
use block_core::BillingPolicy;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

pub struct PurchaseService {
    pool: PgPool,
    policy: BillingPolicy,
    gateway: Arc<dyn PaymentGateway>,
    return_url: String,
}

impl PurchaseService {
    pub fn new(
        pool: PgPool,
        policy: BillingPolicy,
        gateway: Arc<dyn PaymentGateway>,
        return_url: String,
    ) -> Self {
        Self {
            pool,
            policy,
            gateway,
            return_url,
        }
    }

    /// Create a pending purchase and request a hosted checkout session.
    ///
    /// A gateway failure marks the purchase failed and surfaces a retryable
    /// error; the ledger is never touched here. Crediting happens only on
    /// webhook confirmation.
    pub async fn create_purchase(
        &self,
        creator_id: Uuid,
        blocks_requested: i64,
    ) -> Result<BlockPurchase> {
        if blocks_requested < 1 {
            return Err(AppError::ValidationError(
                "blocks must be at least 1".to_string(),
            ));
        }

        ledger_repo::find_ledger(&self.pool, creator_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("no ledger for creator {}", creator_id)))?;

        let purchase = purchase_repo::create_purchase(
            &self.pool,
            creator_id,
            blocks_requested,
            self.policy.price_per_block_cents,
        )
        .await?;

        let request = CheckoutRequest {
            purchase_id: purchase.id,
            creator_id,
            amount_cents: purchase.total_price_cents,
            description: format!("{} Solstream storage block(s)", blocks_requested),
            idempotency_key: purchase.idempotency_key,
            return_url: self.return_url.clone(),
        };

        // Gateway call happens with no database locks held.
        match self.gateway.create_checkout_session(&request).await {
            Ok(session) => {
                let purchase =
                    purchase_repo::set_checkout_url(&self.pool, purchase.id, &session.checkout_url)
                        .await?;

                tracing::info!(
                    purchase_id = %purchase.id,
                    creator_id = %creator_id,
                    blocks = blocks_requested,
                    total_price_cents = purchase.total_price_cents,
                    "checkout session created"
                );

                Ok(purchase)
            }
            Err(err) => {
                let mut conn = self.pool.acquire().await?;
                purchase_repo::mark_status(&mut conn, purchase.id, PurchaseStatus::Failed).await?;

                tracing::warn!(
                    purchase_id = %purchase.id,
                    creator_id = %creator_id,
                    error = %err,
                    "checkout session creation failed"
                );

                Err(AppError::PaymentGatewayError(err.to_string()))
            }
        }
    }

    /// Apply a gateway status delivery. Idempotent: purchases already in a
    /// terminal state are left untouched whatever the incoming status says,
    /// and the first `approved` delivery credits the ledger atomically with
    /// the status transition.
    pub async fn confirm_purchase(
        &self,
        reference: Uuid,
        gateway_status: &str,
    ) -> Result<BlockPurchase> {
        let purchase = purchase_repo::resolve_reference(&self.pool, reference)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("no purchase for reference {}", reference)))?;

        let mut tx = self.pool.begin().await?;

        let locked = purchase_repo::lock_purchase(&mut tx, purchase.id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("purchase {} not found", purchase.id)))?;

        if locked.get_status().is_terminal() {
            metrics::billing::record_webhook("replay");
            tracing::debug!(
                purchase_id = %locked.id,
                status = %locked.status,
                incoming = gateway_status,
                "webhook replay ignored"
            );
            return Ok(locked);
        }

        match gateway_status {
            "approved" | "paid" => {
                let ledger = ledger_repo::lock_ledger(&mut tx, locked.creator_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::Internal(format!(
                            "purchase {} references creator {} without a ledger",
                            locked.id, locked.creator_id
                        ))
                    })?;

                let mut snapshot = ledger.snapshot();
                snapshot.credit(locked.blocks_requested)?;
                ledger_repo::store_snapshot(&mut tx, locked.creator_id, &snapshot).await?;
                purchase_repo::mark_status(&mut tx, locked.id, PurchaseStatus::Paid).await?;
                tx.commit().await?;

                metrics::billing::record_webhook("confirmed");
                tracing::info!(
                    purchase_id = %locked.id,
                    creator_id = %locked.creator_id,
                    blocks = locked.blocks_requested,
                    "purchase paid; ledger credited"
                );
            }
            "rejected" | "declined" | "failed" => {
                purchase_repo::mark_status(&mut tx, locked.id, PurchaseStatus::Failed).await?;
                tx.commit().await?;
                metrics::billing::record_webhook("failed");
            }
            "expired" => {
                purchase_repo::mark_status(&mut tx, locked.id, PurchaseStatus::Expired).await?;
                tx.commit().await?;
                metrics::billing::record_webhook("expired");
            }
            other => {
                // Unknown interim status (e.g. "in_process"); acknowledge and
                // wait for a terminal delivery.
                metrics::billing::record_webhook("ignored");
                tracing::debug!(
                    purchase_id = %locked.id,
                    status = other,
                    "ignoring non-terminal gateway status"
                );
                return Ok(locked);
            }
        }

        purchase_repo::find_purchase(&self.pool, purchase.id)
            .await?
            .ok_or_else(|| AppError::Internal("purchase vanished after confirm".to_string()))
    }

    pub async fn get_purchase(&self, purchase_id: Uuid) -> Result<Option<BlockPurchase>> {
        Ok(purchase_repo::find_purchase(&self.pool, purchase_id).await?)
    }

    /// Maintenance sweep: expire pending purchases older than the TTL.
    pub async fn expire_purchases(&self, now: DateTime<Utc>, ttl_hours: i64) -> Result<u64> {
        let cutoff = now - Duration::hours(ttl_hours);
        let expired = purchase_repo::expire_pending_before(&self.pool, cutoff).await?;
        if expired > 0 {
            tracing::info!(expired, "expired stale pending purchases");
        }
        Ok(expired)
    }
}
