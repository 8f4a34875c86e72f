/// Grace allowances and seasonal promotional credits
use crate::db::{credit_repo, ledger_repo};
use crate::error::{AppError, Result};
use crate::models::{CreatorLedger, PromotionalCredit};
use block_core::BillingPolicy;
use chrono::{DateTime, Datelike, Utc};
use sqlx::PgPool;
use uuid::Uuid;

pub struct GrantService {
    pool: PgPool,
    policy: BillingPolicy,
}

impl GrantService {
    pub fn new(pool: PgPool, policy: BillingPolicy) -> Self {
        Self { pool, policy }
    }

    /// Create the creator's ledger at account approval with the one-time
    /// grace allowance already credited. Idempotent: re-approving an existing
    /// creator returns the current ledger unchanged.
    pub async fn approve_creator(
        &self,
        creator_id: Uuid,
        joined_at: Option<DateTime<Utc>>,
    ) -> Result<CreatorLedger> {
        let joined = joined_at.unwrap_or_else(Utc::now);
        let grace_end = self.policy.grace_end(joined);

        let mut tx = self.pool.begin().await?;
        let created = ledger_repo::create_ledger(
            &mut tx,
            creator_id,
            self.policy.grace_grant_blocks,
            grace_end,
        )
        .await?;
        tx.commit().await?;

        match created {
            Some(ledger) => {
                tracing::info!(
                    creator_id = %creator_id,
                    grace_end = %ledger.grace_end,
                    granted_blocks = self.policy.grace_grant_blocks,
                    "creator approved; grace allowance granted"
                );
                Ok(ledger)
            }
            None => ledger_repo::find_ledger(&self.pool, creator_id)
                .await?
                .ok_or_else(|| {
                    AppError::Internal(format!("ledger for creator {} vanished", creator_id))
                }),
        }
    }

    /// Campaign label for the seasonal promotional grants (January and May),
    /// or None outside campaign months.
    pub fn campaign_for(now: DateTime<Utc>) -> Option<String> {
        match now.month() {
            1 => Some(format!("january-{}", now.year())),
            5 => Some(format!("may-{}", now.year())),
            _ => None,
        }
    }

    /// Grant the current campaign credit to one creator. Non-cumulative: a
    /// fresh grant replaces any still-live credit from an earlier campaign.
    /// Returns None when the creator already received this campaign.
    pub async fn grant_campaign_credit(
        &self,
        creator_id: Uuid,
        campaign: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PromotionalCredit>> {
        let expires_at = self.policy.promo_expiry(now);

        let mut tx = self.pool.begin().await?;

        let inserted = credit_repo::insert_campaign_credit(
            &mut tx,
            creator_id,
            self.policy.promo_grant_blocks,
            campaign,
            now,
            expires_at,
        )
        .await?;

        if inserted.is_some() {
            let replaced =
                credit_repo::delete_live_credits_except(&mut tx, creator_id, campaign, now).await?;
            if replaced > 0 {
                tracing::debug!(
                    creator_id = %creator_id,
                    campaign,
                    replaced,
                    "superseded earlier promotional credits"
                );
            }
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// One pass of the campaign granter: during a campaign month, grant the
    /// seasonal credit to every creator that does not have it yet. Returns
    /// the number of grants made.
    pub async fn run_campaign_cycle(&self, now: DateTime<Utc>) -> Result<u64> {
        let Some(campaign) = Self::campaign_for(now) else {
            return Ok(0);
        };

        let mut granted = 0u64;
        for creator_id in ledger_repo::list_creator_ids(&self.pool).await? {
            if self
                .grant_campaign_credit(creator_id, &campaign, now)
                .await?
                .is_some()
            {
                granted += 1;
            }
        }

        if granted > 0 {
            tracing::info!(campaign = %campaign, granted, "seasonal promotional credits granted");
        }
        Ok(granted)
    }

    /// Drop expired, never-consumed credits.
    pub async fn expire_credits(&self, now: DateTime<Utc>) -> Result<u64> {
        let removed = credit_repo::delete_expired(&self.pool, now).await?;
        if removed > 0 {
            tracing::info!(removed, "swept expired promotional credits");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_campaign_months() {
        let jan = Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap();
        let may = Utc.with_ymd_and_hms(2026, 5, 20, 0, 0, 0).unwrap();
        let aug = Utc.with_ymd_and_hms(2026, 8, 6, 0, 0, 0).unwrap();

        assert_eq!(
            GrantService::campaign_for(jan).as_deref(),
            Some("january-2026")
        );
        assert_eq!(GrantService::campaign_for(may).as_deref(), Some("may-2026"));
        assert_eq!(GrantService::campaign_for(aug), None);
    }
}
