//! Billing policy constants and the injectable policy value object

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

/// Size of one storage block (GB)
pub const BLOCK_SIZE_GB: f64 = 7.3;

/// Price of one block in cents
pub const PRICE_PER_BLOCK_CENTS: i64 = 1500;

/// Length of the post-approval grace window in months
pub const GRACE_MONTHS: u32 = 3;

/// Promotional credits expire this many days after grant
pub const PROMO_EXPIRY_DAYS: i64 = 30;

/// One-time allowance credited at creator approval
pub const GRACE_GRANT_BLOCKS: i64 = 2;

/// Blocks granted per seasonal promotional campaign
pub const PROMO_GRANT_BLOCKS: i64 = 1;

/// Pricing and allowance policy.
///
/// Injected everywhere pricing appears so tiers are testable without code
/// changes. Defaults mirror the constants above.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingPolicy {
    pub block_size_gb: f64,
    pub price_per_block_cents: i64,
    pub grace_months: u32,
    pub promo_expiry_days: i64,
    pub grace_grant_blocks: i64,
    pub promo_grant_blocks: i64,
}

impl Default for BillingPolicy {
    fn default() -> Self {
        Self {
            block_size_gb: BLOCK_SIZE_GB,
            price_per_block_cents: PRICE_PER_BLOCK_CENTS,
            grace_months: GRACE_MONTHS,
            promo_expiry_days: PROMO_EXPIRY_DAYS,
            grace_grant_blocks: GRACE_GRANT_BLOCKS,
            promo_grant_blocks: PROMO_GRANT_BLOCKS,
        }
    }
}

impl BillingPolicy {
    /// End of the grace window for a creator approved at `joined_at`
    pub fn grace_end(&self, joined_at: DateTime<Utc>) -> DateTime<Utc> {
        joined_at + Months::new(self.grace_months)
    }

    /// Expiry instant for a promotional credit granted at `granted_at`
    pub fn promo_expiry(&self, granted_at: DateTime<Utc>) -> DateTime<Utc> {
        granted_at + Duration::days(self.promo_expiry_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_grace_end_adds_calendar_months() {
        let policy = BillingPolicy::default();
        let joined = Utc.with_ymd_and_hms(2026, 1, 15, 9, 30, 0).unwrap();
        let end = policy.grace_end(joined);
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 4, 15, 9, 30, 0).unwrap());
    }

    #[test]
    fn test_promo_expiry_is_thirty_days() {
        let policy = BillingPolicy::default();
        let granted = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            policy.promo_expiry(granted),
            Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap()
        );
    }
}
