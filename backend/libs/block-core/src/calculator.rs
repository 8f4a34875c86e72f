//! Size-to-block conversion and cost quoting
//!
//! `estimate_size_gb` is a best-effort heuristic used for pre-upload hints;
//! it is never authoritative. Admission runs on caller-declared sizes and
//! finalize runs on the size reported by the video host.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::ledger::{LedgerSnapshot, PromoCredit};
use crate::policy::BillingPolicy;

/// Rejected content size
#[derive(Debug, Error, PartialEq)]
pub enum SizeError {
    #[error("invalid size: {0} GB")]
    InvalidSize(f64),
}

/// Video resolution tiers with their per-minute size rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "720p")]
    R720p,
    #[serde(rename = "1080p")]
    R1080p,
    #[serde(rename = "4k")]
    R4k,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::R720p => "720p",
            Self::R1080p => "1080p",
            Self::R4k => "4k",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "720p" => Some(Self::R720p),
            "1080p" => Some(Self::R1080p),
            "4k" | "4K" | "2160p" => Some(Self::R4k),
            _ => None,
        }
    }

    /// Heuristic storage rate in GB per minute of footage
    pub fn gb_per_minute(&self) -> f64 {
        match self {
            Self::R720p => 0.0183,
            Self::R1080p => 0.0365,
            Self::R4k => 0.1095,
        }
    }
}

/// Estimate content size from duration and resolution. Unknown resolutions
/// fall back to 1080p.
pub fn estimate_size_gb(duration_minutes: f64, resolution: &str) -> f64 {
    let rate = Resolution::from_str(resolution)
        .unwrap_or(Resolution::R1080p)
        .gb_per_minute();
    duration_minutes * rate
}

/// Blocks required to store `size_gb`, minimum one.
pub fn blocks_needed(policy: &BillingPolicy, size_gb: f64) -> Result<i64, SizeError> {
    if !size_gb.is_finite() || size_gb <= 0.0 {
        return Err(SizeError::InvalidSize(size_gb));
    }
    let blocks = (size_gb / policy.block_size_gb).ceil() as i64;
    Ok(blocks.max(1))
}

/// Price quote for a block count against a ledger snapshot.
///
/// Pure: no credit is consumed here. `applied_credit_ids` tells the caller
/// which credits to consume if the quoted operation commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub blocks_needed: i64,
    pub free_blocks_applied: i64,
    pub chargeable_blocks: i64,
    pub total_price_cents: i64,
    pub applied_credit_ids: Vec<Uuid>,
}

/// Compute the cost of `blocks_needed` blocks.
///
/// The grace-period waiver applies first: an in-grace creator pays nothing.
/// Otherwise unexpired promotional credits are consumed soonest-expiring
/// first, and the remainder is charged at the policy's unit price.
pub fn quote(
    policy: &BillingPolicy,
    blocks_needed: i64,
    snapshot: &LedgerSnapshot,
    credits: &[PromoCredit],
    now: DateTime<Utc>,
) -> Quote {
    let mut free_blocks = 0i64;
    let mut applied_credit_ids = Vec::new();

    if snapshot.in_grace(now) {
        free_blocks = blocks_needed;
    } else {
        let mut usable: Vec<&PromoCredit> =
            credits.iter().filter(|c| c.is_usable(now)).collect();
        usable.sort_by_key(|c| c.expires_at);

        for credit in usable {
            if free_blocks >= blocks_needed {
                break;
            }
            free_blocks += credit.blocks.min(blocks_needed - free_blocks);
            applied_credit_ids.push(credit.id);
        }
    }

    let chargeable = (blocks_needed - free_blocks).max(0);
    Quote {
        blocks_needed,
        free_blocks_applied: free_blocks,
        chargeable_blocks: chargeable,
        total_price_cents: chargeable * policy.price_per_block_cents,
        applied_credit_ids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn policy() -> BillingPolicy {
        BillingPolicy::default()
    }

    fn post_grace_snapshot(now: DateTime<Utc>) -> LedgerSnapshot {
        LedgerSnapshot {
            total_blocks: 10,
            used_blocks: 0,
            reserved_blocks: 0,
            grace_end: now - Duration::days(30),
        }
    }

    #[test]
    fn test_estimate_rates_per_resolution() {
        assert!((estimate_size_gb(10.0, "720p") - 0.183).abs() < 1e-9);
        assert!((estimate_size_gb(10.0, "1080p") - 0.365).abs() < 1e-9);
        assert!((estimate_size_gb(10.0, "4k") - 1.095).abs() < 1e-9);
    }

    #[test]
    fn test_estimate_unknown_resolution_defaults_to_1080p() {
        assert_eq!(estimate_size_gb(10.0, "480i"), estimate_size_gb(10.0, "1080p"));
    }

    #[test]
    fn test_blocks_needed_exact_multiple() {
        // 14.6 / 7.3 = 2.0 exactly
        assert_eq!(blocks_needed(&policy(), 14.6).unwrap(), 2);
    }

    #[test]
    fn test_blocks_needed_rounds_up() {
        assert_eq!(blocks_needed(&policy(), 7.31).unwrap(), 2);
    }

    #[test]
    fn test_blocks_needed_minimum_one() {
        assert_eq!(blocks_needed(&policy(), 0.001).unwrap(), 1);
    }

    #[test]
    fn test_blocks_needed_rejects_bad_sizes() {
        assert!(blocks_needed(&policy(), 0.0).is_err());
        assert!(blocks_needed(&policy(), -1.5).is_err());
        assert!(blocks_needed(&policy(), f64::NAN).is_err());
        assert!(blocks_needed(&policy(), f64::INFINITY).is_err());
    }

    #[test]
    fn test_quote_charges_full_price_post_grace() {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        let q = quote(&policy(), 2, &post_grace_snapshot(now), &[], now);
        assert_eq!(q.free_blocks_applied, 0);
        assert_eq!(q.total_price_cents, 2 * policy().price_per_block_cents);
    }

    #[test]
    fn test_quote_waives_everything_in_grace() {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        let snapshot = LedgerSnapshot {
            grace_end: now + Duration::days(10),
            ..post_grace_snapshot(now)
        };
        let q = quote(&policy(), 3, &snapshot, &[], now);
        assert_eq!(q.free_blocks_applied, 3);
        assert_eq!(q.total_price_cents, 0);
    }

    #[test]
    fn test_quote_in_grace_with_promo_credit_is_free() {
        // creator in grace with an active 1-block promotional credit
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        let snapshot = LedgerSnapshot {
            grace_end: now + Duration::days(5),
            ..post_grace_snapshot(now)
        };
        let credit = PromoCredit {
            id: Uuid::new_v4(),
            blocks: 1,
            granted_at: now - Duration::days(1),
            expires_at: now + Duration::days(29),
        };
        let q = quote(&policy(), 1, &snapshot, &[credit], now);
        assert_eq!(q.free_blocks_applied, 1);
        assert_eq!(q.total_price_cents, 0);
    }

    #[test]
    fn test_quote_consumes_soonest_expiring_credit_first() {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        let snapshot = post_grace_snapshot(now);
        let later = PromoCredit {
            id: Uuid::new_v4(),
            blocks: 1,
            granted_at: now,
            expires_at: now + Duration::days(20),
        };
        let sooner = PromoCredit {
            id: Uuid::new_v4(),
            blocks: 1,
            granted_at: now,
            expires_at: now + Duration::days(3),
        };
        let q = quote(&policy(), 1, &snapshot, &[later.clone(), sooner.clone()], now);
        assert_eq!(q.applied_credit_ids, vec![sooner.id]);
        assert_eq!(q.chargeable_blocks, 0);
    }

    #[test]
    fn test_quote_ignores_expired_credit() {
        // granted 2024-01-01, expires 2024-01-31; quoted 2024-02-01
        let granted = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let snapshot = post_grace_snapshot(now);
        let credit = PromoCredit {
            id: Uuid::new_v4(),
            blocks: 1,
            granted_at: granted,
            expires_at: granted + Duration::days(30),
        };
        let q = quote(&policy(), 1, &snapshot, &[credit], now);
        assert_eq!(q.free_blocks_applied, 0);
        assert_eq!(q.total_price_cents, policy().price_per_block_cents);
        assert!(q.applied_credit_ids.is_empty());
    }

    #[test]
    fn test_quote_partial_credit_coverage() {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        let snapshot = post_grace_snapshot(now);
        let credit = PromoCredit {
            id: Uuid::new_v4(),
            blocks: 1,
            granted_at: now,
            expires_at: now + Duration::days(10),
        };
        let q = quote(&policy(), 3, &snapshot, &[credit], now);
        assert_eq!(q.free_blocks_applied, 1);
        assert_eq!(q.chargeable_blocks, 2);
        assert_eq!(q.total_price_cents, 2 * policy().price_per_block_cents);
    }
}
