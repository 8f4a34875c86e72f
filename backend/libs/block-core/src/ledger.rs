//! Block ledger arithmetic
//!
//! A creator's ledger tracks capacity in whole blocks. All mutation goes
//! through the operations here so the invariant
//! `available = total - used - reserved >= 0` holds after every step.
//! The billing-service loads a snapshot under a row lock, applies one of
//! these operations, and writes the result back in the same transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by ledger operations. All leave the snapshot unchanged.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Reservation requested without enough available capacity
    #[error("insufficient blocks: requested {requested}, available {available}")]
    InsufficientBlocks { requested: i64, available: i64 },

    /// Actual usage at finalize exceeds what was reserved
    #[error("finalize shortfall: actual {actual} blocks exceed reserved {reserved}")]
    ShortfallOnFinalize { reserved: i64, actual: i64 },

    /// A negative block count reached a ledger operation
    #[error("negative block count: {0}")]
    NegativeBlocks(i64),
}

/// Point-in-time view of one creator's block capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub total_blocks: i64,
    pub used_blocks: i64,
    pub reserved_blocks: i64,
    /// End of the creator's fee-waiver window
    pub grace_end: DateTime<Utc>,
}

impl LedgerSnapshot {
    pub fn available_blocks(&self) -> i64 {
        self.total_blocks - self.used_blocks - self.reserved_blocks
    }

    pub fn in_grace(&self, now: DateTime<Utc>) -> bool {
        now < self.grace_end
    }

    /// Add purchased or granted capacity.
    pub fn credit(&mut self, blocks: i64) -> Result<(), LedgerError> {
        if blocks < 0 {
            return Err(LedgerError::NegativeBlocks(blocks));
        }
        self.total_blocks += blocks;
        Ok(())
    }

    /// Place a provisional hold for an in-flight upload.
    pub fn reserve(&mut self, blocks: i64) -> Result<(), LedgerError> {
        if blocks < 0 {
            return Err(LedgerError::NegativeBlocks(blocks));
        }
        let available = self.available_blocks();
        if available < blocks {
            return Err(LedgerError::InsufficientBlocks {
                requested: blocks,
                available,
            });
        }
        self.reserved_blocks += blocks;
        Ok(())
    }

    /// Return a hold to available capacity. Floored at zero so a defensive
    /// double-release is harmless; intent state tracking prevents it from
    /// freeing someone else's hold.
    pub fn release(&mut self, blocks: i64) {
        self.reserved_blocks = (self.reserved_blocks - blocks).max(0);
    }

    /// Convert a hold into permanent usage. The surplus `reserved - actual`
    /// goes back to available. Fails without mutation when `actual` exceeds
    /// the hold; the caller must reserve the difference first.
    pub fn commit_usage(&mut self, reserved: i64, actual: i64) -> Result<(), LedgerError> {
        if reserved < 0 || actual < 0 {
            return Err(LedgerError::NegativeBlocks(reserved.min(actual)));
        }
        if actual > reserved {
            return Err(LedgerError::ShortfallOnFinalize { reserved, actual });
        }
        self.used_blocks += actual;
        self.reserved_blocks = (self.reserved_blocks - reserved).max(0);
        Ok(())
    }
}

/// An unexpired promotional credit as seen by the quoting path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromoCredit {
    pub id: Uuid,
    pub blocks: i64,
    pub granted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PromoCredit {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at && self.blocks > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn snapshot(total: i64, used: i64, reserved: i64) -> LedgerSnapshot {
        LedgerSnapshot {
            total_blocks: total,
            used_blocks: used,
            reserved_blocks: reserved,
            grace_end: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_available_is_total_minus_used_minus_reserved() {
        let ledger = snapshot(10, 3, 2);
        assert_eq!(ledger.available_blocks(), 5);
    }

    #[test]
    fn test_reserve_fails_without_capacity() {
        let mut ledger = snapshot(2, 1, 0);
        let err = ledger.reserve(2).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientBlocks {
                requested: 2,
                available: 1
            }
        );
        // state unchanged on failure
        assert_eq!(ledger, snapshot(2, 1, 0));
    }

    #[test]
    fn test_reserve_then_release_restores_state() {
        let mut ledger = snapshot(5, 1, 0);
        let before = ledger.clone();
        ledger.reserve(3).unwrap();
        assert_eq!(ledger.available_blocks(), 1);
        ledger.release(3);
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_release_floors_at_zero() {
        let mut ledger = snapshot(5, 0, 1);
        ledger.release(4);
        assert_eq!(ledger.reserved_blocks, 0);
        assert_eq!(ledger.available_blocks(), 5);
    }

    #[test]
    fn test_commit_usage_returns_surplus() {
        let mut ledger = snapshot(10, 0, 4);
        ledger.commit_usage(4, 3).unwrap();
        assert_eq!(ledger.used_blocks, 3);
        assert_eq!(ledger.reserved_blocks, 0);
        assert_eq!(ledger.available_blocks(), 7);
    }

    #[test]
    fn test_commit_usage_rejects_shortfall_without_mutation() {
        let mut ledger = snapshot(10, 0, 2);
        let before = ledger.clone();
        let err = ledger.commit_usage(2, 3).unwrap_err();
        assert_eq!(
            err,
            LedgerError::ShortfallOnFinalize {
                reserved: 2,
                actual: 3
            }
        );
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_invariant_holds_across_operation_sequence() {
        let mut ledger = snapshot(0, 0, 0);
        ledger.credit(5).unwrap();
        ledger.reserve(3).unwrap();
        ledger.commit_usage(3, 2).unwrap();
        ledger.reserve(2).unwrap();
        ledger.release(2);
        ledger.credit(1).unwrap();
        assert!(ledger.available_blocks() >= 0);
        assert_eq!(
            ledger.available_blocks(),
            ledger.total_blocks - ledger.used_blocks - ledger.reserved_blocks
        );
    }

    #[test]
    fn test_promo_credit_usable_window() {
        let granted = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let credit = PromoCredit {
            id: Uuid::new_v4(),
            blocks: 1,
            granted_at: granted,
            expires_at: granted + Duration::days(30),
        };
        assert!(credit.is_usable(granted + Duration::days(29)));
        assert!(!credit.is_usable(granted + Duration::days(31)));
    }
}
