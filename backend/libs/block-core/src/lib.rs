//! Storage-block billing core
//!
//! Shared pure logic for the billing-service: the billing policy value
//! object, size-to-block conversion, cost quoting against a ledger
//! snapshot, and the block ledger arithmetic with its invariants.
//!
//! Nothing in this crate touches the database or the network; the
//! billing-service applies these decisions inside its own transactions.

pub mod calculator;
pub mod ledger;
pub mod policy;

pub use calculator::{blocks_needed, estimate_size_gb, quote, Quote, Resolution, SizeError};
pub use ledger::{LedgerError, LedgerSnapshot, PromoCredit};
pub use policy::BillingPolicy;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_full_quote_round_trip() {
        let policy = BillingPolicy::default();
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();

        let mut ledger = LedgerSnapshot {
            total_blocks: 2,
            used_blocks: 0,
            reserved_blocks: 0,
            grace_end: now - chrono::Duration::days(1),
        };

        let needed = blocks_needed(&policy, 14.6).unwrap();
        assert_eq!(needed, 2);

        let q = quote(&policy, needed, &ledger, &[], now);
        assert_eq!(q.total_price_cents, 2 * policy.price_per_block_cents);

        ledger.reserve(needed).unwrap();
        assert_eq!(ledger.available_blocks(), 0);
        ledger.commit_usage(needed, needed).unwrap();
        assert_eq!(ledger.used_blocks, 2);
        assert_eq!(ledger.reserved_blocks, 0);
    }
}
