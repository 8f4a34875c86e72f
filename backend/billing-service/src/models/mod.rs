/// Data models for billing-service
///
/// This module defines structures for:
/// - CreatorLedger: per-creator block capacity row
/// - PromotionalCredit: time-limited free-block grants
/// - UploadIntent: content-upload lifecycle tied to a reservation
/// - BlockPurchase: asynchronous block purchases
///
use block_core::{LedgerSnapshot, PromoCredit};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ========================================
// Ledger Models
// ========================================

/// Per-creator block ledger row. All mutation happens inside row-locked
/// transactions in the repository layer.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CreatorLedger {
    pub creator_id: Uuid,
    pub total_blocks: i64,
    pub used_blocks: i64,
    pub reserved_blocks: i64,
    pub grace_end: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CreatorLedger {
    pub fn available_blocks(&self) -> i64 {
        self.total_blocks - self.used_blocks - self.reserved_blocks
    }

    /// Pure snapshot handed to block-core arithmetic
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            total_blocks: self.total_blocks,
            used_blocks: self.used_blocks,
            reserved_blocks: self.reserved_blocks,
            grace_end: self.grace_end,
        }
    }
}

/// Ledger summary response DTO
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerResponse {
    pub creator_id: String,
    pub total_blocks: i64,
    pub used_blocks: i64,
    pub reserved_blocks: i64,
    pub available_blocks: i64,
    pub can_upload: bool,
    pub in_grace: bool,
}

impl LedgerResponse {
    pub fn from_ledger(ledger: &CreatorLedger, now: DateTime<Utc>) -> Self {
        let available = ledger.available_blocks();
        Self {
            creator_id: ledger.creator_id.to_string(),
            total_blocks: ledger.total_blocks,
            used_blocks: ledger.used_blocks,
            reserved_blocks: ledger.reserved_blocks,
            available_blocks: available,
            can_upload: available > 0,
            in_grace: now < ledger.grace_end,
        }
    }
}

// ========================================
// Promotional Credit Models
// ========================================

/// Promotional credit row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PromotionalCredit {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub blocks: i64,
    pub campaign: String,
    pub granted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
}

impl From<&PromotionalCredit> for PromoCredit {
    fn from(row: &PromotionalCredit) -> Self {
        PromoCredit {
            id: row.id,
            blocks: row.blocks,
            granted_at: row.granted_at,
            expires_at: row.expires_at,
        }
    }
}

// ========================================
// Upload Intent Models
// ========================================

/// Upload intent state in the reservation lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentState {
    Estimated,
    Reserved,
    Uploading,
    Completed,
    Failed,
    Cancelled,
    PendingBlockShortfall,
}

impl IntentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Estimated => "estimated",
            Self::Reserved => "reserved",
            Self::Uploading => "uploading",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::PendingBlockShortfall => "pending_block_shortfall",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "estimated" => Some(Self::Estimated),
            "reserved" => Some(Self::Reserved),
            "uploading" => Some(Self::Uploading),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            "pending_block_shortfall" => Some(Self::PendingBlockShortfall),
            _ => None,
        }
    }

    /// States whose reservation still holds ledger capacity
    pub fn holds_reservation(&self) -> bool {
        matches!(
            self,
            Self::Reserved | Self::Uploading | Self::PendingBlockShortfall
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Upload intent row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UploadIntent {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub video_id: Uuid,
    pub title: String,
    pub estimated_size_gb: f64,
    pub actual_size_gb: Option<f64>,
    pub blocks_needed: i64,
    pub reserved_blocks: i64,
    pub state: String,
    pub upload_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UploadIntent {
    pub fn get_state(&self) -> IntentState {
        IntentState::from_str(&self.state).unwrap_or(IntentState::Estimated)
    }
}

/// Upload intent response DTO
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentResponse {
    pub id: String,
    pub creator_id: String,
    pub video_id: String,
    pub title: String,
    pub estimated_size_gb: f64,
    pub actual_size_gb: Option<f64>,
    pub blocks_needed: i64,
    pub reserved_blocks: i64,
    pub state: String,
    pub upload_url: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<UploadIntent> for IntentResponse {
    fn from(intent: UploadIntent) -> Self {
        Self {
            id: intent.id.to_string(),
            creator_id: intent.creator_id.to_string(),
            video_id: intent.video_id.to_string(),
            title: intent.title,
            estimated_size_gb: intent.estimated_size_gb,
            actual_size_gb: intent.actual_size_gb,
            blocks_needed: intent.blocks_needed,
            reserved_blocks: intent.reserved_blocks,
            state: intent.state,
            upload_url: intent.upload_url,
            created_at: intent.created_at.timestamp(),
            updated_at: intent.updated_at.timestamp(),
        }
    }
}

// ========================================
// Block Purchase Models
// ========================================

/// Purchase status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    Pending,
    Paid,
    Failed,
    Expired,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Expired => "expired",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "failed" => Some(Self::Failed),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    /// Terminal purchases never change again; webhook replays are no-ops
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Block purchase row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BlockPurchase {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub blocks_requested: i64,
    pub unit_price_cents: i64,
    pub total_price_cents: i64,
    pub status: String,
    pub checkout_url: Option<String>,
    pub idempotency_key: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BlockPurchase {
    pub fn get_status(&self) -> PurchaseStatus {
        PurchaseStatus::from_str(&self.status).unwrap_or(PurchaseStatus::Pending)
    }
}

/// Purchase response DTO
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseResponse {
    pub id: String,
    pub creator_id: String,
    pub blocks_requested: i64,
    pub unit_price_cents: i64,
    pub total_price_cents: i64,
    pub status: String,
    pub checkout_url: Option<String>,
    pub created_at: i64,
}

impl From<BlockPurchase> for PurchaseResponse {
    fn from(purchase: BlockPurchase) -> Self {
        Self {
            id: purchase.id.to_string(),
            creator_id: purchase.creator_id.to_string(),
            blocks_requested: purchase.blocks_requested,
            unit_price_cents: purchase.unit_price_cents,
            total_price_cents: purchase.total_price_cents,
            status: purchase.status,
            checkout_url: purchase.checkout_url,
            created_at: purchase.created_at.timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_state_round_trip() {
        for state in [
            IntentState::Estimated,
            IntentState::Reserved,
            IntentState::Uploading,
            IntentState::Completed,
            IntentState::Failed,
            IntentState::Cancelled,
            IntentState::PendingBlockShortfall,
        ] {
            assert_eq!(IntentState::from_str(state.as_str()), Some(state));
        }
    }

    #[test]
    fn test_holds_reservation_states() {
        assert!(IntentState::Reserved.holds_reservation());
        assert!(IntentState::Uploading.holds_reservation());
        assert!(IntentState::PendingBlockShortfall.holds_reservation());
        assert!(!IntentState::Estimated.holds_reservation());
        assert!(!IntentState::Completed.holds_reservation());
    }

    #[test]
    fn test_purchase_terminal_states() {
        assert!(!PurchaseStatus::Pending.is_terminal());
        assert!(PurchaseStatus::Paid.is_terminal());
        assert!(PurchaseStatus::Failed.is_terminal());
        assert!(PurchaseStatus::Expired.is_terminal());
    }
}
