/// Block purchase repository
use crate::models::{BlockPurchase, PurchaseStatus};
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

const PURCHASE_COLUMNS: &str = r#"id, creator_id, blocks_requested, unit_price_cents,
    total_price_cents, status, checkout_url, idempotency_key, created_at, updated_at"#;

/// Create a pending purchase with a fresh idempotency key.
pub async fn create_purchase(
    pool: &PgPool,
    creator_id: Uuid,
    blocks_requested: i64,
    unit_price_cents: i64,
) -> Result<BlockPurchase, sqlx::Error> {
    let purchase = sqlx::query_as::<_, BlockPurchase>(&format!(
        r#"
        INSERT INTO block_purchases
            (id, creator_id, blocks_requested, unit_price_cents, total_price_cents,
             status, idempotency_key)
        VALUES ($1, $2, $3, $4, $5, 'pending', $6)
        RETURNING {PURCHASE_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(creator_id)
    .bind(blocks_requested)
    .bind(unit_price_cents)
    .bind(blocks_requested * unit_price_cents)
    .bind(Uuid::new_v4())
    .fetch_one(pool)
    .await?;

    Ok(purchase)
}

pub async fn find_purchase(
    pool: &PgPool,
    purchase_id: Uuid,
) -> Result<Option<BlockPurchase>, sqlx::Error> {
    let purchase = sqlx::query_as::<_, BlockPurchase>(&format!(
        "SELECT {PURCHASE_COLUMNS} FROM block_purchases WHERE id = $1"
    ))
    .bind(purchase_id)
    .fetch_optional(pool)
    .await?;

    Ok(purchase)
}

/// Resolve a webhook reference. Gateways echo either our purchase id or the
/// idempotency key we sent them as the external reference.
pub async fn resolve_reference(
    pool: &PgPool,
    reference: Uuid,
) -> Result<Option<BlockPurchase>, sqlx::Error> {
    let purchase = sqlx::query_as::<_, BlockPurchase>(&format!(
        "SELECT {PURCHASE_COLUMNS} FROM block_purchases WHERE id = $1 OR idempotency_key = $1"
    ))
    .bind(reference)
    .fetch_optional(pool)
    .await?;

    Ok(purchase)
}

/// Lock a purchase row for confirmation.
pub async fn lock_purchase(
    conn: &mut PgConnection,
    purchase_id: Uuid,
) -> Result<Option<BlockPurchase>, sqlx::Error> {
    let purchase = sqlx::query_as::<_, BlockPurchase>(&format!(
        "SELECT {PURCHASE_COLUMNS} FROM block_purchases WHERE id = $1 FOR UPDATE"
    ))
    .bind(purchase_id)
    .fetch_optional(conn)
    .await?;

    Ok(purchase)
}

/// Store the gateway checkout URL on a pending purchase.
pub async fn set_checkout_url(
    pool: &PgPool,
    purchase_id: Uuid,
    checkout_url: &str,
) -> Result<BlockPurchase, sqlx::Error> {
    let purchase = sqlx::query_as::<_, BlockPurchase>(&format!(
        r#"
        UPDATE block_purchases
        SET checkout_url = $1, updated_at = NOW()
        WHERE id = $2
        RETURNING {PURCHASE_COLUMNS}
        "#
    ))
    .bind(checkout_url)
    .bind(purchase_id)
    .fetch_one(pool)
    .await?;

    Ok(purchase)
}

/// Move a purchase to a new status.
pub async fn mark_status(
    conn: &mut PgConnection,
    purchase_id: Uuid,
    status: PurchaseStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE block_purchases SET status = $1, updated_at = NOW() WHERE id = $2")
        .bind(status.as_str())
        .bind(purchase_id)
        .execute(conn)
        .await?;

    Ok(())
}

/// Expire pending purchases older than the cutoff. The ledger is untouched;
/// nothing was credited for them.
pub async fn expire_pending_before(
    pool: &PgPool,
    cutoff: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE block_purchases
        SET status = 'expired', updated_at = NOW()
        WHERE status = 'pending' AND created_at < $1
        "#,
    )
    .bind(cutoff)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
