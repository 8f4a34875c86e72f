/// Ledger repository - database operations for creator block ledgers
///
/// Mutations load the creator's row with `FOR UPDATE`, apply block-core
/// arithmetic on the snapshot, and write the result back in the same
/// transaction. Nothing outside this module updates ledger columns.
use crate::models::CreatorLedger;
use block_core::LedgerSnapshot;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Fetch a ledger without locking. May be stale by the time it is used;
/// admission re-validates under the row lock.
pub async fn find_ledger(
    pool: &PgPool,
    creator_id: Uuid,
) -> Result<Option<CreatorLedger>, sqlx::Error> {
    let ledger = sqlx::query_as::<_, CreatorLedger>(
        r#"
        SELECT creator_id, total_blocks, used_blocks, reserved_blocks,
               grace_end, created_at, updated_at
        FROM creator_block_ledgers
        WHERE creator_id = $1
        "#,
    )
    .bind(creator_id)
    .fetch_optional(pool)
    .await?;

    Ok(ledger)
}

/// Lock the creator's ledger row for the rest of the transaction.
pub async fn lock_ledger(
    conn: &mut PgConnection,
    creator_id: Uuid,
) -> Result<Option<CreatorLedger>, sqlx::Error> {
    let ledger = sqlx::query_as::<_, CreatorLedger>(
        r#"
        SELECT creator_id, total_blocks, used_blocks, reserved_blocks,
               grace_end, created_at, updated_at
        FROM creator_block_ledgers
        WHERE creator_id = $1
        FOR UPDATE
        "#,
    )
    .bind(creator_id)
    .fetch_optional(conn)
    .await?;

    Ok(ledger)
}

/// Create the ledger row at creator approval. Returns None when the row
/// already existed, so the approval grant is applied at most once.
pub async fn create_ledger(
    conn: &mut PgConnection,
    creator_id: Uuid,
    initial_blocks: i64,
    grace_end: DateTime<Utc>,
) -> Result<Option<CreatorLedger>, sqlx::Error> {
    let ledger = sqlx::query_as::<_, CreatorLedger>(
        r#"
        INSERT INTO creator_block_ledgers
            (creator_id, total_blocks, used_blocks, reserved_blocks, grace_end)
        VALUES ($1, $2, 0, 0, $3)
        ON CONFLICT (creator_id) DO NOTHING
        RETURNING creator_id, total_blocks, used_blocks, reserved_blocks,
                  grace_end, created_at, updated_at
        "#,
    )
    .bind(creator_id)
    .bind(initial_blocks)
    .bind(grace_end)
    .fetch_optional(conn)
    .await?;

    Ok(ledger)
}

/// Write an updated snapshot back to the locked row.
pub async fn store_snapshot(
    conn: &mut PgConnection,
    creator_id: Uuid,
    snapshot: &LedgerSnapshot,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE creator_block_ledgers
        SET total_blocks = $1, used_blocks = $2, reserved_blocks = $3, updated_at = NOW()
        WHERE creator_id = $4
        "#,
    )
    .bind(snapshot.total_blocks)
    .bind(snapshot.used_blocks)
    .bind(snapshot.reserved_blocks)
    .bind(creator_id)
    .execute(conn)
    .await?;

    Ok(())
}

/// All creator ids with a ledger, for campaign grants.
pub async fn list_creator_ids(pool: &PgPool) -> Result<Vec<Uuid>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (Uuid,)>(
        "SELECT creator_id FROM creator_block_ledgers ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}
