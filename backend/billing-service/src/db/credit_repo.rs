/// Promotional credit repository
use crate::models::PromotionalCredit;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Unexpired, unconsumed credits ordered soonest-expiring first.
pub async fn active_credits(
    pool: &PgPool,
    creator_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Vec<PromotionalCredit>, sqlx::Error> {
    let credits = sqlx::query_as::<_, PromotionalCredit>(
        r#"
        SELECT id, creator_id, blocks, campaign, granted_at, expires_at, consumed_at
        FROM promotional_credits
        WHERE creator_id = $1 AND consumed_at IS NULL AND expires_at > $2
        ORDER BY expires_at
        "#,
    )
    .bind(creator_id)
    .bind(now)
    .fetch_all(pool)
    .await?;

    Ok(credits)
}

/// Same as `active_credits` but locked, for use inside a reservation
/// transaction that may consume them.
pub async fn lock_active_credits(
    conn: &mut PgConnection,
    creator_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Vec<PromotionalCredit>, sqlx::Error> {
    let credits = sqlx::query_as::<_, PromotionalCredit>(
        r#"
        SELECT id, creator_id, blocks, campaign, granted_at, expires_at, consumed_at
        FROM promotional_credits
        WHERE creator_id = $1 AND consumed_at IS NULL AND expires_at > $2
        ORDER BY expires_at
        FOR UPDATE
        "#,
    )
    .bind(creator_id)
    .bind(now)
    .fetch_all(conn)
    .await?;

    Ok(credits)
}

/// Mark a set of credits consumed.
pub async fn consume_credits(
    conn: &mut PgConnection,
    credit_ids: &[Uuid],
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    if credit_ids.is_empty() {
        return Ok(());
    }

    sqlx::query(
        r#"
        UPDATE promotional_credits
        SET consumed_at = $1
        WHERE id = ANY($2) AND consumed_at IS NULL
        "#,
    )
    .bind(now)
    .bind(credit_ids)
    .execute(conn)
    .await?;

    Ok(())
}

/// Insert a campaign credit. Returns None when the creator already received
/// this campaign (consumed or not), so re-running a grant cycle is harmless.
pub async fn insert_campaign_credit(
    conn: &mut PgConnection,
    creator_id: Uuid,
    blocks: i64,
    campaign: &str,
    granted_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Result<Option<PromotionalCredit>, sqlx::Error> {
    let credit = sqlx::query_as::<_, PromotionalCredit>(
        r#"
        INSERT INTO promotional_credits (id, creator_id, blocks, campaign, granted_at, expires_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (creator_id, campaign) DO NOTHING
        RETURNING id, creator_id, blocks, campaign, granted_at, expires_at, consumed_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(creator_id)
    .bind(blocks)
    .bind(campaign)
    .bind(granted_at)
    .bind(expires_at)
    .fetch_optional(conn)
    .await?;

    Ok(credit)
}

/// Drop a creator's live credits from other campaigns. Grants are
/// non-cumulative: a new seasonal grant replaces whatever is still unused.
pub async fn delete_live_credits_except(
    conn: &mut PgConnection,
    creator_id: Uuid,
    campaign: &str,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM promotional_credits
        WHERE creator_id = $1 AND campaign <> $2
          AND consumed_at IS NULL AND expires_at > $3
        "#,
    )
    .bind(creator_id)
    .bind(campaign)
    .bind(now)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

/// Remove expired, never-consumed credits. Consumed rows stay for audit.
pub async fn delete_expired(pool: &PgPool, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM promotional_credits WHERE consumed_at IS NULL AND expires_at <= $1",
    )
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
