/// Upload intent repository
use crate::models::{IntentState, UploadIntent};
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

const INTENT_COLUMNS: &str = r#"id, creator_id, video_id, title, estimated_size_gb,
    actual_size_gb, blocks_needed, reserved_blocks, state, upload_url,
    created_at, updated_at"#;

/// Create a new intent in state "estimated"
pub async fn create_intent(
    pool: &PgPool,
    creator_id: Uuid,
    video_id: Uuid,
    title: &str,
    estimated_size_gb: f64,
    blocks_needed: i64,
) -> Result<UploadIntent, sqlx::Error> {
    let intent = sqlx::query_as::<_, UploadIntent>(&format!(
        r#"
        INSERT INTO upload_intents
            (id, creator_id, video_id, title, estimated_size_gb, blocks_needed, state)
        VALUES ($1, $2, $3, $4, $5, $6, 'estimated')
        RETURNING {INTENT_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(creator_id)
    .bind(video_id)
    .bind(title)
    .bind(estimated_size_gb)
    .bind(blocks_needed)
    .fetch_one(pool)
    .await?;

    Ok(intent)
}

pub async fn find_intent(
    pool: &PgPool,
    intent_id: Uuid,
) -> Result<Option<UploadIntent>, sqlx::Error> {
    let intent = sqlx::query_as::<_, UploadIntent>(&format!(
        "SELECT {INTENT_COLUMNS} FROM upload_intents WHERE id = $1"
    ))
    .bind(intent_id)
    .fetch_optional(pool)
    .await?;

    Ok(intent)
}

/// Lock an intent row for a state transition. Finalize, abort and the reaper
/// can race on the same intent; the row lock serializes them.
pub async fn lock_intent(
    conn: &mut PgConnection,
    intent_id: Uuid,
) -> Result<Option<UploadIntent>, sqlx::Error> {
    let intent = sqlx::query_as::<_, UploadIntent>(&format!(
        "SELECT {INTENT_COLUMNS} FROM upload_intents WHERE id = $1 FOR UPDATE"
    ))
    .bind(intent_id)
    .fetch_optional(conn)
    .await?;

    Ok(intent)
}

/// Record a successful reservation.
pub async fn mark_reserved(
    conn: &mut PgConnection,
    intent_id: Uuid,
    reserved_blocks: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE upload_intents
        SET state = 'reserved', reserved_blocks = $1, updated_at = NOW()
        WHERE id = $2
        "#,
    )
    .bind(reserved_blocks)
    .bind(intent_id)
    .execute(conn)
    .await?;

    Ok(())
}

/// Record the upload hand-off to the video host.
pub async fn mark_uploading(
    pool: &PgPool,
    intent_id: Uuid,
    upload_url: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE upload_intents
        SET state = 'uploading', upload_url = $1, updated_at = NOW()
        WHERE id = $2
        "#,
    )
    .bind(upload_url)
    .bind(intent_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Move an intent to a new state.
pub async fn mark_state(
    conn: &mut PgConnection,
    intent_id: Uuid,
    state: IntentState,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE upload_intents SET state = $1, updated_at = NOW() WHERE id = $2")
        .bind(state.as_str())
        .bind(intent_id)
        .execute(conn)
        .await?;

    Ok(())
}

/// Record a committed finalize: authoritative size, final reservation count,
/// terminal state.
pub async fn mark_completed(
    conn: &mut PgConnection,
    intent_id: Uuid,
    actual_size_gb: f64,
    reserved_blocks: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE upload_intents
        SET state = 'completed', actual_size_gb = $1, reserved_blocks = $2, updated_at = NOW()
        WHERE id = $3
        "#,
    )
    .bind(actual_size_gb)
    .bind(reserved_blocks)
    .bind(intent_id)
    .execute(conn)
    .await?;

    Ok(())
}

/// Intents still holding a reservation that have not progressed since the
/// cutoff. Input for the reconciliation reaper.
pub async fn find_stale_holding(
    pool: &PgPool,
    cutoff: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<UploadIntent>, sqlx::Error> {
    let intents = sqlx::query_as::<_, UploadIntent>(&format!(
        r#"
        SELECT {INTENT_COLUMNS}
        FROM upload_intents
        WHERE state IN ('reserved', 'uploading') AND updated_at < $1
        ORDER BY updated_at
        LIMIT $2
        "#
    ))
    .bind(cutoff)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(intents)
}

/// Cancel estimated intents that never reserved. They hold no capacity, so a
/// plain status flip is enough.
pub async fn cancel_stale_estimated(
    pool: &PgPool,
    cutoff: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE upload_intents
        SET state = 'cancelled', updated_at = NOW()
        WHERE state = 'estimated' AND updated_at < $1
        "#,
    )
    .bind(cutoff)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
