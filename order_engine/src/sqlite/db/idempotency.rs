use chrono::{Duration, Utc};
use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::{IdempotencyRecord, ObserveResult},
    traits::OrderSyncError,
};

/// Atomically claims an event id for processing.
///
/// The insert and the new-vs-duplicate decision are one statement: on conflict the row is only reclaimed when its
/// expiry has passed, so an unexpired record yields no returned row and the caller sees `Duplicate`. There is no
/// separate read-then-write race window.
pub async fn observe(
    event_id: &str,
    integration_id: i64,
    horizon: Duration,
    conn: &mut SqliteConnection,
) -> Result<ObserveResult, OrderSyncError> {
    let now = Utc::now();
    let expires_at = now + horizon;
    let claimed: Option<IdempotencyRecord> = sqlx::query_as(
        r#"
            INSERT INTO idempotency_records (event_id, integration_id, processed_at, response_status, expires_at)
            VALUES ($1, $2, $3, 200, $4)
            ON CONFLICT (event_id) DO UPDATE
                SET integration_id = excluded.integration_id,
                    processed_at = excluded.processed_at,
                    expires_at = excluded.expires_at
                WHERE idempotency_records.expires_at <= excluded.processed_at
            RETURNING *;
        "#,
    )
    .bind(event_id)
    .bind(integration_id)
    .bind(now)
    .bind(expires_at)
    .fetch_optional(conn)
    .await?;
    let result = match claimed {
        Some(_) => ObserveResult::New,
        None => ObserveResult::Duplicate,
    };
    trace!("🎫️ Event {event_id} observed: {result:?}");
    Ok(result)
}

/// Removes ledger rows past their expiry horizon. A replayed event after this point is treated as new, which is an
/// accepted trade-off: the platform does not redeliver events that old.
pub async fn prune_expired(conn: &mut SqliteConnection) -> Result<u64, OrderSyncError> {
    let result =
        sqlx::query("DELETE FROM idempotency_records WHERE expires_at <= $1").bind(Utc::now()).execute(conn).await?;
    Ok(result.rows_affected())
}
