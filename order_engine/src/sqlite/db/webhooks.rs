use chrono::{Duration, Utc};
use log::{debug, trace, warn};
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewWebhookNotification, WebhookNotification},
    helpers::retry_backoff,
    traits::OrderSyncError,
};

/// Inserts a notification in `Pending` state, due immediately. Returns `None` when the (integration, idempotency
/// key) pair is already queued; redelivery between ledger expiry and queue pruning lands here.
pub async fn enqueue(
    notification: NewWebhookNotification,
    conn: &mut SqliteConnection,
) -> Result<Option<WebhookNotification>, OrderSyncError> {
    let result: Option<WebhookNotification> = sqlx::query_as(
        r#"
            INSERT INTO webhook_notifications
                (integration_id, shop_domain, topic, payload, headers, idempotency_key, external_ref, status,
                 next_attempt_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'Pending', $8)
            ON CONFLICT (integration_id, idempotency_key) DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(notification.integration_id)
    .bind(notification.shop_domain)
    .bind(notification.topic)
    .bind(notification.payload)
    .bind(notification.headers)
    .bind(notification.idempotency_key)
    .bind(notification.external_ref)
    .bind(Utc::now())
    .fetch_optional(conn)
    .await?;
    if let Some(n) = &result {
        debug!("📨️ Notification [{}] queued for {} ({})", n.id, n.shop_domain, n.topic);
    }
    Ok(result)
}

/// Due pending notifications, oldest first for fairness, bounded by `limit`.
pub async fn fetch_due(limit: i64, conn: &mut SqliteConnection) -> Result<Vec<WebhookNotification>, OrderSyncError> {
    let rows = sqlx::query_as(
        r#"
            SELECT * FROM webhook_notifications
            WHERE status = 'Pending' AND next_attempt_at <= $1
            ORDER BY created_at ASC
            LIMIT $2;
        "#,
    )
    .bind(Utc::now())
    .bind(limit)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

/// Takes the processing lease. The conditional `WHERE status = 'Pending'` makes two dispatchers racing on the same
/// row resolve to exactly one winner.
pub async fn lease(id: i64, conn: &mut SqliteConnection) -> Result<bool, OrderSyncError> {
    let result =
        sqlx::query("UPDATE webhook_notifications SET status = 'Processing', updated_at = $1 WHERE id = $2 AND status = 'Pending'")
            .bind(Utc::now())
            .bind(id)
            .execute(conn)
            .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn mark_succeeded(id: i64, conn: &mut SqliteConnection) -> Result<WebhookNotification, OrderSyncError> {
    let now = Utc::now();
    let result: Option<WebhookNotification> = sqlx::query_as(
        r#"
            UPDATE webhook_notifications
            SET status = 'Succeeded', processed_at = $1, updated_at = $1, last_error = NULL
            WHERE id = $2 AND status = 'Processing'
            RETURNING *;
        "#,
    )
    .bind(now)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    result.ok_or(OrderSyncError::IllegalStateTransition(id))
}

/// Terminal failure. Used for permanent errors and for the retry ceiling; the row is kept for the admin surface.
pub async fn mark_failed(
    id: i64,
    error: &str,
    conn: &mut SqliteConnection,
) -> Result<WebhookNotification, OrderSyncError> {
    let now = Utc::now();
    let result: Option<WebhookNotification> = sqlx::query_as(
        r#"
            UPDATE webhook_notifications
            SET status = 'Failed', processed_at = $1, updated_at = $1, last_error = $2
            WHERE id = $3
            RETURNING *;
        "#,
    )
    .bind(now)
    .bind(error)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    if let Some(n) = &result {
        warn!("📨️ Notification [{}] terminally failed: {error}", n.id);
    }
    result.ok_or(OrderSyncError::NotificationNotFound(id))
}

/// Records a transient failure: bumps the attempt counter, then either reschedules with exponential backoff or,
/// once the ceiling is reached, terminally fails the notification.
pub async fn record_failed_attempt(
    id: i64,
    error: &str,
    conn: &mut SqliteConnection,
) -> Result<WebhookNotification, OrderSyncError> {
    let current: Option<WebhookNotification> =
        sqlx::query_as("SELECT * FROM webhook_notifications WHERE id = $1").bind(id).fetch_optional(&mut *conn).await?;
    let current = current.ok_or(OrderSyncError::NotificationNotFound(id))?;
    let attempts = current.attempts + 1;
    let now = Utc::now();
    let result: WebhookNotification = if attempts >= current.max_attempts {
        sqlx::query_as(
            r#"
                UPDATE webhook_notifications
                SET status = 'Failed', attempts = $1, processed_at = $2, updated_at = $2, last_error = $3
                WHERE id = $4
                RETURNING *;
            "#,
        )
        .bind(attempts)
        .bind(now)
        .bind(error)
        .bind(id)
        .fetch_one(conn)
        .await?
    } else {
        let delay = retry_backoff(attempts);
        let next_attempt_at = now + delay;
        trace!("📨️ Notification [{id}] attempt {attempts} failed; retrying in {}s", delay.num_seconds());
        sqlx::query_as(
            r#"
                UPDATE webhook_notifications
                SET status = 'Pending', attempts = $1, next_attempt_at = $2, updated_at = $3, last_error = $4
                WHERE id = $5
                RETURNING *;
            "#,
        )
        .bind(attempts)
        .bind(next_attempt_at)
        .bind(now)
        .bind(error)
        .bind(id)
        .fetch_one(conn)
        .await?
    };
    Ok(result)
}

/// Returns `Processing` rows whose lease has gone stale (a worker crashed mid-flight) back to `Pending`.
pub async fn reset_stale(older_than: Duration, conn: &mut SqliteConnection) -> Result<u64, OrderSyncError> {
    let cutoff = Utc::now() - older_than;
    let result = sqlx::query(
        "UPDATE webhook_notifications SET status = 'Pending', updated_at = $1 WHERE status = 'Processing' AND updated_at < $2",
    )
    .bind(Utc::now())
    .bind(cutoff)
    .execute(conn)
    .await?;
    if result.rows_affected() > 0 {
        warn!("📨️ Reset {} stale processing notification(s) back to pending", result.rows_affected());
    }
    Ok(result.rows_affected())
}

/// Terminally failed notifications for the admin surface, newest first.
pub async fn fetch_failed(limit: i64, conn: &mut SqliteConnection) -> Result<Vec<WebhookNotification>, OrderSyncError> {
    let rows = sqlx::query_as(
        "SELECT * FROM webhook_notifications WHERE status = 'Failed' ORDER BY processed_at DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

pub async fn fetch_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<WebhookNotification>, OrderSyncError> {
    let row = sqlx::query_as("SELECT * FROM webhook_notifications WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(row)
}

/// Removes ledger and pending queue entries tied to an external order id, so that a late-arriving duplicate for an
/// order that no longer exists is treated as a fresh create rather than an update-of-nothing. Part of the delete
/// cascade; runs inside its transaction.
pub async fn purge_for_external_ref(
    store_id: i64,
    external_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<u64, OrderSyncError> {
    sqlx::query(
        r#"
            DELETE FROM idempotency_records
            WHERE event_id IN (
                SELECT idempotency_key FROM webhook_notifications
                WHERE external_ref = $1
                  AND integration_id IN (SELECT id FROM integrations WHERE store_id = $2)
            );
        "#,
    )
    .bind(external_ref)
    .bind(store_id)
    .execute(&mut *conn)
    .await?;
    // All statuses go, not just pending: a kept `Succeeded` row would trip the queue's uniqueness constraint when
    // the platform redelivers the original create event for an order that no longer exists.
    let removed = sqlx::query(
        r#"
            DELETE FROM webhook_notifications
            WHERE external_ref = $1
              AND integration_id IN (SELECT id FROM integrations WHERE store_id = $2);
        "#,
    )
    .bind(external_ref)
    .bind(store_id)
    .execute(conn)
    .await?;
    Ok(removed.rows_affected())
}
