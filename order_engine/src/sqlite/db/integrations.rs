use chrono::Utc;
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Integration, NewIntegration},
    traits::OrderSyncError,
};

pub async fn fetch_by_domain(domain: &str, conn: &mut SqliteConnection) -> Result<Option<Integration>, sqlx::Error> {
    let integration = sqlx::query_as("SELECT * FROM integrations WHERE shop_domain = $1")
        .bind(domain)
        .fetch_optional(conn)
        .await?;
    Ok(integration)
}

/// Registers a new integration, or re-activates and re-keys an existing one for the same shop domain. Called on
/// app-install completion.
pub async fn upsert(integration: NewIntegration, conn: &mut SqliteConnection) -> Result<Integration, OrderSyncError> {
    let result = sqlx::query_as(
        r#"
            INSERT INTO integrations (shop_domain, signing_secret, store_id, status)
            VALUES ($1, $2, $3, 'Active')
            ON CONFLICT (shop_domain) DO UPDATE
                SET signing_secret = excluded.signing_secret,
                    store_id = excluded.store_id,
                    status = 'Active',
                    updated_at = $4
            RETURNING *;
        "#,
    )
    .bind(integration.shop_domain)
    .bind(integration.signing_secret)
    .bind(integration.store_id)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    Ok(result)
}

/// Flips the integration to `Revoked`. Returns the number of rows affected (0 if the domain is unknown).
pub async fn revoke(domain: &str, conn: &mut SqliteConnection) -> Result<u64, OrderSyncError> {
    let result = sqlx::query("UPDATE integrations SET status = 'Revoked', updated_at = $1 WHERE shop_domain = $2")
        .bind(Utc::now())
        .bind(domain)
        .execute(conn)
        .await?;
    debug!("🔌️ Integration for {domain} revoked ({} row(s))", result.rows_affected());
    Ok(result.rows_affected())
}
