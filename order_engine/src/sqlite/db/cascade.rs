//! The cascading consistency cleanup that accompanies a hard order delete.
//!
//! Everything here runs against the caller's connection; [`crate::SqliteDatabase`] wraps the whole sequence in one
//! transaction so a failure at any step aborts the entire deletion. A full order row plus half its derived records
//! must never exist.
use log::{debug, info};
use sqlx::SqliteConnection;

use super::{inventory, orders, products, webhooks};
use crate::{
    db_types::{MovementType, NewInventoryMovement},
    traits::{CascadeReport, OrderSyncError, StockRestoration},
};

/// Hard-deletes an order and every record that depends on it.
///
/// Steps, in order:
/// 1. If the order's status says stock was consumed (ready_to_ship/shipped/delivered), each resolved line item's
///    product gets its stock incremented by the line quantity, with a ledger movement documenting the restoration.
/// 2. Dependent rows are removed children-before-parents; grouping records (warehouse/return sessions) that end up
///    with no member orders are removed too.
/// 3. Inventory movements referencing the order are detached, not deleted.
/// 4. Ledger and pending queue entries for the order's external id are purged, so a late duplicate notification is
///    treated as a fresh create.
/// 5. The line items and finally the order row are deleted.
pub async fn delete_order_with_cascade(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<CascadeReport, OrderSyncError> {
    let order = orders::fetch_order_by_id(order_id, &mut *conn).await?.ok_or(OrderSyncError::OrderNotFound(order_id))?;
    let items = orders::fetch_line_items(order_id, &mut *conn).await?;

    // 1. Stock restoration
    let mut restorations = Vec::new();
    if order.status.stock_consumed() {
        for item in &items {
            // Unmapped line items never consumed local stock, so there is nothing to restore.
            let Some(product_id) = item.product_id else {
                continue;
            };
            let product = products::adjust_stock(product_id, item.quantity, &mut *conn).await?;
            let reason = format!(
                "Stock restored for order {} (status {}) on hard delete",
                order.external_order_id.as_ref().map(|id| id.to_string()).unwrap_or_else(|| format!("[{order_id}]")),
                order.status
            );
            inventory::append_movement(
                NewInventoryMovement {
                    product_id,
                    store_id: order.store_id,
                    order_id: Some(order_id),
                    movement_type: MovementType::HardDeleteRestoration,
                    quantity_delta: item.quantity,
                    reason: Some(reason),
                },
                &mut *conn,
            )
            .await?;
            restorations.push(StockRestoration {
                product_id,
                store_id: order.store_id,
                external_product_id: product.external_product_id,
                quantity: item.quantity,
                new_stock: product.stock,
            });
        }
        debug!("🧮️ Restored stock for {} product(s) of order [{order_id}]", restorations.len());
    }

    // 2. Dependent rows, children before parents
    let mut dependents_removed = 0u64;
    dependents_removed += remove_session_memberships(
        order_id,
        "warehouse_session_orders",
        "warehouse_sessions",
        &mut *conn,
    )
    .await?;
    dependents_removed += remove_session_memberships(order_id, "return_session_orders", "return_sessions", &mut *conn).await?;
    for table in ["packing_progress", "settlement_orders", "order_status_history", "followup_logs"] {
        dependents_removed += delete_for_order(table, order_id, &mut *conn).await?;
    }

    // 3. Detach the audit trail
    let movements_detached = inventory::detach_order_movements(order_id, &mut *conn).await?;

    // 4. Purge ledger/queue entries for the external id
    let queue_entries_purged = match &order.external_order_id {
        Some(external_id) => webhooks::purge_for_external_ref(order.store_id, external_id.as_str(), &mut *conn).await?,
        None => 0,
    };

    // 5. The order itself
    sqlx::query("DELETE FROM order_line_items WHERE order_id = $1").bind(order_id).execute(&mut *conn).await?;
    sqlx::query("DELETE FROM orders WHERE id = $1").bind(order_id).execute(&mut *conn).await?;

    info!(
        "🗑️ Order [{order_id}] hard-deleted: {} stock restoration(s), {dependents_removed} dependent row(s), \
         {movements_detached} movement(s) detached",
        restorations.len()
    );
    Ok(CascadeReport {
        order_id,
        store_id: order.store_id,
        external_order_id: order.external_order_id,
        restorations,
        dependents_removed,
        movements_detached,
        queue_entries_purged,
    })
}

/// Removes the order's membership rows from a session table, then removes any parent session left with no members.
async fn remove_session_memberships(
    order_id: i64,
    membership_table: &str,
    parent_table: &str,
    conn: &mut SqliteConnection,
) -> Result<u64, OrderSyncError> {
    let session_ids: Vec<(i64,)> =
        sqlx::query_as(&format!("SELECT session_id FROM {membership_table} WHERE order_id = $1"))
            .bind(order_id)
            .fetch_all(&mut *conn)
            .await?;
    let removed = sqlx::query(&format!("DELETE FROM {membership_table} WHERE order_id = $1"))
        .bind(order_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    let mut total = removed;
    for (session_id,) in session_ids {
        let emptied = sqlx::query(&format!(
            "DELETE FROM {parent_table} WHERE id = $1 AND NOT EXISTS (SELECT 1 FROM {membership_table} WHERE \
             session_id = $1)"
        ))
        .bind(session_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
        if emptied > 0 {
            debug!("🗑️ Removed empty {parent_table} [{session_id}]");
        }
        total += emptied;
    }
    Ok(total)
}

async fn delete_for_order(table: &str, order_id: i64, conn: &mut SqliteConnection) -> Result<u64, OrderSyncError> {
    let result =
        sqlx::query(&format!("DELETE FROM {table} WHERE order_id = $1")).bind(order_id).execute(conn).await?;
    Ok(result.rows_affected())
}
