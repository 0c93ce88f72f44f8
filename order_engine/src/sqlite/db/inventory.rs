use sqlx::SqliteConnection;

use crate::{
    db_types::{InventoryMovement, NewInventoryMovement},
    traits::OrderSyncError,
};

/// Appends a row to the stock ledger. Movements are never updated or deleted; the ledger is the audit trail for
/// every stock change in the system.
pub async fn append_movement(
    movement: NewInventoryMovement,
    conn: &mut SqliteConnection,
) -> Result<InventoryMovement, OrderSyncError> {
    let result = sqlx::query_as(
        r#"
            INSERT INTO inventory_movements (product_id, store_id, order_id, movement_type, quantity_delta, reason)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(movement.product_id)
    .bind(movement.store_id)
    .bind(movement.order_id)
    .bind(movement.movement_type.to_string())
    .bind(movement.quantity_delta)
    .bind(movement.reason)
    .fetch_one(conn)
    .await?;
    Ok(result)
}

/// Detaches all movements referencing an order (sets the order reference to NULL). Called from the delete cascade
/// so the append-only invariant survives order removal.
pub async fn detach_order_movements(order_id: i64, conn: &mut SqliteConnection) -> Result<u64, OrderSyncError> {
    let result = sqlx::query("UPDATE inventory_movements SET order_id = NULL WHERE order_id = $1")
        .bind(order_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

pub async fn fetch_movements_for_product(
    product_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<InventoryMovement>, OrderSyncError> {
    let rows = sqlx::query_as("SELECT * FROM inventory_movements WHERE product_id = $1 ORDER BY id ASC")
        .bind(product_id)
        .fetch_all(conn)
        .await?;
    Ok(rows)
}
