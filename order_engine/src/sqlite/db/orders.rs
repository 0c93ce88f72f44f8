use chrono::Utc;
use log::debug;
use oms_common::Money;
use sqlx::SqliteConnection;

use crate::{
    db_types::{ExternalOrderId, FulfillmentStatus, LineItem, NewLineItem, NewOrder, Order, OrderStatusEntry},
    traits::OrderSyncError,
};

/// Inserts the order and its line items, returning `false` in the second parameter if an order already exists for
/// the (store, external id) pair. The existence check plus the unique index on that pair is the duplicate-order-on-
/// retry guard. Not atomic on its own: callers embed this inside a transaction and pass `&mut *tx`.
pub async fn idempotent_insert_with_items(
    order: NewOrder,
    items: &[NewLineItem],
    conn: &mut SqliteConnection,
) -> Result<(Order, bool), OrderSyncError> {
    let store_id = order.store_id;
    if let Some(external_id) = &order.external_order_id {
        if let Some(existing) = fetch_order_by_external_id(store_id, external_id, &mut *conn).await? {
            return Ok((existing, false));
        }
    }
    let order = match insert_order(order, &mut *conn).await {
        Ok(order) => order,
        // Lost an insert race between the existence check and here; the winner's row is the order.
        Err(OrderSyncError::OrderAlreadyExists(external_id)) => {
            let existing = fetch_order_by_external_id(store_id, &external_id, &mut *conn)
                .await?
                .ok_or_else(|| OrderSyncError::DatabaseError("order vanished after conflicting insert".to_string()))?;
            return Ok((existing, false));
        },
        Err(e) => return Err(e),
    };
    for item in items {
        insert_line_item(order.id, item, &mut *conn).await?;
    }
    debug!("📦️ Order [{}] inserted with {} line item(s)", order.id, items.len());
    Ok((order, true))
}

async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, OrderSyncError> {
    let external_id = order.external_order_id.clone();
    let order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                store_id,
                external_order_id,
                customer_id,
                status,
                total_price,
                shipping_cost,
                currency,
                payment_gateway,
                shipping_address,
                shipping_city,
                shipping_zip,
                shipping_country,
                external_created_at
            ) VALUES ($1, $2, $3, 'pending', $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *;
        "#,
    )
    .bind(order.store_id)
    .bind(order.external_order_id)
    .bind(order.customer_id)
    .bind(order.total_price.value())
    .bind(order.shipping_cost.value())
    .bind(order.currency)
    .bind(order.payment_gateway)
    .bind(order.shipping_address)
    .bind(order.shipping_city)
    .bind(order.shipping_zip)
    .bind(order.shipping_country)
    .bind(order.external_created_at)
    .fetch_one(conn)
    .await
    .map_err(|e| match (&e, &external_id) {
        (sqlx::Error::Database(de), Some(id)) if de.is_unique_violation() => {
            OrderSyncError::OrderAlreadyExists(id.clone())
        },
        _ => OrderSyncError::from(e),
    })?;
    // The DB trigger writes the initial status history entry.
    Ok(order)
}

async fn insert_line_item(
    order_id: i64,
    item: &NewLineItem,
    conn: &mut SqliteConnection,
) -> Result<LineItem, OrderSyncError> {
    let item = sqlx::query_as(
        r#"
            INSERT INTO order_line_items
                (order_id, product_id, quantity, unit_price, external_product_id, external_variant_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(item.product_id)
    .bind(item.quantity)
    .bind(item.unit_price.value())
    .bind(&item.external_product_id)
    .bind(&item.external_variant_id)
    .fetch_one(conn)
    .await?;
    Ok(item)
}

pub async fn fetch_order_by_external_id(
    store_id: i64,
    external_id: &ExternalOrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE store_id = $1 AND external_order_id = $2")
        .bind(store_id)
        .bind(external_id.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn fetch_order_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_line_items(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<LineItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM order_line_items WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// The timestamped status transition history for an order, oldest first. Rows are written by the DB trigger on
/// insert and on every status change.
pub async fn fetch_status_history(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderStatusEntry>, sqlx::Error> {
    let rows = sqlx::query_as("SELECT * FROM order_status_history WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(rows)
}

pub(crate) async fn update_order_status(
    id: i64,
    status: FulfillmentStatus,
    conn: &mut SqliteConnection,
) -> Result<Order, OrderSyncError> {
    let status = status.to_string();
    let result: Option<Order> =
        sqlx::query_as("UPDATE orders SET status = $1, updated_at = $2 WHERE id = $3 RETURNING *")
            .bind(status)
            .bind(Utc::now())
            .bind(id)
            .fetch_optional(conn)
            .await?;
    result.ok_or(OrderSyncError::OrderNotFound(id))
}

pub(crate) async fn update_order_totals(
    id: i64,
    total_price: Money,
    shipping_cost: Money,
    conn: &mut SqliteConnection,
) -> Result<Order, OrderSyncError> {
    let result: Option<Order> = sqlx::query_as(
        "UPDATE orders SET total_price = $1, shipping_cost = $2, updated_at = $3 WHERE id = $4 RETURNING *",
    )
    .bind(total_price.value())
    .bind(shipping_cost.value())
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(conn)
    .await?;
    result.ok_or(OrderSyncError::OrderNotFound(id))
}

/// Soft delete: a non-destructive marker. Deliberately does NOT invoke the cascade; the order and all its
/// dependents stay in place.
pub(crate) async fn soft_delete(id: i64, conn: &mut SqliteConnection) -> Result<Order, OrderSyncError> {
    let result: Option<Order> =
        sqlx::query_as("UPDATE orders SET deleted_at = $1, updated_at = $1 WHERE id = $2 RETURNING *")
            .bind(Utc::now())
            .bind(id)
            .fetch_optional(conn)
            .await?;
    result.ok_or(OrderSyncError::OrderNotFound(id))
}
