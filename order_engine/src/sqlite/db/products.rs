use chrono::Utc;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewProduct, Product},
    traits::OrderSyncError,
};

/// The product directory lookup: resolve an external reference to a local product. A variant match is preferred
/// over a product-level match; `None` is the recognised unmapped (degraded) outcome, never an error.
pub async fn lookup_by_external_ref(
    store_id: i64,
    external_product_id: Option<&str>,
    external_variant_id: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, OrderSyncError> {
    if let Some(variant) = external_variant_id {
        let hit: Option<Product> =
            sqlx::query_as("SELECT * FROM products WHERE store_id = $1 AND external_variant_id = $2")
                .bind(store_id)
                .bind(variant)
                .fetch_optional(&mut *conn)
                .await?;
        if hit.is_some() {
            return Ok(hit);
        }
    }
    match external_product_id {
        Some(product) => {
            let hit = sqlx::query_as("SELECT * FROM products WHERE store_id = $1 AND external_product_id = $2")
                .bind(store_id)
                .bind(product)
                .fetch_optional(conn)
                .await?;
            Ok(hit)
        },
        None => Ok(None),
    }
}

pub async fn fetch_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, OrderSyncError> {
    let product = sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(product)
}

/// Applies a signed stock delta and returns the updated product.
pub async fn adjust_stock(id: i64, delta: i64, conn: &mut SqliteConnection) -> Result<Product, OrderSyncError> {
    let result: Option<Product> =
        sqlx::query_as("UPDATE products SET stock = stock + $1, updated_at = $2 WHERE id = $3 RETURNING *")
            .bind(delta)
            .bind(Utc::now())
            .bind(id)
            .fetch_optional(conn)
            .await?;
    result.ok_or(OrderSyncError::ProductNotFound(id))
}

pub async fn insert(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, OrderSyncError> {
    let result = sqlx::query_as(
        r#"
            INSERT INTO products
                (store_id, name, sku, external_product_id, external_variant_id, stock, cost_base, cost_packaging,
                 cost_additional)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *;
        "#,
    )
    .bind(product.store_id)
    .bind(product.name)
    .bind(product.sku)
    .bind(product.external_product_id)
    .bind(product.external_variant_id)
    .bind(product.stock)
    .bind(product.cost_base.value())
    .bind(product.cost_packaging.value())
    .bind(product.cost_additional.value())
    .fetch_one(conn)
    .await?;
    Ok(result)
}
