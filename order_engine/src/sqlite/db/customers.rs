use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Customer, NewCustomer},
    traits::OrderSyncError,
};

/// Looks up a customer by (store, email), creating one if none exists. The UNIQUE constraint makes the insert safe
/// under concurrent creates; the loser of the race falls through to the re-select.
pub async fn fetch_or_create(
    customer: NewCustomer,
    conn: &mut SqliteConnection,
) -> Result<Customer, OrderSyncError> {
    if let Some(existing) = fetch_by_email(customer.store_id, &customer.email, &mut *conn).await? {
        return Ok(existing);
    }
    let inserted: Option<Customer> = sqlx::query_as(
        r#"
            INSERT INTO customers (store_id, email, first_name, last_name)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (store_id, email) DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(customer.store_id)
    .bind(&customer.email)
    .bind(&customer.first_name)
    .bind(&customer.last_name)
    .fetch_optional(&mut *conn)
    .await?;
    match inserted {
        Some(c) => {
            debug!("👤️ Customer [{}] created for store {}", c.id, c.store_id);
            Ok(c)
        },
        // Lost a concurrent insert race; the row exists now.
        None => fetch_by_email(customer.store_id, &customer.email, conn)
            .await?
            .ok_or_else(|| OrderSyncError::DatabaseError("customer vanished after conflicting insert".to_string())),
    }
}

pub async fn fetch_by_email(
    store_id: i64,
    email: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Customer>, OrderSyncError> {
    let customer = sqlx::query_as("SELECT * FROM customers WHERE store_id = $1 AND email = $2")
        .bind(store_id)
        .bind(email)
        .fetch_optional(conn)
        .await?;
    Ok(customer)
}
