//! `SqliteDatabase` is a concrete implementation of an order sync backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module. Transaction boundaries live here: the low-level functions in [`super::db`] run against whatever
//! connection they are handed, and this type decides which calls get wrapped together atomically.
use std::fmt::Debug;

use chrono::Duration;
use log::*;
use oms_common::Money;
use sqlx::SqlitePool;

use super::db::{cascade, customers, db_url, idempotency, integrations, inventory, new_pool, orders, products, webhooks};
use crate::{
    db_types::{
        Customer,
        ExternalOrderId,
        FulfillmentStatus,
        Integration,
        LineItem,
        NewCustomer,
        NewIntegration,
        NewLineItem,
        NewOrder,
        NewProduct,
        NewWebhookNotification,
        ObserveResult,
        Order,
        Product,
        WebhookNotification,
    },
    traits::{CascadeReport, OrderSyncDatabase, OrderSyncError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database connection pool using the `OMS_DATABASE_URL` environment variable, or the default.
    pub async fn new(max_connections: u32) -> Result<Self, OrderSyncError> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, OrderSyncError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl OrderSyncDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn fetch_integration_by_domain(&self, domain: &str) -> Result<Option<Integration>, OrderSyncError> {
        let mut conn = self.pool.acquire().await?;
        let integration = integrations::fetch_by_domain(domain, &mut conn).await?;
        Ok(integration)
    }

    async fn upsert_integration(&self, integration: NewIntegration) -> Result<Integration, OrderSyncError> {
        let mut conn = self.pool.acquire().await?;
        integrations::upsert(integration, &mut conn).await
    }

    async fn revoke_integration(&self, domain: &str) -> Result<u64, OrderSyncError> {
        let mut conn = self.pool.acquire().await?;
        integrations::revoke(domain, &mut conn).await
    }

    async fn observe_event(
        &self,
        event_id: &str,
        integration_id: i64,
        horizon: Duration,
    ) -> Result<ObserveResult, OrderSyncError> {
        let mut conn = self.pool.acquire().await?;
        idempotency::observe(event_id, integration_id, horizon, &mut conn).await
    }

    async fn prune_idempotency_ledger(&self) -> Result<u64, OrderSyncError> {
        let mut conn = self.pool.acquire().await?;
        idempotency::prune_expired(&mut conn).await
    }

    async fn enqueue_notification(
        &self,
        notification: NewWebhookNotification,
    ) -> Result<Option<WebhookNotification>, OrderSyncError> {
        let mut conn = self.pool.acquire().await?;
        webhooks::enqueue(notification, &mut conn).await
    }

    async fn fetch_due_notifications(&self, limit: i64) -> Result<Vec<WebhookNotification>, OrderSyncError> {
        let mut conn = self.pool.acquire().await?;
        webhooks::fetch_due(limit, &mut conn).await
    }

    async fn lease_notification(&self, id: i64) -> Result<bool, OrderSyncError> {
        let mut conn = self.pool.acquire().await?;
        webhooks::lease(id, &mut conn).await
    }

    async fn mark_notification_succeeded(&self, id: i64) -> Result<WebhookNotification, OrderSyncError> {
        let mut conn = self.pool.acquire().await?;
        webhooks::mark_succeeded(id, &mut conn).await
    }

    async fn mark_notification_failed(&self, id: i64, error: &str) -> Result<WebhookNotification, OrderSyncError> {
        let mut conn = self.pool.acquire().await?;
        webhooks::mark_failed(id, error, &mut conn).await
    }

    async fn record_failed_attempt(&self, id: i64, error: &str) -> Result<WebhookNotification, OrderSyncError> {
        let mut tx = self.pool.begin().await?;
        let notification = webhooks::record_failed_attempt(id, error, &mut tx).await?;
        tx.commit().await?;
        Ok(notification)
    }

    async fn reset_stale_notifications(&self, older_than: Duration) -> Result<u64, OrderSyncError> {
        let mut conn = self.pool.acquire().await?;
        webhooks::reset_stale(older_than, &mut conn).await
    }

    async fn fetch_failed_notifications(&self, limit: i64) -> Result<Vec<WebhookNotification>, OrderSyncError> {
        let mut conn = self.pool.acquire().await?;
        webhooks::fetch_failed(limit, &mut conn).await
    }

    /// Order plus line items land in one transaction: a mid-failure can never leave an order without its items.
    async fn insert_order_with_items(
        &self,
        order: NewOrder,
        items: Vec<NewLineItem>,
    ) -> Result<(Order, bool), OrderSyncError> {
        let mut tx = self.pool.begin().await?;
        let (order, inserted) = orders::idempotent_insert_with_items(order, &items, &mut tx).await?;
        tx.commit().await?;
        if inserted {
            debug!("🗃️ Order {} saved with id {}", order.external_order_id.as_ref().map(|i| i.to_string()).unwrap_or_default(), order.id);
        }
        Ok((order, inserted))
    }

    async fn fetch_order_by_external_id(
        &self,
        store_id: i64,
        external_id: &ExternalOrderId,
    ) -> Result<Option<Order>, OrderSyncError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_external_id(store_id, external_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_id(&self, id: i64) -> Result<Option<Order>, OrderSyncError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_id(id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_line_items(&self, order_id: i64) -> Result<Vec<LineItem>, OrderSyncError> {
        let mut conn = self.pool.acquire().await?;
        let items = orders::fetch_line_items(order_id, &mut conn).await?;
        Ok(items)
    }

    async fn update_order_totals(
        &self,
        order_id: i64,
        total_price: Money,
        shipping_cost: Money,
    ) -> Result<Order, OrderSyncError> {
        let mut conn = self.pool.acquire().await?;
        orders::update_order_totals(order_id, total_price, shipping_cost, &mut conn).await
    }

    async fn set_order_status(&self, order_id: i64, status: FulfillmentStatus) -> Result<Order, OrderSyncError> {
        let mut conn = self.pool.acquire().await?;
        orders::update_order_status(order_id, status, &mut conn).await
    }

    async fn soft_delete_order(&self, order_id: i64) -> Result<Order, OrderSyncError> {
        let mut conn = self.pool.acquire().await?;
        orders::soft_delete(order_id, &mut conn).await
    }

    async fn fetch_or_create_customer(&self, customer: NewCustomer) -> Result<Customer, OrderSyncError> {
        let mut conn = self.pool.acquire().await?;
        customers::fetch_or_create(customer, &mut conn).await
    }

    async fn lookup_product_by_external_ref(
        &self,
        store_id: i64,
        external_product_id: Option<&str>,
        external_variant_id: Option<&str>,
    ) -> Result<Option<Product>, OrderSyncError> {
        let mut conn = self.pool.acquire().await?;
        products::lookup_by_external_ref(store_id, external_product_id, external_variant_id, &mut conn).await
    }

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, OrderSyncError> {
        let mut conn = self.pool.acquire().await?;
        products::fetch_by_id(product_id, &mut conn).await
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product, OrderSyncError> {
        let mut conn = self.pool.acquire().await?;
        products::insert(product, &mut conn).await
    }

    /// The whole cascade shares one transaction with the delete itself. Any error aborts everything; there is no
    /// observable partial state.
    async fn delete_order_with_cascade(&self, order_id: i64) -> Result<CascadeReport, OrderSyncError> {
        let mut tx = self.pool.begin().await?;
        let report = cascade::delete_order_with_cascade(order_id, &mut tx).await?;
        tx.commit().await?;
        Ok(report)
    }
}

//--------------------------------------- Helper methods for workers/tests -------------------------------------------
impl SqliteDatabase {
    /// Fetch a single product's inventory movements. Mostly useful for audit inspection and tests.
    pub async fn movements_for_product(
        &self,
        product_id: i64,
    ) -> Result<Vec<crate::db_types::InventoryMovement>, OrderSyncError> {
        let mut conn = self.pool.acquire().await?;
        inventory::fetch_movements_for_product(product_id, &mut conn).await
    }

    pub async fn fetch_notification(&self, id: i64) -> Result<Option<WebhookNotification>, OrderSyncError> {
        let mut conn = self.pool.acquire().await?;
        webhooks::fetch_by_id(id, &mut conn).await
    }

    pub async fn status_history_for_order(
        &self,
        order_id: i64,
    ) -> Result<Vec<crate::db_types::OrderStatusEntry>, OrderSyncError> {
        let mut conn = self.pool.acquire().await?;
        let rows = orders::fetch_status_history(order_id, &mut conn).await?;
        Ok(rows)
    }
}
