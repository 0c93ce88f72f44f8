use chrono::Duration;
use oms_common::Money;
use thiserror::Error;

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
    traits::CascadeReport,
};

/// This trait defines the highest level of behaviour for backends supporting the order sync engine.
///
/// This behaviour includes:
/// * The idempotency ledger (atomic observe + pruning).
/// * The durable notification queue with its lease/retry state machine.
/// * Order, customer and product storage used by the normalizer.
/// * The cascading hard-delete that keeps derived records and inventory consistent.
#[allow(async_fn_in_trait)]
pub trait OrderSyncDatabase: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    //----------------------------------- Integrations -----------------------------------

    async fn fetch_integration_by_domain(&self, domain: &str) -> Result<Option<Integration>, OrderSyncError>;

    /// Registers (or re-activates) an integration for a shop domain. Idempotent on the domain.
    async fn upsert_integration(&self, integration: NewIntegration) -> Result<Integration, OrderSyncError>;

    /// Marks the integration revoked. Pending notifications for it will terminally fail at dispatch time.
    async fn revoke_integration(&self, domain: &str) -> Result<u64, OrderSyncError>;

    //----------------------------------- Idempotency ledger -----------------------------------

    /// Atomically claims an event id. The insert and the new-vs-duplicate decision are a single statement; there is
    /// no read-then-write window. An expired record is reclaimed and reported as `New`.
    async fn observe_event(
        &self,
        event_id: &str,
        integration_id: i64,
        horizon: Duration,
    ) -> Result<ObserveResult, OrderSyncError>;

    /// Deletes expired ledger rows. Returns the number pruned.
    async fn prune_idempotency_ledger(&self) -> Result<u64, OrderSyncError>;

    //----------------------------------- Notification queue -----------------------------------

    /// Inserts a notification in `Pending` state with `next_attempt_at = now`. Returns `None` when the
    /// (integration, idempotency key) pair is already queued.
    async fn enqueue_notification(
        &self,
        notification: NewWebhookNotification,
    ) -> Result<Option<WebhookNotification>, OrderSyncError>;

    /// Due pending notifications, oldest first, bounded by `limit`.
    async fn fetch_due_notifications(&self, limit: i64) -> Result<Vec<WebhookNotification>, OrderSyncError>;

    /// Takes the processing lease on a notification. `false` means a concurrent dispatcher won the race.
    async fn lease_notification(&self, id: i64) -> Result<bool, OrderSyncError>;

    async fn mark_notification_succeeded(&self, id: i64) -> Result<WebhookNotification, OrderSyncError>;

    /// Terminal failure; does not consume further attempts.
    async fn mark_notification_failed(&self, id: i64, error: &str) -> Result<WebhookNotification, OrderSyncError>;

    /// Records a transient failure: bumps the attempt counter and either reschedules with backoff or, at the
    /// ceiling, terminally fails the notification.
    async fn record_failed_attempt(&self, id: i64, error: &str) -> Result<WebhookNotification, OrderSyncError>;

    /// Returns notifications stuck in `Processing` beyond the threshold to `Pending` (abandoned by a crashed
    /// worker). Returns the number reset.
    async fn reset_stale_notifications(&self, older_than: Duration) -> Result<u64, OrderSyncError>;

    async fn fetch_failed_notifications(&self, limit: i64) -> Result<Vec<WebhookNotification>, OrderSyncError>;

    //----------------------------------- Orders / customers / products -----------------------------------

    /// Takes a new order with its line items and, in a single atomic transaction, stores all of it.
    /// This call is idempotent on (store, external order id): if the order already exists nothing is written and
    /// the second tuple element is `false`.
    async fn insert_order_with_items(
        &self,
        order: NewOrder,
        items: Vec<NewLineItem>,
    ) -> Result<(Order, bool), OrderSyncError>;

    async fn fetch_order_by_external_id(
        &self,
        store_id: i64,
        external_id: &ExternalOrderId,
    ) -> Result<Option<Order>, OrderSyncError>;

    async fn fetch_order_by_id(&self, id: i64) -> Result<Option<Order>, OrderSyncError>;

    async fn fetch_line_items(&self, order_id: i64) -> Result<Vec<LineItem>, OrderSyncError>;

    async fn update_order_totals(
        &self,
        order_id: i64,
        total_price: Money,
        shipping_cost: Money,
    ) -> Result<Order, OrderSyncError>;

    /// Fulfillment status transition, driven by warehouse operations. The DB records a timestamped history entry
    /// per transition.
    async fn set_order_status(&self, order_id: i64, status: FulfillmentStatus) -> Result<Order, OrderSyncError>;

    /// Flags the order as soft-deleted. A status flag only: no cascade runs and nothing else is touched.
    async fn soft_delete_order(&self, order_id: i64) -> Result<Order, OrderSyncError>;

    async fn fetch_or_create_customer(&self, customer: NewCustomer) -> Result<Customer, OrderSyncError>;

    /// The product directory lookup: resolve an external product/variant reference to a local product.
    async fn lookup_product_by_external_ref(
        &self,
        store_id: i64,
        external_product_id: Option<&str>,
        external_variant_id: Option<&str>,
    ) -> Result<Option<Product>, OrderSyncError>;

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, OrderSyncError>;

    async fn insert_product(&self, product: NewProduct) -> Result<Product, OrderSyncError>;

    //----------------------------------- Cascading hard delete -----------------------------------

    /// Hard-deletes an order and, inside the same transaction: restores consumed stock with audit movements,
    /// removes dependent rows (children before parents, empty groupings included), detaches inventory movements,
    /// and purges queue/ledger entries for the order's external id. Any failure aborts the whole transaction.
    async fn delete_order_with_cascade(&self, order_id: i64) -> Result<CascadeReport, OrderSyncError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), OrderSyncError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum OrderSyncError {
    #[error("We have an internal database engine error (configuration/uptime etc.): {0}")]
    DatabaseError(String),
    #[error("No integration is registered for shop domain {0}")]
    IntegrationNotFound(String),
    #[error("The integration for shop domain {0} has been revoked")]
    IntegrationRevoked(String),
    #[error("Cannot insert order, since it already exists with external id {0}")]
    OrderAlreadyExists(ExternalOrderId),
    #[error("The requested order (internal id {0}) does not exist")]
    OrderNotFound(i64),
    #[error("The requested notification (id {0}) does not exist")]
    NotificationNotFound(i64),
    #[error("The requested product (id {0}) does not exist")]
    ProductNotFound(i64),
    #[error("The notification payload is invalid. {0}")]
    InvalidPayload(String),
    #[error("Notification {0} is not in the expected state for this transition")]
    IllegalStateTransition(i64),
}

impl From<sqlx::Error> for OrderSyncError {
    fn from(e: sqlx::Error) -> Self {
        OrderSyncError::DatabaseError(e.to_string())
    }
}
