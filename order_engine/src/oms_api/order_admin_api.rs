use log::*;

use crate::{
    db_types::{LineItem, Order, WebhookNotification},
    events::{EventPublishers, OrderDeletedEvent, StockAdjustedEvent},
    traits::{CascadeReport, OrderSyncDatabase, OrderSyncError},
};

/// Operator-facing actions: the cascading hard delete, the soft-delete flag, and the failed-notification surface.
pub struct OrderAdminApi<B> {
    db: B,
    publishers: EventPublishers,
}

impl<B> OrderAdminApi<B> {
    pub fn new(db: B, publishers: EventPublishers) -> Self {
        Self { db, publishers }
    }
}

impl<B> OrderAdminApi<B>
where B: OrderSyncDatabase
{
    /// Hard-deletes an order. The cascade (stock restoration, dependent-row removal, movement detachment,
    /// queue/ledger purge) runs inside the same transaction as the delete; this either fully succeeds or leaves
    /// the order untouched. Events fire only after the commit, so subscribers never observe a rolled-back state.
    pub async fn delete_order(&self, order_id: i64) -> Result<CascadeReport, OrderSyncError> {
        let report = self.db.delete_order_with_cascade(order_id).await?;
        for restoration in &report.restorations {
            for publisher in &self.publishers.stock_adjusted {
                publisher
                    .publish(StockAdjustedEvent {
                        product_id: restoration.product_id,
                        store_id: restoration.store_id,
                        external_product_id: restoration.external_product_id.clone(),
                        new_stock: restoration.new_stock,
                    })
                    .await;
            }
        }
        for publisher in &self.publishers.order_deleted {
            publisher.publish(OrderDeletedEvent { report: report.clone() }).await;
        }
        info!(
            "🗑️ Order [{order_id}] deleted. {} product(s) restored, {} dependent row(s) removed",
            report.restorations.len(),
            report.dependents_removed
        );
        Ok(report)
    }

    /// Fulfillment status transition. Warehouse tooling is the usual caller; the status history entry is written
    /// by the database trigger.
    pub async fn set_order_status(
        &self,
        order_id: i64,
        status: crate::db_types::FulfillmentStatus,
    ) -> Result<Order, OrderSyncError> {
        let order = self.db.set_order_status(order_id, status).await?;
        debug!("📦️ Order [{order_id}] moved to status {status}");
        Ok(order)
    }

    /// Soft delete: flips the marker and nothing else. No cascade runs.
    pub async fn soft_delete_order(&self, order_id: i64) -> Result<Order, OrderSyncError> {
        let order = self.db.soft_delete_order(order_id).await?;
        debug!("🗑️ Order [{order_id}] soft-deleted");
        Ok(order)
    }

    /// Terminally failed notifications with their last error text, for manual operator intervention.
    pub async fn failed_notifications(&self, limit: i64) -> Result<Vec<WebhookNotification>, OrderSyncError> {
        self.db.fetch_failed_notifications(limit).await
    }

    pub async fn order_details(&self, order_id: i64) -> Result<Option<(Order, Vec<LineItem>)>, OrderSyncError> {
        match self.db.fetch_order_by_id(order_id).await? {
            Some(order) => {
                let items = self.db.fetch_line_items(order_id).await?;
                Ok(Some((order, items)))
            },
            None => Ok(None),
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
