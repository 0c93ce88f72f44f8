use serde::Serialize;

use crate::db_types::ExternalOrderId;

/// One product whose stock was restored by a cascading order delete.
#[derive(Debug, Clone, Serialize)]
pub struct StockRestoration {
    pub product_id: i64,
    pub store_id: i64,
    /// The platform-side product reference, when the product is mapped; lets the sync bridge push the new level.
    pub external_product_id: Option<String>,
    pub quantity: i64,
    pub new_stock: i64,
}

/// Summary of a cascading hard delete, returned to the caller and fed into the stock-adjusted event hooks.
#[derive(Debug, Clone, Serialize)]
pub struct CascadeReport {
    pub order_id: i64,
    pub store_id: i64,
    pub external_order_id: Option<ExternalOrderId>,
    pub restorations: Vec<StockRestoration>,
    pub dependents_removed: u64,
    pub movements_detached: u64,
    pub queue_entries_purged: u64,
}

/// Outcome of ingesting a verified notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The notification was new and is now queued under the given id.
    Enqueued(i64),
    /// The idempotency ledger (or the queue's uniqueness constraint) has seen this event before.
    Duplicate,
}
