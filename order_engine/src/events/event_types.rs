use crate::{
    db_types::Order,
    traits::CascadeReport,
};

#[derive(Debug, Clone)]
pub struct OrderCreatedEvent {
    pub order: Order,
}

#[derive(Debug, Clone)]
pub struct OrderDeletedEvent {
    pub report: CascadeReport,
}

/// Emitted after a local stock mutation has committed. Consumers propagate the new level to the platform
/// best-effort; local state is already authoritative by the time this fires.
#[derive(Debug, Clone)]
pub struct StockAdjustedEvent {
    pub product_id: i64,
    pub store_id: i64,
    pub external_product_id: Option<String>,
    pub new_stock: i64,
}
