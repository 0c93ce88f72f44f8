//! Wires engine events to the platform client.
//!
//! The engine publishes a `StockAdjustedEvent` after a stock mutation commits locally. The handler built here
//! pushes the new level through the inventory sync bridge — best-effort, local-first: a platform failure is logged
//! and the local state stays authoritative.
use futures::future::BoxFuture;
use log::*;
use order_engine::events::{EventHandlers, EventHooks};
use storefront_tools::{InventorySyncBridge, StorefrontApi, StorefrontApiError, StorefrontConfig, StockSyncRequest};

pub const STOREFRONT_EVENT_BUFFER_SIZE: usize = 25;

/// Assigns event handlers that talk to the platform API.
///
/// Only `StockAdjustedEvent` is relevant here: when the cascade restores stock (or any other local mutation
/// adjusts it), the new absolute level is propagated to the storefront. Unmapped products are skipped inside the
/// bridge and surface as warnings in its report.
pub fn create_storefront_event_handlers(config: StorefrontConfig) -> Result<EventHandlers, StorefrontApiError> {
    let mut hooks = EventHooks::default();
    let api = StorefrontApi::new(config)?;
    let bridge = InventorySyncBridge::new(api);
    hooks.on_stock_adjusted(move |ev| {
        let bridge = bridge.clone();
        debug!("🛍️ Stock for product [{}] changed to {}; pushing to the platform", ev.product_id, ev.new_stock);
        let request = StockSyncRequest {
            product_id: ev.product_id,
            external_product_id: ev.external_product_id,
            new_stock: ev.new_stock,
        };
        boxed(async move {
            let report = bridge.sync_stock_levels(&[request]).await;
            for warning in &report.warnings {
                warn!("🛍️ Stock push warning for product [{}]: {}", warning.product_id, warning.message);
            }
        })
    });
    Ok(EventHandlers::new(STOREFRONT_EVENT_BUFFER_SIZE, hooks))
}

fn boxed<F: std::future::Future<Output = ()> + Send + 'static>(f: F) -> BoxFuture<'static, ()> {
    Box::pin(f)
}
