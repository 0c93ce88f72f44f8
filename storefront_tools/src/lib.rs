//! Client for the platform's Admin REST API, plus the inventory sync bridge that pushes local stock levels back to
//! the storefront in small rate-limited batches.
mod api;
mod config;
mod error;
mod sync;

mod data_objects;

pub use api::StorefrontApi;
pub use config::StorefrontConfig;
pub use data_objects::{InventoryLevel, Location, NewWebhook, ProductVariant, StorefrontProduct, Webhook};
pub use error::StorefrontApiError;
pub use sync::{InventorySyncBridge, StockSyncRequest, SyncReport, SyncWarning, SYNC_CALL_DELAY};
