//! Behaviour contracts for order sync backends.
//!
//! A concrete database (SQLite in this workspace) implements [`OrderSyncDatabase`] to act as the storage layer for
//! the webhook pipeline. The APIs in [`crate::oms_api`] are written against this trait, not against SQLite.
mod data_objects;
mod order_sync_database;

pub use data_objects::{CascadeReport, IngestOutcome, StockRestoration};
pub use order_sync_database::{OrderSyncDatabase, OrderSyncError};
