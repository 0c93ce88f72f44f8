//! Order Sync Engine
//!
//! The order sync engine keeps a merchant's local order/inventory database consistent with the asynchronous change
//! notifications pushed by the e-commerce platform the storefront runs on. This library contains the core logic and
//! is HTTP-framework agnostic.
//!
//! The library is divided into two main sections:
//! 1. Database management and control ([`mod@sqlite`]). SQLite is the supported backend. You should never need to
//!    access the database directly; use the public APIs instead. The exception is the data types used in the
//!    database, defined in the `db_types` module, which are public.
//! 2. The engine public API ([`mod@oms_api`]): notification ingestion (idempotency ledger + durable queue), the
//!    dispatcher/retry engine, the order normalizer, and the administrative surface including the cascading hard
//!    delete. Backends implement the traits in [`mod@traits`] to power these APIs.
//!
//! The engine also emits events (order created, order deleted, stock adjusted) through a small hook system so that
//! callers — most importantly the inventory sync bridge — can react without the engine depending on them.
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod oms_api;
pub mod storefront_types;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;

pub use oms_api::{
    dispatcher::{DispatcherApi, DispatchReport, DEFAULT_BATCH_SIZE, DEFAULT_STALE_AFTER_MINUTES},
    errors::HandlerError,
    normalizer::NormalizerOutcome,
    order_admin_api::OrderAdminApi,
    webhook_flow_api::{IncomingNotification, WebhookFlowApi, DEFAULT_EXPIRY_HOURS},
};
pub use traits::{CascadeReport, IngestOutcome, OrderSyncDatabase, OrderSyncError, StockRestoration};
