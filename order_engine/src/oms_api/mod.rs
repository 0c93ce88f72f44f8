//! The public-facing APIs of the order sync engine.
//!
//! Each API is generic over an [`crate::traits::OrderSyncDatabase`] backend:
//! * [`webhook_flow_api::WebhookFlowApi`] — ingestion of verified notifications (ledger check + enqueue).
//! * [`dispatcher::DispatcherApi`] — the retry engine that drains the queue and applies notifications.
//! * [`normalizer`] — maps platform order payloads onto the local data model.
//! * [`order_admin_api::OrderAdminApi`] — operator actions, most importantly the cascading hard delete.
pub mod dispatcher;
pub mod errors;
pub mod normalizer;
pub mod order_admin_api;
pub mod webhook_flow_api;
