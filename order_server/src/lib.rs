//! # Order sync server
//! This module hosts the HTTP surface of the order sync service. It is responsible for:
//! Listening for incoming webhook notifications from the storefront platform.
//! Verifying each delivery's signature against the integration's shared secret.
//! Handing verified notifications to the ingestion pipeline and acknowledging fast.
//! Running the background dispatch/maintenance worker and the admin surface.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod dispatch_worker;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod webhook_routes;

#[cfg(test)]
mod endpoint_tests;
