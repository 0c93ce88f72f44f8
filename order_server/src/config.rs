use std::env;

use chrono::Duration;
use log::*;
use oms_common::parse_boolean_flag;
use storefront_tools::StorefrontConfig;

const DEFAULT_OMS_HOST: &str = "127.0.0.1";
const DEFAULT_OMS_PORT: u16 = 8570;
const DEFAULT_DISPATCH_INTERVAL_SECS: u64 = 30;
const DEFAULT_DISPATCH_BATCH_SIZE: i64 = order_engine::DEFAULT_BATCH_SIZE;
const DEFAULT_STALE_AFTER_MINUTES: i64 = order_engine::DEFAULT_STALE_AFTER_MINUTES;

/// Transport header carrying the shop domain of the sending integration.
pub const SHOP_DOMAIN_HEADER: &str = "X-Storefront-Shop-Domain";
/// Transport header carrying the HMAC signature over the raw body.
pub const SIGNATURE_HEADER: &str = "X-Storefront-Hmac-SHA256";
/// Transport header carrying the platform's unique event id (the idempotency key).
pub const EVENT_ID_HEADER: &str = "X-Storefront-Event-Id";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Seconds between background dispatch cycles.
    pub dispatch_interval_secs: u64,
    /// Due notifications processed per cycle.
    pub dispatch_batch_size: i64,
    /// A notification stuck in `Processing` longer than this is treated as abandoned and re-queued.
    pub stale_after: Duration,
    /// When false, webhook signature checks are skipped. Local development only.
    pub signature_checks: bool,
    /// When false, restored stock levels are not pushed back to the platform.
    pub inventory_sync_enabled: bool,
    /// Platform API configuration for the sync bridge.
    pub storefront_config: StorefrontConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_OMS_HOST.to_string(),
            port: DEFAULT_OMS_PORT,
            database_url: String::default(),
            dispatch_interval_secs: DEFAULT_DISPATCH_INTERVAL_SECS,
            dispatch_batch_size: DEFAULT_DISPATCH_BATCH_SIZE,
            stale_after: Duration::minutes(DEFAULT_STALE_AFTER_MINUTES),
            signature_checks: true,
            inventory_sync_enabled: true,
            storefront_config: StorefrontConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("OMS_HOST").ok().unwrap_or_else(|| DEFAULT_OMS_HOST.into());
        let port = env::var("OMS_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!("🪛️ {s} is not a valid port for OMS_PORT. {e} Using the default, {DEFAULT_OMS_PORT}, instead.");
                    DEFAULT_OMS_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_OMS_PORT);
        let database_url = env::var("OMS_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ OMS_DATABASE_URL is not set. Please set it to the URL for the order sync database.");
            String::default()
        });
        let dispatch_interval_secs = parse_env_number("OMS_DISPATCH_INTERVAL", DEFAULT_DISPATCH_INTERVAL_SECS);
        let dispatch_batch_size = parse_env_number("OMS_DISPATCH_BATCH_SIZE", DEFAULT_DISPATCH_BATCH_SIZE);
        let stale_after =
            Duration::minutes(parse_env_number("OMS_STALE_AFTER_MINUTES", DEFAULT_STALE_AFTER_MINUTES));
        let signature_checks = parse_boolean_flag(env::var("OMS_SIGNATURE_CHECKS").ok(), true);
        if !signature_checks {
            warn!("🚨️ Webhook signature checks are DISABLED. Do not run like this in production.");
        }
        let inventory_sync_enabled = parse_boolean_flag(env::var("OMS_INVENTORY_SYNC").ok(), true);
        let storefront_config = StorefrontConfig::new_from_env_or_default();
        Self {
            host,
            port,
            database_url,
            dispatch_interval_secs,
            dispatch_batch_size,
            stale_after,
            signature_checks,
            inventory_sync_enabled,
            storefront_config,
        }
    }
}

fn parse_env_number<T: std::str::FromStr + std::fmt::Display + Copy>(var: &str, default: T) -> T {
    match env::var(var) {
        Ok(s) => s.parse::<T>().unwrap_or_else(|_| {
            warn!("🪛️ Invalid configuration value for {var} ({s}). Using the default, {default}.");
            default
        }),
        Err(_) => default,
    }
}
