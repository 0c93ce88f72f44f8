use log::*;
use oms_common::Secret;

#[derive(Debug, Clone, Default)]
pub struct StorefrontConfig {
    pub shop: String,
    pub admin_access_token: Secret<String>,
    pub api_version: String,
    pub shared_secret: Secret<String>,
}

impl StorefrontConfig {
    pub fn new_from_env_or_default() -> Self {
        let shop = std::env::var("OMS_STOREFRONT_SHOP").unwrap_or_else(|_| {
            warn!("OMS_STOREFRONT_SHOP not set, using (probably useless) default");
            "example.myshopify.com".to_string()
        });
        let api_version = std::env::var("OMS_STOREFRONT_API_VERSION").unwrap_or_else(|_| {
            warn!("OMS_STOREFRONT_API_VERSION not set, using 2024-04 as default");
            "2024-04".to_string()
        });
        let admin_access_token = Secret::new(std::env::var("OMS_STOREFRONT_ADMIN_ACCESS_TOKEN").unwrap_or_else(|_| {
            warn!("OMS_STOREFRONT_ADMIN_ACCESS_TOKEN not set, using (probably useless) default");
            "shpat_00000000000000".to_string()
        }));
        let shared_secret = Secret::new(std::env::var("OMS_STOREFRONT_API_SECRET").unwrap_or_else(|_| {
            warn!("OMS_STOREFRONT_API_SECRET not set, using (probably useless) default");
            "00000000000000".to_string()
        }));
        Self { shop, admin_access_token, api_version, shared_secret }
    }
}
