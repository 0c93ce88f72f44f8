use std::{sync::Arc, time::Duration};

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::{
    config::StorefrontConfig,
    data_objects::{InventoryLevel, Location, NewWebhook, StorefrontProduct, Webhook},
    StorefrontApiError,
};

/// Outbound calls must never hang a dispatch batch; every request carries this timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Clone)]
pub struct StorefrontApi {
    config: StorefrontConfig,
    client: Arc<Client>,
}

impl StorefrontApi {
    pub fn new(config: StorefrontConfig) -> Result<Self, StorefrontApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let val = HeaderValue::from_str(config.admin_access_token.reveal().as_str())
            .map_err(|e| StorefrontApiError::Initialization(e.to_string()))?;
        headers.insert("X-Storefront-Access-Token", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StorefrontApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
        body: Option<B>,
    ) -> Result<T, StorefrontApiError> {
        let url = self.url(path);
        trace!("Sending REST query: {url}");
        let mut req = self.client.request(method, url);
        if !params.is_empty() {
            req = req.query(params);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| StorefrontApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| StorefrontApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| StorefrontApiError::RestResponseError(e.to_string()))?;
            Err(StorefrontApiError::QueryError { status, message })
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("https://{}/admin/api/{}{path}", self.config.shop, self.config.api_version)
    }

    /// Fetches the raw order document. Used by the normalizer's enrichment path and operator tooling.
    pub async fn get_order(&self, order_id: u64) -> Result<Value, StorefrontApiError> {
        #[derive(Deserialize)]
        struct OrderResponse {
            order: Value,
        }
        let path = format!("/orders/{order_id}.json");
        debug!("Fetching order #{order_id}");
        let result = self.rest_query::<OrderResponse, ()>(Method::GET, &path, &[], None).await?;
        info!("Fetched order #{order_id}");
        Ok(result.order)
    }

    pub async fn get_product(&self, product_id: u64) -> Result<StorefrontProduct, StorefrontApiError> {
        #[derive(Deserialize)]
        struct ProductResponse {
            product: StorefrontProduct,
        }
        let path = format!("/products/{product_id}.json");
        debug!("Fetching product #{product_id}");
        let result = self.rest_query::<ProductResponse, ()>(Method::GET, &path, &[], None).await?;
        Ok(result.product)
    }

    /// The first active location, which is where inventory levels are written.
    pub async fn fetch_primary_location(&self) -> Result<Location, StorefrontApiError> {
        #[derive(Deserialize)]
        struct LocationsResponse {
            locations: Vec<Location>,
        }
        let result = self.rest_query::<LocationsResponse, ()>(Method::GET, "/locations.json", &[], None).await?;
        result.locations.into_iter().find(|l| l.active).ok_or(StorefrontApiError::EmptyResponse)
    }

    /// Sets the absolute available quantity for an inventory item at a location.
    pub async fn set_inventory_level(
        &self,
        inventory_item_id: i64,
        location_id: i64,
        available: i64,
    ) -> Result<InventoryLevel, StorefrontApiError> {
        #[derive(Deserialize)]
        struct InventoryLevelResponse {
            inventory_level: InventoryLevel,
        }
        let body = serde_json::json!({
            "inventory_item_id": inventory_item_id,
            "location_id": location_id,
            "available": available,
        });
        let result = self
            .rest_query::<InventoryLevelResponse, Value>(Method::POST, "/inventory_levels/set.json", &[], Some(body))
            .await?;
        debug!("Inventory item {inventory_item_id} set to {available} at location {location_id}");
        Ok(result.inventory_level)
    }

    pub async fn fetch_webhooks(&self) -> Result<Vec<Webhook>, StorefrontApiError> {
        #[derive(Deserialize)]
        struct WebhookResponse {
            webhooks: Vec<Webhook>,
        }
        debug!("Fetching webhooks");
        let result = self.rest_query::<WebhookResponse, ()>(Method::GET, "/webhooks.json", &[], None).await?;
        info!("Fetched webhooks");
        Ok(result.webhooks)
    }

    pub async fn install_webhook(&self, address: &str, topic: &str) -> Result<Webhook, StorefrontApiError> {
        #[derive(Serialize)]
        struct WebhookInput {
            webhook: NewWebhook,
        }
        #[derive(Deserialize)]
        struct WebhookResponse {
            webhook: Webhook,
        }
        let webhook = NewWebhook { topic: topic.to_string(), address: address.to_string(), format: "json".to_string() };
        let input = WebhookInput { webhook };
        debug!("Installing webhook: {}", serde_json::to_string(&input).unwrap_or_default());
        let result =
            self.rest_query::<WebhookResponse, WebhookInput>(Method::POST, "/webhooks.json", &[], Some(input)).await?;
        info!("Installed webhook: {:?}", result.webhook.id);
        Ok(result.webhook)
    }

    pub async fn update_webhook(&self, id: i64, new_address: &str) -> Result<Webhook, StorefrontApiError> {
        #[derive(Serialize)]
        struct UpdateWebhook {
            id: String,
            address: String,
        }
        #[derive(Serialize)]
        struct WebhookInput {
            webhook: UpdateWebhook,
        }
        #[derive(Deserialize)]
        struct WebhookResponse {
            webhook: Webhook,
        }
        let input = WebhookInput { webhook: UpdateWebhook { id: id.to_string(), address: new_address.to_string() } };
        let path = format!("/webhooks/{id}.json");
        debug!("Updating webhook: {}", serde_json::to_string(&input).unwrap_or_default());
        let result = self.rest_query::<WebhookResponse, WebhookInput>(Method::PUT, &path, &[], Some(input)).await?;
        info!("Updated webhook: {:?}", result.webhook.id);
        Ok(result.webhook)
    }
}
