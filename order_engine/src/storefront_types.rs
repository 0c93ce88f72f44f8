//! Typed views over the platform's webhook payloads.
//!
//! The platform sends loosely-shaped JSON. Every topic handler goes through [`OrderPayload::parse`] first, which
//! fails closed: a payload that does not carry the fields we need is rejected as a permanent error rather than
//! half-applied. Prices arrive as decimal strings and are converted to [`Money`] at this boundary.
use log::trace;
use oms_common::Money;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::helpers::parse_decimal_price;

/// Placeholder used when neither the customer record nor the billing/shipping addresses carry a usable name.
pub const FALLBACK_CUSTOMER_NAME: &str = "Guest";

#[derive(Debug, Clone, Error)]
#[error("The payload could not be interpreted. {0}")]
pub struct PayloadError(pub String);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddressPayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address1: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerPayload {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineItemPayload {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub product_id: Option<i64>,
    #[serde(default)]
    pub variant_id: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    pub quantity: i64,
    pub price: String,
}

impl LineItemPayload {
    pub fn unit_price(&self) -> Result<Money, PayloadError> {
        parse_decimal_price(&self.price).map_err(|e| PayloadError(format!("Invalid line item price: {e}")))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderPayload {
    pub id: i64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub currency: String,
    pub total_price: String,
    #[serde(default)]
    pub total_shipping_price: Option<String>,
    #[serde(default)]
    pub gateway: Option<String>,
    #[serde(default)]
    pub financial_status: Option<String>,
    #[serde(default)]
    pub customer: Option<CustomerPayload>,
    #[serde(default)]
    pub billing_address: Option<AddressPayload>,
    #[serde(default)]
    pub shipping_address: Option<AddressPayload>,
    #[serde(default)]
    pub line_items: Vec<LineItemPayload>,
}

impl OrderPayload {
    /// Parse a raw webhook body into a typed payload. Anything that fails here is a permanent error; redelivering
    /// the same bytes will never succeed.
    pub fn parse(raw: &str) -> Result<Self, PayloadError> {
        let payload: Self = serde_json::from_str(raw).map_err(|e| PayloadError(e.to_string()))?;
        trace!("🪝️ Parsed order payload for external order {}", payload.id);
        Ok(payload)
    }

    pub fn external_id(&self) -> String {
        self.id.to_string()
    }

    /// The customer email, if the payload carries one in either the customer block or the top-level field.
    pub fn customer_email(&self) -> Option<String> {
        self.customer
            .as_ref()
            .and_then(|c| c.email.clone())
            .or_else(|| self.email.clone())
            .filter(|e| !e.trim().is_empty())
    }

    /// Resolve the customer's name: explicit first/last fields win, then the billing and shipping address names,
    /// then a default placeholder.
    pub fn customer_name(&self) -> (String, String) {
        if let Some(c) = &self.customer {
            let first = c.first_name.clone().unwrap_or_default();
            let last = c.last_name.clone().unwrap_or_default();
            if !first.trim().is_empty() || !last.trim().is_empty() {
                return (first.trim().to_string(), last.trim().to_string());
            }
        }
        let address_name = self
            .billing_address
            .as_ref()
            .and_then(|a| a.name.clone())
            .or_else(|| self.shipping_address.as_ref().and_then(|a| a.name.clone()))
            .filter(|n| !n.trim().is_empty());
        match address_name {
            Some(name) => match name.trim().split_once(' ') {
                Some((first, last)) => (first.to_string(), last.to_string()),
                None => (name.trim().to_string(), String::new()),
            },
            None => (FALLBACK_CUSTOMER_NAME.to_string(), String::new()),
        }
    }

    pub fn total(&self) -> Result<Money, PayloadError> {
        parse_decimal_price(&self.total_price).map_err(|e| PayloadError(format!("Invalid order total: {e}")))
    }

    pub fn shipping(&self) -> Result<Money, PayloadError> {
        match &self.total_shipping_price {
            Some(p) => parse_decimal_price(p).map_err(|e| PayloadError(format!("Invalid shipping cost: {e}"))),
            None => Ok(Money::from(0)),
        }
    }
}

/// Cheaply pull the top-level order id out of a raw body without committing to the full payload shape. Used at
/// ingest time (after signature verification) to tag queue entries with the order they concern.
pub fn extract_external_ref(raw: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    value.get("id").and_then(|id| id.as_i64()).map(|id| id.to_string())
}

//--------------------------------------  OrderPayloadBuilder -------------------------------------------------------
/// Builder for realistic order payloads. Only used by tests, but kept in the library (rather than test_utils) so
/// downstream crates can construct fixtures too.
#[derive(Debug, Clone, Default)]
pub struct OrderPayloadBuilder {
    id: Option<i64>,
    email: Option<String>,
    created_at: Option<String>,
    currency: Option<String>,
    total_price: Option<String>,
    gateway: Option<String>,
    customer: Option<CustomerPayload>,
    shipping_address: Option<AddressPayload>,
    line_items: Vec<LineItemPayload>,
}

impl OrderPayloadBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn random_order() -> OrderPayload {
        OrderPayloadBuilder::new().build()
    }

    pub fn id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    pub fn created_at(mut self, created_at: &str) -> Self {
        self.created_at = Some(created_at.to_string());
        self
    }

    pub fn currency(mut self, currency: &str) -> Self {
        self.currency = Some(currency.to_string());
        self
    }

    pub fn total_price(mut self, total_price: &str) -> Self {
        self.total_price = Some(total_price.to_string());
        self
    }

    pub fn gateway(mut self, gateway: &str) -> Self {
        self.gateway = Some(gateway.to_string());
        self
    }

    pub fn customer(mut self, customer: CustomerPayload) -> Self {
        self.customer = Some(customer);
        self
    }

    pub fn shipping_address(mut self, address: AddressPayload) -> Self {
        self.shipping_address = Some(address);
        self
    }

    pub fn line_item(mut self, product_id: i64, quantity: i64, price: &str) -> Self {
        self.line_items.push(LineItemPayload {
            id: Some(self.line_items.len() as i64 + 1),
            product_id: Some(product_id),
            variant_id: None,
            title: None,
            quantity,
            price: price.to_string(),
        });
        self
    }

    pub fn build(self) -> OrderPayload {
        let mut rng = rand::thread_rng();
        #[allow(clippy::cast_possible_wrap)]
        let id = self.id.unwrap_or_else(|| (rng.next_u64() >> 1) as i64);
        OrderPayload {
            id,
            email: self.email,
            created_at: self.created_at.or_else(|| Some(chrono::Utc::now().to_rfc3339())),
            currency: self.currency.unwrap_or_else(|| "EUR".to_string()),
            total_price: self.total_price.unwrap_or_else(|| format!("{}.00", rng.gen_range(10..2_500))),
            total_shipping_price: None,
            gateway: self.gateway,
            financial_status: None,
            customer: self.customer,
            billing_address: None,
            shipping_address: self.shipping_address,
            line_items: self.line_items,
        }
    }

    pub fn build_json(self) -> String {
        serde_json::to_string(&self.build()).unwrap_or_default()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_order_payload() {
        let raw = r#"{
            "id": 6938797637825,
            "email": "jane@example.com",
            "currency": "EUR",
            "total_price": "100.00",
            "customer": {"id": 42, "email": "jane@example.com", "first_name": "Jane", "last_name": "Doe"},
            "line_items": [{"product_id": 111, "quantity": 2, "price": "50.00"}]
        }"#;
        let payload = OrderPayload::parse(raw).unwrap();
        assert_eq!(payload.external_id(), "6938797637825");
        assert_eq!(payload.total().unwrap().value(), 10_000);
        assert_eq!(payload.line_items.len(), 1);
        assert_eq!(payload.line_items[0].unit_price().unwrap().value(), 5_000);
        assert_eq!(payload.customer_name(), ("Jane".to_string(), "Doe".to_string()));
    }

    #[test]
    fn malformed_payload_is_rejected() {
        assert!(OrderPayload::parse("{\"email\": \"no-id@example.com\"}").is_err());
        assert!(OrderPayload::parse("not even json").is_err());
    }

    #[test]
    fn customer_name_falls_back_to_address_then_placeholder() {
        let with_address = OrderPayloadBuilder::new()
            .shipping_address(AddressPayload { name: Some("Ada Lovelace".to_string()), ..Default::default() })
            .build();
        assert_eq!(with_address.customer_name(), ("Ada".to_string(), "Lovelace".to_string()));

        let bare = OrderPayloadBuilder::new().build();
        assert_eq!(bare.customer_name(), (FALLBACK_CUSTOMER_NAME.to_string(), String::new()));
    }

    #[test]
    fn external_ref_extraction() {
        assert_eq!(extract_external_ref(r#"{"id": 12345, "x": 1}"#), Some("12345".to_string()));
        assert_eq!(extract_external_ref(r#"{"no_id": true}"#), None);
        assert_eq!(extract_external_ref("garbage"), None);
    }
}
