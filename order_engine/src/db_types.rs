//! Data types backing the order sync database.
//!
//! These types map 1:1 onto the SQLite schema and are shared by the database layer and the public APIs. Status
//! enumerations are stored as strings in the database; the `From<String>` implementations exist for sqlx row
//! decoding and log-and-default on corrupt values rather than panicking.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use oms_common::Money;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------  FulfillmentStatus  ---------------------------------------------------------
/// The closed set of fulfillment states an order moves through. `stock_consumed` reports whether an order in this
/// state has already had warehouse stock reserved or shipped against it, which decides whether a hard delete must
/// restore inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum FulfillmentStatus {
    Pending,
    Confirmed,
    InPreparation,
    ReadyToShip,
    Shipped,
    InTransit,
    Delivered,
    Cancelled,
    Returned,
    DeliveryFailed,
}

impl FulfillmentStatus {
    pub fn stock_consumed(&self) -> bool {
        matches!(self, Self::ReadyToShip | Self::Shipped | Self::Delivered)
    }
}

impl Display for FulfillmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::InPreparation => "in_preparation",
            Self::ReadyToShip => "ready_to_ship",
            Self::Shipped => "shipped",
            Self::InTransit => "in_transit",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Returned => "returned",
            Self::DeliveryFailed => "delivery_failed",
        };
        write!(f, "{s}")
    }
}

impl FromStr for FulfillmentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "in_preparation" => Ok(Self::InPreparation),
            "ready_to_ship" => Ok(Self::ReadyToShip),
            "shipped" => Ok(Self::Shipped),
            "in_transit" => Ok(Self::InTransit),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            "returned" => Ok(Self::Returned),
            "delivery_failed" => Ok(Self::DeliveryFailed),
            s => Err(ConversionError(format!("Invalid fulfillment status: {s}"))),
        }
    }
}

impl From<String> for FulfillmentStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid fulfillment status: {value}. But this conversion cannot fail. Defaulting to pending");
            Self::Pending
        })
    }
}

//-------------------------------------- NotificationStatus  ---------------------------------------------------------
/// Queue state machine: `Pending → Processing → {Succeeded | Pending (retry) | Failed}`. `Processing` doubles as a
/// lease; a row in this state is invisible to concurrent dispatch runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum NotificationStatus {
    Pending,
    Processing,
    Succeeded,
    Failed,
}

impl Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::Processing => "Processing",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
        };
        write!(f, "{s}")
    }
}

impl FromStr for NotificationStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Processing" => Ok(Self::Processing),
            "Succeeded" => Ok(Self::Succeeded),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid notification status: {s}"))),
        }
    }
}

impl From<String> for NotificationStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid notification status: {value}. But this conversion cannot fail. Defaulting to Pending");
            Self::Pending
        })
    }
}

//--------------------------------------   IntegrationStatus ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum IntegrationStatus {
    Active,
    Revoked,
}

impl Display for IntegrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::Revoked => write!(f, "Revoked"),
        }
    }
}

impl From<String> for IntegrationStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Active" => Self::Active,
            "Revoked" => Self::Revoked,
            _ => {
                error!("Invalid integration status: {value}. Defaulting to Revoked");
                Self::Revoked
            },
        }
    }
}

//--------------------------------------    WebhookTopic     ---------------------------------------------------------
/// Topics this service subscribes to. Parsing fails closed: a topic we do not recognise is a terminal error, never
/// a silent pass-through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookTopic {
    OrdersCreate,
    OrdersUpdated,
}

impl Display for WebhookTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OrdersCreate => write!(f, "orders/create"),
            Self::OrdersUpdated => write!(f, "orders/updated"),
        }
    }
}

impl FromStr for WebhookTopic {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "orders/create" => Ok(Self::OrdersCreate),
            "orders/updated" => Ok(Self::OrdersUpdated),
            s => Err(ConversionError(format!("Unrecognised webhook topic: {s}"))),
        }
    }
}

//--------------------------------------   ExternalOrderId   ---------------------------------------------------------
/// The order identifier assigned by the platform. Unique per store when present.
#[derive(Debug, Clone, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct ExternalOrderId(pub String);

impl FromStr for ExternalOrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for ExternalOrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for ExternalOrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl ExternalOrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------     Integration     ---------------------------------------------------------
/// One merchant-platform connection. Created when the merchant completes the app install, revoked on uninstall.
#[derive(Debug, Clone, FromRow)]
pub struct Integration {
    pub id: i64,
    pub shop_domain: String,
    pub signing_secret: String,
    pub status: IntegrationStatus,
    pub store_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Integration {
    pub fn is_active(&self) -> bool {
        self.status == IntegrationStatus::Active
    }
}

#[derive(Debug, Clone)]
pub struct NewIntegration {
    pub shop_domain: String,
    pub signing_secret: String,
    pub store_id: i64,
}

//-------------------------------------- WebhookNotification ---------------------------------------------------------
/// A queued inbound notification. The raw payload and a headers snapshot are kept verbatim so a notification can be
/// re-processed (or inspected by an operator) long after receipt.
#[derive(Debug, Clone, FromRow)]
pub struct WebhookNotification {
    pub id: i64,
    pub integration_id: i64,
    pub shop_domain: String,
    pub topic: String,
    pub payload: String,
    pub headers: String,
    pub idempotency_key: String,
    pub external_ref: Option<String>,
    pub status: NotificationStatus,
    pub attempts: i64,
    pub max_attempts: i64,
    pub next_attempt_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewWebhookNotification {
    pub integration_id: i64,
    pub shop_domain: String,
    pub topic: String,
    pub payload: String,
    pub headers: String,
    /// Derived from the platform-provided event id header.
    pub idempotency_key: String,
    /// The external order id carried in the payload, when one could be extracted after signature verification.
    pub external_ref: Option<String>,
}

//--------------------------------------  IdempotencyRecord  ---------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct IdempotencyRecord {
    pub event_id: String,
    pub integration_id: i64,
    pub processed_at: DateTime<Utc>,
    pub response_status: i64,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of [`crate::traits::OrderSyncDatabase::observe_event`]: the atomic insert either claimed the event id
/// (`New`) or found an unexpired record for it (`Duplicate`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserveResult {
    New,
    Duplicate,
}

//--------------------------------------      Customer       ---------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct Customer {
    pub id: i64,
    pub store_id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub store_id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

//--------------------------------------        Order        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct Order {
    pub id: i64,
    pub store_id: i64,
    pub external_order_id: Option<ExternalOrderId>,
    pub customer_id: Option<i64>,
    pub status: FulfillmentStatus,
    pub deleted_at: Option<DateTime<Utc>>,
    pub total_price: Money,
    pub shipping_cost: Money,
    pub currency: String,
    pub payment_gateway: Option<String>,
    pub shipping_address: Option<String>,
    pub shipping_city: Option<String>,
    pub shipping_zip: Option<String>,
    pub shipping_country: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub external_created_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn is_soft_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewOrder {
    pub store_id: i64,
    pub external_order_id: Option<ExternalOrderId>,
    pub customer_id: Option<i64>,
    pub total_price: Money,
    pub shipping_cost: Money,
    pub currency: String,
    pub payment_gateway: Option<String>,
    pub shipping_address: Option<String>,
    pub shipping_city: Option<String>,
    pub shipping_zip: Option<String>,
    pub shipping_country: Option<String>,
    pub external_created_at: Option<DateTime<Utc>>,
}

//--------------------------------------      LineItem       ---------------------------------------------------------
/// A line on an order. `product_id` is NULL when the external product reference could not be resolved locally.
/// That is a recognised degraded state; the external references are kept for later reconciliation.
#[derive(Debug, Clone, FromRow)]
pub struct LineItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: Option<i64>,
    pub quantity: i64,
    pub unit_price: Money,
    pub external_product_id: Option<String>,
    pub external_variant_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewLineItem {
    pub product_id: Option<i64>,
    pub quantity: i64,
    pub unit_price: Money,
    pub external_product_id: Option<String>,
    pub external_variant_id: Option<String>,
}

//--------------------------------------       Product       ---------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct Product {
    pub id: i64,
    pub store_id: i64,
    pub name: String,
    pub sku: Option<String>,
    pub external_product_id: Option<String>,
    pub external_variant_id: Option<String>,
    pub stock: i64,
    pub cost_base: Money,
    pub cost_packaging: Money,
    pub cost_additional: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewProduct {
    pub store_id: i64,
    pub name: String,
    pub sku: Option<String>,
    pub external_product_id: Option<String>,
    pub external_variant_id: Option<String>,
    pub stock: i64,
    pub cost_base: Money,
    pub cost_packaging: Money,
    pub cost_additional: Money,
}

//--------------------------------------    MovementType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementType {
    OrderShipped,
    HardDeleteRestoration,
    ManualAdjustment,
}

impl Display for MovementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OrderShipped => write!(f, "order_shipped"),
            Self::HardDeleteRestoration => write!(f, "hard_delete_restoration"),
            Self::ManualAdjustment => write!(f, "manual_adjustment"),
        }
    }
}

//--------------------------------------  InventoryMovement  ---------------------------------------------------------
/// Append-only stock ledger row. Rows are never updated; when the order a row references is hard-deleted the row is
/// detached (order reference nulled) so the audit trail survives the order.
#[derive(Debug, Clone, FromRow)]
pub struct InventoryMovement {
    pub id: i64,
    pub product_id: i64,
    pub store_id: i64,
    pub order_id: Option<i64>,
    pub movement_type: String,
    pub quantity_delta: i64,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewInventoryMovement {
    pub product_id: i64,
    pub store_id: i64,
    pub order_id: Option<i64>,
    pub movement_type: MovementType,
    pub quantity_delta: i64,
    pub reason: Option<String>,
}

//--------------------------------------  OrderStatusEntry   ---------------------------------------------------------
/// One row per fulfillment status transition, giving each order a timestamped status history.
#[derive(Debug, Clone, FromRow)]
pub struct OrderStatusEntry {
    pub id: i64,
    pub order_id: i64,
    pub status: FulfillmentStatus,
    pub changed_at: DateTime<Utc>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fulfillment_status_round_trip() {
        for s in ["pending", "ready_to_ship", "delivery_failed"] {
            let status: FulfillmentStatus = s.parse().unwrap();
            assert_eq!(status.to_string(), s);
        }
        assert!("payed".parse::<FulfillmentStatus>().is_err());
    }

    #[test]
    fn stock_consumed_states() {
        assert!(FulfillmentStatus::ReadyToShip.stock_consumed());
        assert!(FulfillmentStatus::Shipped.stock_consumed());
        assert!(FulfillmentStatus::Delivered.stock_consumed());
        assert!(!FulfillmentStatus::Pending.stock_consumed());
        assert!(!FulfillmentStatus::Cancelled.stock_consumed());
    }

    #[test]
    fn topic_parsing_fails_closed() {
        assert_eq!("orders/create".parse::<WebhookTopic>().unwrap(), WebhookTopic::OrdersCreate);
        assert_eq!("orders/updated".parse::<WebhookTopic>().unwrap(), WebhookTopic::OrdersUpdated);
        assert!("orders/delete".parse::<WebhookTopic>().is_err());
    }
}
