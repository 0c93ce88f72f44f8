//! The order normalizer: maps a platform order payload onto the local order + line-item model.
//!
//! The normalizer is deliberately re-entrant. The dispatcher delivers at least once, so every entry point starts
//! with an existence check on (store, external order id); a redelivered or half-applied notification is detected
//! there and reported as already applied. Order and line items are written in one atomic unit by the backend, so a
//! mid-failure can never leave an order without its items.
use chrono::{DateTime, Utc};
use log::*;

use crate::{
    db_types::{Integration, NewCustomer, NewLineItem, NewOrder, Order},
    oms_api::errors::HandlerError,
    storefront_types::OrderPayload,
    traits::OrderSyncDatabase,
};

/// What applying a notification did to the local dataset.
#[derive(Debug, Clone)]
pub enum NormalizerOutcome {
    Created(Order),
    /// The existence check matched: this notification (or an equivalent one) was applied before. A no-op.
    AlreadyApplied(Order),
    Updated(Order),
}

impl NormalizerOutcome {
    pub fn order(&self) -> &Order {
        match self {
            Self::Created(o) | Self::AlreadyApplied(o) | Self::Updated(o) => o,
        }
    }
}

/// Applies an `orders/create` notification.
pub async fn apply_order_created<B: OrderSyncDatabase>(
    db: &B,
    integration: &Integration,
    payload: &OrderPayload,
) -> Result<NormalizerOutcome, HandlerError> {
    let store_id = integration.store_id;
    let external_id = payload.external_id().into();

    // 1. Existence check: this is what makes repeated delivery safe.
    if let Some(existing) = db.fetch_order_by_external_id(store_id, &external_id).await? {
        info!("📦️ Order {external_id} already exists for store {store_id}; treating as applied");
        return Ok(NormalizerOutcome::AlreadyApplied(existing));
    }

    // 2. Customer resolution
    let customer_id = match payload.customer_email() {
        Some(email) => {
            let (first_name, last_name) = payload.customer_name();
            let customer =
                db.fetch_or_create_customer(NewCustomer { store_id, email, first_name, last_name }).await?;
            Some(customer.id)
        },
        None => None,
    };

    // 3 + 4. Order and line items, built up-front so the whole write is one atomic unit.
    let total_price = payload.total()?;
    let shipping_cost = payload.shipping()?;
    let mut items = Vec::with_capacity(payload.line_items.len());
    for line in &payload.line_items {
        let external_product_id = line.product_id.map(|id| id.to_string());
        let external_variant_id = line.variant_id.map(|id| id.to_string());
        let product = db
            .lookup_product_by_external_ref(store_id, external_product_id.as_deref(), external_variant_id.as_deref())
            .await?;
        if product.is_none() {
            // Degraded but tolerated: the item is stored unmapped and can be reconciled later.
            warn!(
                "📦️ Line item (product ref {:?}/{:?}) on order {external_id} has no local product mapping",
                external_product_id, external_variant_id
            );
        }
        items.push(NewLineItem {
            product_id: product.map(|p| p.id),
            quantity: line.quantity,
            unit_price: line.unit_price()?,
            external_product_id,
            external_variant_id,
        });
    }
    let shipping = payload.shipping_address.as_ref();
    let order = NewOrder {
        store_id,
        external_order_id: Some(external_id.clone()),
        customer_id,
        total_price,
        shipping_cost,
        currency: payload.currency.clone(),
        payment_gateway: payload.gateway.clone(),
        shipping_address: shipping.and_then(|a| a.address1.clone()),
        shipping_city: shipping.and_then(|a| a.city.clone()),
        shipping_zip: shipping.and_then(|a| a.zip.clone()),
        shipping_country: shipping.and_then(|a| a.country.clone()),
        external_created_at: parse_external_timestamp(payload),
    };
    let (order, inserted) = db.insert_order_with_items(order, items).await?;
    if inserted {
        info!("📦️ Order {external_id} created with id {} for store {store_id}", order.id);
        Ok(NormalizerOutcome::Created(order))
    } else {
        // Someone beat us to it between the existence check and the insert; same as already applied.
        Ok(NormalizerOutcome::AlreadyApplied(order))
    }
}

/// Applies an `orders/updated` notification. An update for an order we have never seen is treated as a create —
/// webhooks for different orders are not mutually ordered and the create may simply not have arrived yet.
pub async fn apply_order_updated<B: OrderSyncDatabase>(
    db: &B,
    integration: &Integration,
    payload: &OrderPayload,
) -> Result<NormalizerOutcome, HandlerError> {
    let store_id = integration.store_id;
    let external_id = payload.external_id().into();
    match db.fetch_order_by_external_id(store_id, &external_id).await? {
        None => {
            debug!("📦️ Update for unknown order {external_id}; applying as create");
            apply_order_created(db, integration, payload).await
        },
        Some(existing) => {
            let total_price = payload.total()?;
            let shipping_cost = payload.shipping()?;
            let order = db.update_order_totals(existing.id, total_price, shipping_cost).await?;
            debug!("📦️ Order {external_id} updated: total {total_price}, shipping {shipping_cost}");
            Ok(NormalizerOutcome::Updated(order))
        },
    }
}

fn parse_external_timestamp(payload: &OrderPayload) -> Option<DateTime<Utc>> {
    let raw = payload.created_at.as_deref()?;
    match raw.parse::<DateTime<Utc>>() {
        Ok(ts) => Some(ts),
        Err(e) => {
            warn!("📦️ Order {} carries an unparseable created_at ({raw}): {e}", payload.id);
            None
        },
    }
}
