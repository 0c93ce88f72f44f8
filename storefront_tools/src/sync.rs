//! The inventory sync bridge: best-effort propagation of local stock levels back to the platform.
//!
//! Local state is authoritative and has already committed by the time the bridge runs. A platform-side failure on
//! one product becomes a warning in the report and never rolls anything back or stops the rest of the batch.
use std::time::Duration;

use log::*;
use serde::Serialize;

use crate::{api::StorefrontApi, StorefrontApiError};

/// Fixed pause between consecutive platform calls, to stay under the API rate limit.
pub const SYNC_CALL_DELAY: Duration = Duration::from_millis(500);

/// One product to push: the local id (for reporting), its external mapping, and the committed stock level.
#[derive(Debug, Clone)]
pub struct StockSyncRequest {
    pub product_id: i64,
    pub external_product_id: Option<String>,
    pub new_stock: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncWarning {
    pub product_id: i64,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub updated: usize,
    pub warnings: Vec<SyncWarning>,
}

#[derive(Clone)]
pub struct InventorySyncBridge {
    api: StorefrontApi,
    pacing: Duration,
}

impl InventorySyncBridge {
    pub fn new(api: StorefrontApi) -> Self {
        Self { api, pacing: SYNC_CALL_DELAY }
    }

    /// Mostly for tests: shrink the inter-call delay.
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Pushes each product's stock level to the platform, one call at a time with a fixed delay in between.
    ///
    /// Per product: resolve the inventory item behind its external product reference, resolve the shop's primary
    /// location, and issue an absolute stock-set call. Failures are demoted to warnings in the report.
    pub async fn sync_stock_levels(&self, items: &[StockSyncRequest]) -> SyncReport {
        let mut report = SyncReport::default();
        if items.is_empty() {
            return report;
        }
        let location = match self.api.fetch_primary_location().await {
            Ok(location) => location,
            Err(e) => {
                warn!("🛍️ Could not resolve the platform location; no stock was pushed. {e}");
                for item in items {
                    report.warnings.push(SyncWarning {
                        product_id: item.product_id,
                        message: format!("location lookup failed: {e}"),
                    });
                }
                return report;
            },
        };
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.pacing).await;
            }
            match self.push_one(item, location.id).await {
                Ok(()) => report.updated += 1,
                Err(e) => {
                    warn!("🛍️ Stock push for product [{}] failed: {e}", item.product_id);
                    report.warnings.push(SyncWarning { product_id: item.product_id, message: e.to_string() });
                },
            }
        }
        info!("🛍️ Stock sync complete: {} updated, {} warning(s)", report.updated, report.warnings.len());
        report
    }

    async fn push_one(&self, item: &StockSyncRequest, location_id: i64) -> Result<(), StorefrontApiError> {
        let external_id = item
            .external_product_id
            .as_deref()
            .ok_or(StorefrontApiError::UnmappedProduct(item.product_id))?
            .parse::<u64>()
            .map_err(|_| StorefrontApiError::UnmappedProduct(item.product_id))?;
        let product = self.api.get_product(external_id).await?;
        let variant = product.variants.first().ok_or(StorefrontApiError::EmptyResponse)?;
        self.api.set_inventory_level(variant.inventory_item_id, location_id, item.new_stock).await?;
        Ok(())
    }
}
