//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use log::*;
use order_engine::{DispatcherApi, OrderAdminApi, SqliteDatabase};
use storefront_tools::{InventorySyncBridge, StockSyncRequest};

use crate::{
    data_objects::{FailedNotificationsQuery, FailedNotificationSummary, JsonResponse, StatusUpdateRequest, StockSyncItem},
    errors::ServerError,
};

const DEFAULT_FAILED_LIMIT: i64 = 50;

#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

/// Terminally failed notifications with their last error, for manual operator intervention.
#[get("/notifications/failed")]
pub async fn failed_notifications(
    query: web::Query<FailedNotificationsQuery>,
    api: web::Data<OrderAdminApi<SqliteDatabase>>,
) -> Result<HttpResponse, ServerError> {
    let limit = query.limit.unwrap_or(DEFAULT_FAILED_LIMIT).clamp(1, 500);
    let failed = api.failed_notifications(limit).await?;
    let summaries: Vec<FailedNotificationSummary> = failed.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(summaries))
}

/// Forces a dispatch cycle right now instead of waiting for the worker's next tick.
#[post("/dispatch")]
pub async fn force_dispatch(
    api: web::Data<DispatcherApi<SqliteDatabase>>,
    config: web::Data<crate::config::ServerConfig>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ Manual dispatch cycle requested");
    let report = api.dispatch_batch(config.dispatch_batch_size).await?;
    Ok(HttpResponse::Ok().json(report))
}

#[get("/orders/{id}")]
pub async fn order_by_id(
    path: web::Path<i64>,
    api: web::Data<OrderAdminApi<SqliteDatabase>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    match api.order_details(id).await? {
        Some((order, items)) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "order": {
                "id": order.id,
                "external_order_id": order.external_order_id,
                "status": order.status,
                "total_price": order.total_price,
                "currency": order.currency,
                "deleted_at": order.deleted_at,
            },
            "line_items": items.iter().map(|i| serde_json::json!({
                "id": i.id,
                "product_id": i.product_id,
                "quantity": i.quantity,
                "unit_price": i.unit_price,
            })).collect::<Vec<_>>(),
        }))),
        None => Err(ServerError::NoRecordFound(format!("order {id}"))),
    }
}

/// Fulfillment status transition, driven by warehouse tooling.
#[put("/orders/{id}/status")]
pub async fn update_order_status(
    path: web::Path<i64>,
    body: web::Json<StatusUpdateRequest>,
    api: web::Data<OrderAdminApi<SqliteDatabase>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let order = api.set_order_status(id, body.into_inner().status).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "id": order.id, "status": order.status })))
}

/// Hard delete with the full consistency cascade. The returned report itemises what was restored and removed.
#[delete("/orders/{id}")]
pub async fn delete_order(
    path: web::Path<i64>,
    api: web::Data<OrderAdminApi<SqliteDatabase>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    info!("💻️ Hard delete requested for order [{id}]");
    let report = api.delete_order(id).await?;
    Ok(HttpResponse::Ok().json(report))
}

/// Soft delete: flags the order and nothing else.
#[post("/orders/{id}/soft-delete")]
pub async fn soft_delete_order(
    path: web::Path<i64>,
    api: web::Data<OrderAdminApi<SqliteDatabase>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let order = api.soft_delete_order(id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "id": order.id, "deleted_at": order.deleted_at })))
}

/// Manual inventory push to the platform. Individual failures come back as warnings; nothing blocks.
#[post("/inventory/sync")]
pub async fn sync_inventory(
    body: web::Json<Vec<StockSyncItem>>,
    bridge: web::Data<InventorySyncBridge>,
) -> Result<HttpResponse, ServerError> {
    let items: Vec<StockSyncRequest> = body
        .into_inner()
        .into_iter()
        .map(|i| StockSyncRequest {
            product_id: i.product_id,
            external_product_id: i.external_product_id,
            new_stock: i.new_stock,
        })
        .collect();
    if items.is_empty() {
        return Ok(HttpResponse::Ok().json(JsonResponse::failure("No products to sync.")));
    }
    debug!("💻️ Manual inventory sync for {} product(s)", items.len());
    let report = bridge.sync_stock_levels(&items).await;
    Ok(HttpResponse::Ok().json(report))
}
