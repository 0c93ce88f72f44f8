//! Webhook endpoint handlers.
//!
//! Every route here sits behind the signature middleware. Handlers do the minimum: capture the raw body, read the
//! transport headers, hand the notification to the ingestion API and acknowledge. Business logic runs later in the
//! dispatcher — a webhook response must come back fast, and non-200 responses cause the platform to redeliver.
use actix_web::{post, web, HttpRequest, HttpResponse};
use log::*;
use order_engine::{
    IncomingNotification,
    IngestOutcome,
    OrderSyncDatabase,
    OrderSyncError,
    SqliteDatabase,
    WebhookFlowApi,
};

use crate::{
    config::{EVENT_ID_HEADER, SHOP_DOMAIN_HEADER},
    data_objects::JsonResponse,
};

#[post("/orders-create")]
pub async fn orders_create(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<WebhookFlowApi<SqliteDatabase>>,
) -> HttpResponse {
    ingest_webhook("orders/create", &req, body, api.get_ref()).await
}

#[post("/orders-updated")]
pub async fn orders_updated(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<WebhookFlowApi<SqliteDatabase>>,
) -> HttpResponse {
    ingest_webhook("orders/updated", &req, body, api.get_ref()).await
}

async fn ingest_webhook(
    topic: &str,
    req: &HttpRequest,
    body: web::Bytes,
    api: &WebhookFlowApi<SqliteDatabase>,
) -> HttpResponse {
    trace!("🪝️ Received webhook request: {}", req.uri());
    let Some(shop_domain) = header_value(req, SHOP_DOMAIN_HEADER) else {
        return HttpResponse::BadRequest().json(JsonResponse::failure("Missing shop domain header."));
    };
    let Some(event_id) = header_value(req, EVENT_ID_HEADER) else {
        warn!("🪝️ Webhook from {shop_domain} carries no event id header");
        return HttpResponse::BadRequest().json(JsonResponse::failure("Missing event id header."));
    };
    let payload = String::from_utf8_lossy(body.as_ref()).into_owned();
    let headers = serde_json::json!({
        "shop_domain": shop_domain,
        "topic": topic,
        "event_id": event_id,
    })
    .to_string();
    let incoming = IncomingNotification { shop_domain, topic: topic.to_string(), event_id, payload, headers };
    match api.ingest(incoming).await {
        Ok(IngestOutcome::Enqueued(id)) => {
            debug!("🪝️ {topic} notification queued as [{id}]");
            HttpResponse::Ok().json(JsonResponse::success("Notification queued."))
        },
        Ok(IngestOutcome::Duplicate) => {
            // The ledger already saw this event; acknowledge so the platform stops redelivering.
            HttpResponse::Ok().json(JsonResponse::success("Duplicate notification acknowledged."))
        },
        Err(e @ (OrderSyncError::IntegrationNotFound(_) | OrderSyncError::IntegrationRevoked(_))) => {
            warn!("🪝️ Webhook rejected: {e}");
            HttpResponse::Unauthorized().json(JsonResponse::failure("Unknown integration."))
        },
        Err(e) => {
            // A 5xx here is deliberate: the platform redelivers and the ledger makes the retry safe.
            error!("🪝️ Could not ingest {topic} notification: {e}");
            HttpResponse::InternalServerError().json(JsonResponse::failure("Could not ingest notification."))
        },
    }
}

//------------------------------------- Compliance endpoints --------------------------------------------------------
// Data-subject requests share the signature verification contract with the order webhooks. The business side of
// data export/erasure is handled by operator tooling; these endpoints acknowledge receipt and record the request.

#[post("/customers-data-request")]
pub async fn customers_data_request(req: HttpRequest, body: web::Bytes) -> HttpResponse {
    let shop = header_value(&req, SHOP_DOMAIN_HEADER).unwrap_or_default();
    info!("⚖️ Data request received from {shop} ({} payload bytes). Queued for operator review.", body.len());
    HttpResponse::Ok().json(JsonResponse::success("Data request received."))
}

#[post("/customers-redact")]
pub async fn customers_redact(req: HttpRequest, body: web::Bytes) -> HttpResponse {
    let shop = header_value(&req, SHOP_DOMAIN_HEADER).unwrap_or_default();
    info!("⚖️ Customer redaction request received from {shop} ({} payload bytes).", body.len());
    HttpResponse::Ok().json(JsonResponse::success("Redaction request received."))
}

/// Shop erasure doubles as uninstall: the integration is revoked so pending notifications terminally fail instead
/// of retrying against a connection that will never come back.
#[post("/shop-redact")]
pub async fn shop_redact(
    req: HttpRequest,
    _body: web::Bytes,
    api: web::Data<WebhookFlowApi<SqliteDatabase>>,
) -> HttpResponse {
    let Some(shop) = header_value(&req, SHOP_DOMAIN_HEADER) else {
        return HttpResponse::BadRequest().json(JsonResponse::failure("Missing shop domain header."));
    };
    match api.db().revoke_integration(&shop).await {
        Ok(n) => {
            info!("⚖️ Shop redaction for {shop}: integration revoked ({n} row(s)).");
            HttpResponse::Ok().json(JsonResponse::success("Shop redaction processed."))
        },
        Err(e) => {
            error!("⚖️ Could not revoke integration for {shop}: {e}");
            HttpResponse::InternalServerError().json(JsonResponse::failure("Could not process shop redaction."))
        },
    }
}

fn header_value(req: &HttpRequest, name: &str) -> Option<String> {
    req.headers().get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}
