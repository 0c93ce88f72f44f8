use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use order_engine::{events::EventPublishers, DispatcherApi, OrderAdminApi, SqliteDatabase, WebhookFlowApi};
use storefront_tools::{InventorySyncBridge, StorefrontApi};

use crate::{
    config::ServerConfig,
    dispatch_worker::start_dispatch_worker,
    errors::ServerError,
    integrations::storefront::create_storefront_event_handlers,
    middleware::SignatureMiddlewareFactory,
    routes::{
        delete_order,
        failed_notifications,
        force_dispatch,
        health,
        order_by_id,
        soft_delete_order,
        sync_inventory,
        update_order_status,
    },
    webhook_routes::{customers_data_request, customers_redact, orders_create, orders_updated, shop_redact},
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    // Event handlers (the inventory sync bridge) only run when the sync is enabled; the engine publishes into the
    // void otherwise.
    let publishers = if config.inventory_sync_enabled {
        let handlers = create_storefront_event_handlers(config.storefront_config.clone())
            .map_err(|e| ServerError::InitializeError(e.to_string()))?;
        let publishers = handlers.publishers();
        handlers.start_handlers().await;
        publishers
    } else {
        info!("🪛️ Inventory sync to the platform is disabled.");
        EventPublishers::default()
    };
    let _worker = start_dispatch_worker(
        db.clone(),
        publishers.clone(),
        config.dispatch_interval_secs,
        config.dispatch_batch_size,
        config.stale_after,
    );
    let srv = create_server_instance(config, db, publishers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    publishers: EventPublishers,
) -> Result<Server, ServerError> {
    let bridge = StorefrontApi::new(config.storefront_config.clone())
        .map(InventorySyncBridge::new)
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let flow_api = WebhookFlowApi::new(db.clone());
        let dispatcher = DispatcherApi::new(db.clone(), publishers.clone());
        let admin_api = OrderAdminApi::new(db.clone(), publishers.clone());
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("oms::access_log"))
            .app_data(web::Data::new(flow_api))
            .app_data(web::Data::new(dispatcher))
            .app_data(web::Data::new(admin_api))
            .app_data(web::Data::new(bridge.clone()))
            .app_data(web::Data::new(config.clone()));
        // All webhook routes, compliance included, share the signature verification contract.
        let webhook_scope = web::scope("/webhook")
            .wrap(SignatureMiddlewareFactory::new(db.clone(), config.signature_checks))
            .service(orders_create)
            .service(orders_updated)
            .service(customers_data_request)
            .service(customers_redact)
            .service(shop_redact);
        // The admin surface carries no authentication of its own; deployments front it with a proxy.
        let admin_scope = web::scope("/api")
            .service(failed_notifications)
            .service(force_dispatch)
            .service(order_by_id)
            .service(update_order_status)
            .service(delete_order)
            .service(soft_delete_order)
            .service(sync_inventory);
        app.service(health).service(webhook_scope).service(admin_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}
