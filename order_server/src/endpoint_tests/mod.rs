//! Endpoint tests: drive the webhook surface through a real actix service with the signature middleware engaged,
//! backed by a migrated throwaway SQLite database.
use actix_web::{
    dev::{Service, ServiceResponse},
    test,
    test::TestRequest,
    web,
    App,
    Error,
};
use order_engine::{
    test_utils::prepare_env::{prepare_test_env, random_db_path, seed_integration},
    SqliteDatabase,
    WebhookFlowApi,
};

use crate::{
    config::{EVENT_ID_HEADER, SHOP_DOMAIN_HEADER, SIGNATURE_HEADER},
    helpers::calculate_signature,
    middleware::SignatureMiddlewareFactory,
    routes::health,
    webhook_routes::{orders_create, shop_redact},
};

const SHOP: &str = "endpoint-test.example.com";
const SECRET: &str = "test-signing-secret";

const PAYLOAD: &str = r#"{"id": 555000111, "currency": "EUR", "total_price": "42.00", "line_items": []}"#;

async fn setup_db(name: &str) -> SqliteDatabase {
    let url = random_db_path(name);
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    seed_integration(&db, SHOP, 1).await;
    db
}

async fn webhook_app(
    db: SqliteDatabase,
) -> impl Service<actix_http::Request, Response = ServiceResponse, Error = Error> {
    let flow_api = WebhookFlowApi::new(db.clone());
    test::init_service(
        App::new().app_data(web::Data::new(flow_api)).service(health).service(
            web::scope("/webhook")
                .wrap(SignatureMiddlewareFactory::new(db, true))
                .service(orders_create)
                .service(shop_redact),
        ),
    )
    .await
}

fn signed_request(path: &str, payload: &str, shop: &str, event_id: &str) -> TestRequest {
    let signature = base64::encode(calculate_signature(SECRET, payload.as_bytes()));
    TestRequest::post()
        .uri(path)
        .insert_header((SHOP_DOMAIN_HEADER, shop))
        .insert_header((SIGNATURE_HEADER, signature))
        .insert_header((EVENT_ID_HEADER, event_id))
        .set_payload(payload.to_string())
}

#[actix_web::test]
async fn health_check_is_open() {
    let db = setup_db("health").await;
    let app = webhook_app(db).await;
    let resp = test::call_service(&app, TestRequest::get().uri("/health").to_request()).await;
    assert!(resp.status().is_success());
}

#[actix_web::test]
async fn signed_webhook_is_queued_then_duplicate_acknowledged() {
    let db = setup_db("queued").await;
    let app = webhook_app(db).await;

    let resp =
        test::call_service(&app, signed_request("/webhook/orders-create", PAYLOAD, SHOP, "evt-e1").to_request()).await;
    assert_eq!(resp.status(), 200);

    // Redelivery with the same event id: still 200, but recognised as a duplicate.
    let resp =
        test::call_service(&app, signed_request("/webhook/orders-create", PAYLOAD, SHOP, "evt-e1").to_request()).await;
    assert_eq!(resp.status(), 200);
    let body: crate::data_objects::JsonResponse = test::read_body_json(resp).await;
    assert!(body.success);
    assert!(body.message.to_lowercase().contains("duplicate"));
}

#[actix_web::test]
async fn invalid_signature_is_unauthorized() {
    let db = setup_db("bad_sig").await;
    let app = webhook_app(db).await;
    let req = TestRequest::post()
        .uri("/webhook/orders-create")
        .insert_header((SHOP_DOMAIN_HEADER, SHOP))
        .insert_header((SIGNATURE_HEADER, "definitely-not-the-signature"))
        .insert_header((EVENT_ID_HEADER, "evt-e2"))
        .set_payload(PAYLOAD.to_string())
        .to_request();
    let resp = test::try_call_service(&app, req).await;
    let err = resp.expect_err("unsigned request must be rejected");
    assert_eq!(err.as_response_error().status_code(), 401);
}

#[actix_web::test]
async fn missing_shop_domain_is_bad_request() {
    let db = setup_db("no_domain").await;
    let app = webhook_app(db).await;
    let req = TestRequest::post()
        .uri("/webhook/orders-create")
        .insert_header((SIGNATURE_HEADER, "irrelevant"))
        .insert_header((EVENT_ID_HEADER, "evt-e3"))
        .set_payload(PAYLOAD.to_string())
        .to_request();
    let resp = test::try_call_service(&app, req).await;
    let err = resp.expect_err("request without shop domain must be rejected");
    assert_eq!(err.as_response_error().status_code(), 400);
}

#[actix_web::test]
async fn unknown_shop_is_unauthorized() {
    let db = setup_db("unknown_shop").await;
    let app = webhook_app(db).await;
    let req = signed_request("/webhook/orders-create", PAYLOAD, "other-shop.example.com", "evt-e4").to_request();
    let resp = test::try_call_service(&app, req).await;
    let err = resp.expect_err("unknown shop must be rejected");
    assert_eq!(err.as_response_error().status_code(), 401);
}

#[actix_web::test]
async fn shop_redact_revokes_the_integration() {
    let db = setup_db("redact").await;
    let app = webhook_app(db.clone()).await;
    let resp =
        test::call_service(&app, signed_request("/webhook/shop-redact", PAYLOAD, SHOP, "evt-e5").to_request()).await;
    assert_eq!(resp.status(), 200);

    use order_engine::traits::OrderSyncDatabase;
    let integration = db.fetch_integration_by_domain(SHOP).await.unwrap().unwrap();
    assert!(!integration.is_active());
}
