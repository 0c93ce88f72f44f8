//! Tests of the cascading hard delete: stock restoration, dependent-row cleanup, audit-trail detachment and
//! queue/ledger purging, all inside one transaction.
use order_engine::{
    db_types::{FulfillmentStatus, NotificationStatus},
    events::EventPublishers,
    test_utils::prepare_env::{prepare_test_env, random_db_path, seed_integration, seed_product},
    traits::OrderSyncDatabase,
    DispatcherApi,
    IncomingNotification,
    IngestOutcome,
    OrderAdminApi,
    OrderSyncError,
    SqliteDatabase,
    WebhookFlowApi,
};

const SHOP: &str = "demo-store.example.com";
const STORE_ID: i64 = 1;
const EXT_ID: &str = "6938797637825";

async fn test_db(name: &str) -> SqliteDatabase {
    let url = random_db_path(name);
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

const CREATE_PAYLOAD: &str = r#"{
    "id": 6938797637825,
    "email": "jane@example.com",
    "currency": "EUR",
    "total_price": "100.00",
    "customer": {"id": 42, "email": "jane@example.com", "first_name": "Jane", "last_name": "Doe"},
    "line_items": [{"product_id": 111, "quantity": 2, "price": "50.00"}]
}"#;

/// Ingests and dispatches the canonical create payload, returning the local order id.
async fn create_order(db: &SqliteDatabase, event_id: &str) -> i64 {
    let flow = WebhookFlowApi::new(db.clone());
    let dispatcher = DispatcherApi::new(db.clone(), EventPublishers::default());
    let outcome = flow
        .ingest(IncomingNotification {
            shop_domain: SHOP.to_string(),
            topic: "orders/create".to_string(),
            event_id: event_id.to_string(),
            payload: CREATE_PAYLOAD.to_string(),
            headers: "{}".to_string(),
        })
        .await
        .unwrap();
    assert!(matches!(outcome, IngestOutcome::Enqueued(_)));
    let report = dispatcher.dispatch_batch(10).await.unwrap();
    assert_eq!(report.succeeded, 1);
    db.fetch_order_by_external_id(STORE_ID, &EXT_ID.to_string().into()).await.unwrap().unwrap().id
}

#[tokio::test]
async fn deleting_a_shipped_order_restores_stock_with_one_movement_per_item() {
    let db = test_db("restore_stock").await;
    seed_integration(&db, SHOP, STORE_ID).await;
    let product = seed_product(&db, STORE_ID, "111", 10).await;
    let order_id = create_order(&db, "evt-ship").await;
    db.set_order_status(order_id, FulfillmentStatus::Shipped).await.unwrap();

    let admin = OrderAdminApi::new(db.clone(), EventPublishers::default());
    let report = admin.delete_order(order_id).await.unwrap();

    assert_eq!(report.restorations.len(), 1);
    assert_eq!(report.restorations[0].quantity, 2);
    let restocked = db.fetch_product(product.id).await.unwrap().unwrap();
    assert_eq!(restocked.stock, 12, "quantity 2 must come back onto the original 10");

    // Exactly one restoration movement, detached from the deleted order but still carrying the audit reason.
    let movements = db.movements_for_product(product.id).await.unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].movement_type, "hard_delete_restoration");
    assert_eq!(movements[0].quantity_delta, 2);
    assert!(movements[0].order_id.is_none());
    assert!(movements[0].reason.as_deref().unwrap_or_default().contains("shipped"));

    assert!(db.fetch_order_by_id(order_id).await.unwrap().is_none());
}

#[tokio::test]
async fn deleting_a_pending_order_changes_no_stock() {
    let db = test_db("no_restore").await;
    seed_integration(&db, SHOP, STORE_ID).await;
    let product = seed_product(&db, STORE_ID, "111", 10).await;
    let order_id = create_order(&db, "evt-pending").await;

    let admin = OrderAdminApi::new(db.clone(), EventPublishers::default());
    let report = admin.delete_order(order_id).await.unwrap();

    assert!(report.restorations.is_empty());
    let product = db.fetch_product(product.id).await.unwrap().unwrap();
    assert_eq!(product.stock, 10);
    assert!(db.movements_for_product(product.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn cascade_removes_dependents_and_empty_parents_only() {
    let db = test_db("dependents").await;
    seed_integration(&db, SHOP, STORE_ID).await;
    seed_product(&db, STORE_ID, "111", 10).await;
    let order_id = create_order(&db, "evt-deps").await;

    // A second order keeps one warehouse session non-empty after the cascade.
    let other_payload = CREATE_PAYLOAD.replace(EXT_ID, "7000000000002");
    let flow = WebhookFlowApi::new(db.clone());
    let dispatcher = DispatcherApi::new(db.clone(), EventPublishers::default());
    flow.ingest(IncomingNotification {
        shop_domain: SHOP.to_string(),
        topic: "orders/create".to_string(),
        event_id: "evt-other".to_string(),
        payload: other_payload,
        headers: "{}".to_string(),
    })
    .await
    .unwrap();
    dispatcher.dispatch_batch(10).await.unwrap();
    let other_id =
        db.fetch_order_by_external_id(STORE_ID, &"7000000000002".to_string().into()).await.unwrap().unwrap().id;

    let pool = db.pool();
    // Shared session holds both orders; solo session holds only the doomed one.
    sqlx::query("INSERT INTO warehouse_sessions (id, store_id, code) VALUES (1, 1, 'WH-A'), (2, 1, 'WH-B')")
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO warehouse_session_orders (session_id, order_id) VALUES (1, $1), (1, $2), (2, $1)")
        .bind(order_id)
        .bind(other_id)
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO packing_progress (order_id, packed_items, total_items) VALUES ($1, 1, 2)")
        .bind(order_id)
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO settlements (id, store_id, reference) VALUES (7, 1, 'COD-2025-08')")
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO settlement_orders (settlement_id, order_id, amount) VALUES (7, $1, 10000)")
        .bind(order_id)
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO followup_logs (order_id, note) VALUES ($1, 'called customer')")
        .bind(order_id)
        .execute(pool)
        .await
        .unwrap();

    let admin = OrderAdminApi::new(db.clone(), EventPublishers::default());
    admin.delete_order(order_id).await.unwrap();

    let pool = db.pool();
    let count = |sql: &'static str| async move {
        sqlx::query_scalar::<_, i64>(sql).bind(order_id).fetch_one(pool).await.unwrap()
    };
    assert_eq!(count("SELECT COUNT(*) FROM warehouse_session_orders WHERE order_id = $1").await, 0);
    assert_eq!(count("SELECT COUNT(*) FROM packing_progress WHERE order_id = $1").await, 0);
    assert_eq!(count("SELECT COUNT(*) FROM settlement_orders WHERE order_id = $1").await, 0);
    assert_eq!(count("SELECT COUNT(*) FROM order_status_history WHERE order_id = $1").await, 0);
    assert_eq!(count("SELECT COUNT(*) FROM followup_logs WHERE order_id = $1").await, 0);
    assert_eq!(count("SELECT COUNT(*) FROM order_line_items WHERE order_id = $1").await, 0);

    // The shared session survives (it still has the other order); the solo session is gone.
    let sessions: Vec<(i64,)> =
        sqlx::query_as("SELECT id FROM warehouse_sessions ORDER BY id").fetch_all(db.pool()).await.unwrap();
    assert_eq!(sessions, vec![(1,)]);
    // Settlements are financial records and are retained even when emptied.
    let settlements: Vec<(i64,)> =
        sqlx::query_as("SELECT id FROM settlements ORDER BY id").fetch_all(db.pool()).await.unwrap();
    assert_eq!(settlements, vec![(7,)]);
    // The other order is untouched.
    assert!(db.fetch_order_by_id(other_id).await.unwrap().is_some());
}

#[tokio::test]
async fn cascade_purges_queue_and_ledger_so_late_duplicates_are_fresh_creates() {
    let db = test_db("purge").await;
    seed_integration(&db, SHOP, STORE_ID).await;
    seed_product(&db, STORE_ID, "111", 10).await;
    let order_id = create_order(&db, "evt-create").await;

    // A pending update for the same external order sits in the queue when the order is deleted.
    let flow = WebhookFlowApi::new(db.clone());
    let pending = match flow
        .ingest(IncomingNotification {
            shop_domain: SHOP.to_string(),
            topic: "orders/updated".to_string(),
            event_id: "evt-late-update".to_string(),
            payload: CREATE_PAYLOAD.to_string(),
            headers: "{}".to_string(),
        })
        .await
        .unwrap()
    {
        IngestOutcome::Enqueued(id) => id,
        other => panic!("expected enqueued, got {other:?}"),
    };

    let admin = OrderAdminApi::new(db.clone(), EventPublishers::default());
    // Both the pending update and the already-succeeded create entry go.
    let report = admin.delete_order(order_id).await.unwrap();
    assert_eq!(report.queue_entries_purged, 2);
    assert!(db.fetch_notification(pending).await.unwrap().is_none());

    // The original create event id is forgotten too: redelivery is treated as a brand-new event and the order is
    // recreated rather than confusing anyone with an update-of-nothing.
    let outcome = flow
        .ingest(IncomingNotification {
            shop_domain: SHOP.to_string(),
            topic: "orders/create".to_string(),
            event_id: "evt-create".to_string(),
            payload: CREATE_PAYLOAD.to_string(),
            headers: "{}".to_string(),
        })
        .await
        .unwrap();
    assert!(matches!(outcome, IngestOutcome::Enqueued(_)));
    let dispatcher = DispatcherApi::new(db.clone(), EventPublishers::default());
    dispatcher.dispatch_batch(10).await.unwrap();
    assert!(db.fetch_order_by_external_id(STORE_ID, &EXT_ID.to_string().into()).await.unwrap().is_some());
}

#[tokio::test]
async fn soft_delete_is_a_flag_with_no_cascade() {
    let db = test_db("soft_delete").await;
    seed_integration(&db, SHOP, STORE_ID).await;
    seed_product(&db, STORE_ID, "111", 10).await;
    let order_id = create_order(&db, "evt-soft").await;
    db.set_order_status(order_id, FulfillmentStatus::Shipped).await.unwrap();

    // The pending → shipped transition is on record before the soft delete.
    let history: Vec<String> =
        db.status_history_for_order(order_id).await.unwrap().iter().map(|h| h.status.to_string()).collect();
    assert_eq!(history, vec!["pending".to_string(), "shipped".to_string()]);

    let admin = OrderAdminApi::new(db.clone(), EventPublishers::default());
    let order = admin.soft_delete_order(order_id).await.unwrap();
    assert!(order.is_soft_deleted());

    // Everything is still there: order, items, and no stock movement happened.
    assert!(db.fetch_order_by_id(order_id).await.unwrap().is_some());
    assert_eq!(db.fetch_line_items(order_id).await.unwrap().len(), 1);
    let product = db
        .lookup_product_by_external_ref(STORE_ID, Some("111"), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product.stock, 10);
}

#[tokio::test]
async fn deleting_a_missing_order_is_an_error_and_touches_nothing() {
    let db = test_db("missing").await;
    seed_integration(&db, SHOP, STORE_ID).await;
    let admin = OrderAdminApi::new(db.clone(), EventPublishers::default());
    let err = admin.delete_order(99_999).await.unwrap_err();
    assert!(matches!(err, OrderSyncError::OrderNotFound(99_999)));
}

#[tokio::test]
async fn failed_notifications_surface_their_last_error() {
    let db = test_db("failed_surface").await;
    seed_integration(&db, SHOP, STORE_ID).await;
    let flow = WebhookFlowApi::new(db.clone());
    let dispatcher = DispatcherApi::new(db.clone(), EventPublishers::default());
    flow.ingest(IncomingNotification {
        shop_domain: SHOP.to_string(),
        topic: "orders/create".to_string(),
        event_id: "evt-bad".to_string(),
        payload: "{\"broken\":".to_string(),
        headers: "{}".to_string(),
    })
    .await
    .unwrap();
    dispatcher.dispatch_batch(10).await.unwrap();

    let admin = OrderAdminApi::new(db.clone(), EventPublishers::default());
    let failed = admin.failed_notifications(10).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].status, NotificationStatus::Failed);
    assert!(failed[0].last_error.is_some());
}
