//! End-to-end tests of the ingestion/dispatch pipeline against a real (throwaway) SQLite database.
use chrono::Duration;
use order_engine::{
    db_types::{NotificationStatus, ObserveResult},
    events::EventPublishers,
    test_utils::prepare_env::{prepare_test_env, random_db_path, seed_integration, seed_product},
    traits::OrderSyncDatabase,
    DispatcherApi,
    IncomingNotification,
    IngestOutcome,
    SqliteDatabase,
    WebhookFlowApi,
};

const SHOP: &str = "demo-store.example.com";
const STORE_ID: i64 = 1;

async fn test_db(name: &str) -> SqliteDatabase {
    let url = random_db_path(name);
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

fn incoming(event_id: &str, topic: &str, payload: &str) -> IncomingNotification {
    IncomingNotification {
        shop_domain: SHOP.to_string(),
        topic: topic.to_string(),
        event_id: event_id.to_string(),
        payload: payload.to_string(),
        headers: "{}".to_string(),
    }
}

const CREATE_PAYLOAD: &str = r#"{
    "id": 6938797637825,
    "email": "jane@example.com",
    "currency": "EUR",
    "total_price": "100.00",
    "customer": {"id": 42, "email": "jane@example.com", "first_name": "Jane", "last_name": "Doe"},
    "line_items": [{"product_id": 111, "quantity": 2, "price": "50.00"}]
}"#;

#[tokio::test]
async fn duplicate_delivery_creates_exactly_one_order() {
    let db = test_db("dup_delivery").await;
    seed_integration(&db, SHOP, STORE_ID).await;
    seed_product(&db, STORE_ID, "111", 10).await;
    let flow = WebhookFlowApi::new(db.clone());
    let dispatcher = DispatcherApi::new(db.clone(), EventPublishers::default());

    // The platform redelivers the same event (identical idempotency key) a few seconds later.
    let first = flow.ingest(incoming("evt-1", "orders/create", CREATE_PAYLOAD)).await.unwrap();
    assert!(matches!(first, IngestOutcome::Enqueued(_)));
    let second = flow.ingest(incoming("evt-1", "orders/create", CREATE_PAYLOAD)).await.unwrap();
    assert_eq!(second, IngestOutcome::Duplicate);

    let report = dispatcher.dispatch_batch(10).await.unwrap();
    assert_eq!(report.due, 1);
    assert_eq!(report.succeeded, 1);

    let order = db
        .fetch_order_by_external_id(STORE_ID, &"6938797637825".to_string().into())
        .await
        .unwrap()
        .expect("order should exist");
    assert_eq!(order.total_price.value(), 10_000);
    let items = db.fetch_line_items(order.id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, 2);
    assert_eq!(items[0].unit_price.value(), 5_000);
    assert!(items[0].product_id.is_some());

    // An equivalent notification under a fresh event id must also be a no-op thanks to the existence check.
    let replay = flow.ingest(incoming("evt-2", "orders/create", CREATE_PAYLOAD)).await.unwrap();
    assert!(matches!(replay, IngestOutcome::Enqueued(_)));
    let report = dispatcher.dispatch_batch(10).await.unwrap();
    assert_eq!(report.succeeded, 1);
    let again = db.fetch_order_by_external_id(STORE_ID, &"6938797637825".to_string().into()).await.unwrap().unwrap();
    assert_eq!(again.id, order.id);
    assert_eq!(db.fetch_line_items(order.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn ledger_observe_is_atomic_and_expiry_reclaims() {
    let db = test_db("ledger").await;
    let integration = seed_integration(&db, SHOP, STORE_ID).await;

    let horizon = Duration::hours(24);
    assert_eq!(db.observe_event("evt-x", integration.id, horizon).await.unwrap(), ObserveResult::New);
    assert_eq!(db.observe_event("evt-x", integration.id, horizon).await.unwrap(), ObserveResult::Duplicate);

    // A record whose horizon has already passed is reclaimed and reported as new.
    assert_eq!(db.observe_event("evt-y", integration.id, Duration::seconds(-1)).await.unwrap(), ObserveResult::New);
    assert_eq!(db.observe_event("evt-y", integration.id, horizon).await.unwrap(), ObserveResult::New);

    // Pruning removes only expired rows; a pruned event id is new again on replay.
    assert_eq!(db.observe_event("evt-z", integration.id, Duration::seconds(-1)).await.unwrap(), ObserveResult::New);
    assert_eq!(db.prune_idempotency_ledger().await.unwrap(), 1);
    assert_eq!(db.observe_event("evt-z", integration.id, horizon).await.unwrap(), ObserveResult::New);
}

#[tokio::test]
async fn retry_state_machine_backs_off_and_caps_attempts() {
    let db = test_db("retry").await;
    seed_integration(&db, SHOP, STORE_ID).await;
    let flow = WebhookFlowApi::new(db.clone());
    let id = match flow.ingest(incoming("evt-r", "orders/create", CREATE_PAYLOAD)).await.unwrap() {
        IngestOutcome::Enqueued(id) => id,
        other => panic!("expected enqueued, got {other:?}"),
    };

    // Simulate a handler that keeps failing transiently: the deltas must be non-decreasing, capped at 960s, and
    // the notification must reach Failed after exactly max_attempts attempts.
    let mut last_delay = 0i64;
    for attempt in 1..=5 {
        assert!(db.lease_notification(id).await.unwrap());
        let n = db.record_failed_attempt(id, "upstream timeout").await.unwrap();
        assert_eq!(n.attempts, attempt);
        if attempt < 5 {
            assert_eq!(n.status, NotificationStatus::Pending);
            let delay = (n.next_attempt_at - n.updated_at).num_seconds();
            assert!(delay >= last_delay, "backoff must be non-decreasing ({delay} < {last_delay})");
            assert!(delay <= 960);
            last_delay = delay;
        } else {
            assert_eq!(n.status, NotificationStatus::Failed);
            assert!(n.last_error.as_deref() == Some("upstream timeout"));
        }
    }
    // 60 * 2^(attempts-1): the fourth retry delay is 480s, still under the 960s cap.
    assert_eq!(last_delay, 480);

    // Terminal: no further lease is possible.
    assert!(!db.lease_notification(id).await.unwrap());
}

#[tokio::test]
async fn transient_failures_then_success_leaves_attempt_count_at_two() {
    let db = test_db("retry_success").await;
    seed_integration(&db, SHOP, STORE_ID).await;
    let flow = WebhookFlowApi::new(db.clone());
    let id = match flow.ingest(incoming("evt-s", "orders/create", CREATE_PAYLOAD)).await.unwrap() {
        IngestOutcome::Enqueued(id) => id,
        other => panic!("expected enqueued, got {other:?}"),
    };

    // pending → processing → pending, twice
    for _ in 0..2 {
        assert!(db.lease_notification(id).await.unwrap());
        let n = db.record_failed_attempt(id, "flaky upstream").await.unwrap();
        assert_eq!(n.status, NotificationStatus::Pending);
    }
    // third invocation succeeds
    assert!(db.lease_notification(id).await.unwrap());
    let n = db.mark_notification_succeeded(id).await.unwrap();
    assert_eq!(n.status, NotificationStatus::Succeeded);
    assert_eq!(n.attempts, 2);
    assert!(n.processed_at.is_some());
}

#[tokio::test]
async fn unknown_integration_fails_without_retry() {
    let db = test_db("no_integration").await;
    seed_integration(&db, SHOP, STORE_ID).await;
    let flow = WebhookFlowApi::new(db.clone());
    let dispatcher = DispatcherApi::new(db.clone(), EventPublishers::default());
    let id = match flow.ingest(incoming("evt-i", "orders/create", CREATE_PAYLOAD)).await.unwrap() {
        IngestOutcome::Enqueued(id) => id,
        other => panic!("expected enqueued, got {other:?}"),
    };
    // The merchant uninstalls before dispatch runs.
    db.revoke_integration(SHOP).await.unwrap();
    let report = dispatcher.dispatch_batch(10).await.unwrap();
    assert_eq!(report.failed, 1);
    let n = db.fetch_notification(id).await.unwrap().unwrap();
    assert_eq!(n.status, NotificationStatus::Failed);
    assert_eq!(n.attempts, 0, "a permanent condition must not consume retry attempts");
    assert_eq!(n.last_error.as_deref(), Some("integration revoked"));
}

#[tokio::test]
async fn malformed_payload_and_unknown_topic_fail_closed() {
    let db = test_db("fail_closed").await;
    seed_integration(&db, SHOP, STORE_ID).await;
    let flow = WebhookFlowApi::new(db.clone());
    let dispatcher = DispatcherApi::new(db.clone(), EventPublishers::default());

    flow.ingest(incoming("evt-m1", "orders/create", r#"{"not": "an order"}"#)).await.unwrap();
    flow.ingest(incoming("evt-m2", "orders/delete", CREATE_PAYLOAD)).await.unwrap();

    let report = dispatcher.dispatch_batch(10).await.unwrap();
    assert_eq!(report.failed, 2);
    assert_eq!(report.retried, 0);
    let failed = db.fetch_failed_notifications(10).await.unwrap();
    assert_eq!(failed.len(), 2);
    assert!(failed.iter().all(|n| n.attempts == 0));
}

#[tokio::test]
async fn stale_processing_rows_are_swept_back_to_pending() {
    let db = test_db("stale_sweep").await;
    seed_integration(&db, SHOP, STORE_ID).await;
    let flow = WebhookFlowApi::new(db.clone());
    let dispatcher = DispatcherApi::new(db.clone(), EventPublishers::default());
    let id = match flow.ingest(incoming("evt-st", "orders/create", CREATE_PAYLOAD)).await.unwrap() {
        IngestOutcome::Enqueued(id) => id,
        other => panic!("expected enqueued, got {other:?}"),
    };
    // A worker takes the lease and then dies.
    assert!(db.lease_notification(id).await.unwrap());

    // With a generous threshold nothing moves; with a zero threshold the lease is considered abandoned.
    let (reset, _) = dispatcher.maintenance_sweep(Duration::minutes(10)).await.unwrap();
    assert_eq!(reset, 0);
    let (reset, _) = dispatcher.maintenance_sweep(Duration::seconds(0)).await.unwrap();
    assert_eq!(reset, 1);
    let n = db.fetch_notification(id).await.unwrap().unwrap();
    assert_eq!(n.status, NotificationStatus::Pending);
}

#[tokio::test]
async fn unmapped_product_is_degraded_not_fatal() {
    let db = test_db("unmapped").await;
    seed_integration(&db, SHOP, STORE_ID).await;
    let flow = WebhookFlowApi::new(db.clone());
    let dispatcher = DispatcherApi::new(db.clone(), EventPublishers::default());

    // No product seeded: the line item cannot be resolved, but the order must still be created.
    flow.ingest(incoming("evt-u", "orders/create", CREATE_PAYLOAD)).await.unwrap();
    let report = dispatcher.dispatch_batch(10).await.unwrap();
    assert_eq!(report.succeeded, 1);
    let order = db.fetch_order_by_external_id(STORE_ID, &"6938797637825".to_string().into()).await.unwrap().unwrap();
    let items = db.fetch_line_items(order.id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert!(items[0].product_id.is_none());
    assert_eq!(items[0].external_product_id.as_deref(), Some("111"));
}

#[tokio::test]
async fn update_for_known_order_changes_totals_and_unknown_creates() {
    let db = test_db("updates").await;
    seed_integration(&db, SHOP, STORE_ID).await;
    let flow = WebhookFlowApi::new(db.clone());
    let dispatcher = DispatcherApi::new(db.clone(), EventPublishers::default());

    flow.ingest(incoming("evt-c", "orders/create", CREATE_PAYLOAD)).await.unwrap();
    dispatcher.dispatch_batch(10).await.unwrap();

    let updated_payload = CREATE_PAYLOAD.replace("\"100.00\"", "\"120.00\"");
    flow.ingest(incoming("evt-up", "orders/updated", &updated_payload)).await.unwrap();
    let report = dispatcher.dispatch_batch(10).await.unwrap();
    assert_eq!(report.succeeded, 1);
    let order = db.fetch_order_by_external_id(STORE_ID, &"6938797637825".to_string().into()).await.unwrap().unwrap();
    assert_eq!(order.total_price.value(), 12_000);

    // An update for an order that never arrived is applied as a create.
    let orphan = CREATE_PAYLOAD.replace("6938797637825", "7000000000001");
    flow.ingest(incoming("evt-orphan", "orders/updated", &orphan)).await.unwrap();
    let report = dispatcher.dispatch_batch(10).await.unwrap();
    assert_eq!(report.succeeded, 1);
    assert!(db
        .fetch_order_by_external_id(STORE_ID, &"7000000000001".to_string().into())
        .await
        .unwrap()
        .is_some());
}
