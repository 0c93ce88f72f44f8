use order_engine::{
    test_utils::prepare_env::{prepare_test_env, random_db_path, seed_integration},
    traits::OrderSyncDatabase,
    events::EventPublishers,
    DispatcherApi, IncomingNotification, SqliteDatabase, WebhookFlowApi,
};

const SHOP: &str = "demo-store.example.com";
const PAYLOAD: &str = r#"{"id":6938797637825,"currency":"EUR","total_price":"100.00","line_items":[{"product_id":111,"quantity":2,"price":"50.00"}]}"#;

async fn mkdb(name: &str) -> SqliteDatabase {
    let url = random_db_path(name);
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.unwrap()
}

async fn run(name: &str, ev: &str) {
    let db = mkdb(name).await;
    seed_integration(&db, SHOP, 1).await;
    let flow = WebhookFlowApi::new(db.clone());
    let disp = DispatcherApi::new(db.clone(), EventPublishers::default());
    flow.ingest(IncomingNotification {
        shop_domain: SHOP.to_string(),
        topic: "orders/create".to_string(),
        event_id: ev.to_string(),
        payload: PAYLOAD.to_string(),
        headers: "{}".to_string(),
    })
    .await
    .unwrap();
    let n1 = db.fetch_notification(1).await.unwrap().unwrap();
    println!("DIAG[{name}] now={} stored_next_attempt_at={}", chrono::Utc::now(), n1.next_attempt_at);
    let due = db.fetch_due_notifications(10).await.unwrap();
    println!("DIAG[{name}] due={} ", due.len());
    for n in &due {
        println!("DIAG[{name}] id={} status={:?} next_attempt_at={} payload_len={}", n.id, n.status, n.next_attempt_at, n.payload.len());
    }
    let rep = disp.dispatch_batch(10).await.unwrap();
    println!("DIAG[{name}] report={:?}", rep);
}

#[tokio::test]
async fn diag_a_first() {
    run("diag_a", "evt-a").await;
}

#[tokio::test]
async fn diag_b_second() {
    run("diag_b", "evt-b").await;
}
