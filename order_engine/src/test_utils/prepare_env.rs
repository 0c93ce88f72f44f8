use std::path::Path;

use log::*;
use sqlx::{migrate, migrate::MigrateDatabase, Sqlite};

use crate::{
    db_types::{NewIntegration, NewProduct},
    traits::OrderSyncDatabase,
    SqliteDatabase,
};

pub async fn prepare_test_env(url: &str) {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    create_database(url).await;
    run_migrations(url).await;
}

/// A unique throwaway database URL for one test run.
pub fn random_db_path(name: &str) -> String {
    format!("sqlite://{}/oms_{name}_{}.db", std::env::temp_dir().display(), rand::random::<u64>())
}

pub async fn run_migrations(url: &str) {
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating connection to database");
    migrate!("./migrations").run(db.pool()).await.expect("Error running DB migrations");
    info!("🚀️ Migrations complete");
}

pub async fn create_database<P: AsRef<Path>>(path: P) {
    let p = path.as_ref().as_os_str().to_str().unwrap();
    if let Err(e) = Sqlite::drop_database(p).await {
        warn!("Error dropping database {p}: {e:?}");
    }
    Sqlite::create_database(p).await.expect("Error creating database");
    info!("Created Sqlite database {p}");
}

/// Registers an active integration for tests and returns it.
pub async fn seed_integration(db: &SqliteDatabase, domain: &str, store_id: i64) -> crate::db_types::Integration {
    db.upsert_integration(NewIntegration {
        shop_domain: domain.to_string(),
        signing_secret: "test-signing-secret".to_string(),
        store_id,
    })
    .await
    .expect("Error seeding integration")
}

/// Inserts a product mapped to an external product id, with the given starting stock.
pub async fn seed_product(
    db: &SqliteDatabase,
    store_id: i64,
    external_product_id: &str,
    stock: i64,
) -> crate::db_types::Product {
    db.insert_product(NewProduct {
        store_id,
        name: format!("Product {external_product_id}"),
        external_product_id: Some(external_product_id.to_string()),
        stock,
        ..Default::default()
    })
    .await
    .expect("Error seeding product")
}
