//! Integration tests for sg-storage
//!
//! The PostgreSQL catalog tests need a reachable database with a writable `orders` table.

use sg_storage::{
    catalog, CatalogConfig, ConnectionPool, DatabaseConfig, KeyValueStore, Position, PositionBackend,
    PositionKey, PositionRecord, PositionStore, PositionStoreConfig, RuleType, SqliteStore,
};
use std::sync::Arc;

fn sqlite_config(dir: &tempfile::TempDir) -> PositionStoreConfig {
    PositionStoreConfig {
        backend: PositionBackend::Sqlite,
        path: dir.path().join("positions.sqlite").to_string_lossy().into_owned(),
    }
}

#[tokio::test]
async fn test_load_or_init_persists_verbatim_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let config = sqlite_config(&dir);

    let store = PositionStore::open(&config).unwrap();
    let key = PositionKey::new("BTCUSDT", "5m", RuleType::Ema);
    let record = store.load_or_init(&key, Some(15)).await.unwrap();

    assert_eq!(record, PositionRecord::fresh("BTCUSDT", RuleType::Ema, Some(15)));
    drop(store);

    // Raw bytes on disk are exactly the serialized fresh record
    let raw = SqliteStore::open(&config.path).unwrap();
    let bytes = raw.get("BTCUSDT/5m/EMA").await.unwrap();
    assert_eq!(
        String::from_utf8(bytes).unwrap(),
        r#"{"symbol":"BTCUSDT","types":"EMA","ema":15}"#
    );
}

#[tokio::test]
async fn test_position_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = sqlite_config(&dir);
    let key = PositionKey::new("ETHUSDT", "4h", RuleType::Cdc);

    {
        let store = PositionStore::open(&config).unwrap();
        let record = store.load_or_init(&key, None).await.unwrap();
        store
            .save(&key, &record.with_position(Position::Short))
            .await
            .unwrap();
    }

    let store = PositionStore::open(&config).unwrap();
    let record = store.load_or_init(&key, None).await.unwrap();
    assert_eq!(record.position, Some(Position::Short));
    assert_eq!(record.ema_period, None);
}

#[tokio::test]
async fn test_reads_records_written_by_previous_deployments() {
    let kv = Arc::new(SqliteStore::in_memory().unwrap());
    kv.put("BTCUSDT/1h/EMA", br#"{"symbol":"BTCUSDT","ema":20}"#)
        .await
        .unwrap();
    kv.put(
        "SOLUSDT/1h/EMA",
        br#"{"symbol":"SOLUSDT","types":"EMA","position":"Long"}"#,
    )
    .await
    .unwrap();

    let store = PositionStore::new(kv);
    let listed = store.list("").await.unwrap();
    assert_eq!(listed.len(), 2);

    let (key, first) = &listed[0];
    assert_eq!(key, "BTCUSDT/1h/EMA");
    let first = first.as_ref().unwrap();
    assert_eq!(first.position, None);
    assert_eq!(first.ema_period, Some(20));

    let second = listed[1].1.as_ref().unwrap();
    assert_eq!(second.position, Some(Position::Long));
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL with an `orders` table
async fn test_postgres_catalog_lists_rules() {
    let config = CatalogConfig::Postgres(DatabaseConfig::default());
    let catalog = catalog::connect(&config).await.unwrap();

    let rules = catalog.list_active_rules("5m").await.unwrap();
    for rule in &rules {
        assert_eq!(rule.timeframe, "5m");
    }
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL with a writable `orders` table
async fn test_postgres_catalog_skips_rows_with_null_columns() {
    let db = DatabaseConfig::default();
    let pool = ConnectionPool::new(&db).await.unwrap();
    let client = pool.get().await.unwrap();

    let cleanup = "DELETE FROM orders WHERE symbol = 'NULLROWUSDT'";
    client.execute(cleanup, &[]).await.unwrap();
    client
        .execute(
            r#"
            INSERT INTO orders (id, symbol, quantity, leverage, ema, user_id, timeframe, type)
            VALUES ('null-row-1', 'NULLROWUSDT', 1, NULL, 15, NULL, '5m', 'EMA'),
                   ('null-row-2', 'NULLROWUSDT', 1, 5, 15, 'u-1', '5m', 'EMA')
            "#,
            &[],
        )
        .await
        .unwrap();

    let catalog = catalog::connect(&CatalogConfig::Postgres(db)).await.unwrap();
    let orders = catalog
        .list_orders_for("NULLROWUSDT", RuleType::Ema, Some(15))
        .await;
    let rules = catalog.list_active_rules("5m").await;
    client.execute(cleanup, &[]).await.unwrap();

    let ids: Vec<String> = orders.unwrap().into_iter().map(|o| o.order_id).collect();
    assert_eq!(ids, vec!["null-row-2".to_string()]);
    assert!(rules.unwrap().iter().any(|r| r.symbol == "NULLROWUSDT"));
}
