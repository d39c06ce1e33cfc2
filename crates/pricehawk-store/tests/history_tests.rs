use std::fs;

use chrono::{TimeZone, Utc};
use pricehawk_core::models::Price;
use pricehawk_core::traits::HistoryStore;
use pricehawk_store::JsonHistoryStore;
use serde_json::Value;

fn price(value: f64) -> Price {
    Price::new(value).unwrap()
}

#[tokio::test]
async fn history_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("price_history.json");

    let store = JsonHistoryStore::open(&path, 100).await;
    store.record("Laptop", price(899.0)).await.unwrap();
    store.record("Laptop", price(799.99)).await.unwrap();
    store.record("Mouse", price(25.0)).await.unwrap();
    drop(store);

    let reopened = JsonHistoryStore::open(&path, 100).await;
    let laptop = reopened.history("Laptop", 10).await.unwrap();

    assert_eq!(laptop.len(), 2);
    assert_eq!(laptop[0].price, 799.99);
    assert_eq!(laptop[1].price, 899.0);
    assert!(laptop[0].timestamp >= laptop[1].timestamp);
    assert_eq!(reopened.products().await, vec!["Laptop", "Mouse"]);
}

#[tokio::test]
async fn file_layout_is_oldest_first_per_product() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("price_history.json");

    let store = JsonHistoryStore::open(&path, 100).await;
    store.record("Laptop", price(899.0)).await.unwrap();
    store.record("Laptop", price(799.99)).await.unwrap();

    let raw = fs::read_to_string(&path).unwrap();
    assert!(raw.contains('\n'), "expected pretty-printed JSON");

    let doc: Value = serde_json::from_str(&raw).unwrap();
    let entries = doc["Laptop"].as_array().unwrap();
    assert_eq!(entries[0]["price"], 899.0);
    assert_eq!(entries[1]["price"], 799.99);
    assert!(entries[0]["timestamp"].is_string());
}

#[tokio::test]
async fn reads_existing_document() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("price_history.json");
    fs::write(
        &path,
        r#"{
  "Laptop": [
    { "price": 950.0, "timestamp": "2024-03-01T08:00:00Z" },
    { "price": 899.0, "timestamp": "2024-03-01T09:00:00+00:00" }
  ]
}"#,
    )
    .unwrap();

    let store = JsonHistoryStore::open(&path, 100).await;
    let entries = store.history("Laptop", 1).await.unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].price, 899.0);
    assert_eq!(
        entries[0].timestamp,
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn corrupt_file_starts_fresh_and_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("price_history.json");
    fs::write(&path, "{ not json").unwrap();

    let store = JsonHistoryStore::open(&path, 100).await;
    assert!(store.products().await.is_empty());

    store.record("Cable", price(9.99)).await.unwrap();

    let doc: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(doc["Cable"][0]["price"], 9.99);
}

#[tokio::test]
async fn unwritable_location_is_storage_error() {
    let dir = tempfile::tempdir().unwrap();
    // a regular file where a directory is expected
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "").unwrap();

    let store = JsonHistoryStore::open(blocker.join("history.json"), 100).await;
    let result = store.record("Cable", price(9.99)).await;

    assert!(matches!(
        result,
        Err(pricehawk_core::error::AppError::StorageError(_))
    ));
}
