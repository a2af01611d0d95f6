//! Runs against a real database when `TEST_DATABASE_URL` is set; skipped
//! otherwise.

use std::time::Duration;

use safebus_backend::{
    db::connection::{create_pool, run_migrations},
    store::{DocumentStore, Filter, PgStore, StoreError, WriteMode},
};
use serde_json::json;
use uuid::Uuid;

async fn store() -> Option<PgStore> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = create_pool(&url).await.expect("connect test database");
    run_migrations(&pool).await.expect("migrate test database");
    Some(PgStore::new(pool))
}

/// Unique collection per test so runs never see each other's rows.
fn collection(name: &str) -> String {
    format!("test_{name}_{}", Uuid::new_v4().simple())
}

#[tokio::test]
async fn set_merge_query_and_delete() {
    let Some(store) = store().await else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return;
    };
    let col = collection("crud");

    store
        .set(&col, "a", json!({"busId": "B1", "nested": {"x": 1}}), WriteMode::Replace)
        .await
        .unwrap();
    store
        .set(&col, "a", json!({"nested": {"y": 2}}), WriteMode::Merge)
        .await
        .unwrap();
    store
        .set(&col, "b", json!({"busId": "B2"}), WriteMode::Replace)
        .await
        .unwrap();

    let doc = store.get(&col, "a").await.unwrap().unwrap();
    assert_eq!(doc.data, json!({"busId": "B1", "nested": {"x": 1, "y": 2}}));

    let found = store.query(&col, &[Filter::eq("busId", "B1")]).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, "a");

    store.delete(&col, "a").await.unwrap();
    assert!(store.get(&col, "a").await.unwrap().is_none());
    store.delete(&col, "b").await.unwrap();
}

#[tokio::test]
async fn transactions_serialize_concurrent_writers() {
    let Some(store) = store().await else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return;
    };
    let col = collection("tx");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        let col = col.clone();
        handles.push(tokio::spawn(async move {
            store
                .transact(
                    &col,
                    "counter",
                    Box::new(|current| {
                        let value = current
                            .as_ref()
                            .and_then(|doc| doc["value"].as_i64())
                            .unwrap_or(0);
                        Ok(Some(json!({"value": value + 1})))
                    }),
                )
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    let doc = store.get(&col, "counter").await.unwrap().unwrap();
    assert_eq!(doc.data["value"], 8);

    let err = store
        .transact(
            &col,
            "counter",
            Box::new(|_| Err(StoreError::Aborted("nope".into()))),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Aborted(msg) if msg == "nope"));
    store.delete(&col, "counter").await.unwrap();
}

#[tokio::test]
async fn watch_delivers_initial_state_and_changes() {
    let Some(store) = store().await else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return;
    };
    let col = collection("watch");

    let mut feed = store.watch(&col, "doc").await.unwrap();
    let initial = tokio::time::timeout(Duration::from_secs(5), feed.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(initial.is_none());

    store
        .set(&col, "doc", json!({"isSharing": true}), WriteMode::Replace)
        .await
        .unwrap();
    let changed = tokio::time::timeout(Duration::from_secs(5), feed.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(changed.data, json!({"isSharing": true}));
    store.delete(&col, "doc").await.unwrap();
}

#[tokio::test]
async fn watchers_share_one_change_listener() {
    let Some(store) = store().await else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return;
    };
    let col = collection("fanout");

    let mut feeds = Vec::new();
    for id in ["a", "b", "c"] {
        let mut feed = store.watch(&col, id).await.unwrap();
        let initial = tokio::time::timeout(Duration::from_secs(5), feed.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(initial.is_none());
        feeds.push((id, feed));
    }

    for (id, _) in &feeds {
        store
            .set(&col, id, json!({"id": id}), WriteMode::Replace)
            .await
            .unwrap();
    }
    for (id, feed) in &mut feeds {
        let changed = tokio::time::timeout(Duration::from_secs(5), feed.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(changed.data, json!({"id": id}));
    }
    for (id, _) in &feeds {
        store.delete(&col, id).await.unwrap();
    }
}
