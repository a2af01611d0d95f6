//! Document store abstraction.
//!
//! Every SafeBus resource lives in a `collection/id -> JSON object` store that
//! supports merge writes, equality queries, single-document transactions and
//! per-document change subscriptions. Two implementations exist: an
//! in-process [`MemoryStore`] and a PostgreSQL-backed [`PgStore`].

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use tokio::{sync::mpsc, task::JoinHandle};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Buffered change events per subscription before the forwarder applies backpressure.
pub const SUBSCRIPTION_BUFFER: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("document must be a JSON object")]
    NotAnObject,
    /// A transaction closure refused to commit. Carries the domain message.
    #[error("{0}")]
    Aborted(String),
    #[error("change feed closed")]
    Closed,
}

/// A stored document together with its key and last write time.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub collection: String,
    pub id: String,
    pub data: Value,
    pub updated_at_ms: i64,
}

impl Document {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}

/// How a write combines with an existing document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace the whole document.
    Replace,
    /// Deep-merge object fields into the existing document.
    Merge,
}

/// Equality filter on a top-level field.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, data: &Value) -> bool {
        data.get(&self.field) == Some(&self.value)
    }
}

/// Closure run inside [`DocumentStore::transact`]. Receives the current
/// document data (if any) and returns the data to write, or `None` to leave
/// the document untouched.
pub type TransactFn =
    Box<dyn FnOnce(Option<Value>) -> Result<Option<Value>, StoreError> + Send + 'static>;

/// One delivery on a subscription: the latest state of the watched
/// document (`None` when it does not exist) or a feed error.
pub type SnapshotResult = Result<Option<Document>, StoreError>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    async fn set(
        &self,
        collection: &str,
        id: &str,
        data: Value,
        mode: WriteMode,
    ) -> Result<(), StoreError>;

    /// Returns all documents in `collection` matching every filter, ordered by id.
    async fn query(&self, collection: &str, filters: &[Filter])
        -> Result<Vec<Document>, StoreError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Runs a read-modify-write on one document with writers to that document
    /// serialized. Returns the committed data (or the unchanged data when the
    /// closure returned `None`).
    async fn transact(
        &self,
        collection: &str,
        id: &str,
        apply: TransactFn,
    ) -> Result<Option<Value>, StoreError>;

    /// Subscribes to one document. The current state is delivered first,
    /// followed by one snapshot per change.
    async fn watch(&self, collection: &str, id: &str) -> Result<Subscription, StoreError>;
}

/// Live feed of document snapshots. Dropping the handle stops the
/// forwarding task.
pub struct Subscription {
    receiver: mpsc::Receiver<SnapshotResult>,
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn new(receiver: mpsc::Receiver<SnapshotResult>, task: JoinHandle<()>) -> Self {
        Self { receiver, task }
    }

    /// Next snapshot, or `None` once the feed has ended.
    pub async fn next(&mut self) -> Option<SnapshotResult> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Serializes a record into the object form stored in a document.
pub fn to_document<T: Serialize>(value: &T) -> Result<Value, StoreError> {
    let value = serde_json::to_value(value)?;
    if !value.is_object() {
        return Err(StoreError::NotAnObject);
    }
    Ok(value)
}

/// Deep merge of `patch` into `base`. Nested objects merge field by field;
/// every other value in `patch` overwrites.
pub fn merge_json(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => merge_maps(base_map, patch_map),
        (base, patch) => *base = patch,
    }
}

fn merge_maps(base: &mut Map<String, Value>, patch: Map<String, Value>) {
    for (key, value) in patch {
        match base.get_mut(&key) {
            Some(existing) if existing.is_object() && value.is_object() => {
                merge_json(existing, value)
            }
            _ => {
                base.insert(key, value);
            }
        }
    }
}

/// Applies a write to the current data according to `mode`.
pub fn apply_write(current: Option<Value>, data: Value, mode: WriteMode) -> Value {
    match (mode, current) {
        (WriteMode::Merge, Some(mut existing)) => {
            merge_json(&mut existing, data);
            existing
        }
        _ => data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_json_merges_nested_objects() {
        let mut base = json!({
            "name": "Bus 7",
            "morning": {"going": true, "status": "PICK_IN"},
            "evening": {"going": true, "status": "PICK_IN"}
        });
        merge_json(
            &mut base,
            json!({"morning": {"status": "ON_BUS"}, "plate": "AB-12"}),
        );
        assert_eq!(base["morning"]["going"], true);
        assert_eq!(base["morning"]["status"], "ON_BUS");
        assert_eq!(base["evening"]["status"], "PICK_IN");
        assert_eq!(base["plate"], "AB-12");
        assert_eq!(base["name"], "Bus 7");
    }

    #[test]
    fn merge_json_overwrites_non_object_values() {
        let mut base = json!({"homeLocation": {"lat": 1.0, "lng": 2.0}});
        merge_json(&mut base, json!({"homeLocation": null}));
        assert!(base["homeLocation"].is_null());
    }

    #[test]
    fn apply_write_replace_discards_existing_fields() {
        let written = apply_write(
            Some(json!({"a": 1, "b": 2})),
            json!({"a": 3}),
            WriteMode::Replace,
        );
        assert_eq!(written, json!({"a": 3}));
    }

    #[test]
    fn to_document_rejects_scalars() {
        assert!(matches!(to_document(&5), Err(StoreError::NotAnObject)));
        assert!(to_document(&json!({"ok": true})).is_ok());
    }

    #[test]
    fn filter_matches_top_level_field() {
        let filter = Filter::eq("status", "approved");
        assert!(filter.matches(&json!({"status": "approved"})));
        assert!(!filter.matches(&json!({"status": "pending"})));
        assert!(!filter.matches(&json!({})));
    }
}
