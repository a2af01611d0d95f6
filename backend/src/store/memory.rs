//! In-process document store used for local development and tests.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};

use super::{
    apply_write, Document, DocumentStore, Filter, SnapshotResult, StoreError, Subscription,
    TransactFn, WriteMode, SUBSCRIPTION_BUFFER,
};

const CHANGE_CHANNEL_CAPACITY: usize = 256;

type Key = (String, String);

#[derive(Debug, Clone)]
struct Change {
    collection: String,
    id: String,
    document: Option<Document>,
}

struct Inner {
    documents: Mutex<BTreeMap<Key, Document>>,
    changes: broadcast::Sender<Change>,
}

impl Inner {
    fn documents(&self) -> MutexGuard<'_, BTreeMap<Key, Document>> {
        self.documents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn snapshot(&self, collection: &str, id: &str) -> Option<Document> {
        self.documents()
            .get(&(collection.to_string(), id.to_string()))
            .cloned()
    }

    fn publish(&self, collection: &str, id: &str, document: Option<Document>) {
        // No receivers is the normal case when nothing is subscribed.
        let _ = self.changes.send(Change {
            collection: collection.to_string(),
            id: id.to_string(),
            document,
        });
    }
}

#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                documents: Mutex::new(BTreeMap::new()),
                changes,
            }),
        }
    }

    /// Number of stored documents in `collection`.
    pub fn count(&self, collection: &str) -> usize {
        self.inner
            .documents()
            .keys()
            .filter(|(c, _)| c == collection)
            .count()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self.inner.snapshot(collection, id))
    }

    async fn set(
        &self,
        collection: &str,
        id: &str,
        data: Value,
        mode: WriteMode,
    ) -> Result<(), StoreError> {
        if !data.is_object() {
            return Err(StoreError::NotAnObject);
        }
        let mut documents = self.inner.documents();
        let key = (collection.to_string(), id.to_string());
        let current = documents.get(&key).map(|doc| doc.data.clone());
        let document = Document {
            collection: collection.to_string(),
            id: id.to_string(),
            data: apply_write(current, data, mode),
            updated_at_ms: Utc::now().timestamp_millis(),
        };
        documents.insert(key, document.clone());
        // Published under the lock so watchers see writes in commit order.
        self.inner.publish(collection, id, Some(document));
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
    ) -> Result<Vec<Document>, StoreError> {
        let documents = self.inner.documents();
        Ok(documents
            .iter()
            .filter(|((c, _), doc)| {
                c == collection && filters.iter().all(|filter| filter.matches(&doc.data))
            })
            .map(|(_, doc)| doc.clone())
            .collect())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let mut documents = self.inner.documents();
        if documents
            .remove(&(collection.to_string(), id.to_string()))
            .is_some()
        {
            self.inner.publish(collection, id, None);
        }
        Ok(())
    }

    async fn transact(
        &self,
        collection: &str,
        id: &str,
        apply: TransactFn,
    ) -> Result<Option<Value>, StoreError> {
        let mut documents = self.inner.documents();
        let key = (collection.to_string(), id.to_string());
        let current = documents.get(&key).map(|doc| doc.data.clone());
        let Some(data) = apply(current.clone())? else {
            return Ok(current);
        };
        if !data.is_object() {
            return Err(StoreError::NotAnObject);
        }
        let document = Document {
            collection: collection.to_string(),
            id: id.to_string(),
            data: data.clone(),
            updated_at_ms: Utc::now().timestamp_millis(),
        };
        documents.insert(key, document.clone());
        self.inner.publish(collection, id, Some(document));
        Ok(Some(data))
    }

    async fn watch(&self, collection: &str, id: &str) -> Result<Subscription, StoreError> {
        // Subscribing and reading under one lock means the feed starts
        // exactly after the initial snapshot.
        let (mut changes, initial) = {
            let documents = self.inner.documents();
            let initial = documents
                .get(&(collection.to_string(), id.to_string()))
                .cloned();
            (self.inner.changes.subscribe(), initial)
        };
        let (tx, rx) = mpsc::channel::<SnapshotResult>(SUBSCRIPTION_BUFFER);
        let inner = Arc::clone(&self.inner);
        let collection = collection.to_string();
        let id = id.to_string();

        let task = tokio::spawn(async move {
            if tx.send(Ok(initial)).await.is_err() {
                return;
            }
            loop {
                let next = match changes.recv().await {
                    Ok(change) if change.collection == collection && change.id == id => {
                        Ok(change.document)
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(%collection, %id, skipped, "subscription lagged; resyncing");
                        Ok(inner.snapshot(&collection, &id))
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        let _ = tx.send(Err(StoreError::Closed)).await;
                        return;
                    }
                };
                if tx.send(next).await.is_err() {
                    return;
                }
            }
        });

        Ok(Subscription::new(rx, task))
    }
}
