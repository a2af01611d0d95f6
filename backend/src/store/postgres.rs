//! PostgreSQL document store.
//!
//! Documents live in a single JSONB table keyed by `(collection, id)`.
//! Writers to the same document are serialized with a transaction-scoped
//! advisory lock, and every committed write emits a `NOTIFY` on
//! [`CHANGE_CHANNEL`] so subscribers can refetch. One `LISTEN` connection
//! per store fans notices out to all watchers.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{postgres::PgListener, FromRow, PgPool, Postgres, Transaction};
use tokio::sync::{broadcast, mpsc, OnceCell};

use super::{
    apply_write, Document, DocumentStore, Filter, SnapshotResult, StoreError, Subscription,
    TransactFn, WriteMode, SUBSCRIPTION_BUFFER,
};

pub const CHANGE_CHANNEL: &str = "safebus_document_changes";

const NOTICE_CHANNEL_CAPACITY: usize = 1024;
const LISTENER_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, FromRow)]
struct DocumentRow {
    collection: String,
    id: String,
    data: Value,
    updated_at: DateTime<Utc>,
}

impl From<DocumentRow> for Document {
    fn from(row: DocumentRow) -> Self {
        Self {
            collection: row.collection,
            id: row.id,
            data: row.data,
            updated_at_ms: row.updated_at.timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChangeNotice {
    collection: String,
    id: String,
}

/// What the shared listener broadcasts to watchers.
#[derive(Debug, Clone)]
enum ChangeEvent {
    Changed(ChangeNotice),
    /// The listener reconnected and notices may have been missed.
    Resync,
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    changes: Arc<OnceCell<broadcast::Sender<ChangeEvent>>>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            changes: Arc::new(OnceCell::new()),
        }
    }

    /// Subscribes to the shared change feed, starting the listener on first
    /// use. `LISTEN` is active before this returns.
    async fn change_events(&self) -> Result<broadcast::Receiver<ChangeEvent>, StoreError> {
        let sender = self
            .changes
            .get_or_try_init(|| async {
                let mut listener = PgListener::connect_with(&self.pool).await?;
                listener.listen(CHANGE_CHANNEL).await?;
                let (sender, _) = broadcast::channel(NOTICE_CHANNEL_CAPACITY);
                tokio::spawn(run_listener(listener, sender.clone()));
                tracing::debug!(channel = CHANGE_CHANNEL, "document change listener started");
                Ok::<_, StoreError>(sender)
            })
            .await?;
        Ok(sender.subscribe())
    }

    async fn lock_document(
        tx: &mut Transaction<'_, Postgres>,
        collection: &str,
        id: &str,
    ) -> Result<(), StoreError> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(format!("{collection}/{id}"))
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn read_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        collection: &str,
        id: &str,
    ) -> Result<Option<Value>, StoreError> {
        let data = sqlx::query_scalar::<_, Value>(
            "SELECT data FROM documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(data)
    }

    async fn write_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        collection: &str,
        id: &str,
        data: &Value,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO documents (collection, id, data, updated_at) VALUES ($1, $2, $3, NOW()) \
             ON CONFLICT (collection, id) DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()",
        )
        .bind(collection)
        .bind(id)
        .bind(data)
        .execute(&mut **tx)
        .await?;
        Self::notify_in_tx(tx, collection, id).await
    }

    async fn notify_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        collection: &str,
        id: &str,
    ) -> Result<(), StoreError> {
        let payload = serde_json::to_string(&ChangeNotice {
            collection: collection.to_string(),
            id: id.to_string(),
        })?;
        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(CHANGE_CHANNEL)
            .bind(payload)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

/// Builds the `@>` containment object for a set of equality filters.
fn containment(filters: &[Filter]) -> Value {
    let mut object = Map::new();
    for filter in filters {
        object.insert(filter.field.clone(), filter.value.clone());
    }
    Value::Object(object)
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            "SELECT collection, id, data, updated_at FROM documents \
             WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Document::from))
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
        let mut tx = self.pool.begin().await?;
        Self::lock_document(&mut tx, collection, id).await?;
        let current = match mode {
            WriteMode::Merge => Self::read_in_tx(&mut tx, collection, id).await?,
            WriteMode::Replace => None,
        };
        let merged = apply_write(current, data, mode);
        Self::write_in_tx(&mut tx, collection, id, &merged).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
    ) -> Result<Vec<Document>, StoreError> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            "SELECT collection, id, data, updated_at FROM documents \
             WHERE collection = $1 AND data @> $2 ORDER BY id",
        )
        .bind(collection)
        .bind(containment(filters))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Document::from).collect())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() > 0 {
            Self::notify_in_tx(&mut tx, collection, id).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn transact(
        &self,
        collection: &str,
        id: &str,
        apply: TransactFn,
    ) -> Result<Option<Value>, StoreError> {
        let mut tx = self.pool.begin().await?;
        Self::lock_document(&mut tx, collection, id).await?;
        let current = Self::read_in_tx(&mut tx, collection, id).await?;
        match apply(current.clone())? {
            Some(data) => {
                if !data.is_object() {
                    return Err(StoreError::NotAnObject);
                }
                Self::write_in_tx(&mut tx, collection, id, &data).await?;
                tx.commit().await?;
                Ok(Some(data))
            }
            None => {
                tx.rollback().await?;
                Ok(current)
            }
        }
    }

    async fn watch(&self, collection: &str, id: &str) -> Result<Subscription, StoreError> {
        let mut events = self.change_events().await?;
        let initial = self.get(collection, id).await?;

        let (tx, rx) = mpsc::channel::<SnapshotResult>(SUBSCRIPTION_BUFFER);
        let store = self.clone();
        let collection = collection.to_string();
        let id = id.to_string();

        let task = tokio::spawn(async move {
            if tx.send(Ok(initial)).await.is_err() {
                return;
            }
            loop {
                let refetch = match events.recv().await {
                    Ok(ChangeEvent::Changed(notice)) => {
                        notice.collection == collection && notice.id == id
                    }
                    Ok(ChangeEvent::Resync) => true,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(%collection, %id, skipped, "change feed lagged; resyncing");
                        true
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        let _ = tx.send(Err(StoreError::Closed)).await;
                        return;
                    }
                };
                if !refetch {
                    continue;
                }
                let snapshot = store.get(&collection, &id).await;
                if tx.send(snapshot).await.is_err() {
                    return;
                }
            }
        });

        Ok(Subscription::new(rx, task))
    }
}

/// Forwards `NOTIFY` payloads to every watcher. `PgListener` reconnects on
/// the next `recv` after a connection loss; watchers refetch when that happens.
async fn run_listener(mut listener: PgListener, sender: broadcast::Sender<ChangeEvent>) {
    loop {
        let event = match listener.recv().await {
            Ok(notification) => match serde_json::from_str::<ChangeNotice>(notification.payload()) {
                Ok(notice) => ChangeEvent::Changed(notice),
                Err(err) => {
                    tracing::debug!(error = %err, "ignoring malformed change notice");
                    continue;
                }
            },
            Err(err) => {
                tracing::warn!(error = %err, "document change listener failed; reconnecting");
                tokio::time::sleep(LISTENER_RETRY_DELAY).await;
                ChangeEvent::Resync
            }
        };
        // Nobody watching is fine.
        let _ = sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn containment_builds_object_from_filters() {
        let value = containment(&[Filter::eq("busId", "B1"), Filter::eq("status", "approved")]);
        assert_eq!(value, json!({"busId": "B1", "status": "approved"}));
    }

    #[test]
    fn containment_without_filters_matches_everything() {
        assert_eq!(containment(&[]), json!({}));
    }

    #[test]
    fn change_notice_round_trips_payload() {
        let payload = serde_json::to_string(&ChangeNotice {
            collection: "buses".into(),
            id: "B1".into(),
        })
        .unwrap();
        let notice: ChangeNotice = serde_json::from_str(&payload).unwrap();
        assert_eq!(notice.collection, "buses");
        assert_eq!(notice.id, "B1");
    }
}
