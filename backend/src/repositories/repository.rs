//! Record trait and typed access helpers.
//!
//! Every persisted record type implements [`Record`] to name its collection.
//! The helpers below translate between typed records and raw store
//! documents so the per-collection modules only contain their own queries.

use serde::{de::DeserializeOwned, Serialize};

use crate::store::{to_document, DocumentStore, Filter, StoreError, WriteMode};

/// A record type stored in one collection of the document store.
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Target collection name.
    const COLLECTION: &'static str;
}

/// Finds a single record by document id.
pub async fn find<T: Record>(store: &dyn DocumentStore, id: &str) -> Result<Option<T>, StoreError> {
    match store.get(T::COLLECTION, id).await? {
        Some(doc) => Ok(Some(doc.decode()?)),
        None => Ok(None),
    }
}

/// Finds all records matching every equality filter, ordered by document id.
pub async fn find_where<T: Record>(
    store: &dyn DocumentStore,
    filters: &[Filter],
) -> Result<Vec<T>, StoreError> {
    store
        .query(T::COLLECTION, filters)
        .await?
        .iter()
        .map(|doc| doc.decode())
        .collect()
}

/// Writes a record under `id`.
pub async fn save<T: Record>(
    store: &dyn DocumentStore,
    id: &str,
    record: &T,
    mode: WriteMode,
) -> Result<(), StoreError> {
    store
        .set(T::COLLECTION, id, to_document(record)?, mode)
        .await
}

/// Typed read-modify-write. `apply` sees the current record (if any) and
/// returns the record to store, or `None` to leave it untouched. Returns the
/// record as it stands after the transaction.
pub async fn update<T, F>(
    store: &dyn DocumentStore,
    id: &str,
    apply: F,
) -> Result<Option<T>, StoreError>
where
    T: Record,
    F: FnOnce(Option<T>) -> Result<Option<T>, StoreError> + Send + 'static,
{
    let committed = store
        .transact(
            T::COLLECTION,
            id,
            Box::new(move |current| {
                let current = current.map(serde_json::from_value::<T>).transpose()?;
                apply(current)?.map(|record| to_document(&record)).transpose()
            }),
        )
        .await?;
    Ok(committed.map(serde_json::from_value).transpose()?)
}

/// Deletes a record by document id. Missing documents are not an error.
pub async fn remove<T: Record>(store: &dyn DocumentStore, id: &str) -> Result<(), StoreError> {
    store.delete(T::COLLECTION, id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Counter {
        value: i64,
    }

    impl Record for Counter {
        const COLLECTION: &'static str = "counters";
    }

    #[tokio::test]
    async fn update_creates_then_modifies_record() {
        let store = MemoryStore::new();
        let first = update::<Counter, _>(&store, "c", |current| {
            assert!(current.is_none());
            Ok(Some(Counter { value: 1 }))
        })
        .await
        .unwrap();
        assert_eq!(first, Some(Counter { value: 1 }));

        let second = update::<Counter, _>(&store, "c", |current| {
            let mut counter = current.expect("exists");
            counter.value += 1;
            Ok(Some(counter))
        })
        .await
        .unwrap();
        assert_eq!(second, Some(Counter { value: 2 }));
        assert_eq!(find::<Counter>(&store, "c").await.unwrap(), second);
    }

    #[tokio::test]
    async fn update_returning_none_keeps_current_record() {
        let store = MemoryStore::new();
        save(&store, "c", &Counter { value: 7 }, WriteMode::Replace)
            .await
            .unwrap();
        let result = update::<Counter, _>(&store, "c", |_| Ok(None)).await.unwrap();
        assert_eq!(result, Some(Counter { value: 7 }));
    }

    #[tokio::test]
    async fn find_where_decodes_matching_records() {
        let store = MemoryStore::new();
        save(&store, "a", &Counter { value: 1 }, WriteMode::Replace)
            .await
            .unwrap();
        save(&store, "b", &Counter { value: 2 }, WriteMode::Replace)
            .await
            .unwrap();
        let found: Vec<Counter> = find_where(&store, &[Filter::eq("value", 2)]).await.unwrap();
        assert_eq!(found, vec![Counter { value: 2 }]);

        remove::<Counter>(&store, "b").await.unwrap();
        let found: Vec<Counter> = find_where(&store, &[]).await.unwrap();
        assert_eq!(found, vec![Counter { value: 1 }]);
    }
}
