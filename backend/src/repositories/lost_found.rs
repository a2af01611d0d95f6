//! `lostFound/{itemId}` documents.

use crate::{
    models::lost_found::{ItemStatus, LostFoundItem},
    repositories::repository::{self, Record},
    store::{DocumentStore, Filter, StoreError, WriteMode},
    types::LostFoundItemId,
};

impl Record for LostFoundItem {
    const COLLECTION: &'static str = "lostFound";
}

pub async fn insert_item(store: &dyn DocumentStore, item: &LostFoundItem) -> Result<(), StoreError> {
    repository::save(store, &item.item_id.to_string(), item, WriteMode::Replace).await
}

pub async fn find_item(
    store: &dyn DocumentStore,
    item_id: LostFoundItemId,
) -> Result<Option<LostFoundItem>, StoreError> {
    repository::find(store, &item_id.to_string()).await
}

pub async fn update_item<F>(
    store: &dyn DocumentStore,
    item_id: LostFoundItemId,
    apply: F,
) -> Result<Option<LostFoundItem>, StoreError>
where
    F: FnOnce(Option<LostFoundItem>) -> Result<Option<LostFoundItem>, StoreError>
        + Send
        + 'static,
{
    repository::update(store, &item_id.to_string(), apply).await
}

pub async fn list_for_bus(
    store: &dyn DocumentStore,
    bus_id: &str,
) -> Result<Vec<LostFoundItem>, StoreError> {
    repository::find_where(store, &[Filter::eq("busId", bus_id)]).await
}

/// Resolved items whose retention window has passed.
pub async fn list_expired(
    store: &dyn DocumentStore,
    now_ms: i64,
) -> Result<Vec<LostFoundItem>, StoreError> {
    let resolved: Vec<LostFoundItem> =
        repository::find_where(store, &[Filter::eq("status", "resolved")]).await?;
    Ok(resolved
        .into_iter()
        .filter(|item| item.status == ItemStatus::Resolved && item.is_expired(now_ms))
        .collect())
}

pub async fn delete_item(store: &dyn DocumentStore, item_id: LostFoundItemId) -> Result<(), StoreError> {
    repository::remove::<LostFoundItem>(store, &item_id.to_string()).await
}
