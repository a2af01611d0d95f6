//! `buddyLinks/{busId}_{childA}_{childB}` pairing documents.

use std::collections::BTreeMap;

use crate::{
    models::buddy::BuddyLink,
    repositories::repository::{self, Record},
    store::{DocumentStore, Filter, StoreError},
};

impl Record for BuddyLink {
    const COLLECTION: &'static str = "buddyLinks";
}

pub async fn find_link(store: &dyn DocumentStore, link_id: &str) -> Result<Option<BuddyLink>, StoreError> {
    repository::find(store, link_id).await
}

pub async fn update_link<F>(
    store: &dyn DocumentStore,
    link_id: &str,
    apply: F,
) -> Result<Option<BuddyLink>, StoreError>
where
    F: FnOnce(Option<BuddyLink>) -> Result<Option<BuddyLink>, StoreError> + Send + 'static,
{
    repository::update(store, link_id, apply).await
}

/// Links where the child is on either side, ordered by link id.
pub async fn list_for_child(
    store: &dyn DocumentStore,
    child_uid: &str,
) -> Result<Vec<BuddyLink>, StoreError> {
    let as_a: Vec<BuddyLink> =
        repository::find_where(store, &[Filter::eq("childA", child_uid)]).await?;
    let as_b: Vec<BuddyLink> =
        repository::find_where(store, &[Filter::eq("childB", child_uid)]).await?;

    let merged: BTreeMap<String, BuddyLink> = as_a
        .into_iter()
        .chain(as_b)
        .map(|link| (link.link_id.clone(), link))
        .collect();
    Ok(merged.into_values().collect())
}
