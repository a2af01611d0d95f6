//! `busChildren/{busId}_{childUid}` join-request documents.

use crate::{
    models::bus_child::{bus_child_key, BusChild, BusChildStatus},
    repositories::repository::{self, Record},
    store::{DocumentStore, Filter, StoreError},
};

impl Record for BusChild {
    const COLLECTION: &'static str = "busChildren";
}

pub async fn find_link(
    store: &dyn DocumentStore,
    bus_id: &str,
    child_uid: &str,
) -> Result<Option<BusChild>, StoreError> {
    repository::find(store, &bus_child_key(bus_id, child_uid)).await
}

pub async fn list_for_bus(
    store: &dyn DocumentStore,
    bus_id: &str,
    status: Option<BusChildStatus>,
) -> Result<Vec<BusChild>, StoreError> {
    let mut filters = vec![Filter::eq("busId", bus_id)];
    if let Some(status) = status {
        filters.push(Filter::eq("status", status.as_str()));
    }
    repository::find_where(store, &filters).await
}

pub async fn list_for_child(
    store: &dyn DocumentStore,
    child_uid: &str,
) -> Result<Vec<BusChild>, StoreError> {
    repository::find_where(store, &[Filter::eq("childUid", child_uid)]).await
}

/// Transactional read-modify-write of one link.
pub async fn update_link<F>(
    store: &dyn DocumentStore,
    bus_id: &str,
    child_uid: &str,
    apply: F,
) -> Result<Option<BusChild>, StoreError>
where
    F: FnOnce(Option<BusChild>) -> Result<Option<BusChild>, StoreError> + Send + 'static,
{
    repository::update(store, &bus_child_key(bus_id, child_uid), apply).await
}
