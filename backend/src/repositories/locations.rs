//! Live location pings and sharing switches, both keyed by bus id.

use crate::{
    models::location::{LocationPing, SharingStatus},
    repositories::repository::{self, Record},
    store::{DocumentStore, StoreError, Subscription, WriteMode},
};

impl Record for LocationPing {
    const COLLECTION: &'static str = "liveLocations";
}

impl Record for SharingStatus {
    const COLLECTION: &'static str = "locationSharing";
}

pub async fn find_ping(store: &dyn DocumentStore, bus_id: &str) -> Result<Option<LocationPing>, StoreError> {
    repository::find(store, bus_id).await
}

pub async fn find_sharing(
    store: &dyn DocumentStore,
    bus_id: &str,
) -> Result<Option<SharingStatus>, StoreError> {
    repository::find(store, bus_id).await
}

pub async fn write_ping(
    store: &dyn DocumentStore,
    bus_id: &str,
    ping: &LocationPing,
) -> Result<(), StoreError> {
    repository::save(store, bus_id, ping, WriteMode::Replace).await
}

pub async fn write_sharing(
    store: &dyn DocumentStore,
    bus_id: &str,
    sharing: &SharingStatus,
) -> Result<(), StoreError> {
    repository::save(store, bus_id, sharing, WriteMode::Merge).await
}

pub async fn watch_ping(store: &dyn DocumentStore, bus_id: &str) -> Result<Subscription, StoreError> {
    store.watch(LocationPing::COLLECTION, bus_id).await
}

pub async fn watch_sharing(store: &dyn DocumentStore, bus_id: &str) -> Result<Subscription, StoreError> {
    store.watch(SharingStatus::COLLECTION, bus_id).await
}
