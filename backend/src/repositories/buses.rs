//! `buses/{busId}` profile documents.

use crate::{
    models::bus::BusProfile,
    repositories::repository::{self, Record},
    store::{DocumentStore, Filter, StoreError, WriteMode},
};

impl Record for BusProfile {
    const COLLECTION: &'static str = "buses";
}

pub const BUS_ID_TAKEN: &str = "A bus with this id already exists.";

pub async fn find_bus(store: &dyn DocumentStore, bus_id: &str) -> Result<Option<BusProfile>, StoreError> {
    repository::find(store, bus_id).await
}

/// Inserts a new bus, failing if the id is already taken.
pub async fn insert_bus(store: &dyn DocumentStore, bus: BusProfile) -> Result<BusProfile, StoreError> {
    let bus_id = bus.bus_id.clone();
    repository::update::<BusProfile, _>(store, &bus_id, move |current| {
        if current.is_some() {
            return Err(StoreError::Aborted(BUS_ID_TAKEN.into()));
        }
        Ok(Some(bus))
    })
    .await?
    .ok_or(StoreError::NotAnObject)
}

pub async fn save_bus(store: &dyn DocumentStore, bus: &BusProfile) -> Result<(), StoreError> {
    repository::save(store, &bus.bus_id, bus, WriteMode::Replace).await
}

pub async fn list_buses(
    store: &dyn DocumentStore,
    driver_uid: Option<&str>,
) -> Result<Vec<BusProfile>, StoreError> {
    let filters: Vec<Filter> = driver_uid
        .map(|uid| vec![Filter::eq("driverUid", uid)])
        .unwrap_or_default();
    repository::find_where(store, &filters).await
}
