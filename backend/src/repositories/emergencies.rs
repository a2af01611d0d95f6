//! `emergencyAlerts/{alertId}` documents.

use crate::{
    models::emergency::EmergencyAlert,
    repositories::repository::{self, Record},
    store::{DocumentStore, Filter, StoreError, WriteMode},
    types::EmergencyAlertId,
};

impl Record for EmergencyAlert {
    const COLLECTION: &'static str = "emergencyAlerts";
}

pub async fn insert_alert(store: &dyn DocumentStore, alert: &EmergencyAlert) -> Result<(), StoreError> {
    repository::save(store, &alert.alert_id.to_string(), alert, WriteMode::Replace).await
}

pub async fn find_alert(
    store: &dyn DocumentStore,
    alert_id: EmergencyAlertId,
) -> Result<Option<EmergencyAlert>, StoreError> {
    repository::find(store, &alert_id.to_string()).await
}

pub async fn update_alert<F>(
    store: &dyn DocumentStore,
    alert_id: EmergencyAlertId,
    apply: F,
) -> Result<Option<EmergencyAlert>, StoreError>
where
    F: FnOnce(Option<EmergencyAlert>) -> Result<Option<EmergencyAlert>, StoreError>
        + Send
        + 'static,
{
    repository::update(store, &alert_id.to_string(), apply).await
}

pub async fn list_for_bus(
    store: &dyn DocumentStore,
    bus_id: &str,
) -> Result<Vec<EmergencyAlert>, StoreError> {
    repository::find_where(store, &[Filter::eq("busId", bus_id)]).await
}
