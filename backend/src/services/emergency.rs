use std::sync::Arc;

use crate::{
    error::AppError,
    models::{
        emergency::{AlertStatus, EmergencyAlert, RaiseAlertPayload},
        Session,
    },
    repositories::emergencies,
    services::access,
    store::{DocumentStore, StoreError},
    types::EmergencyAlertId,
    utils::time::now_ms,
};

pub const ALERT_NOT_FOUND: &str = "Alert not found";
pub const ALERT_RESOLVED: &str = "Alert is already resolved.";

/// Records an acknowledgement. Repeats by the same uid change nothing.
pub fn acknowledge(alert: &mut EmergencyAlert, uid: &str, now_ms: i64) -> Result<bool, StoreError> {
    if alert.status == AlertStatus::Resolved {
        return Err(StoreError::Aborted(ALERT_RESOLVED.into()));
    }
    if alert.acknowledged_by.iter().any(|existing| existing == uid) {
        return Ok(false);
    }
    alert.acknowledged_by.push(uid.to_string());
    alert.status = AlertStatus::Acknowledged;
    alert.updated_at_ms = now_ms;
    Ok(true)
}

#[derive(Clone)]
pub struct EmergencyService {
    store: Arc<dyn DocumentStore>,
}

impl EmergencyService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn raise_as(
        &self,
        caller: &Session,
        bus_id: &str,
        payload: RaiseAlertPayload,
    ) -> Result<EmergencyAlert, AppError> {
        let store = self.store.as_ref();
        let bus = access::load_bus(store, bus_id).await?;
        access::require_driver_of(caller, &bus)?;

        let now = now_ms();
        let alert = EmergencyAlert {
            alert_id: EmergencyAlertId::new(),
            bus_id: bus_id.to_string(),
            driver_uid: caller.uid.clone(),
            kind: payload.kind,
            message: payload.message.trim().to_string(),
            location: payload.location,
            status: AlertStatus::Active,
            acknowledged_by: Vec::new(),
            resolved_at_ms: None,
            created_at_ms: now,
            updated_at_ms: now,
        };
        emergencies::insert_alert(store, &alert).await?;
        tracing::warn!(bus_id, alert_id = %alert.alert_id, kind = ?alert.kind, "emergency alert raised");
        Ok(alert)
    }

    pub async fn acknowledge_as(
        &self,
        caller: &Session,
        alert_id: EmergencyAlertId,
    ) -> Result<EmergencyAlert, AppError> {
        let uid = caller.uid.clone();
        let now = now_ms();
        emergencies::update_alert(self.store.as_ref(), alert_id, move |current| {
            let Some(mut alert) = current else {
                return Ok(None);
            };
            Ok(acknowledge(&mut alert, &uid, now)?.then_some(alert))
        })
        .await?
        .ok_or_else(|| AppError::NotFound(ALERT_NOT_FOUND.into()))
    }

    pub async fn resolve_as(
        &self,
        caller: &Session,
        alert_id: EmergencyAlertId,
    ) -> Result<EmergencyAlert, AppError> {
        let store = self.store.as_ref();
        let alert = emergencies::find_alert(store, alert_id)
            .await?
            .ok_or_else(|| AppError::NotFound(ALERT_NOT_FOUND.into()))?;
        let bus = access::load_bus(store, &alert.bus_id).await?;
        access::require_driver_of(caller, &bus)?;

        let now = now_ms();
        let alert = emergencies::update_alert(store, alert_id, move |current| {
            let Some(mut alert) = current else {
                return Ok(None);
            };
            if !alert.is_open() {
                return Err(StoreError::Aborted(ALERT_RESOLVED.into()));
            }
            alert.status = AlertStatus::Resolved;
            alert.resolved_at_ms = Some(now);
            alert.updated_at_ms = now;
            Ok(Some(alert))
        })
        .await?
        .ok_or_else(|| AppError::NotFound(ALERT_NOT_FOUND.into()))?;
        tracing::info!(alert_id = %alert.alert_id, "emergency alert resolved");
        Ok(alert)
    }

    /// Open alerts for the bus, newest first.
    pub async fn list_active(&self, bus_id: &str) -> Result<Vec<EmergencyAlert>, AppError> {
        let mut alerts: Vec<EmergencyAlert> = emergencies::list_for_bus(self.store.as_ref(), bus_id)
            .await?
            .into_iter()
            .filter(EmergencyAlert::is_open)
            .collect();
        alerts.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
        Ok(alerts)
    }

    pub async fn list_active_as(
        &self,
        caller: &Session,
        bus_id: &str,
    ) -> Result<Vec<EmergencyAlert>, AppError> {
        let store = self.store.as_ref();
        let bus = access::load_bus(store, bus_id).await?;
        access::require_member_of(store, caller, &bus).await?;
        self.list_active(bus_id).await
    }
}
