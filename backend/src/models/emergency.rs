use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{models::location::GeoPoint, types::EmergencyAlertId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Breakdown,
    Accident,
    Medical,
    Delay,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
}

/// Driver-raised alert stored at `emergencyAlerts/{alertId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyAlert {
    pub alert_id: EmergencyAlertId,
    pub bus_id: String,
    pub driver_uid: String,
    pub kind: AlertKind,
    pub message: String,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    pub status: AlertStatus,
    #[serde(default)]
    pub acknowledged_by: Vec<String>,
    #[serde(default)]
    pub resolved_at_ms: Option<i64>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl EmergencyAlert {
    pub fn is_open(&self) -> bool {
        self.status != AlertStatus::Resolved
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RaiseAlertPayload {
    pub kind: AlertKind,
    #[validate(length(min = 1, max = 500))]
    pub message: String,
    #[validate(nested)]
    #[serde(default)]
    pub location: Option<GeoPoint>,
}
