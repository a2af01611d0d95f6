use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation::rules::validate_document_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BusStatus {
    #[default]
    Active,
    Inactive,
}

/// Bus profile stored at `buses/{busId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusProfile {
    pub bus_id: String,
    pub driver_uid: String,
    pub name: String,
    pub plate_number: String,
    #[serde(default)]
    pub school_name: Option<String>,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub status: BusStatus,
    #[serde(default)]
    pub created_at_ms: i64,
    #[serde(default)]
    pub updated_at_ms: i64,
}

impl BusProfile {
    pub fn is_driven_by(&self, uid: &str) -> bool {
        self.driver_uid == uid
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBusPayload {
    /// Optional driver-chosen code; a UUID is generated otherwise.
    #[validate(custom(function = "validate_document_id"))]
    #[serde(default)]
    pub bus_id: Option<String>,
    #[validate(length(min = 1, max = 80))]
    pub name: String,
    #[validate(length(min = 1, max = 20))]
    pub plate_number: String,
    #[validate(length(max = 120))]
    #[serde(default)]
    pub school_name: Option<String>,
    #[validate(range(min = 1, max = 200))]
    #[serde(default)]
    pub capacity: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBusPayload {
    #[validate(length(min = 1, max = 80))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 20))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plate_number: Option<String>,
    #[validate(length(max = 120))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_name: Option<String>,
    #[validate(range(min = 1, max = 200))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<BusStatus>,
}
