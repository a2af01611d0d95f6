use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct GeoPoint {
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: f64,
}

/// Last position published by a bus driver, stored at `liveLocations/{busId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationPing {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    /// Stamped by the store writer when the ping is accepted.
    #[serde(default)]
    pub server_updated_at_ms: Option<i64>,
    /// Device clock at capture time, as reported by the driver app.
    #[serde(default)]
    pub client_updated_at_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_uid: Option<String>,
}

/// Driver's sharing switch, stored at `locationSharing/{busId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharingStatus {
    pub is_sharing: bool,
    #[serde(default)]
    pub updated_at_ms: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationSource {
    Live,
    Stale,
    None,
}

/// Freshness-qualified location shown to parents. Derived, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveLocationView {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub accuracy: Option<f64>,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub updated_at_ms: Option<i64>,
    pub is_sharing: bool,
    pub source: LocationSource,
    pub last_ago_ms: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PublishLocationPayload {
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: f64,
    #[validate(range(min = 0.0))]
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[validate(range(min = 0.0, max = 360.0))]
    #[serde(default)]
    pub heading: Option<f64>,
    #[validate(range(min = 0.0))]
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub client_updated_at_ms: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetSharingPayload {
    pub is_sharing: bool,
}
