use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusChildStatus {
    Pending,
    Approved,
    Rejected,
    Removed,
}

impl BusChildStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BusChildStatus::Pending => "pending",
            BusChildStatus::Approved => "approved",
            BusChildStatus::Rejected => "rejected",
            BusChildStatus::Removed => "removed",
        }
    }
}

/// Link between a bus and a child, stored at `busChildren/{busId}_{childUid}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusChild {
    pub bus_id: String,
    pub child_uid: String,
    pub requested_by: String,
    pub status: BusChildStatus,
    pub requested_at_ms: i64,
    #[serde(default)]
    pub decided_at_ms: Option<i64>,
    #[serde(default)]
    pub decided_by: Option<String>,
}

impl BusChild {
    pub fn pending(bus_id: &str, child_uid: &str, requested_by: &str, now_ms: i64) -> Self {
        Self {
            bus_id: bus_id.to_string(),
            child_uid: child_uid.to_string(),
            requested_by: requested_by.to_string(),
            status: BusChildStatus::Pending,
            requested_at_ms: now_ms,
            decided_at_ms: None,
            decided_by: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequestPayload {
    pub child_uid: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BusChildQuery {
    pub status: Option<BusChildStatus>,
}

pub fn bus_child_key(bus_id: &str, child_uid: &str) -> String {
    format!("{bus_id}_{child_uid}")
}
