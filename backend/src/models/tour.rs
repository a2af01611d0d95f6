use serde::{Deserialize, Serialize};

use crate::models::location::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParticipantStatus {
    PickIn,
    OnBus,
    Dropped,
    Absent,
    NotGoing,
}

impl ParticipantStatus {
    /// `going` value implied by a status when the caller does not supply one.
    pub fn implied_going(self) -> bool {
        self != ParticipantStatus::NotGoing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TourSession {
    Morning,
    Evening,
}

impl TourSession {
    pub fn field(self) -> &'static str {
        match self {
            TourSession::Morning => "morning",
            TourSession::Evening => "evening",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub going: bool,
    pub status: ParticipantStatus,
}

impl SessionState {
    /// Builds a session state, deriving `going` from the status unless given.
    pub fn new(status: ParticipantStatus, going: Option<bool>) -> Self {
        Self {
            going: going.unwrap_or_else(|| status.implied_going()),
            status,
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            going: true,
            status: ParticipantStatus::PickIn,
        }
    }
}

/// Day marker stored at `tourDays/{busId}_{dateKey}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourDay {
    pub bus_id: String,
    pub date_key: String,
    #[serde(default)]
    pub created_at_ms: i64,
    #[serde(default)]
    pub ensured_at_ms: i64,
}

/// One child on one bus for one day, stored at
/// `tourParticipants/{busId}_{dateKey}_{childUid}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourParticipant {
    pub bus_id: String,
    pub date_key: String,
    pub child_uid: String,
    pub child_name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub home_location: Option<GeoPoint>,
    #[serde(default)]
    pub school_location: Option<GeoPoint>,
    #[serde(default)]
    pub profile_synced_at_ms: i64,
    #[serde(default)]
    pub updated_at_ms: i64,
    #[serde(default)]
    pub morning: SessionState,
    #[serde(default)]
    pub evening: SessionState,
}

/// Session fields already present on a participant document. Each one is
/// kept as-is on refresh.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoredSessions {
    #[serde(default)]
    pub morning: Option<SessionState>,
    #[serde(default)]
    pub evening: Option<SessionState>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateParticipantPayload {
    pub session: TourSession,
    pub status: ParticipantStatus,
    #[serde(default)]
    pub going: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourDayResponse {
    pub day: Option<TourDay>,
    pub participants: Vec<TourParticipant>,
}

pub fn tour_day_key(bus_id: &str, date_key: &str) -> String {
    format!("{bus_id}_{date_key}")
}

pub fn participant_key(bus_id: &str, date_key: &str, child_uid: &str) -> String {
    format!("{bus_id}_{date_key}_{child_uid}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_screaming_snake_case() {
        let v = serde_json::to_value(ParticipantStatus::NotGoing).unwrap();
        assert_eq!(v, serde_json::json!("NOT_GOING"));
        let s: ParticipantStatus = serde_json::from_str("\"ON_BUS\"").unwrap();
        assert_eq!(s, ParticipantStatus::OnBus);
    }

    #[test]
    fn session_state_derives_going_from_status() {
        assert!(!SessionState::new(ParticipantStatus::NotGoing, None).going);
        for status in [
            ParticipantStatus::PickIn,
            ParticipantStatus::OnBus,
            ParticipantStatus::Dropped,
            ParticipantStatus::Absent,
        ] {
            assert!(SessionState::new(status, None).going, "{status:?}");
        }
    }

    #[test]
    fn explicit_going_wins_over_derived_value() {
        let state = SessionState::new(ParticipantStatus::Absent, Some(false));
        assert!(!state.going);
        assert_eq!(state.status, ParticipantStatus::Absent);
    }

    #[test]
    fn stored_sessions_reads_partial_documents() {
        let stored: StoredSessions = serde_json::from_value(serde_json::json!({
            "childName": "Ana",
            "morning": {"going": false, "status": "NOT_GOING"}
        }))
        .unwrap();
        assert_eq!(
            stored.morning,
            Some(SessionState::new(ParticipantStatus::NotGoing, None))
        );
        assert!(stored.evening.is_none());
    }

    #[test]
    fn keys_are_composite() {
        assert_eq!(tour_day_key("B1", "2024-09-02"), "B1_2024-09-02");
        assert_eq!(
            participant_key("B1", "2024-09-02", "C1"),
            "B1_2024-09-02_C1"
        );
    }
}
