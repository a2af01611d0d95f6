//! Tour day attendance state.
//!
//! `ensure` materializes one participant per approved child for a bus and
//! day. Re-running it refreshes the profile snapshot (name, address,
//! locations) from the live user profile but never resets session statuses
//! a driver or parent already set.

use std::sync::Arc;

use futures::future::try_join_all;

use crate::{
    error::AppError,
    models::{
        bus_child::BusChildStatus,
        tour::{
            ParticipantStatus, SessionState, StoredSessions, TourDayResponse, TourParticipant,
            TourSession,
        },
        user::{UserDoc, UNNAMED},
        Session,
    },
    repositories::{bus_children, tours, users},
    services::access,
    store::{DocumentStore, StoreError},
    utils::time::now_ms,
};

pub const PARTICIPANT_NOT_FOUND: &str = "Participant not found for this tour day";
pub const GUARDIAN_STATUS_ONLY: &str = "Parents can only mark a child as going or not going.";

/// Statuses a child's guardian may set; everything else is driver-only.
const GUARDIAN_STATUSES: [ParticipantStatus; 2] =
    [ParticipantStatus::PickIn, ParticipantStatus::NotGoing];

/// Builds the participant record written by `ensure`: profile snapshot from
/// the current user document, sessions kept from the stored record when
/// present and defaulted to going/PICK_IN otherwise.
pub fn build_participant(
    bus_id: &str,
    date_key: &str,
    child_uid: &str,
    profile: Option<&UserDoc>,
    stored: StoredSessions,
    now_ms: i64,
) -> TourParticipant {
    TourParticipant {
        bus_id: bus_id.to_string(),
        date_key: date_key.to_string(),
        child_uid: child_uid.to_string(),
        child_name: profile
            .map(UserDoc::display_name)
            .unwrap_or_else(|| UNNAMED.to_string()),
        address: profile.and_then(|p| p.address.clone()),
        home_location: profile.and_then(|p| p.home_location),
        school_location: profile.and_then(|p| p.school_location),
        profile_synced_at_ms: now_ms,
        updated_at_ms: now_ms,
        morning: stored.morning.unwrap_or_default(),
        evening: stored.evening.unwrap_or_default(),
    }
}

fn sort_participants(participants: &mut [TourParticipant]) {
    participants.sort_by(|a, b| {
        a.child_name
            .to_lowercase()
            .cmp(&b.child_name.to_lowercase())
            .then_with(|| a.child_uid.cmp(&b.child_uid))
    });
}

#[derive(Clone)]
pub struct TourDayService {
    store: Arc<dyn DocumentStore>,
}

impl TourDayService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Upserts the day marker and one participant per approved child.
    pub async fn ensure_tour_day(
        &self,
        bus_id: &str,
        date_key: &str,
        now_ms: i64,
    ) -> Result<TourDayResponse, AppError> {
        let store = self.store.as_ref();
        let day = tours::upsert_day(store, bus_id, date_key, now_ms).await?;
        let approved =
            bus_children::list_for_bus(store, bus_id, Some(BusChildStatus::Approved)).await?;

        let mut participants = try_join_all(
            approved
                .iter()
                .map(|link| self.ensure_participant(bus_id, date_key, &link.child_uid, now_ms)),
        )
        .await?;
        sort_participants(&mut participants);

        tracing::info!(
            bus_id,
            date_key,
            participants = participants.len(),
            "tour day ensured"
        );
        Ok(TourDayResponse {
            day: Some(day),
            participants,
        })
    }

    pub async fn ensure_tour_day_as(
        &self,
        caller: &Session,
        bus_id: &str,
        date_key: &str,
    ) -> Result<TourDayResponse, AppError> {
        let bus = access::load_bus(self.store.as_ref(), bus_id).await?;
        access::require_driver_of(caller, &bus)?;
        self.ensure_tour_day(bus_id, date_key, now_ms()).await
    }

    async fn ensure_participant(
        &self,
        bus_id: &str,
        date_key: &str,
        child_uid: &str,
        now_ms: i64,
    ) -> Result<TourParticipant, StoreError> {
        let store = self.store.as_ref();
        let profile = users::find_user(store, child_uid).await?;
        let (bus, day, child) = (bus_id.to_string(), date_key.to_string(), child_uid.to_string());
        tours::refresh_participant(store, bus_id, date_key, child_uid, move |stored| {
            build_participant(&bus, &day, &child, profile.as_ref(), stored, now_ms)
        })
        .await
    }

    /// Writes one session of one participant. `going` defaults to
    /// `status != NOT_GOING`. The other session is left untouched.
    #[allow(clippy::too_many_arguments)]
    pub async fn update_participant_status(
        &self,
        bus_id: &str,
        child_uid: &str,
        session: TourSession,
        status: ParticipantStatus,
        date_key: &str,
        going: Option<bool>,
        now_ms: i64,
    ) -> Result<TourParticipant, AppError> {
        let store = self.store.as_ref();
        if tours::find_participant(store, bus_id, date_key, child_uid)
            .await?
            .is_none()
        {
            return Err(AppError::NotFound(PARTICIPANT_NOT_FOUND.into()));
        }

        let state = SessionState::new(status, going);
        tours::write_session(store, bus_id, date_key, child_uid, session, state, now_ms).await?;
        tracing::info!(
            bus_id,
            date_key,
            child_uid,
            session = session.field(),
            ?status,
            going = state.going,
            "participant status updated"
        );

        tours::find_participant(store, bus_id, date_key, child_uid)
            .await?
            .ok_or_else(|| AppError::NotFound(PARTICIPANT_NOT_FOUND.into()))
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn update_participant_status_as(
        &self,
        caller: &Session,
        bus_id: &str,
        child_uid: &str,
        session: TourSession,
        status: ParticipantStatus,
        date_key: &str,
        going: Option<bool>,
    ) -> Result<TourParticipant, AppError> {
        let store = self.store.as_ref();
        let bus = access::load_bus(store, bus_id).await?;
        if access::require_driver_of(caller, &bus).is_err() {
            access::require_guardian_of(store, caller, child_uid).await?;
            if !GUARDIAN_STATUSES.contains(&status) {
                return Err(AppError::Forbidden(GUARDIAN_STATUS_ONLY.into()));
            }
        }
        self.update_participant_status(
            bus_id,
            child_uid,
            session,
            status,
            date_key,
            going,
            now_ms(),
        )
        .await
    }

    /// Day marker (if ensured) and its participants, sorted by name.
    pub async fn get_tour_day(
        &self,
        bus_id: &str,
        date_key: &str,
    ) -> Result<TourDayResponse, AppError> {
        let store = self.store.as_ref();
        let (day, mut participants) = tokio::try_join!(
            tours::find_day(store, bus_id, date_key),
            tours::list_participants(store, bus_id, date_key)
        )?;
        sort_participants(&mut participants);
        Ok(TourDayResponse { day, participants })
    }

    pub async fn get_tour_day_as(
        &self,
        caller: &Session,
        bus_id: &str,
        date_key: &str,
    ) -> Result<TourDayResponse, AppError> {
        let store = self.store.as_ref();
        let bus = access::load_bus(store, bus_id).await?;
        access::require_member_of(store, caller, &bus).await?;
        let mut response = self.get_tour_day(bus_id, date_key).await?;
        if !bus.is_driven_by(&caller.uid) {
            // Riders only see the children they guard.
            let mut visible = Vec::with_capacity(response.participants.len());
            for participant in response.participants {
                if access::is_guardian_of(store, caller, &participant.child_uid).await? {
                    visible.push(participant);
                }
            }
            response.participants = visible;
        }
        Ok(response)
    }
}
