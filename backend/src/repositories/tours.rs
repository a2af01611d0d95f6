//! Tour day markers and per-child participant documents.

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::{
    models::tour::{
        participant_key, tour_day_key, SessionState, StoredSessions, TourDay, TourParticipant,
        TourSession,
    },
    repositories::repository::{self, Record},
    store::{apply_write, to_document, DocumentStore, Filter, StoreError, WriteMode},
};

impl Record for TourDay {
    const COLLECTION: &'static str = "tourDays";
}

impl Record for TourParticipant {
    const COLLECTION: &'static str = "tourParticipants";
}

pub async fn find_day(
    store: &dyn DocumentStore,
    bus_id: &str,
    date_key: &str,
) -> Result<Option<TourDay>, StoreError> {
    repository::find(store, &tour_day_key(bus_id, date_key)).await
}

/// Upserts the day marker. `createdAtMs` is kept from the first write.
pub async fn upsert_day(
    store: &dyn DocumentStore,
    bus_id: &str,
    date_key: &str,
    now_ms: i64,
) -> Result<TourDay, StoreError> {
    let day = TourDay {
        bus_id: bus_id.to_string(),
        date_key: date_key.to_string(),
        created_at_ms: now_ms,
        ensured_at_ms: now_ms,
    };
    repository::update::<TourDay, _>(store, &tour_day_key(bus_id, date_key), move |current| {
        let created_at_ms = current
            .map(|existing| existing.created_at_ms)
            .filter(|created| *created > 0)
            .unwrap_or(day.created_at_ms);
        Ok(Some(TourDay {
            created_at_ms,
            ..day
        }))
    })
    .await?
    .ok_or(StoreError::NotAnObject)
}

pub async fn find_participant(
    store: &dyn DocumentStore,
    bus_id: &str,
    date_key: &str,
    child_uid: &str,
) -> Result<Option<TourParticipant>, StoreError> {
    repository::find(store, &participant_key(bus_id, date_key, child_uid)).await
}

/// Refreshes a participant inside one transaction. `build` receives the
/// session fields currently stored (if any) and returns the participant to
/// merge over the existing document, so a session written concurrently is
/// never overwritten with an older value.
pub async fn refresh_participant<F>(
    store: &dyn DocumentStore,
    bus_id: &str,
    date_key: &str,
    child_uid: &str,
    build: F,
) -> Result<TourParticipant, StoreError>
where
    F: FnOnce(StoredSessions) -> TourParticipant + Send + 'static,
{
    let committed = store
        .transact(
            TourParticipant::COLLECTION,
            &participant_key(bus_id, date_key, child_uid),
            Box::new(move |current| {
                let stored = match &current {
                    Some(data) => StoredSessions::deserialize(data)?,
                    None => StoredSessions::default(),
                };
                let participant = to_document(&build(stored))?;
                Ok(Some(apply_write(current, participant, WriteMode::Merge)))
            }),
        )
        .await?
        .ok_or(StoreError::NotAnObject)?;
    Ok(serde_json::from_value(committed)?)
}

/// Merge-writes a single session field, leaving the other session alone.
pub async fn write_session(
    store: &dyn DocumentStore,
    bus_id: &str,
    date_key: &str,
    child_uid: &str,
    session: TourSession,
    state: SessionState,
    now_ms: i64,
) -> Result<(), StoreError> {
    let mut patch = Map::new();
    patch.insert(session.field().to_string(), serde_json::to_value(state)?);
    patch.insert("updatedAtMs".to_string(), json!(now_ms));
    store
        .set(
            TourParticipant::COLLECTION,
            &participant_key(bus_id, date_key, child_uid),
            Value::Object(patch),
            WriteMode::Merge,
        )
        .await
}

pub async fn list_participants(
    store: &dyn DocumentStore,
    bus_id: &str,
    date_key: &str,
) -> Result<Vec<TourParticipant>, StoreError> {
    repository::find_where(
        store,
        &[Filter::eq("busId", bus_id), Filter::eq("dateKey", date_key)],
    )
    .await
}
