use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Extension, Json,
};
use futures::{stream, Stream};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        location::{
            LiveLocationView, LocationPing, PublishLocationPayload, SetSharingPayload,
            SharingStatus,
        },
        Session,
    },
    state::AppState,
};

const LIVE_LOCATION_EVENT: &str = "live-location";

pub async fn publish_location(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(bus_id): Path<String>,
    Json(payload): Json<PublishLocationPayload>,
) -> Result<Json<LocationPing>, AppError> {
    payload.validate()?;
    let ping = state
        .live_location
        .publish_ping_as(&session, &bus_id, &payload)
        .await?;
    Ok(Json(ping))
}

pub async fn set_sharing(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(bus_id): Path<String>,
    Json(payload): Json<SetSharingPayload>,
) -> Result<Json<SharingStatus>, AppError> {
    let status = state
        .live_location
        .set_sharing_as(&session, &bus_id, payload.is_sharing)
        .await?;
    Ok(Json(status))
}

/// Snapshot of the merged view; `null` when the bus has neither record.
pub async fn get_live_location(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(bus_id): Path<String>,
) -> Result<Json<Option<LiveLocationView>>, AppError> {
    let view = state.live_location.snapshot_as(&session, &bus_id).await?;
    Ok(Json(view))
}

/// Server-sent events, one `live-location` event per emitted view. The
/// subscription ends when the client disconnects and the stream is dropped.
pub async fn stream_live_location(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(bus_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let subscription = state.live_location.subscribe_as(&session, &bus_id).await?;
    tracing::debug!(%bus_id, uid = %session.uid, "live location stream opened");

    let initial = subscription.current();
    let events = stream::unfold(
        (subscription, Some(initial)),
        |(mut subscription, pending)| async move {
            let view = match pending {
                Some(view) => view,
                None => subscription.changed().await?,
            };
            Some((Ok(view_event(&view)), (subscription, None)))
        },
    );
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn view_event(view: &Option<LiveLocationView>) -> Event {
    Event::default()
        .event(LIVE_LOCATION_EVENT)
        .json_data(view)
        .unwrap_or_else(|_| Event::default().event(LIVE_LOCATION_EVENT).data("null"))
}
