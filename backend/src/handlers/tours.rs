use axum::{
    extract::{Path, State},
    Extension, Json,
};

use crate::{
    error::AppError,
    models::{
        tour::{TourDayResponse, TourParticipant, UpdateParticipantPayload},
        Session,
    },
    state::AppState,
    utils::time::resolve_date_key,
};

const INVALID_DATE_KEY: &str = "dateKey must be YYYY-MM-DD or 'today'";

fn date_key(state: &AppState, raw: &str) -> Result<String, AppError> {
    resolve_date_key(raw, &state.config.time_zone)
        .ok_or_else(|| AppError::BadRequest(INVALID_DATE_KEY.into()))
}

pub async fn ensure_tour_day(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path((bus_id, raw_date)): Path<(String, String)>,
) -> Result<Json<TourDayResponse>, AppError> {
    let date_key = date_key(&state, &raw_date)?;
    let response = state
        .tours
        .ensure_tour_day_as(&session, &bus_id, &date_key)
        .await?;
    Ok(Json(response))
}

pub async fn get_tour_day(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path((bus_id, raw_date)): Path<(String, String)>,
) -> Result<Json<TourDayResponse>, AppError> {
    let date_key = date_key(&state, &raw_date)?;
    let response = state
        .tours
        .get_tour_day_as(&session, &bus_id, &date_key)
        .await?;
    Ok(Json(response))
}

pub async fn update_participant(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path((bus_id, raw_date, child_uid)): Path<(String, String, String)>,
    Json(payload): Json<UpdateParticipantPayload>,
) -> Result<Json<TourParticipant>, AppError> {
    let date_key = date_key(&state, &raw_date)?;
    let participant = state
        .tours
        .update_participant_status_as(
            &session,
            &bus_id,
            &child_uid,
            payload.session,
            payload.status,
            &date_key,
            payload.going,
        )
        .await?;
    Ok(Json(participant))
}
