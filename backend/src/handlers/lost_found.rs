use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        lost_found::{LostFoundItem, ReportItemPayload},
        Session,
    },
    state::AppState,
    types::LostFoundItemId,
};

pub async fn report_item(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(bus_id): Path<String>,
    Json(payload): Json<ReportItemPayload>,
) -> Result<(StatusCode, Json<LostFoundItem>), AppError> {
    payload.validate()?;
    let item = state
        .lost_found
        .report_as(&session, &bus_id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn list_items(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(bus_id): Path<String>,
) -> Result<Json<Vec<LostFoundItem>>, AppError> {
    Ok(Json(state.lost_found.list_as(&session, &bus_id).await?))
}

pub async fn claim_item(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(item_id): Path<LostFoundItemId>,
) -> Result<Json<LostFoundItem>, AppError> {
    Ok(Json(state.lost_found.claim_as(&session, item_id).await?))
}

pub async fn resolve_item(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(item_id): Path<LostFoundItemId>,
) -> Result<Json<LostFoundItem>, AppError> {
    Ok(Json(state.lost_found.resolve_as(&session, item_id).await?))
}
