use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};

use crate::{
    error::AppError,
    models::{
        buddy::{BuddyLink, BuddyRequestPayload, BuddyRespondPayload},
        Session,
    },
    state::AppState,
};

pub async fn request_buddy(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(bus_id): Path<String>,
    Json(payload): Json<BuddyRequestPayload>,
) -> Result<(StatusCode, Json<BuddyLink>), AppError> {
    let link = state
        .buddies
        .request_as(&session, &bus_id, &payload.child_uid, &payload.buddy_uid)
        .await?;
    Ok((StatusCode::CREATED, Json(link)))
}

pub async fn respond_buddy(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(link_id): Path<String>,
    Json(payload): Json<BuddyRespondPayload>,
) -> Result<Json<BuddyLink>, AppError> {
    let link = state
        .buddies
        .respond_as(&session, &link_id, payload.accept)
        .await?;
    Ok(Json(link))
}

pub async fn cancel_buddy(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(link_id): Path<String>,
) -> Result<Json<BuddyLink>, AppError> {
    Ok(Json(state.buddies.cancel_as(&session, &link_id).await?))
}

pub async fn list_child_buddies(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(child_uid): Path<String>,
) -> Result<Json<Vec<BuddyLink>>, AppError> {
    let links = state
        .buddies
        .list_for_child_as(&session, &child_uid)
        .await?;
    Ok(Json(links))
}
