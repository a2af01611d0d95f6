use axum::{
    extract::{Path, State},
    Extension, Json,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        user::{UpdateProfilePayload, UserDoc},
        Session,
    },
    repositories::users,
    state::AppState,
    utils::time::now_ms,
};

const PROFILE_NOT_FOUND: &str = "Profile not found";

pub async fn update_my_profile(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(payload): Json<UpdateProfilePayload>,
) -> Result<Json<UserDoc>, AppError> {
    payload.validate()?;
    let profile =
        users::upsert_profile(state.store(), &session.uid, session.role, &payload, now_ms())
            .await?;
    tracing::info!(uid = %session.uid, "profile updated");
    Ok(Json(profile))
}

pub async fn get_my_profile(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<UserDoc>, AppError> {
    users::find_user(state.store(), &session.uid)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(PROFILE_NOT_FOUND.into()))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> Result<Json<UserDoc>, AppError> {
    users::find_user(state.store(), &uid)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(PROFILE_NOT_FOUND.into()))
}
