use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        emergency::{EmergencyAlert, RaiseAlertPayload},
        Session,
    },
    state::AppState,
    types::EmergencyAlertId,
};

pub async fn raise_alert(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(bus_id): Path<String>,
    Json(payload): Json<RaiseAlertPayload>,
) -> Result<(StatusCode, Json<EmergencyAlert>), AppError> {
    payload.validate()?;
    let alert = state
        .emergencies
        .raise_as(&session, &bus_id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(alert)))
}

pub async fn list_active_alerts(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(bus_id): Path<String>,
) -> Result<Json<Vec<EmergencyAlert>>, AppError> {
    Ok(Json(
        state.emergencies.list_active_as(&session, &bus_id).await?,
    ))
}

pub async fn acknowledge_alert(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(alert_id): Path<EmergencyAlertId>,
) -> Result<Json<EmergencyAlert>, AppError> {
    Ok(Json(
        state.emergencies.acknowledge_as(&session, alert_id).await?,
    ))
}

pub async fn resolve_alert(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(alert_id): Path<EmergencyAlertId>,
) -> Result<Json<EmergencyAlert>, AppError> {
    Ok(Json(state.emergencies.resolve_as(&session, alert_id).await?))
}
