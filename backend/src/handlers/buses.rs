use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        bus::{BusProfile, BusStatus, CreateBusPayload, UpdateBusPayload},
        Session,
    },
    repositories::buses,
    services::access,
    state::AppState,
    utils::time::now_ms,
};

const DRIVERS_ONLY: &str = "Only drivers can register a bus.";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusListQuery {
    pub driver_uid: Option<String>,
}

pub async fn create_bus(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(payload): Json<CreateBusPayload>,
) -> Result<(StatusCode, Json<BusProfile>), AppError> {
    if !session.is_driver() {
        return Err(AppError::Forbidden(DRIVERS_ONLY.into()));
    }
    payload.validate()?;

    let now = now_ms();
    let bus = BusProfile {
        bus_id: payload
            .bus_id
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string()),
        driver_uid: session.uid.clone(),
        name: payload.name.trim().to_string(),
        plate_number: payload.plate_number.trim().to_uppercase(),
        school_name: payload.school_name,
        capacity: payload.capacity,
        status: BusStatus::Active,
        created_at_ms: now,
        updated_at_ms: now,
    };
    let bus = buses::insert_bus(state.store(), bus).await?;
    tracing::info!(bus_id = %bus.bus_id, driver_uid = %bus.driver_uid, "bus registered");
    Ok((StatusCode::CREATED, Json(bus)))
}

pub async fn list_buses(
    State(state): State<AppState>,
    Query(query): Query<BusListQuery>,
) -> Result<Json<Vec<BusProfile>>, AppError> {
    let buses = buses::list_buses(state.store(), query.driver_uid.as_deref()).await?;
    Ok(Json(buses))
}

pub async fn get_bus(
    State(state): State<AppState>,
    Path(bus_id): Path<String>,
) -> Result<Json<BusProfile>, AppError> {
    Ok(Json(access::load_bus(state.store(), &bus_id).await?))
}

pub async fn update_bus(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(bus_id): Path<String>,
    Json(payload): Json<UpdateBusPayload>,
) -> Result<Json<BusProfile>, AppError> {
    payload.validate()?;
    let mut bus = access::load_bus(state.store(), &bus_id).await?;
    access::require_driver_of(&session, &bus)?;

    if let Some(name) = payload.name {
        bus.name = name.trim().to_string();
    }
    if let Some(plate_number) = payload.plate_number {
        bus.plate_number = plate_number.trim().to_uppercase();
    }
    if payload.school_name.is_some() {
        bus.school_name = payload.school_name;
    }
    if payload.capacity.is_some() {
        bus.capacity = payload.capacity;
    }
    if let Some(status) = payload.status {
        bus.status = status;
    }
    bus.updated_at_ms = now_ms();

    buses::save_bus(state.store(), &bus).await?;
    Ok(Json(bus))
}
