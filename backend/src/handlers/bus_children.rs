use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};

use crate::{
    error::AppError,
    models::{
        bus_child::{BusChild, BusChildQuery, JoinRequestPayload},
        Session,
    },
    services::bus_child::Decision,
    state::AppState,
};

pub async fn request_join(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(bus_id): Path<String>,
    Json(payload): Json<JoinRequestPayload>,
) -> Result<(StatusCode, Json<BusChild>), AppError> {
    let link = state
        .bus_children
        .request_join_as(&session, &bus_id, &payload.child_uid)
        .await?;
    Ok((StatusCode::CREATED, Json(link)))
}

pub async fn list_bus_children(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(bus_id): Path<String>,
    Query(query): Query<BusChildQuery>,
) -> Result<Json<Vec<BusChild>>, AppError> {
    let links = state
        .bus_children
        .list_for_bus_as(&session, &bus_id, query.status)
        .await?;
    Ok(Json(links))
}

async fn decide(
    state: AppState,
    session: Session,
    bus_id: String,
    child_uid: String,
    decision: Decision,
) -> Result<Json<BusChild>, AppError> {
    let link = state
        .bus_children
        .decide_as(&session, &bus_id, &child_uid, decision)
        .await?;
    Ok(Json(link))
}

pub async fn approve_child(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path((bus_id, child_uid)): Path<(String, String)>,
) -> Result<Json<BusChild>, AppError> {
    decide(state, session, bus_id, child_uid, Decision::Approve).await
}

pub async fn reject_child(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path((bus_id, child_uid)): Path<(String, String)>,
) -> Result<Json<BusChild>, AppError> {
    decide(state, session, bus_id, child_uid, Decision::Reject).await
}

pub async fn remove_child(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path((bus_id, child_uid)): Path<(String, String)>,
) -> Result<Json<BusChild>, AppError> {
    decide(state, session, bus_id, child_uid, Decision::Remove).await
}

pub async fn list_child_buses(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(child_uid): Path<String>,
) -> Result<Json<Vec<BusChild>>, AppError> {
    let links = state
        .bus_children
        .list_for_child_as(&session, &child_uid)
        .await?;
    Ok(Json(links))
}
