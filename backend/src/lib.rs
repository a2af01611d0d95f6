//! SafeBus backend: live bus location, daily attendance and rider
//! coordination over a realtime document store.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod services;
pub mod state;
pub mod store;
pub mod types;
pub mod utils;
pub mod validation;

use axum::{
    body::Body,
    http::{header, HeaderValue, Method, Request},
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{config::Config, state::AppState};

/// Builds the full application router: public chat routes plus the
/// token-protected `/api` surface.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/chat", post(handlers::chat::chat))
        .route("/health", get(handlers::chat::health))
        .route("/check-secret", get(handlers::chat::check_secret));

    let api_routes = Router::new()
        .route(
            "/api/me/profile",
            get(handlers::users::get_my_profile).put(handlers::users::update_my_profile),
        )
        .route("/api/users/{uid}", get(handlers::users::get_user))
        .route(
            "/api/buses",
            get(handlers::buses::list_buses).post(handlers::buses::create_bus),
        )
        .route(
            "/api/buses/{bus_id}",
            get(handlers::buses::get_bus).put(handlers::buses::update_bus),
        )
        .route(
            "/api/buses/{bus_id}/location",
            put(handlers::locations::publish_location),
        )
        .route(
            "/api/buses/{bus_id}/sharing",
            put(handlers::locations::set_sharing),
        )
        .route(
            "/api/buses/{bus_id}/live-location",
            get(handlers::locations::get_live_location),
        )
        .route(
            "/api/buses/{bus_id}/live-location/stream",
            get(handlers::locations::stream_live_location),
        )
        .route(
            "/api/buses/{bus_id}/tours/{date_key}",
            get(handlers::tours::get_tour_day),
        )
        .route(
            "/api/buses/{bus_id}/tours/{date_key}/ensure",
            post(handlers::tours::ensure_tour_day),
        )
        .route(
            "/api/buses/{bus_id}/tours/{date_key}/participants/{child_uid}",
            put(handlers::tours::update_participant),
        )
        .route(
            "/api/buses/{bus_id}/children",
            get(handlers::bus_children::list_bus_children)
                .post(handlers::bus_children::request_join),
        )
        .route(
            "/api/buses/{bus_id}/children/{child_uid}",
            delete(handlers::bus_children::remove_child),
        )
        .route(
            "/api/buses/{bus_id}/children/{child_uid}/approve",
            put(handlers::bus_children::approve_child),
        )
        .route(
            "/api/buses/{bus_id}/children/{child_uid}/reject",
            put(handlers::bus_children::reject_child),
        )
        .route(
            "/api/children/{child_uid}/buses",
            get(handlers::bus_children::list_child_buses),
        )
        .route(
            "/api/buses/{bus_id}/buddies",
            post(handlers::buddies::request_buddy),
        )
        .route(
            "/api/buddies/{link_id}",
            delete(handlers::buddies::cancel_buddy),
        )
        .route(
            "/api/buddies/{link_id}/respond",
            put(handlers::buddies::respond_buddy),
        )
        .route(
            "/api/children/{child_uid}/buddies",
            get(handlers::buddies::list_child_buddies),
        )
        .route(
            "/api/buses/{bus_id}/lost-found",
            get(handlers::lost_found::list_items).post(handlers::lost_found::report_item),
        )
        .route(
            "/api/lost-found/{item_id}/claim",
            put(handlers::lost_found::claim_item),
        )
        .route(
            "/api/lost-found/{item_id}/resolve",
            put(handlers::lost_found::resolve_item),
        )
        .route(
            "/api/buses/{bus_id}/alerts",
            get(handlers::emergencies::list_active_alerts)
                .post(handlers::emergencies::raise_alert),
        )
        .route(
            "/api/alerts/{alert_id}/acknowledge",
            put(handlers::emergencies::acknowledge_alert),
        )
        .route(
            "/api/alerts/{alert_id}/resolve",
            put(handlers::emergencies::resolve_alert),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth,
        ));

    let cors = cors_layer(&state.config);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                        tracing::info_span!(
                            "http_request",
                            method = %request.method(),
                            uri = %request.uri(),
                            request_id = tracing::field::Empty,
                            uid = tracing::field::Empty,
                        )
                    }),
                )
                .layer(axum_middleware::from_fn(middleware::request_id))
                .layer(cors)
                .layer(axum_middleware::from_fn(middleware::log_error_responses)),
        )
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if config.cors_allow_origins.iter().any(|origin| origin == "*") {
        return base.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = config
        .cors_allow_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    base.allow_origin(AllowOrigin::list(origins))
}
