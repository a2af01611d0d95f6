#![allow(dead_code)]
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use safebus_backend::{
    build_router,
    config::{Config, DEFAULT_GEMINI_API_BASE, DEFAULT_GEMINI_MODEL},
    models::{
        bus::{BusProfile, BusStatus},
        bus_child::{BusChild, BusChildStatus},
        user::UserDoc,
        Role,
    },
    repositories::{bus_children, buses, repository},
    services::ChatModel,
    state::AppState,
    store::{DocumentStore, MemoryStore, WriteMode},
    utils::jwt::create_access_token,
};
use serde_json::Value;
use tower::ServiceExt;

pub const TEST_JWT_SECRET: &str = "test-secret";

pub fn test_config() -> Config {
    Config {
        database_url: None,
        jwt_secret: TEST_JWT_SECRET.into(),
        server_port: 0,
        cors_allow_origins: vec!["http://localhost:8081".into()],
        time_zone: chrono_tz::UTC,
        gemini_api_key: None,
        gemini_model: DEFAULT_GEMINI_MODEL.into(),
        gemini_api_base: DEFAULT_GEMINI_API_BASE.into(),
        chat_timeout_seconds: 5,
        lost_found_retention_hours: 1,
    }
}

/// Router over a fresh in-memory store. The store handle is returned for
/// seeding and direct assertions.
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub state: AppState,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_chat_model(test_config(), None)
    }

    pub fn with_chat_model(config: Config, chat_model: Option<Arc<dyn ChatModel>>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let dyn_store: Arc<dyn DocumentStore> = store.clone();
        let state = AppState::new(dyn_store, config, chat_model);
        let router = build_router(state.clone());
        Self {
            store,
            state,
            router,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}

pub fn token_for(uid: &str, role: Role) -> String {
    create_access_token(uid.to_string(), role, TEST_JWT_SECRET, 1).expect("token")
}

pub fn user(uid: &str, role: Role, first_name: &str, parent_uid: Option<&str>) -> UserDoc {
    UserDoc {
        uid: uid.into(),
        role,
        full_name: None,
        first_name: Some(first_name.into()),
        last_name: None,
        email: None,
        phone: None,
        address: None,
        home_location: None,
        school_location: None,
        parent_uid: parent_uid.map(str::to_string),
        created_at_ms: 1,
        updated_at_ms: 1,
    }
}

pub async fn seed_user(store: &dyn DocumentStore, doc: &UserDoc) {
    repository::save(store, &doc.uid, doc, WriteMode::Replace)
        .await
        .expect("seed user");
}

pub async fn seed_bus(store: &dyn DocumentStore, bus_id: &str, driver_uid: &str) -> BusProfile {
    let bus = BusProfile {
        bus_id: bus_id.into(),
        driver_uid: driver_uid.into(),
        name: "North Route".into(),
        plate_number: "SB-001".into(),
        school_name: None,
        capacity: Some(30),
        status: BusStatus::Active,
        created_at_ms: 1,
        updated_at_ms: 1,
    };
    buses::save_bus(store, &bus).await.expect("seed bus");
    bus
}

pub async fn seed_link(
    store: &dyn DocumentStore,
    bus_id: &str,
    child_uid: &str,
    requested_by: &str,
    status: BusChildStatus,
) {
    let (bus, child, by) = (bus_id.to_string(), child_uid.to_string(), requested_by.to_string());
    bus_children::update_link(store, bus_id, child_uid, move |_| {
        let mut link = BusChild::pending(&bus, &child, &by, 1);
        link.status = status;
        Ok(Some(link))
    })
    .await
    .expect("seed link");
}

/// Driver `D1` on bus `B1`, parent `P1` with children `C1` and `C2` both
/// approved, parent `P3` with pending child `C3`.
pub async fn seed_bus_with_riders(store: &dyn DocumentStore) {
    seed_user(store, &user("D1", Role::Driver, "Dana", None)).await;
    seed_user(store, &user("P1", Role::Parent, "Paula", None)).await;
    seed_user(store, &user("C1", Role::Child, "Ana", Some("P1"))).await;
    seed_user(store, &user("C2", Role::Child, "Bruno", Some("P1"))).await;
    seed_user(store, &user("P3", Role::Parent, "Pedro", None)).await;
    seed_user(store, &user("C3", Role::Child, "Caio", Some("P3"))).await;
    seed_bus(store, "B1", "D1").await;
    seed_link(store, "B1", "C1", "P1", BusChildStatus::Approved).await;
    seed_link(store, "B1", "C2", "P1", BusChildStatus::Approved).await;
    seed_link(store, "B1", "C3", "P3", BusChildStatus::Pending).await;
}
