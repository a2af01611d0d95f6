use axum::http::{Method, StatusCode};
use safebus_backend::models::Role;
use serde_json::json;

mod support;

use support::{token_for, TestApp};

#[tokio::test]
async fn drivers_register_buses_and_others_cannot() {
    let app = TestApp::new();

    let (status, body) = app
        .request(
            Method::POST,
            "/api/buses",
            Some(&token_for("P1", Role::Parent)),
            Some(json!({"name": "North", "plateNumber": "abc-1234"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Only drivers can register a bus.");

    let (status, bus) = app
        .request(
            Method::POST,
            "/api/buses",
            Some(&token_for("D1", Role::Driver)),
            Some(json!({"busId": "B1", "name": " North ", "plateNumber": "abc-1234"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(bus["busId"], "B1");
    assert_eq!(bus["name"], "North");
    assert_eq!(bus["plateNumber"], "ABC-1234");
    assert_eq!(bus["driverUid"], "D1");
    assert_eq!(bus["status"], "active");

    let (status, _) = app
        .request(
            Method::POST,
            "/api/buses",
            Some(&token_for("D2", Role::Driver)),
            Some(json!({"busId": "B1", "name": "Copy", "plateNumber": "XYZ-9"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn generated_ids_and_driver_filter() {
    let app = TestApp::new();
    let d1 = token_for("D1", Role::Driver);

    let (_, first) = app
        .request(
            Method::POST,
            "/api/buses",
            Some(&d1),
            Some(json!({"name": "North", "plateNumber": "AAA-1"})),
        )
        .await;
    assert_eq!(first["busId"].as_str().unwrap().len(), 32);

    app.request(
        Method::POST,
        "/api/buses",
        Some(&token_for("D2", Role::Driver)),
        Some(json!({"name": "South", "plateNumber": "BBB-2"})),
    )
    .await;

    let (_, all) = app.request(Method::GET, "/api/buses", Some(&d1), None).await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (_, mine) = app
        .request(Method::GET, "/api/buses?driverUid=D1", Some(&d1), None)
        .await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
    assert_eq!(mine[0]["name"], "North");
}

#[tokio::test]
async fn only_the_owning_driver_updates_a_bus() {
    let app = TestApp::new();
    app.request(
        Method::POST,
        "/api/buses",
        Some(&token_for("D1", Role::Driver)),
        Some(json!({"busId": "B1", "name": "North", "plateNumber": "AAA-1"})),
    )
    .await;

    let (status, _) = app
        .request(
            Method::PUT,
            "/api/buses/B1",
            Some(&token_for("D2", Role::Driver)),
            Some(json!({"name": "Hijacked"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, bus) = app
        .request(
            Method::PUT,
            "/api/buses/B1",
            Some(&token_for("D1", Role::Driver)),
            Some(json!({"capacity": 40, "status": "inactive"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bus["capacity"], 40);
    assert_eq!(bus["status"], "inactive");
    assert_eq!(bus["name"], "North");

    let (status, _) = app
        .request(Method::GET, "/api/buses/B9", Some(&token_for("D1", Role::Driver)), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
