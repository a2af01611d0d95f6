use axum::http::{Method, StatusCode};
use safebus_backend::models::Role;
use serde_json::json;

mod support;

use support::{seed_bus_with_riders, token_for, TestApp};

#[tokio::test]
async fn second_request_while_pending_is_rejected() {
    let app = TestApp::new();
    seed_bus_with_riders(app.store.as_ref()).await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/buses/B1/children",
            Some(&token_for("P3", Role::Parent)),
            Some(json!({"childUid": "C3"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "A request is already pending.");
}

#[tokio::test]
async fn approve_then_remove_then_request_again() {
    let app = TestApp::new();
    seed_bus_with_riders(app.store.as_ref()).await;
    let driver = token_for("D1", Role::Driver);
    let parent = token_for("P3", Role::Parent);

    let (status, body) = app
        .request(Method::PUT, "/api/buses/B1/children/C3/approve", Some(&driver), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "approved");
    assert_eq!(body["decidedBy"], "D1");

    let (status, body) = app
        .request(
            Method::POST,
            "/api/buses/B1/children",
            Some(&parent),
            Some(json!({"childUid": "C3"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Child is already on this bus.");

    let (status, body) = app
        .request(Method::PUT, "/api/buses/B1/children/C3/approve", Some(&driver), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Cannot approve a request that is approved.");

    let (status, body) = app
        .request(Method::DELETE, "/api/buses/B1/children/C3", Some(&driver), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "removed");

    let (status, body) = app
        .request(
            Method::POST,
            "/api/buses/B1/children",
            Some(&parent),
            Some(json!({"childUid": "C3"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["requestedBy"], "P3");
    assert!(body["decidedAtMs"].is_null());
}

#[tokio::test]
async fn rejected_request_is_listed_by_status() {
    let app = TestApp::new();
    seed_bus_with_riders(app.store.as_ref()).await;
    let driver = token_for("D1", Role::Driver);

    let (status, _) = app
        .request(Method::PUT, "/api/buses/B1/children/C3/reject", Some(&driver), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app
        .request(Method::GET, "/api/buses/B1/children?status=pending", Some(&driver), None)
        .await;
    assert_eq!(body.as_array().unwrap().len(), 0);

    let (_, body) = app
        .request(Method::GET, "/api/buses/B1/children?status=rejected", Some(&driver), None)
        .await;
    let rejected = body.as_array().unwrap();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0]["childUid"], "C3");

    let (_, body) = app
        .request(Method::GET, "/api/buses/B1/children", Some(&driver), None)
        .await;
    assert_eq!(body.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn decisions_and_requests_are_authorized() {
    let app = TestApp::new();
    seed_bus_with_riders(app.store.as_ref()).await;

    let (status, _) = app
        .request(
            Method::PUT,
            "/api/buses/B1/children/C3/approve",
            Some(&token_for("P3", Role::Parent)),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request(
            Method::POST,
            "/api/buses/B1/children",
            Some(&token_for("P1", Role::Parent)),
            Some(json!({"childUid": "C3"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request(
            Method::POST,
            "/api/buses/NOPE/children",
            Some(&token_for("P3", Role::Parent)),
            Some(json!({"childUid": "C3"})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .request(
            Method::PUT,
            "/api/buses/B1/children/C9/approve",
            Some(&token_for("D1", Role::Driver)),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Join request not found");
}

#[tokio::test]
async fn child_bus_list_is_visible_to_guardians_only() {
    let app = TestApp::new();
    seed_bus_with_riders(app.store.as_ref()).await;

    let (status, body) = app
        .request(Method::GET, "/api/children/C1/buses", Some(&token_for("P1", Role::Parent)), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["busId"], "B1");

    let (status, _) = app
        .request(Method::GET, "/api/children/C1/buses", Some(&token_for("C1", Role::Child)), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request(Method::GET, "/api/children/C1/buses", Some(&token_for("P3", Role::Parent)), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
