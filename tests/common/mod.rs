// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request, Response};
use std::sync::Arc;
use tour_tracker::config::Config;
use tour_tracker::db::{FirestoreDb, Storage};
use tour_tracker::models::Tour;
use tour_tracker::routes::create_router;
use tour_tracker::AppState;

/// Id of the tour seeded by `create_test_app`.
#[allow(dead_code)]
pub const TEST_TOUR_ID: &str = "test-tour";

/// Keypoints of the seeded tour, in catalog order (lat, lng).
#[allow(dead_code)]
pub const TEST_KEYPOINTS: [(f64, f64); 2] = [(45.2551, 19.8451), (45.2651, 19.8451)];

/// Author of the seeded tour.
#[allow(dead_code)]
pub const TEST_AUTHOR_ID: u64 = 900;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// The two-keypoint tour every test app starts with.
#[allow(dead_code)]
pub fn test_tour() -> Tour {
    let mut tour = Tour::new(
        TEST_TOUR_ID.to_string(),
        "Test Tour".to_string(),
        String::new(),
        TEST_AUTHOR_ID,
    );
    for (i, (lat, lng)) in TEST_KEYPOINTS.iter().enumerate() {
        tour.add_keypoint(format!("Keypoint {}", i), String::new(), *lat, *lng);
    }
    tour
}

/// Create a test app on in-memory storage with the test tour seeded.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub async fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(Config::test_default(), Storage::in_memory()));
    state
        .catalog
        .seed(&[test_tour()])
        .await
        .expect("seeding the in-memory catalog");

    (create_router(state.clone()), state)
}

/// Create a test app whose storage is an offline Firestore client.
#[allow(dead_code)]
pub fn create_offline_app() -> axum::Router {
    let state = Arc::new(AppState::new(
        Config::test_default(),
        Storage::firestore(FirestoreDb::new_mock()),
    ));
    create_router(state)
}

/// Helper to create a JWT for testing.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: u64, signing_key: &[u8]) -> String {
    tour_tracker::middleware::auth::create_jwt(user_id, signing_key).unwrap()
}

/// Build a request acting as `user_id` via the `X-User-ID` header.
#[allow(dead_code)]
pub fn request_as(user_id: u64, method: &str, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("X-User-ID", user_id.to_string());

    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
