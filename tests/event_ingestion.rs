//! End-to-end tests for event ingestion: batching, throttling, quota,
//! and ordering, over the HTTP router.

mod common;

use axum::http::StatusCode;
use serde_json::json;
use std::time::Duration;

use common::{expect_json, spawn_app};
use uplift::domain::foundation::UserId;
use uplift::ports::BusinessStore;

fn batch_of(names: &[&str]) -> serde_json::Value {
    json!({
        "user_id": "user_1",
        "session_id": "session_1",
        "events": names.iter().map(|n| json!({"event_name": n})).collect::<Vec<_>>(),
    })
}

async fn settle(app: &common::TestApp) {
    app.services.ingestor.flush_pending().await;
    tokio::time::sleep(Duration::from_millis(150)).await;
}

#[tokio::test]
async fn single_event_tracks_and_persists() {
    let app = spawn_app().await;

    let response = app
        .post(
            "/api/events/track",
            json!({
                "user_id": "user_1",
                "session_id": "session_1",
                "event_name": "click",
                "component_id": "hero",
            }),
        )
        .await;
    let body = expect_json(response, StatusCode::OK).await;
    assert_eq!(body["status"], "tracked");
    assert_eq!(body["event_name"], "click");

    settle(&app).await;
    assert_eq!(app.events.len().await, 1);
}

#[tokio::test]
async fn unknown_event_name_is_a_bad_request() {
    let app = spawn_app().await;

    let response = app
        .post(
            "/api/events/track",
            json!({
                "user_id": "user_1",
                "session_id": "session_1",
                "event_name": "mind_reading",
            }),
        )
        .await;
    let body = expect_json(response, StatusCode::BAD_REQUEST).await;
    assert_eq!(body["error"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn hesitation_burst_coalesces_into_one_stored_event() {
    let app = spawn_app().await;

    // 20 mouse_hesitation events in one batch
    let names: Vec<&str> = std::iter::repeat("mouse_hesitation").take(20).collect();
    let response = app.post("/api/events/batch", batch_of(&names)).await;
    let body = expect_json(response, StatusCode::OK).await;

    assert_eq!(body["accepted"], 1);
    assert_eq!(body["coalesced"], 19);

    settle(&app).await;
    let stored = app
        .events
        .session_events(&UserId::new("user_1").unwrap())
        .await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].coalesced_count(), 20);
}

#[tokio::test]
async fn mixed_batch_reports_per_index_statuses() {
    let app = spawn_app().await;

    let response = app
        .post(
            "/api/events/batch",
            batch_of(&["click", "mouse_hesitation", "mouse_hesitation", "bogus"]),
        )
        .await;
    let body = expect_json(response, StatusCode::OK).await;

    let statuses = body["statuses"].as_array().unwrap();
    assert_eq!(statuses[0]["status"], "accepted");
    assert_eq!(statuses[1]["status"], "accepted");
    assert_eq!(statuses[2]["status"], "coalesced");
    assert_eq!(statuses[3]["status"], "invalid");
}

#[tokio::test]
async fn quota_exhaustion_returns_403_without_incrementing() {
    let app = spawn_app().await;

    let mut at_limit = app.business.clone();
    at_limit.monthly_events_used = at_limit.monthly_event_limit.unwrap();
    app.businesses.seed(at_limit.clone()).await;

    let response = app
        .post(
            "/api/events/track",
            json!({
                "user_id": "user_1",
                "session_id": "session_1",
                "event_name": "click",
            }),
        )
        .await;
    let body = expect_json(response, StatusCode::FORBIDDEN).await;
    assert_eq!(body["error"], "QUOTA_EXCEEDED");

    let after = app
        .businesses
        .find_by_id(&at_limit.business_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.monthly_events_used, after.monthly_event_limit.unwrap());
}

#[tokio::test]
async fn events_persist_in_timestamp_order_per_session() {
    let app = spawn_app().await;

    // Client timestamps submitted out of order
    let response = app
        .post(
            "/api/events/batch",
            json!({
                "user_id": "user_1",
                "session_id": "session_1",
                "events": [
                    {"event_name": "click", "timestamp": "2026-07-01T12:00:05Z"},
                    {"event_name": "page_viewed", "timestamp": "2026-07-01T12:00:01Z"},
                    {"event_name": "add_to_cart", "timestamp": "2026-07-01T12:00:09Z"},
                ],
            }),
        )
        .await;
    expect_json(response, StatusCode::OK).await;

    settle(&app).await;
    let stored = app
        .events
        .session_events(&UserId::new("user_1").unwrap())
        .await;
    let names: Vec<String> = stored
        .iter()
        .map(|e| e.event_name.to_string())
        .collect();
    assert_eq!(names, ["page_viewed", "click", "add_to_cart"]);
}

#[tokio::test]
async fn distinct_sessions_throttle_independently() {
    let app = spawn_app().await;

    for session in ["session_1", "session_2"] {
        let response = app
            .post(
                "/api/events/batch",
                json!({
                    "user_id": "user_1",
                    "session_id": session,
                    "events": [{"event_name": "hover"}],
                }),
            )
            .await;
        let body = expect_json(response, StatusCode::OK).await;
        assert_eq!(body["accepted"], 1, "session {session} should admit its first hover");
    }
}

#[tokio::test]
async fn batch_quota_partially_grants_and_marks_the_rest() {
    let app = spawn_app().await;

    let mut nearly_full = app.business.clone();
    nearly_full.monthly_events_used = nearly_full.monthly_event_limit.unwrap() - 2;
    app.businesses.seed(nearly_full.clone()).await;

    let response = app
        .post(
            "/api/events/batch",
            batch_of(&["click", "click", "click", "click"]),
        )
        .await;
    let body = expect_json(response, StatusCode::OK).await;

    let statuses = body["statuses"].as_array().unwrap();
    assert_eq!(statuses[0]["status"], "accepted");
    assert_eq!(statuses[1]["status"], "accepted");
    assert_eq!(statuses[2]["status"], "quota_exceeded");
    assert_eq!(statuses[3]["status"], "quota_exceeded");
}
