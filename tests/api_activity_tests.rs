// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! End-to-end tests for activity logging, insights and goals over HTTP.
//!
//! Every test runs against the full router with an in-memory store.

use axum::http::StatusCode;
use footprint_tracker::db::{collections, ActivityRepository, InsightRepository};
use footprint_tracker::models::ActivityFilter;
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::{authed_request, create_test_app, json_body};

fn car_trip(km: f64) -> serde_json::Value {
    json!({ "category": "transport", "activity_type": "car", "amount": km })
}

#[tokio::test]
async fn test_generate_without_activities_has_no_data() {
    let (app, _, db) = create_test_app();

    let response = app
        .oneshot(authed_request("POST", "/api/insights/generate", "alice", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["has_data"], false);
    assert!(body["message"].is_string());
    assert!(body.get("insight_id").is_none());

    // Nothing was persisted
    assert!(db.find_insight_history("alice", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_car_trip_yields_transport_insight() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(authed_request(
            "POST",
            "/api/activities",
            "alice",
            Some(car_trip(100.0)),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;

    assert_eq!(body["activity"]["co2_emission"], 12.0);
    assert_eq!(body["activity"]["unit"], "km");
    assert_eq!(body["activity"]["label"], "Car Travel");

    let insight = &body["insight"];
    assert_eq!(insight["has_data"], true);
    assert_eq!(insight["highest_category"], "transport");
    assert_eq!(insight["highest_emission"], 12.0);
    assert_eq!(insight["total_emissions"], 12.0);
    assert_eq!(insight["action"], "cycle/walk");
    assert_eq!(insight["potential_reduction"], 2.0);
}

#[tokio::test]
async fn test_stored_activity_is_returned_when_insight_save_fails() {
    let (app, _, db) = create_test_app();
    db.set_fail_writes_to(collections::INSIGHTS, true);

    let response = app
        .oneshot(authed_request(
            "POST",
            "/api/activities",
            "alice",
            Some(car_trip(100.0)),
        ))
        .await
        .unwrap();

    // The activity is committed, so the client must not be told to retry
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["activity"]["co2_emission"], 12.0);
    assert!(body.get("insight").is_none());

    let stored = db
        .find_activities("alice", &ActivityFilter::default())
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(body["activity"]["id"], stored[0].id.as_str());
}

#[tokio::test]
async fn test_every_generation_appends_history() {
    let (app, _, _) = create_test_app();

    app.clone()
        .oneshot(authed_request(
            "POST",
            "/api/activities",
            "alice",
            Some(json!({ "category": "food", "activity_type": "beef", "amount": 0.5 })),
        ))
        .await
        .unwrap();

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(authed_request("POST", "/api/insights/generate", "alice", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(authed_request("GET", "/api/insights/history", "alice", None))
        .await
        .unwrap();
    let body = json_body(response).await;
    let insights = body["insights"].as_array().unwrap();

    // One from logging the activity, two explicit
    assert_eq!(insights.len(), 3);
    assert!(insights
        .iter()
        .all(|i| i["highest_category"] == "food" && i["highest_emission"] == 13.5));
}

#[tokio::test]
async fn test_unknown_activity_type_is_rejected_without_side_effects() {
    let (app, _, db) = create_test_app();

    let response = app
        .oneshot(authed_request(
            "POST",
            "/api/activities",
            "alice",
            Some(json!({ "category": "food", "activity_type": "car", "amount": 3 })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "unknown_activity");

    let stored = db
        .find_activities("alice", &ActivityFilter::default())
        .await
        .unwrap();
    assert!(stored.is_empty());
    assert!(db.find_latest_insight("alice").await.unwrap().is_none());
}

#[tokio::test]
async fn test_invalid_category_and_amount_are_bad_requests() {
    let (app, _, _) = create_test_app();

    let bodies = [
        json!({ "category": "aviation", "activity_type": "plane", "amount": 3 }),
        json!({ "category": "transport", "activity_type": "car", "amount": 0 }),
        json!({ "category": "transport", "activity_type": "car", "amount": -5 }),
        json!({ "category": "transport", "activity_type": "", "amount": 5 }),
    ];

    for body in bodies {
        let response = app
            .clone()
            .oneshot(authed_request("POST", "/api/activities", "alice", Some(body.clone())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {}", body);
    }
}

#[tokio::test]
async fn test_list_filters_and_delete_ownership() {
    let (app, _, _) = create_test_app();

    let mut ids = Vec::new();
    for body in [
        car_trip(10.0),
        json!({ "category": "energy", "activity_type": "electricity", "amount": 4 }),
        json!({ "category": "transport", "activity_type": "bus", "amount": 20, "date": "2026-01-05" }),
    ] {
        let response = app
            .clone()
            .oneshot(authed_request("POST", "/api/activities", "alice", Some(body)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        ids.push(json_body(response).await["activity"]["id"].as_str().unwrap().to_string());
    }

    let response = app
        .clone()
        .oneshot(authed_request(
            "GET",
            "/api/activities?category=transport",
            "alice",
            None,
        ))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["total"], 2);

    let response = app
        .clone()
        .oneshot(authed_request(
            "GET",
            "/api/activities?start_date=2026-01-01&end_date=2026-01-05",
            "alice",
            None,
        ))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["activities"][0]["date"], "2026-01-05");

    // Bob cannot see or delete Alice's activity
    let uri = format!("/api/activities/{}", ids[0]);
    let response = app
        .clone()
        .oneshot(authed_request("DELETE", &uri, "bob", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(authed_request("DELETE", &uri, "alice", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(authed_request("GET", "/api/activities", "alice", None))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["total"], 2);
}

#[tokio::test]
async fn test_goal_endpoints() {
    let (app, _, _) = create_test_app();

    // No data yet
    let response = app
        .clone()
        .oneshot(authed_request("GET", "/api/goals/current", "alice", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["has_goal"], false);

    let response = app
        .clone()
        .oneshot(authed_request("POST", "/api/goals", "alice", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.clone()
        .oneshot(authed_request(
            "POST",
            "/api/activities",
            "alice",
            Some(car_trip(100.0)),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(authed_request("POST", "/api/goals", "alice", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;

    assert_eq!(body["has_goal"], true);
    assert_eq!(body["goal"]["category"], "transport");
    assert_eq!(body["goal"]["baseline_emission"], 12.0);
    assert_eq!(body["goal"]["target_reduction"], 2.0);
    assert_eq!(body["goal"]["current_emission"], 12.0);
    assert_eq!(body["goal"]["status"], "active");
    assert_eq!(body["progress"], 0.0);
    let days = body["days_remaining"].as_i64().unwrap();
    assert!((1..=7).contains(&days));

    let response = app
        .clone()
        .oneshot(authed_request("GET", "/api/goals/history", "alice", None))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["goals"].as_array().unwrap().len(), 1);
    assert_eq!(body["counts"]["active"], 1);

    let response = app
        .oneshot(authed_request("GET", "/api/dashboard/stats", "alice", None))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["user_total"], 12.0);
    assert_eq!(body["daily"].as_array().unwrap().len(), 7);
    assert_eq!(body["daily"][6]["total"], 12.0);
    assert_eq!(body["categories"][0]["category"], "transport");
    assert_eq!(body["current_goal"]["category"], "transport");
    assert_eq!(body["latest_insight"]["highest_category"], "transport");
}
