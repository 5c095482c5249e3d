// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Request validation tests for the session and payment endpoints.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::json;
use shuttle_club::models::Role;
use tower::ServiceExt;

mod common;
use common::{create_test_app, seed_account, token_for};

async fn admin_token(state: &std::sync::Arc<shuttle_club::AppState>) -> String {
    let admin = seed_account(state, "The Organizer", "maz@example.com", Role::Admin).await;
    token_for(state, admin, Role::Admin)
}

fn post_json(uri: &str, token: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

#[tokio::test]
async fn test_create_session_rejects_zero_spots() {
    let (app, state) = create_test_app();
    let token = admin_token(&state).await;

    let body = json!({
        "date": "2026-08-14",
        "start_time": "19:00:00",
        "end_time": "21:00:00",
        "max_players": 0,
        "venue": "Sports Complex, Court 1-3",
    });

    let response = app
        .oneshot(post_json("/api/admin/sessions", &token, &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_session_rejects_end_before_start() {
    let (app, state) = create_test_app();
    let token = admin_token(&state).await;

    let body = json!({
        "date": "2026-08-14",
        "start_time": "21:00:00",
        "end_time": "19:00:00",
        "max_players": 12,
        "venue": "Sports Complex, Court 1-3",
    });

    let response = app
        .oneshot(post_json("/api/admin/sessions", &token, &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_session_accepts_valid_payload() {
    let (app, state) = create_test_app();
    let token = admin_token(&state).await;

    let body = json!({
        "date": "2026-08-14",
        "start_time": "19:00:00",
        "end_time": "21:00:00",
        "max_players": 12,
        "venue": "Sports Complex, Court 1-3",
    });

    let response = app
        .oneshot(post_json("/api/admin/sessions", &token, &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_record_payment_rejects_nonpositive_amount() {
    let (app, state) = create_test_app();
    let user = seed_account(&state, "A Player", "pay@example.com", Role::Player).await;
    let token = token_for(&state, user, Role::Player);

    let body = json!({
        "amount_pence": 0,
        "payment_type": "monthly",
        "month": 8,
        "year": 2026,
    });

    let response = app
        .oneshot(post_json("/api/payments", &token, &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_record_payment_rejects_missing_key() {
    // Neither a session nor a complete period: nothing to attach the
    // payment to.
    let (app, state) = create_test_app();
    let user = seed_account(&state, "A Player", "pay2@example.com", Role::Player).await;
    let token = token_for(&state, user, Role::Player);

    let body = json!({
        "amount_pence": 1200,
        "payment_type": "weekly",
    });

    let response = app
        .oneshot(post_json("/api/payments", &token, &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_record_payment_rejects_out_of_range_month() {
    let (app, state) = create_test_app();
    let user = seed_account(&state, "A Player", "pay3@example.com", Role::Player).await;
    let token = token_for(&state, user, Role::Player);

    let body = json!({
        "amount_pence": 4000,
        "payment_type": "monthly",
        "month": 13,
        "year": 2026,
    });

    let response = app
        .oneshot(post_json("/api/payments", &token, &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_set_payment_status_requires_an_address() {
    let (app, state) = create_test_app();
    let token = admin_token(&state).await;

    // No payment_id, no user_id: nothing to address
    let body = json!({ "status": "paid" });

    let response = app
        .oneshot(post_json("/api/admin/payments/status", &token, &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_signup_rejects_short_password() {
    let (app, _) = create_test_app();

    let body = json!({
        "email": "short@example.com",
        "password": "short",
        "full_name": "Short Password",
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/signup")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_signup_rejects_duplicate_email() {
    let (app, _) = create_test_app();

    let body = json!({
        "email": "twice@example.com",
        "password": "a long enough password",
        "full_name": "First Signup",
    });

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/signup")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/signup")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
