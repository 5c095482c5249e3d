// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chrono::{NaiveDate, NaiveTime, Utc};
use shuttle_club::config::Config;
use shuttle_club::db::{ClubStore, MemoryStore};
use shuttle_club::middleware::auth::create_jwt;
use shuttle_club::models::{Credential, PaymentPreference, Profile, Role, Session};
use shuttle_club::AppState;
use std::sync::Arc;
use uuid::Uuid;

/// Create a test app backed by the in-memory store.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let store: Arc<dyn ClubStore> = Arc::new(MemoryStore::new());
    let state = Arc::new(AppState::new(config, store));
    (shuttle_club::routes::create_router(state.clone()), state)
}

/// Create a session token for a seeded user.
#[allow(dead_code)]
pub fn token_for(state: &AppState, user_id: Uuid, role: Role) -> String {
    create_jwt(user_id, role, &state.config.jwt_signing_key).expect("JWT creation failed")
}

/// Seed an account straight into the store (no password round-trip).
#[allow(dead_code)]
pub async fn seed_account(state: &AppState, full_name: &str, email: &str, role: Role) -> Uuid {
    let now = Utc::now();
    let profile = Profile {
        id: Uuid::new_v4(),
        email: email.to_string(),
        full_name: full_name.to_string(),
        role,
        payment_preference: PaymentPreference::Weekly,
        created_at: now,
        updated_at: now,
    };
    let credential = Credential {
        user_id: profile.id,
        email: email.to_string(),
        password_hash: "unused".to_string(),
    };
    state
        .store
        .create_account(&profile, &credential)
        .await
        .expect("Failed to seed account");
    profile.id
}

/// Seed a session straight into the store.
#[allow(dead_code)]
pub async fn seed_session(state: &AppState, date: NaiveDate, max_players: u32) -> Session {
    let session = Session {
        id: Uuid::new_v4(),
        date,
        start_time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
        max_players,
        venue: "Sports Complex, Court 1-3".to_string(),
        created_by: None,
        created_at: Utc::now(),
    };
    state
        .store
        .insert_session(&session)
        .await
        .expect("Failed to seed session");
    session
}

/// A date `days` days from today (sessions in route tests must be upcoming).
#[allow(dead_code)]
pub fn days_from_today(days: u64) -> NaiveDate {
    Utc::now()
        .date_naive()
        .checked_add_days(chrono::Days::new(days))
        .expect("date overflow")
}
