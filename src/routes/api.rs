// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated players.

use crate::db::ClubStore;
use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::{Booking, Payment, PaymentPreference, PaymentStatus, PaymentType, Profile, Role};
use crate::services::ledger::{PaymentDraft, SessionOverview, SCHEDULE_LIMIT};
use crate::time_utils::{format_utc_rfc3339, period_of};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/sessions", get(get_sessions))
        .route("/api/sessions/{id}/book", post(book_session))
        .route("/api/bookings/{id}/cancel", post(cancel_booking))
        .route("/api/players", get(get_players))
        .route("/api/payments", post(record_payment))
        .route("/api/payments/me", get(get_my_payment))
}

// ─── Shared response shapes ──────────────────────────────────

/// Member profile as the API returns it.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ProfileResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub role: Role,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub payment_preference: PaymentPreference,
}

impl From<Profile> for ProfileResponse {
    fn from(profile: Profile) -> Self {
        Self {
            id: profile.id,
            email: profile.email,
            full_name: profile.full_name,
            role: profile.role,
            payment_preference: profile.payment_preference,
        }
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct BookingResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub id: Uuid,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub session_id: Uuid,
    pub status: String,
    pub created_at: String,
}

impl From<Booking> for BookingResponse {
    fn from(booking: Booking) -> Self {
        Self {
            id: booking.id,
            session_id: booking.session_id,
            status: booking.status.as_str().to_string(),
            created_at: format_utc_rfc3339(booking.created_at),
        }
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PaymentResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub id: Uuid,
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub session_id: Option<Uuid>,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub amount_pence: i64,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub payment_type: PaymentType,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub status: PaymentStatus,
    pub paid_at: Option<String>,
    pub month: Option<u32>,
    pub year: Option<i32>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id,
            session_id: payment.session_id,
            amount_pence: payment.amount_pence,
            payment_type: payment.payment_type,
            status: payment.status,
            paid_at: payment.paid_at.map(format_utc_rfc3339),
            month: payment.month,
            year: payment.year,
        }
    }
}

// ─── Current member ──────────────────────────────────────────

/// Dashboard view of the caller: profile plus their headline stats.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MeResponse {
    pub profile: ProfileResponse,
    /// Confirmed bookings ever made
    pub sessions_played: u32,
    /// Payment for the current billing period, if recorded
    pub current_payment: Option<PaymentResponse>,
}

/// Get the current member with dashboard stats.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MeResponse>> {
    let profile = state.store.get_profile(user.user_id).await?.ok_or_else(|| {
        crate::error::AppError::NotFound(format!("Profile {} not found", user.user_id))
    })?;

    let sessions_played = state.store.count_sessions_played(user.user_id).await?;
    let (month, year) = period_of(chrono::Utc::now());
    let current_payment = state.ledger.period_payment(user.user_id, month, year).await?;

    Ok(Json(MeResponse {
        profile: ProfileResponse::from(profile),
        sessions_played,
        current_payment: current_payment.map(PaymentResponse::from),
    }))
}

// ─── Schedule ────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionSummary {
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub id: Uuid,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub max_players: u32,
    pub venue: String,
    pub confirmed_count: u32,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub spots_left: i64,
    pub is_booked: bool,
}

impl From<SessionOverview> for SessionSummary {
    fn from(overview: SessionOverview) -> Self {
        Self {
            id: overview.session.id,
            date: overview.session.date.to_string(),
            start_time: overview.session.start_time.format("%H:%M").to_string(),
            end_time: overview.session.end_time.format("%H:%M").to_string(),
            max_players: overview.session.max_players,
            venue: overview.session.venue,
            confirmed_count: overview.confirmed_count,
            spots_left: overview.spots_left,
            is_booked: overview.is_booked,
        }
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionSummary>,
}

/// Upcoming sessions with booking state for the caller.
async fn get_sessions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SessionsResponse>> {
    let today = chrono::Utc::now().date_naive();
    let overviews = state
        .ledger
        .upcoming_sessions(user.user_id, today, SCHEDULE_LIMIT)
        .await?;

    Ok(Json(SessionsResponse {
        sessions: overviews.into_iter().map(SessionSummary::from).collect(),
    }))
}

// ─── Bookings ────────────────────────────────────────────────

/// Book a spot in a session.
async fn book_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<BookingResponse>> {
    let booking = state
        .ledger
        .book_session(user.user_id, session_id, chrono::Utc::now())
        .await?;
    Ok(Json(BookingResponse::from(booking)))
}

/// Cancel one of the caller's bookings.
async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingResponse>> {
    let booking = state
        .ledger
        .cancel_booking(user.user_id, booking_id, chrono::Utc::now())
        .await?;
    Ok(Json(BookingResponse::from(booking)))
}

// ─── Players ─────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PlayerSummary {
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub payment_preference: PaymentPreference,
    pub sessions_played: u32,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PlayersResponse {
    pub players: Vec<PlayerSummary>,
}

/// Players list, sorted by name.
///
/// Payment details stay off this response; members only see attendance.
async fn get_players(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<PlayersResponse>> {
    tracing::debug!(user_id = %user.user_id, "Fetching players list");

    let (month, year) = period_of(chrono::Utc::now());
    let aggregates = state.ledger.players_aggregate(month, year).await?;

    Ok(Json(PlayersResponse {
        players: aggregates
            .into_iter()
            .map(|a| PlayerSummary {
                id: a.profile.id,
                full_name: a.profile.full_name,
                email: a.profile.email,
                payment_preference: a.profile.payment_preference,
                sessions_played: a.sessions_played,
            })
            .collect(),
    }))
}

// ─── Payments ────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PaymentRecordedResponse {
    pub payment: PaymentResponse,
    /// `false` when a payment already existed for this session or period
    pub created: bool,
}

/// Record a self-declared payment (pending until an organizer confirms).
async fn record_payment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(draft): Json<PaymentDraft>,
) -> Result<Json<PaymentRecordedResponse>> {
    let outcome = state
        .ledger
        .record_payment(user.user_id, draft, chrono::Utc::now())
        .await?;

    Ok(Json(PaymentRecordedResponse {
        payment: PaymentResponse::from(outcome.payment),
        created: outcome.created,
    }))
}

#[derive(Deserialize)]
struct PeriodQuery {
    month: Option<u32>,
    year: Option<i32>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MyPaymentResponse {
    pub payment: Option<PaymentResponse>,
}

/// The caller's payment for a billing period (defaults to the current one).
async fn get_my_payment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<PeriodQuery>,
) -> Result<Json<MyPaymentResponse>> {
    let (current_month, current_year) = period_of(chrono::Utc::now());
    let month = params.month.unwrap_or(current_month);
    let year = params.year.unwrap_or(current_year);

    if !(1..=12).contains(&month) {
        return Err(crate::error::AppError::BadRequest(format!(
            "Invalid month: {}",
            month
        )));
    }

    let payment = state.ledger.period_payment(user.user_id, month, year).await?;

    Ok(Json(MyPaymentResponse {
        payment: payment.map(PaymentResponse::from),
    }))
}
