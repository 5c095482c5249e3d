// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Organizer routes: session management, payment confirmation, dashboard.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{PaymentPreference, PaymentStatus, Session};
use crate::routes::api::PaymentResponse;
use crate::services::ledger::{NewSession, PaymentTarget};
use crate::time_utils::period_of;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Organizer routes (require authentication and the admin role).
/// Both middleware layers are applied in routes/mod.rs.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/admin/sessions", post(create_session))
        .route("/api/admin/sessions/{id}", get(session_register))
        .route("/api/admin/overview", get(overview))
        .route("/api/admin/payments", get(period_payments))
        .route("/api/admin/payments/status", post(set_payment_status))
        .route("/api/admin/payments/mark-overdue", post(mark_overdue))
}

// ─── Sessions ────────────────────────────────────────────────

#[derive(Serialize)]
pub struct SessionResponse {
    pub id: Uuid,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub max_players: u32,
    pub venue: String,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            id: session.id,
            date: session.date.to_string(),
            start_time: session.start_time.format("%H:%M").to_string(),
            end_time: session.end_time.format("%H:%M").to_string(),
            max_players: session.max_players,
            venue: session.venue,
        }
    }
}

/// Create a new session.
async fn create_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(new): Json<NewSession>,
) -> Result<Json<SessionResponse>> {
    let session = state
        .ledger
        .create_session(user.user_id, new, chrono::Utc::now())
        .await?;
    Ok(Json(SessionResponse::from(session)))
}

#[derive(Serialize)]
pub struct RegisterEntryResponse {
    pub booking_id: Uuid,
    pub user_id: Uuid,
    pub player_name: String,
    pub player_email: String,
    pub payment_status: Option<PaymentStatus>,
    pub amount_pence: Option<i64>,
}

#[derive(Serialize)]
pub struct SessionRegisterResponse {
    pub session: SessionResponse,
    pub confirmed_count: u32,
    pub paid_count: u32,
    pub pending_count: u32,
    pub spots_left: i64,
    pub players: Vec<RegisterEntryResponse>,
}

/// The register for one session: who is coming and who has paid.
async fn session_register(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionRegisterResponse>> {
    let register = state.ledger.session_register(session_id).await?;

    let spots_left = register.session.spots_left(register.confirmed_count);
    let players = register
        .entries
        .into_iter()
        .map(|entry| RegisterEntryResponse {
            booking_id: entry.booking.id,
            user_id: entry.booking.user_id,
            player_name: entry
                .profile
                .as_ref()
                .map(|p| p.full_name.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            player_email: entry
                .profile
                .map(|p| p.email)
                .unwrap_or_default(),
            payment_status: entry.payment.as_ref().map(|p| p.status),
            amount_pence: entry.payment.map(|p| p.amount_pence),
        })
        .collect();

    Ok(Json(SessionRegisterResponse {
        session: SessionResponse::from(register.session),
        confirmed_count: register.confirmed_count,
        paid_count: register.paid_count,
        pending_count: register.pending_count,
        spots_left,
        players,
    }))
}

// ─── Dashboard ───────────────────────────────────────────────

#[derive(Serialize)]
pub struct NextSessionResponse {
    pub session: SessionResponse,
    pub confirmed_count: u32,
    pub pending_payments: u32,
}

#[derive(Serialize)]
pub struct OverviewResponse {
    pub next_session: Option<NextSessionResponse>,
    pub revenue_pence: i64,
    pub player_count: u32,
    pub sessions_this_month: u32,
}

/// Dashboard stats for the current billing period.
async fn overview(State(state): State<Arc<AppState>>) -> Result<Json<OverviewResponse>> {
    let now = chrono::Utc::now();
    let (month, year) = period_of(now);
    let overview = state
        .ledger
        .club_overview(now.date_naive(), month, year)
        .await?;

    Ok(Json(OverviewResponse {
        next_session: overview.next_session.map(|next| NextSessionResponse {
            session: SessionResponse::from(next.session),
            confirmed_count: next.confirmed_count,
            pending_payments: next.pending_payments,
        }),
        revenue_pence: overview.revenue_pence,
        player_count: overview.player_count,
        sessions_this_month: overview.sessions_this_month,
    }))
}

// ─── Payments ────────────────────────────────────────────────

#[derive(Deserialize)]
struct PeriodQuery {
    month: Option<u32>,
    year: Option<i32>,
}

#[derive(Serialize)]
pub struct PlayerPaymentResponse {
    pub user_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub payment_preference: PaymentPreference,
    pub sessions_played: u32,
    pub payment: Option<PaymentResponse>,
}

#[derive(Serialize)]
pub struct PeriodPaymentsResponse {
    pub month: u32,
    pub year: i32,
    pub paid_count: u32,
    pub pending_count: u32,
    pub collected_pence: i64,
    pub players: Vec<PlayerPaymentResponse>,
}

/// Every player's payment state for a billing period (defaults to the
/// current one).
async fn period_payments(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PeriodQuery>,
) -> Result<Json<PeriodPaymentsResponse>> {
    let (current_month, current_year) = period_of(chrono::Utc::now());
    let month = params.month.unwrap_or(current_month);
    let year = params.year.unwrap_or(current_year);

    let aggregates = state.ledger.players_aggregate(month, year).await?;

    let paid_count = aggregates
        .iter()
        .filter(|a| matches!(&a.payment, Some(p) if p.status == PaymentStatus::Paid))
        .count() as u32;
    // No payment row yet counts as pending: the player owes for the period.
    let pending_count = aggregates
        .iter()
        .filter(|a| match &a.payment {
            None => true,
            Some(p) => p.status == PaymentStatus::Pending,
        })
        .count() as u32;
    let collected_pence = aggregates
        .iter()
        .filter_map(|a| a.payment.as_ref())
        .filter(|p| p.status == PaymentStatus::Paid)
        .map(|p| p.amount_pence)
        .sum();

    let players = aggregates
        .into_iter()
        .map(|a| PlayerPaymentResponse {
            user_id: a.profile.id,
            full_name: a.profile.full_name,
            email: a.profile.email,
            payment_preference: a.profile.payment_preference,
            sessions_played: a.sessions_played,
            payment: a.payment.map(PaymentResponse::from),
        })
        .collect();

    Ok(Json(PeriodPaymentsResponse {
        month,
        year,
        paid_count,
        pending_count,
        collected_pence,
        players,
    }))
}

/// Status update request: addressed by payment id, by (user, session), or
/// by (user, month, year).
#[derive(Deserialize)]
struct SetPaymentStatusRequest {
    payment_id: Option<Uuid>,
    user_id: Option<Uuid>,
    session_id: Option<Uuid>,
    month: Option<u32>,
    year: Option<i32>,
    status: PaymentStatus,
}

impl SetPaymentStatusRequest {
    fn target(&self) -> Result<PaymentTarget> {
        if let Some(payment_id) = self.payment_id {
            return Ok(PaymentTarget::Payment(payment_id));
        }
        let user_id = self.user_id.ok_or_else(|| {
            AppError::BadRequest("Provide payment_id, or user_id with a key".to_string())
        })?;
        if let Some(session_id) = self.session_id {
            return Ok(PaymentTarget::Session {
                user_id,
                session_id,
            });
        }
        match (self.month, self.year) {
            (Some(month), Some(year)) => Ok(PaymentTarget::Period {
                user_id,
                month,
                year,
            }),
            _ => Err(AppError::BadRequest(
                "Provide session_id, or month and year".to_string(),
            )),
        }
    }
}

/// Mark a payment paid (sets `paid_at`), pending ("undo", clears it), or
/// overdue. Keyed forms create the row with the default fee when absent.
async fn set_payment_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<SetPaymentStatusRequest>,
) -> Result<Json<PaymentResponse>> {
    let target = req.target()?;
    let payment = state
        .ledger
        .set_payment_status(target, req.status, chrono::Utc::now())
        .await?;

    tracing::info!(
        admin_id = %user.user_id,
        payment_id = %payment.id,
        status = payment.status.as_str(),
        "Payment status set"
    );

    Ok(Json(PaymentResponse::from(payment)))
}

#[derive(Serialize)]
pub struct MarkOverdueResponse {
    pub updated: u32,
}

/// Flip pending payments for past sessions to overdue.
async fn mark_overdue(State(state): State<Arc<AppState>>) -> Result<Json<MarkOverdueResponse>> {
    let now = chrono::Utc::now();
    let updated = state.ledger.mark_overdue(now.date_naive(), now).await?;
    Ok(Json(MarkOverdueResponse { updated }))
}
