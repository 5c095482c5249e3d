// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! The `ClubStore` port: every operation the ledger needs from storage.
//!
//! Adapters must make the multi-step operations (`book_session`,
//! `record_payment`, `apply_payment_status`, `create_account`) atomic:
//! the read and the dependent write may not interleave with a concurrent
//! call on the same key. How that is achieved is adapter-specific
//! (Firestore transactions, an in-memory table lock).

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    Booking, BookingStatus, Credential, Payment, PaymentKey, PaymentStatus, Profile, Session,
};

/// Result of a `book_session` call.
#[derive(Debug, Clone)]
pub struct BookingOutcome {
    pub booking: Booking,
    /// `false` when the caller already held this booking (idempotent hit)
    pub created: bool,
}

/// Result of a `record_payment` call.
#[derive(Debug, Clone)]
pub struct PaymentOutcome {
    pub payment: Payment,
    /// `false` when a row already existed for the payment's key
    pub created: bool,
}

#[async_trait]
pub trait ClubStore: Send + Sync {
    // ─── Accounts ────────────────────────────────────────────────

    /// Create a credential and its profile together.
    ///
    /// Fails with `Conflict` if the email is already registered, so exactly
    /// one profile ever exists per identity.
    async fn create_account(&self, profile: &Profile, credential: &Credential) -> Result<()>;

    async fn find_credential(&self, email: &str) -> Result<Option<Credential>>;

    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>>;

    /// All profiles with the player role, in no particular order.
    async fn list_players(&self) -> Result<Vec<Profile>>;

    async fn count_players(&self) -> Result<u32>;

    // ─── Sessions ────────────────────────────────────────────────

    async fn insert_session(&self, session: &Session) -> Result<()>;

    async fn get_session(&self, session_id: Uuid) -> Result<Option<Session>>;

    /// Sessions on or after `from`, soonest first.
    async fn list_sessions_from(&self, from: NaiveDate, limit: u32) -> Result<Vec<Session>>;

    async fn count_sessions_between(&self, from: NaiveDate, to: NaiveDate) -> Result<u32>;

    // ─── Bookings ────────────────────────────────────────────────

    /// Book a spot: the admission rule (`models::booking::decide`)
    /// evaluated atomically against current rows.
    ///
    /// Returns the existing booking unchanged if the user already holds
    /// one, fails with `SessionFull` at capacity, and otherwise inserts a
    /// new confirmed booking.
    async fn book_session(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<BookingOutcome>;

    async fn get_booking(&self, booking_id: Uuid) -> Result<Option<Booking>>;

    async fn set_booking_status(
        &self,
        booking_id: Uuid,
        status: BookingStatus,
        now: DateTime<Utc>,
    ) -> Result<Booking>;

    async fn find_active_booking(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> Result<Option<Booking>>;

    async fn list_confirmed_bookings(&self, session_id: Uuid) -> Result<Vec<Booking>>;

    /// Confirmed bookings for a session, recomputed from rows.
    async fn count_confirmed_bookings(&self, session_id: Uuid) -> Result<u32>;

    /// Confirmed bookings ever made by a user ("sessions played").
    async fn count_sessions_played(&self, user_id: Uuid) -> Result<u32>;

    // ─── Payments ────────────────────────────────────────────────

    /// Insert a payment unless a row already exists for its key.
    ///
    /// The existing row is returned unchanged on a key hit. A payment
    /// without a key (no session, incomplete period) is inserted as-is.
    async fn record_payment(&self, payment: Payment) -> Result<PaymentOutcome>;

    async fn get_payment(&self, payment_id: Uuid) -> Result<Option<Payment>>;

    async fn find_payment(&self, key: &PaymentKey) -> Result<Option<Payment>>;

    /// Update one payment's status; `paid_at` is set exactly when the new
    /// status is `paid`. The amount is never touched.
    async fn update_payment_status(
        &self,
        payment_id: Uuid,
        status: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<Payment>;

    /// Status update addressed by key: update the row if one exists,
    /// otherwise insert `template` (which carries the target status and
    /// default amount). Exactly one row exists for the key afterwards.
    async fn apply_payment_status(
        &self,
        key: &PaymentKey,
        template: Payment,
        now: DateTime<Utc>,
    ) -> Result<Payment>;

    /// All payments for a billing period, any status.
    async fn list_payments_for_period(&self, month: u32, year: i32) -> Result<Vec<Payment>>;

    /// Pending payments tied to a session (candidates for overdue).
    async fn list_pending_session_payments(&self) -> Result<Vec<Payment>>;

    async fn count_payments_with_status(&self, status: PaymentStatus) -> Result<u32>;
}
