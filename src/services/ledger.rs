// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! The booking and payment ledger.
//!
//! Every operation here is a thin composition over the club store: counts
//! and revenue are always recomputed from rows (there is no cached
//! aggregate to drift), and the operations that must not race - booking
//! admission, payment upserts - delegate to the store's atomic calls.
//! Callers pass the clock in, so each operation is a pure function of the
//! store snapshot plus its arguments.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use futures_util::{stream, StreamExt};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::db::{ClubStore, PaymentOutcome};
use crate::error::{AppError, Result};
use crate::models::{
    Booking, BookingStatus, Payment, PaymentKey, PaymentStatus, PaymentType, Profile, Session,
};
use crate::time_utils::month_bounds;

/// Cap on concurrent store reads when enriching a list.
const MAX_CONCURRENT_STORE_OPS: usize = 16;

/// How many upcoming sessions the schedule shows.
pub const SCHEDULE_LIMIT: u32 = 10;

/// Payload for creating a session.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewSession {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[validate(range(min = 1, max = 64))]
    pub max_players: u32,
    #[validate(length(min = 1, max = 200))]
    pub venue: String,
}

/// Payload for a member recording their own payment.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PaymentDraft {
    /// Session covered; omit for period dues
    pub session_id: Option<Uuid>,
    #[validate(range(min = 1))]
    pub amount_pence: i64,
    pub payment_type: PaymentType,
    #[validate(range(min = 1, max = 12))]
    pub month: Option<u32>,
    pub year: Option<i32>,
}

/// How a status update addresses its payment.
#[derive(Debug, Clone, Copy)]
pub enum PaymentTarget {
    /// An existing payment row
    Payment(Uuid),
    /// The (user, session) partition; created with the weekly default fee
    /// if no row exists yet
    Session { user_id: Uuid, session_id: Uuid },
    /// The (user, month, year) partition; created with the monthly default
    /// fee if no row exists yet
    Period {
        user_id: Uuid,
        month: u32,
        year: i32,
    },
}

/// A session as the schedule shows it to one player.
#[derive(Debug, Clone)]
pub struct SessionOverview {
    pub session: Session,
    pub confirmed_count: u32,
    pub spots_left: i64,
    pub is_booked: bool,
}

/// One player with their attendance and current-period payment.
#[derive(Debug, Clone)]
pub struct PlayerAggregate {
    pub profile: Profile,
    pub sessions_played: u32,
    pub payment: Option<Payment>,
}

/// One confirmed booking on the register, enriched for the organizer.
#[derive(Debug, Clone)]
pub struct RegisterEntry {
    pub booking: Booking,
    pub profile: Option<Profile>,
    pub payment: Option<Payment>,
}

/// The organizer's view of one session.
#[derive(Debug, Clone)]
pub struct SessionRegister {
    pub session: Session,
    pub confirmed_count: u32,
    pub paid_count: u32,
    pub pending_count: u32,
    pub entries: Vec<RegisterEntry>,
}

/// The next session as the organizer dashboard shows it.
#[derive(Debug, Clone)]
pub struct NextSessionSummary {
    pub session: Session,
    pub confirmed_count: u32,
    pub pending_payments: u32,
}

/// Organizer dashboard stats.
#[derive(Debug, Clone)]
pub struct ClubOverview {
    pub next_session: Option<NextSessionSummary>,
    pub revenue_pence: i64,
    pub player_count: u32,
    pub sessions_this_month: u32,
}

/// Booking and payment ledger over a club store.
#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn ClubStore>,
}

impl LedgerService {
    pub fn new(store: Arc<dyn ClubStore>) -> Self {
        Self { store }
    }

    // ─── Sessions ────────────────────────────────────────────────

    /// Create a session (organizer operation).
    pub async fn create_session(
        &self,
        created_by: Uuid,
        new: NewSession,
        now: DateTime<Utc>,
    ) -> Result<Session> {
        new.validate()?;
        if new.end_time <= new.start_time {
            return Err(AppError::BadRequest(
                "End time must be after start time".to_string(),
            ));
        }

        let session = Session {
            id: Uuid::new_v4(),
            date: new.date,
            start_time: new.start_time,
            end_time: new.end_time,
            max_players: new.max_players,
            venue: new.venue.trim().to_string(),
            created_by: Some(created_by),
            created_at: now,
        };
        self.store.insert_session(&session).await?;

        tracing::info!(
            session_id = %session.id,
            date = %session.date,
            max_players = session.max_players,
            "Session created"
        );

        Ok(session)
    }

    /// Upcoming sessions for the schedule, enriched for one player.
    ///
    /// Counts and booking flags are fetched concurrently per session; the
    /// result is sorted once everything has been gathered, never by call
    /// completion order.
    pub async fn upcoming_sessions(
        &self,
        user_id: Uuid,
        today: NaiveDate,
        limit: u32,
    ) -> Result<Vec<SessionOverview>> {
        let sessions = self.store.list_sessions_from(today, limit).await?;

        let mut overviews = stream::iter(sessions)
            .map(|session| {
                let store = self.store.clone();
                async move {
                    let confirmed_count = store.count_confirmed_bookings(session.id).await?;
                    let is_booked = store
                        .find_active_booking(user_id, session.id)
                        .await?
                        .is_some();
                    Ok::<_, AppError>(SessionOverview {
                        spots_left: session.spots_left(confirmed_count),
                        session,
                        confirmed_count,
                        is_booked,
                    })
                }
            })
            .buffer_unordered(MAX_CONCURRENT_STORE_OPS)
            .collect::<Vec<Result<SessionOverview>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        overviews.sort_by(|a, b| {
            (a.session.date, a.session.start_time).cmp(&(b.session.date, b.session.start_time))
        });

        Ok(overviews)
    }

    // ─── Bookings ────────────────────────────────────────────────

    /// Book a spot in a session.
    ///
    /// Idempotent for a user who already holds a confirmed booking; fails
    /// with `SessionFull` at capacity.
    pub async fn book_session(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Booking> {
        let outcome = self.store.book_session(user_id, session_id, now).await?;
        if !outcome.created {
            tracing::debug!(
                user_id = %user_id,
                session_id = %session_id,
                "Repeat booking request, returning existing booking"
            );
        }
        Ok(outcome.booking)
    }

    /// Cancel a booking. The row is kept (status change only) and any
    /// payment for the session is deliberately left untouched.
    ///
    /// Safe to retry: cancelling an already-cancelled booking is a no-op.
    pub async fn cancel_booking(
        &self,
        user_id: Uuid,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Booking> {
        let booking = self
            .store
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Booking {} not found", booking_id)))?;

        if booking.user_id != user_id {
            return Err(AppError::Forbidden(
                "Booking belongs to another player".to_string(),
            ));
        }

        if booking.status == BookingStatus::Cancelled {
            return Ok(booking);
        }

        let booking = self
            .store
            .set_booking_status(booking_id, BookingStatus::Cancelled, now)
            .await?;

        tracing::info!(
            user_id = %user_id,
            booking_id = %booking_id,
            session_id = %booking.session_id,
            "Booking cancelled"
        );

        Ok(booking)
    }

    /// Active bookings for a session, recomputed from rows.
    pub async fn confirmed_count(&self, session_id: Uuid) -> Result<u32> {
        self.store.count_confirmed_bookings(session_id).await
    }

    // ─── Payments ────────────────────────────────────────────────

    /// Record a member's self-declared payment (always `pending`; an
    /// organizer confirms it later).
    ///
    /// Upsert semantics: one row per (user, session) or (user, month,
    /// year) partition. A repeat call returns the existing row unchanged.
    pub async fn record_payment(
        &self,
        user_id: Uuid,
        draft: PaymentDraft,
        now: DateTime<Utc>,
    ) -> Result<PaymentOutcome> {
        draft.validate()?;

        if let Some(session_id) = draft.session_id {
            self.store
                .get_session(session_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Session {} not found", session_id)))?;
        } else if draft.month.is_none() || draft.year.is_none() {
            return Err(AppError::BadRequest(
                "A payment needs a session or a month and year".to_string(),
            ));
        }

        let payment = Payment {
            id: Uuid::new_v4(),
            user_id,
            session_id: draft.session_id,
            amount_pence: draft.amount_pence,
            payment_type: draft.payment_type,
            status: PaymentStatus::Pending,
            paid_at: None,
            month: draft.month,
            year: draft.year,
            created_at: now,
            updated_at: now,
        };

        let outcome = self.store.record_payment(payment).await?;

        if outcome.created {
            tracing::info!(
                user_id = %user_id,
                payment_id = %outcome.payment.id,
                amount_pence = outcome.payment.amount_pence,
                "Payment recorded"
            );
        }

        Ok(outcome)
    }

    /// Set a payment's status (organizer operation).
    ///
    /// Addressed by row id, or by partition key - the keyed forms create
    /// the row with the default fee when none exists yet, which is how an
    /// organizer marks someone paid who never recorded a payment.
    /// `paid_at` is set exactly when the new status is `paid`.
    pub async fn set_payment_status(
        &self,
        target: PaymentTarget,
        status: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<Payment> {
        match target {
            PaymentTarget::Payment(payment_id) => {
                self.store
                    .update_payment_status(payment_id, status, now)
                    .await
            }
            PaymentTarget::Session {
                user_id,
                session_id,
            } => {
                self.require_profile(user_id).await?;
                self.store
                    .get_session(session_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::NotFound(format!("Session {} not found", session_id))
                    })?;

                let key = PaymentKey::Session {
                    user_id,
                    session_id,
                };
                let template = payment_template(
                    user_id,
                    Some(session_id),
                    PaymentType::Weekly,
                    None,
                    None,
                    status,
                    now,
                );
                self.store.apply_payment_status(&key, template, now).await
            }
            PaymentTarget::Period {
                user_id,
                month,
                year,
            } => {
                if !(1..=12).contains(&month) {
                    return Err(AppError::BadRequest(format!("Invalid month: {}", month)));
                }
                self.require_profile(user_id).await?;

                let key = PaymentKey::Period {
                    user_id,
                    month,
                    year,
                };
                let template = payment_template(
                    user_id,
                    None,
                    PaymentType::Monthly,
                    Some(month),
                    Some(year),
                    status,
                    now,
                );
                self.store.apply_payment_status(&key, template, now).await
            }
        }
    }

    /// A member's payment for a billing period, if any.
    pub async fn period_payment(
        &self,
        user_id: Uuid,
        month: u32,
        year: i32,
    ) -> Result<Option<Payment>> {
        self.store
            .find_payment(&PaymentKey::Period {
                user_id,
                month,
                year,
            })
            .await
    }

    /// Exact revenue for a billing period: the integer sum of paid
    /// amounts.
    pub async fn monthly_revenue(&self, month: u32, year: i32) -> Result<i64> {
        if !(1..=12).contains(&month) {
            return Err(AppError::BadRequest(format!("Invalid month: {}", month)));
        }
        let payments = self.store.list_payments_for_period(month, year).await?;
        Ok(payments
            .iter()
            .filter(|p| p.status == PaymentStatus::Paid)
            .map(|p| p.amount_pence)
            .sum())
    }

    /// Flip pending session payments to `overdue` once their session date
    /// has passed. Returns how many rows changed.
    pub async fn mark_overdue(&self, today: NaiveDate, now: DateTime<Utc>) -> Result<u32> {
        let pending = self.store.list_pending_session_payments().await?;

        let mut flipped = 0;
        for payment in pending {
            let Some(session_id) = payment.session_id else {
                continue;
            };
            let Some(session) = self.store.get_session(session_id).await? else {
                tracing::warn!(
                    payment_id = %payment.id,
                    session_id = %session_id,
                    "Pending payment references a missing session, skipping"
                );
                continue;
            };
            if session.date < today {
                self.store
                    .update_payment_status(payment.id, PaymentStatus::Overdue, now)
                    .await?;
                flipped += 1;
            }
        }

        if flipped > 0 {
            tracing::info!(count = flipped, "Marked stale session payments overdue");
        }

        Ok(flipped)
    }

    // ─── Aggregates ──────────────────────────────────────────────

    /// Every player with their attendance count and payment for the given
    /// billing period. Enrichment runs concurrently; the result is sorted
    /// by name after all lookups complete.
    pub async fn players_aggregate(&self, month: u32, year: i32) -> Result<Vec<PlayerAggregate>> {
        if !(1..=12).contains(&month) {
            return Err(AppError::BadRequest(format!("Invalid month: {}", month)));
        }
        let players = self.store.list_players().await?;

        let mut aggregates = stream::iter(players)
            .map(|profile| {
                let store = self.store.clone();
                async move {
                    let sessions_played = store.count_sessions_played(profile.id).await?;
                    let payment = store
                        .find_payment(&PaymentKey::Period {
                            user_id: profile.id,
                            month,
                            year,
                        })
                        .await?;
                    Ok::<_, AppError>(PlayerAggregate {
                        profile,
                        sessions_played,
                        payment,
                    })
                }
            })
            .buffer_unordered(MAX_CONCURRENT_STORE_OPS)
            .collect::<Vec<Result<PlayerAggregate>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        aggregates.sort_by(|a, b| {
            (&a.profile.full_name, &a.profile.email).cmp(&(&b.profile.full_name, &b.profile.email))
        });

        Ok(aggregates)
    }

    /// The organizer's register for one session: confirmed bookings with
    /// player details and session payment state.
    pub async fn session_register(&self, session_id: Uuid) -> Result<SessionRegister> {
        let session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Session {} not found", session_id)))?;

        let bookings = self.store.list_confirmed_bookings(session_id).await?;
        let confirmed_count = bookings.len() as u32;

        let mut entries = stream::iter(bookings)
            .map(|booking| {
                let store = self.store.clone();
                async move {
                    let profile = store.get_profile(booking.user_id).await?;
                    let payment = store
                        .find_payment(&PaymentKey::Session {
                            user_id: booking.user_id,
                            session_id: booking.session_id,
                        })
                        .await?;
                    Ok::<_, AppError>(RegisterEntry {
                        booking,
                        profile,
                        payment,
                    })
                }
            })
            .buffer_unordered(MAX_CONCURRENT_STORE_OPS)
            .collect::<Vec<Result<RegisterEntry>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        entries.sort_by(|a, b| {
            let name_a = a.profile.as_ref().map(|p| p.full_name.as_str());
            let name_b = b.profile.as_ref().map(|p| p.full_name.as_str());
            name_a.cmp(&name_b).then(a.booking.id.cmp(&b.booking.id))
        });

        let paid_count = entries
            .iter()
            .filter(|e| matches!(&e.payment, Some(p) if p.status == PaymentStatus::Paid))
            .count() as u32;
        // A missing payment row counts as pending: the player owes.
        let pending_count = entries
            .iter()
            .filter(|e| match &e.payment {
                None => true,
                Some(p) => p.status == PaymentStatus::Pending,
            })
            .count() as u32;

        Ok(SessionRegister {
            session,
            confirmed_count,
            paid_count,
            pending_count,
            entries,
        })
    }

    /// Organizer dashboard stats for the given day and billing period.
    pub async fn club_overview(
        &self,
        today: NaiveDate,
        month: u32,
        year: i32,
    ) -> Result<ClubOverview> {
        let next_session = match self.store.list_sessions_from(today, 1).await?.pop() {
            Some(session) => {
                let confirmed_count = self.store.count_confirmed_bookings(session.id).await?;
                let pending_payments = self
                    .store
                    .count_payments_with_status(PaymentStatus::Pending)
                    .await?;
                Some(NextSessionSummary {
                    session,
                    confirmed_count,
                    pending_payments,
                })
            }
            None => None,
        };

        let revenue_pence = self.monthly_revenue(month, year).await?;
        let player_count = self.store.count_players().await?;

        let (first_day, last_day) = month_bounds(month, year)
            .ok_or_else(|| AppError::BadRequest(format!("Invalid month: {}", month)))?;
        let sessions_this_month = self
            .store
            .count_sessions_between(first_day, last_day)
            .await?;

        Ok(ClubOverview {
            next_session,
            revenue_pence,
            player_count,
            sessions_this_month,
        })
    }

    async fn require_profile(&self, user_id: Uuid) -> Result<Profile> {
        self.store
            .get_profile(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Profile {} not found", user_id)))
    }
}

/// A fresh payment row carrying a status set directly by an organizer.
fn payment_template(
    user_id: Uuid,
    session_id: Option<Uuid>,
    payment_type: PaymentType,
    month: Option<u32>,
    year: Option<i32>,
    status: PaymentStatus,
    now: DateTime<Utc>,
) -> Payment {
    Payment {
        id: Uuid::new_v4(),
        user_id,
        session_id,
        amount_pence: payment_type.default_fee_pence(),
        payment_type,
        status,
        paid_at: (status == PaymentStatus::Paid).then_some(now),
        month,
        year,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::{PaymentPreference, Role};

    fn ledger() -> (LedgerService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (LedgerService::new(store.clone()), store)
    }

    fn new_session(date: NaiveDate, max_players: u32) -> NewSession {
        NewSession {
            date,
            start_time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
            max_players,
            venue: "Sports Complex, Court 1-3".to_string(),
        }
    }

    async fn seed_player(store: &Arc<MemoryStore>, name: &str) -> Uuid {
        let now = Utc::now();
        let profile = Profile {
            id: Uuid::new_v4(),
            email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
            full_name: name.to_string(),
            role: Role::Player,
            payment_preference: PaymentPreference::Weekly,
            created_at: now,
            updated_at: now,
        };
        let credential = crate::models::Credential {
            user_id: profile.id,
            email: profile.email.clone(),
            password_hash: "x".to_string(),
        };
        store.create_account(&profile, &credential).await.unwrap();
        profile.id
    }

    #[tokio::test]
    async fn test_create_session_rejects_zero_capacity() {
        let (ledger, _) = ledger();
        let mut new = new_session(NaiveDate::from_ymd_opt(2026, 8, 14).unwrap(), 12);
        new.max_players = 0;

        let err = ledger
            .create_session(Uuid::new_v4(), new, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_create_session_rejects_inverted_times() {
        let (ledger, _) = ledger();
        let mut new = new_session(NaiveDate::from_ymd_opt(2026, 8, 14).unwrap(), 12);
        new.end_time = NaiveTime::from_hms_opt(18, 0, 0).unwrap();

        let err = ledger
            .create_session(Uuid::new_v4(), new, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_cancel_booking_owner_only() {
        let (ledger, _) = ledger();
        let now = Utc::now();
        let session = ledger
            .create_session(
                Uuid::new_v4(),
                new_session(NaiveDate::from_ymd_opt(2026, 8, 14).unwrap(), 12),
                now,
            )
            .await
            .unwrap();

        let owner = Uuid::new_v4();
        let booking = ledger.book_session(owner, session.id, now).await.unwrap();

        let err = ledger
            .cancel_booking(Uuid::new_v4(), booking.id, now)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        // The owner can, and a repeat cancel is a no-op
        ledger.cancel_booking(owner, booking.id, now).await.unwrap();
        let again = ledger.cancel_booking(owner, booking.id, now).await.unwrap();
        assert_eq!(again.status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_record_payment_requires_a_key() {
        let (ledger, _) = ledger();
        let draft = PaymentDraft {
            session_id: None,
            amount_pence: 1200,
            payment_type: PaymentType::Weekly,
            month: None,
            year: None,
        };

        let err = ledger
            .record_payment(Uuid::new_v4(), draft, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_monthly_revenue_sums_only_paid() {
        let (ledger, _) = ledger();
        let now = Utc::now();
        let user_a = Uuid::new_v4();
        let user_b = Uuid::new_v4();

        for (user, status) in [(user_a, PaymentStatus::Paid), (user_b, PaymentStatus::Pending)] {
            let draft = PaymentDraft {
                session_id: None,
                amount_pence: 1250,
                payment_type: PaymentType::Monthly,
                month: Some(8),
                year: Some(2026),
            };
            let outcome = ledger.record_payment(user, draft, now).await.unwrap();
            if status == PaymentStatus::Paid {
                ledger
                    .set_payment_status(PaymentTarget::Payment(outcome.payment.id), status, now)
                    .await
                    .unwrap();
            }
        }

        assert_eq!(ledger.monthly_revenue(8, 2026).await.unwrap(), 1250);
        assert_eq!(ledger.monthly_revenue(9, 2026).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_players_aggregate_sorted_by_name() {
        let (ledger, store) = ledger();
        seed_player(&store, "Zoe Adams").await;
        seed_player(&store, "Amy Brown").await;
        seed_player(&store, "Mia Clark").await;

        let aggregates = ledger.players_aggregate(8, 2026).await.unwrap();
        let names: Vec<&str> = aggregates
            .iter()
            .map(|a| a.profile.full_name.as_str())
            .collect();
        assert_eq!(names, vec!["Amy Brown", "Mia Clark", "Zoe Adams"]);
    }

    #[tokio::test]
    async fn test_mark_overdue_flips_only_past_sessions() {
        let (ledger, _) = ledger();
        let now = Utc::now();
        let admin = Uuid::new_v4();
        let today = NaiveDate::from_ymd_opt(2026, 8, 7).unwrap();

        let past = ledger
            .create_session(admin, new_session(today.pred_opt().unwrap(), 12), now)
            .await
            .unwrap();
        let future = ledger
            .create_session(admin, new_session(today.succ_opt().unwrap(), 12), now)
            .await
            .unwrap();

        let user = Uuid::new_v4();
        for session in [&past, &future] {
            let draft = PaymentDraft {
                session_id: Some(session.id),
                amount_pence: 1200,
                payment_type: PaymentType::Weekly,
                month: None,
                year: None,
            };
            ledger.record_payment(user, draft, now).await.unwrap();
        }

        let flipped = ledger.mark_overdue(today, now).await.unwrap();
        assert_eq!(flipped, 1);

        let past_payment = ledger
            .store
            .find_payment(&PaymentKey::Session {
                user_id: user,
                session_id: past.id,
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(past_payment.status, PaymentStatus::Overdue);

        let future_payment = ledger
            .store
            .find_payment(&PaymentKey::Session {
                user_id: user,
                session_id: future.id,
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(future_payment.status, PaymentStatus::Pending);
    }
}
