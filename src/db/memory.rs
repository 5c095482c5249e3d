//! In-memory store adapter.
//!
//! Backs the test suite and local development (`CLUB_STORE=memory`).
//! A single table lock is held across each multi-step operation, which
//! makes the port's atomicity contract hold by construction.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::db::store::{BookingOutcome, ClubStore, PaymentOutcome};
use crate::error::{AppError, Result};
use crate::models::booking::{decide, BookingDecision};
use crate::models::{
    Booking, BookingStatus, Credential, Payment, PaymentKey, PaymentStatus, Profile, Role, Session,
};

#[derive(Default)]
struct Tables {
    profiles: HashMap<Uuid, Profile>,
    /// Keyed by lowercased email
    credentials: HashMap<String, Credential>,
    sessions: HashMap<Uuid, Session>,
    bookings: HashMap<Uuid, Booking>,
    payments: HashMap<Uuid, Payment>,
}

/// In-memory club store.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `PoisonError` keeps the guard and is not `Send`, so only its string
    /// representation crosses the error boundary.
    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|e: PoisonError<_>| AppError::Database(format!("table lock poisoned: {e}")))
    }
}

#[async_trait]
impl ClubStore for MemoryStore {
    // ─── Accounts ────────────────────────────────────────────────

    async fn create_account(&self, profile: &Profile, credential: &Credential) -> Result<()> {
        let mut tables = self.lock()?;
        if tables.credentials.contains_key(&credential.email) {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }
        if tables.profiles.contains_key(&profile.id) {
            return Err(AppError::Conflict("Profile already exists".to_string()));
        }
        tables
            .credentials
            .insert(credential.email.clone(), credential.clone());
        tables.profiles.insert(profile.id, profile.clone());
        Ok(())
    }

    async fn find_credential(&self, email: &str) -> Result<Option<Credential>> {
        Ok(self.lock()?.credentials.get(email).cloned())
    }

    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
        Ok(self.lock()?.profiles.get(&user_id).cloned())
    }

    async fn list_players(&self) -> Result<Vec<Profile>> {
        Ok(self
            .lock()?
            .profiles
            .values()
            .filter(|p| p.role == Role::Player)
            .cloned()
            .collect())
    }

    async fn count_players(&self) -> Result<u32> {
        Ok(self
            .lock()?
            .profiles
            .values()
            .filter(|p| p.role == Role::Player)
            .count() as u32)
    }

    // ─── Sessions ────────────────────────────────────────────────

    async fn insert_session(&self, session: &Session) -> Result<()> {
        self.lock()?.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn get_session(&self, session_id: Uuid) -> Result<Option<Session>> {
        Ok(self.lock()?.sessions.get(&session_id).cloned())
    }

    async fn list_sessions_from(&self, from: NaiveDate, limit: u32) -> Result<Vec<Session>> {
        let mut sessions: Vec<Session> = self
            .lock()?
            .sessions
            .values()
            .filter(|s| s.date >= from)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| (a.date, a.start_time).cmp(&(b.date, b.start_time)));
        sessions.truncate(limit as usize);
        Ok(sessions)
    }

    async fn count_sessions_between(&self, from: NaiveDate, to: NaiveDate) -> Result<u32> {
        Ok(self
            .lock()?
            .sessions
            .values()
            .filter(|s| s.date >= from && s.date <= to)
            .count() as u32)
    }

    // ─── Bookings ────────────────────────────────────────────────

    async fn book_session(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<BookingOutcome> {
        let mut tables = self.lock()?;

        let max_players = tables
            .sessions
            .get(&session_id)
            .ok_or_else(|| AppError::NotFound(format!("Session {session_id} not found")))?
            .max_players;

        let existing = tables
            .bookings
            .values()
            .find(|b| {
                b.user_id == user_id
                    && b.session_id == session_id
                    && b.status == BookingStatus::Confirmed
            })
            .cloned();
        let confirmed_count = tables
            .bookings
            .values()
            .filter(|b| b.session_id == session_id && b.status == BookingStatus::Confirmed)
            .count() as u32;

        match decide(existing.as_ref(), confirmed_count, max_players) {
            BookingDecision::AlreadyBooked => {
                // Checked above: `existing` is Some in this branch
                let booking = existing.ok_or_else(|| {
                    AppError::Database("booking decision without a row".to_string())
                })?;
                Ok(BookingOutcome {
                    booking,
                    created: false,
                })
            }
            BookingDecision::Full => Err(AppError::SessionFull(format!(
                "Session {session_id} has no spots left"
            ))),
            BookingDecision::Accept => {
                let booking = Booking::confirmed(user_id, session_id, now);
                tables.bookings.insert(booking.id, booking.clone());
                Ok(BookingOutcome {
                    booking,
                    created: true,
                })
            }
        }
    }

    async fn get_booking(&self, booking_id: Uuid) -> Result<Option<Booking>> {
        Ok(self.lock()?.bookings.get(&booking_id).cloned())
    }

    async fn set_booking_status(
        &self,
        booking_id: Uuid,
        status: BookingStatus,
        now: DateTime<Utc>,
    ) -> Result<Booking> {
        let mut tables = self.lock()?;
        let booking = tables
            .bookings
            .get_mut(&booking_id)
            .ok_or_else(|| AppError::NotFound(format!("Booking {booking_id} not found")))?;
        booking.status = status;
        booking.updated_at = now;
        Ok(booking.clone())
    }

    async fn find_active_booking(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> Result<Option<Booking>> {
        Ok(self
            .lock()?
            .bookings
            .values()
            .find(|b| {
                b.user_id == user_id
                    && b.session_id == session_id
                    && b.status == BookingStatus::Confirmed
            })
            .cloned())
    }

    async fn list_confirmed_bookings(&self, session_id: Uuid) -> Result<Vec<Booking>> {
        Ok(self
            .lock()?
            .bookings
            .values()
            .filter(|b| b.session_id == session_id && b.status == BookingStatus::Confirmed)
            .cloned()
            .collect())
    }

    async fn count_confirmed_bookings(&self, session_id: Uuid) -> Result<u32> {
        Ok(self
            .lock()?
            .bookings
            .values()
            .filter(|b| b.session_id == session_id && b.status == BookingStatus::Confirmed)
            .count() as u32)
    }

    async fn count_sessions_played(&self, user_id: Uuid) -> Result<u32> {
        Ok(self
            .lock()?
            .bookings
            .values()
            .filter(|b| b.user_id == user_id && b.status == BookingStatus::Confirmed)
            .count() as u32)
    }

    // ─── Payments ────────────────────────────────────────────────

    async fn record_payment(&self, payment: Payment) -> Result<PaymentOutcome> {
        let mut tables = self.lock()?;

        if let Some(key) = payment.key() {
            if let Some(existing) = tables.payments.values().find(|p| key.matches(p)) {
                return Ok(PaymentOutcome {
                    payment: existing.clone(),
                    created: false,
                });
            }
        }

        tables.payments.insert(payment.id, payment.clone());
        Ok(PaymentOutcome {
            payment,
            created: true,
        })
    }

    async fn get_payment(&self, payment_id: Uuid) -> Result<Option<Payment>> {
        Ok(self.lock()?.payments.get(&payment_id).cloned())
    }

    async fn find_payment(&self, key: &PaymentKey) -> Result<Option<Payment>> {
        Ok(self
            .lock()?
            .payments
            .values()
            .find(|p| key.matches(p))
            .cloned())
    }

    async fn update_payment_status(
        &self,
        payment_id: Uuid,
        status: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<Payment> {
        let mut tables = self.lock()?;
        let payment = tables
            .payments
            .get_mut(&payment_id)
            .ok_or_else(|| AppError::NotFound(format!("Payment {payment_id} not found")))?;
        payment.status = status;
        payment.paid_at = (status == PaymentStatus::Paid).then_some(now);
        payment.updated_at = now;
        Ok(payment.clone())
    }

    async fn apply_payment_status(
        &self,
        key: &PaymentKey,
        template: Payment,
        now: DateTime<Utc>,
    ) -> Result<Payment> {
        let mut tables = self.lock()?;

        if let Some(payment) = tables.payments.values_mut().find(|p| key.matches(p)) {
            payment.status = template.status;
            payment.paid_at = (template.status == PaymentStatus::Paid).then_some(now);
            payment.updated_at = now;
            return Ok(payment.clone());
        }

        tables.payments.insert(template.id, template.clone());
        Ok(template)
    }

    async fn list_payments_for_period(&self, month: u32, year: i32) -> Result<Vec<Payment>> {
        Ok(self
            .lock()?
            .payments
            .values()
            .filter(|p| p.month == Some(month) && p.year == Some(year))
            .cloned()
            .collect())
    }

    async fn list_pending_session_payments(&self) -> Result<Vec<Payment>> {
        Ok(self
            .lock()?
            .payments
            .values()
            .filter(|p| p.status == PaymentStatus::Pending && p.session_id.is_some())
            .cloned()
            .collect())
    }

    async fn count_payments_with_status(&self, status: PaymentStatus) -> Result<u32> {
        Ok(self
            .lock()?
            .payments
            .values()
            .filter(|p| p.status == status)
            .count() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaymentType, WEEKLY_FEE_PENCE};
    use chrono::NaiveTime;

    fn make_session(max_players: u32) -> Session {
        Session {
            id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2026, 8, 14).unwrap(),
            start_time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
            max_players,
            venue: "Sports Complex".to_string(),
            created_by: None,
            created_at: Utc::now(),
        }
    }

    fn make_payment(user_id: Uuid, session_id: Option<Uuid>) -> Payment {
        let now = Utc::now();
        Payment {
            id: Uuid::new_v4(),
            user_id,
            session_id,
            amount_pence: WEEKLY_FEE_PENCE,
            payment_type: PaymentType::Weekly,
            status: PaymentStatus::Pending,
            paid_at: None,
            month: Some(8),
            year: Some(2026),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_book_session_idempotent() {
        let store = MemoryStore::new();
        let session = make_session(12);
        store.insert_session(&session).await.unwrap();

        let user = Uuid::new_v4();
        let first = store
            .book_session(user, session.id, Utc::now())
            .await
            .unwrap();
        let second = store
            .book_session(user, session.id, Utc::now())
            .await
            .unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.booking.id, second.booking.id);
        assert_eq!(store.count_confirmed_bookings(session.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_book_session_enforces_capacity() {
        let store = MemoryStore::new();
        let session = make_session(2);
        store.insert_session(&session).await.unwrap();

        for _ in 0..2 {
            store
                .book_session(Uuid::new_v4(), session.id, Utc::now())
                .await
                .unwrap();
        }

        let err = store
            .book_session(Uuid::new_v4(), session.id, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SessionFull(_)));
    }

    #[tokio::test]
    async fn test_book_session_unknown_session() {
        let store = MemoryStore::new();
        let err = store
            .book_session(Uuid::new_v4(), Uuid::new_v4(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_concurrent_bookings_race_one_spot() {
        // Many tasks race for the last spot; exactly one may win.
        let store = std::sync::Arc::new(MemoryStore::new());
        let session = make_session(1);
        store.insert_session(&session).await.unwrap();

        let mut handles = vec![];
        for _ in 0..8 {
            let store = store.clone();
            let session_id = session.id;
            handles.push(tokio::spawn(async move {
                store
                    .book_session(Uuid::new_v4(), session_id, Utc::now())
                    .await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.expect("task join failed").is_ok() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(store.count_confirmed_bookings(session.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_record_payment_upserts_by_key() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let session_id = Some(Uuid::new_v4());

        let first = store
            .record_payment(make_payment(user, session_id))
            .await
            .unwrap();
        let second = store
            .record_payment(make_payment(user, session_id))
            .await
            .unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.payment.id, second.payment.id);
    }

    #[tokio::test]
    async fn test_update_payment_status_toggles_paid_at() {
        let store = MemoryStore::new();
        let payment = make_payment(Uuid::new_v4(), None);
        let amount = payment.amount_pence;
        store.record_payment(payment.clone()).await.unwrap();

        let paid = store
            .update_payment_status(payment.id, PaymentStatus::Paid, Utc::now())
            .await
            .unwrap();
        assert!(paid.paid_at.is_some());
        assert_eq!(paid.amount_pence, amount);

        let pending = store
            .update_payment_status(payment.id, PaymentStatus::Pending, Utc::now())
            .await
            .unwrap();
        assert!(pending.paid_at.is_none());
        assert_eq!(pending.amount_pence, amount);
    }

    #[tokio::test]
    async fn test_apply_payment_status_creates_when_absent() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let session_id = Uuid::new_v4();
        let key = PaymentKey::Session {
            user_id: user,
            session_id,
        };

        let mut template = make_payment(user, Some(session_id));
        template.status = PaymentStatus::Paid;
        template.paid_at = Some(Utc::now());

        let created = store
            .apply_payment_status(&key, template, Utc::now())
            .await
            .unwrap();
        assert_eq!(created.status, PaymentStatus::Paid);

        // Second apply must update the same row, not add one
        let mut undo = make_payment(user, Some(session_id));
        undo.status = PaymentStatus::Pending;
        let updated = store
            .apply_payment_status(&key, undo, Utc::now())
            .await
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.status, PaymentStatus::Pending);
        assert!(updated.paid_at.is_none());
    }
}
