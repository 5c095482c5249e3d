// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore club store adapter.
//!
//! One collection per record kind:
//! - `profiles` (keyed by user id)
//! - `credentials` (keyed by lowercased email)
//! - `sessions`, `bookings`, `payments` (keyed by record id)
//!
//! Multi-step invariants (signup uniqueness, booking admission, payment
//! upserts) run inside Firestore transactions so concurrent requests on
//! the same key are retried against fresh data instead of racing.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::db::collections;
use crate::db::store::{BookingOutcome, ClubStore, PaymentOutcome};
use crate::error::{AppError, Result};
use crate::models::booking::{decide, BookingDecision};
use crate::models::{
    Booking, BookingStatus, Credential, Payment, PaymentKey, PaymentStatus, Profile, Role, Session,
};

/// Firestore-backed club store.
#[derive(Clone)]
pub struct FirestoreStore {
    client: firestore::FirestoreDb,
}

impl FirestoreStore {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self> {
        // If the emulator environment variable is set, use unauthenticated
        // connection to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self { client })
    }

    /// Upsert one document keyed by `doc_id`.
    async fn put<T>(&self, collection: &str, doc_id: &str, object: &T) -> Result<()>
    where
        T: serde::Serialize + Send + Sync + for<'de> serde::Deserialize<'de>,
    {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collection)
            .document_id(doc_id)
            .object(object)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ClubStore for FirestoreStore {
    // ─── Accounts ────────────────────────────────────────────────

    async fn create_account(&self, profile: &Profile, credential: &Credential) -> Result<()> {
        let mut transaction = self
            .client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        // Read the credential slot inside the transaction so two signups
        // for the same email conflict instead of both committing.
        let existing: Option<Credential> = self
            .client
            .fluent()
            .select()
            .by_id_in(collections::CREDENTIALS)
            .obj()
            .one(&credential.email)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if existing.is_some() {
            let _ = transaction.rollback().await;
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        self.client
            .fluent()
            .update()
            .in_col(collections::CREDENTIALS)
            .document_id(&credential.email)
            .object(credential)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add credential to transaction: {}", e))
            })?;

        self.client
            .fluent()
            .update()
            .in_col(collections::PROFILES)
            .document_id(profile.id.to_string())
            .object(profile)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add profile to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(user_id = %profile.id, "Account created");

        Ok(())
    }

    async fn find_credential(&self, email: &str) -> Result<Option<Credential>> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::CREDENTIALS)
            .obj()
            .one(email)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::PROFILES)
            .obj()
            .one(&user_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_players(&self) -> Result<Vec<Profile>> {
        self.client
            .fluent()
            .select()
            .from(collections::PROFILES)
            .filter(|q| q.for_all([q.field("role").eq(Role::Player.as_str())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn count_players(&self) -> Result<u32> {
        Ok(self.list_players().await?.len() as u32)
    }

    // ─── Sessions ────────────────────────────────────────────────

    async fn insert_session(&self, session: &Session) -> Result<()> {
        self.put(collections::SESSIONS, &session.id.to_string(), session)
            .await
    }

    async fn get_session(&self, session_id: Uuid) -> Result<Option<Session>> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::SESSIONS)
            .obj()
            .one(&session_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_sessions_from(&self, from: NaiveDate, limit: u32) -> Result<Vec<Session>> {
        // ISO date strings order the same way dates do.
        let from = from.to_string();
        self.client
            .fluent()
            .select()
            .from(collections::SESSIONS)
            .filter(move |q| q.for_all([q.field("date").greater_than_or_equal(from.clone())]))
            .order_by([("date", firestore::FirestoreQueryDirection::Ascending)])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn count_sessions_between(&self, from: NaiveDate, to: NaiveDate) -> Result<u32> {
        let from = from.to_string();
        let to = to.to_string();
        let sessions: Vec<Session> = self
            .client
            .fluent()
            .select()
            .from(collections::SESSIONS)
            .filter(move |q| {
                q.for_all([
                    q.field("date").greater_than_or_equal(from.clone()),
                    q.field("date").less_than_or_equal(to.clone()),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(sessions.len() as u32)
    }

    // ─── Bookings ────────────────────────────────────────────────

    async fn book_session(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<BookingOutcome> {
        let session = self
            .get_session(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Session {} not found", session_id)))?;

        // Begin a transaction: the existence check, the capacity check and
        // the insert must not interleave with a concurrent booking. If
        // another request touches these rows Firestore retries with fresh
        // data, preventing double bookings and oversold sessions.
        let mut transaction = self
            .client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let existing = self.find_active_booking(user_id, session_id).await?;
        let confirmed_count = self.count_confirmed_bookings(session_id).await?;

        match decide(existing.as_ref(), confirmed_count, session.max_players) {
            BookingDecision::AlreadyBooked => {
                tracing::debug!(
                    user_id = %user_id,
                    session_id = %session_id,
                    "Booking already active (idempotent hit)"
                );
                let _ = transaction.rollback().await;
                let booking = existing.ok_or_else(|| {
                    AppError::Database("booking decision without a row".to_string())
                })?;
                Ok(BookingOutcome {
                    booking,
                    created: false,
                })
            }
            BookingDecision::Full => {
                let _ = transaction.rollback().await;
                Err(AppError::SessionFull(format!(
                    "Session {} has no spots left",
                    session_id
                )))
            }
            BookingDecision::Accept => {
                let booking = Booking::confirmed(user_id, session_id, now);

                self.client
                    .fluent()
                    .update()
                    .in_col(collections::BOOKINGS)
                    .document_id(booking.id.to_string())
                    .object(&booking)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!("Failed to add booking to transaction: {}", e))
                    })?;

                transaction
                    .commit()
                    .await
                    .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

                tracing::info!(
                    user_id = %user_id,
                    session_id = %session_id,
                    confirmed = confirmed_count + 1,
                    "Booking confirmed"
                );

                Ok(BookingOutcome {
                    booking,
                    created: true,
                })
            }
        }
    }

    async fn get_booking(&self, booking_id: Uuid) -> Result<Option<Booking>> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::BOOKINGS)
            .obj()
            .one(&booking_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn set_booking_status(
        &self,
        booking_id: Uuid,
        status: BookingStatus,
        now: DateTime<Utc>,
    ) -> Result<Booking> {
        let mut booking = self
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Booking {} not found", booking_id)))?;

        booking.status = status;
        booking.updated_at = now;
        self.put(collections::BOOKINGS, &booking.id.to_string(), &booking)
            .await?;

        Ok(booking)
    }

    async fn find_active_booking(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> Result<Option<Booking>> {
        let user_id = user_id.to_string();
        let session_id = session_id.to_string();
        let bookings: Vec<Booking> = self
            .client
            .fluent()
            .select()
            .from(collections::BOOKINGS)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    q.field("session_id").eq(session_id.clone()),
                    q.field("status").eq(BookingStatus::Confirmed.as_str()),
                ])
            })
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(bookings.into_iter().next())
    }

    async fn list_confirmed_bookings(&self, session_id: Uuid) -> Result<Vec<Booking>> {
        let session_id = session_id.to_string();
        self.client
            .fluent()
            .select()
            .from(collections::BOOKINGS)
            .filter(move |q| {
                q.for_all([
                    q.field("session_id").eq(session_id.clone()),
                    q.field("status").eq(BookingStatus::Confirmed.as_str()),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn count_confirmed_bookings(&self, session_id: Uuid) -> Result<u32> {
        Ok(self.list_confirmed_bookings(session_id).await?.len() as u32)
    }

    async fn count_sessions_played(&self, user_id: Uuid) -> Result<u32> {
        let user_id = user_id.to_string();
        let bookings: Vec<Booking> = self
            .client
            .fluent()
            .select()
            .from(collections::BOOKINGS)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    q.field("status").eq(BookingStatus::Confirmed.as_str()),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(bookings.len() as u32)
    }

    // ─── Payments ────────────────────────────────────────────────

    async fn record_payment(&self, payment: Payment) -> Result<PaymentOutcome> {
        let mut transaction = self
            .client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        if let Some(key) = payment.key() {
            if let Some(existing) = self.find_payment(&key).await? {
                tracing::debug!(
                    payment_id = %existing.id,
                    "Payment already recorded for key (idempotent hit)"
                );
                let _ = transaction.rollback().await;
                return Ok(PaymentOutcome {
                    payment: existing,
                    created: false,
                });
            }
        }

        self.client
            .fluent()
            .update()
            .in_col(collections::PAYMENTS)
            .document_id(payment.id.to_string())
            .object(&payment)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add payment to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        Ok(PaymentOutcome {
            payment,
            created: true,
        })
    }

    async fn get_payment(&self, payment_id: Uuid) -> Result<Option<Payment>> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::PAYMENTS)
            .obj()
            .one(&payment_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_payment(&self, key: &PaymentKey) -> Result<Option<Payment>> {
        // Query the coarse fields, then settle the partition client-side
        // (period rows must not match session rows that happen to carry
        // the same month and year).
        let candidates: Vec<Payment> = match *key {
            PaymentKey::Session {
                user_id,
                session_id,
            } => {
                let user_id = user_id.to_string();
                let session_id = session_id.to_string();
                self.client
                    .fluent()
                    .select()
                    .from(collections::PAYMENTS)
                    .filter(move |q| {
                        q.for_all([
                            q.field("user_id").eq(user_id.clone()),
                            q.field("session_id").eq(session_id.clone()),
                        ])
                    })
                    .obj()
                    .query()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?
            }
            PaymentKey::Period {
                user_id,
                month,
                year,
            } => {
                let user_id = user_id.to_string();
                self.client
                    .fluent()
                    .select()
                    .from(collections::PAYMENTS)
                    .filter(move |q| {
                        q.for_all([
                            q.field("user_id").eq(user_id.clone()),
                            q.field("month").eq(month as i64),
                            q.field("year").eq(year as i64),
                        ])
                    })
                    .obj()
                    .query()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?
            }
        };

        Ok(candidates.into_iter().find(|p| key.matches(p)))
    }

    async fn update_payment_status(
        &self,
        payment_id: Uuid,
        status: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<Payment> {
        let mut payment = self
            .get_payment(payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Payment {} not found", payment_id)))?;

        payment.status = status;
        payment.paid_at = (status == PaymentStatus::Paid).then_some(now);
        payment.updated_at = now;
        self.put(collections::PAYMENTS, &payment.id.to_string(), &payment)
            .await?;

        Ok(payment)
    }

    async fn apply_payment_status(
        &self,
        key: &PaymentKey,
        template: Payment,
        now: DateTime<Utc>,
    ) -> Result<Payment> {
        let mut transaction = self
            .client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let payment = match self.find_payment(key).await? {
            Some(mut existing) => {
                existing.status = template.status;
                existing.paid_at = (template.status == PaymentStatus::Paid).then_some(now);
                existing.updated_at = now;
                existing
            }
            None => template,
        };

        self.client
            .fluent()
            .update()
            .in_col(collections::PAYMENTS)
            .document_id(payment.id.to_string())
            .object(&payment)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add payment to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        Ok(payment)
    }

    async fn list_payments_for_period(&self, month: u32, year: i32) -> Result<Vec<Payment>> {
        self.client
            .fluent()
            .select()
            .from(collections::PAYMENTS)
            .filter(move |q| {
                q.for_all([
                    q.field("month").eq(month as i64),
                    q.field("year").eq(year as i64),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_pending_session_payments(&self) -> Result<Vec<Payment>> {
        let payments: Vec<Payment> = self
            .client
            .fluent()
            .select()
            .from(collections::PAYMENTS)
            .filter(|q| q.for_all([q.field("status").eq(PaymentStatus::Pending.as_str())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(payments
            .into_iter()
            .filter(|p| p.session_id.is_some())
            .collect())
    }

    async fn count_payments_with_status(&self, status: PaymentStatus) -> Result<u32> {
        let payments: Vec<Payment> = self
            .client
            .fluent()
            .select()
            .from(collections::PAYMENTS)
            .filter(move |q| q.for_all([q.field("status").eq(status.as_str())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(payments.len() as u32)
    }
}
