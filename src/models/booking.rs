// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Booking model and the booking admission rule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Booking lifecycle state.
///
/// Cancellation is a status change, not a deletion, so booking history
/// survives. Re-booking after a cancel creates a fresh row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

/// A player's claim on one spot in one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    /// Booking ID (also used as document ID)
    pub id: Uuid,
    /// Player holding the spot
    pub user_id: Uuid,
    /// Session the spot belongs to
    pub session_id: Uuid,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Create a new confirmed booking.
    pub fn confirmed(user_id: Uuid, session_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            session_id,
            status: BookingStatus::Confirmed,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Outcome of the booking admission rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingDecision {
    /// The caller already holds a confirmed booking; return it unchanged.
    AlreadyBooked,
    /// The session has reached `max_players`.
    Full,
    /// Admit: insert a new confirmed booking.
    Accept,
}

/// Decide whether a booking request is admitted.
///
/// This is the pure core of `book_session`. Storage adapters evaluate it
/// inside their atomic section so the existence check, the capacity check
/// and the insert cannot interleave with a concurrent request.
pub fn decide(
    existing_active: Option<&Booking>,
    confirmed_count: u32,
    max_players: u32,
) -> BookingDecision {
    if existing_active.is_some() {
        return BookingDecision::AlreadyBooked;
    }
    if confirmed_count >= max_players {
        return BookingDecision::Full;
    }
    BookingDecision::Accept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_booking(status: BookingStatus) -> Booking {
        let now = Utc::now();
        Booking {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            status,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_decide_accepts_with_space() {
        assert_eq!(decide(None, 0, 12), BookingDecision::Accept);
        assert_eq!(decide(None, 11, 12), BookingDecision::Accept);
    }

    #[test]
    fn test_decide_rejects_full_session() {
        assert_eq!(decide(None, 12, 12), BookingDecision::Full);
        // Overbooked legacy data is still full
        assert_eq!(decide(None, 13, 12), BookingDecision::Full);
    }

    #[test]
    fn test_decide_idempotent_for_existing_booking() {
        let booking = make_booking(BookingStatus::Confirmed);
        // An existing active booking wins even when the session is full
        assert_eq!(
            decide(Some(&booking), 12, 12),
            BookingDecision::AlreadyBooked
        );
    }
}
