// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Payment model and the per-partition payment key.
//!
//! Amounts are integer pence throughout; revenue sums are exact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default weekly session fee: £12.
pub const WEEKLY_FEE_PENCE: i64 = 1200;
/// Default monthly dues: £40.
pub const MONTHLY_FEE_PENCE: i64 = 4000;

/// Payment lifecycle state.
///
/// `pending ⇄ paid` through the status operations; `overdue` is only set
/// by the maintenance pass over stale session payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Overdue,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Overdue => "overdue",
        }
    }
}

/// Whether the payment covers one session or a calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Weekly,
    Monthly,
}

impl PaymentType {
    /// Default fee in pence when an organizer records a payment directly.
    pub fn default_fee_pence(&self) -> i64 {
        match self {
            PaymentType::Weekly => WEEKLY_FEE_PENCE,
            PaymentType::Monthly => MONTHLY_FEE_PENCE,
        }
    }
}

/// A dues record, tied either to one session or to a calendar month.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    /// Payment ID (also used as document ID)
    pub id: Uuid,
    /// Payer
    pub user_id: Uuid,
    /// Session covered; absent for period payments
    pub session_id: Option<Uuid>,
    /// Amount in pence
    pub amount_pence: i64,
    pub payment_type: PaymentType,
    pub status: PaymentStatus,
    /// Set exactly when status is `paid`
    pub paid_at: Option<DateTime<Utc>>,
    /// Billing period month (1-12); the period key for monthly lookups
    pub month: Option<u32>,
    /// Billing period year
    pub year: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// The uniqueness partition this payment belongs to, if it has one.
    ///
    /// Session-tied payments are keyed by (user, session); everything else
    /// by (user, month, year). A row carrying neither a session nor a full
    /// period has no key and cannot be deduplicated.
    pub fn key(&self) -> Option<PaymentKey> {
        if let Some(session_id) = self.session_id {
            return Some(PaymentKey::Session {
                user_id: self.user_id,
                session_id,
            });
        }
        match (self.month, self.year) {
            (Some(month), Some(year)) => Some(PaymentKey::Period {
                user_id: self.user_id,
                month,
                year,
            }),
            _ => None,
        }
    }
}

/// Uniqueness key: at most one payment row exists per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentKey {
    /// Weekly-style: one payment per (user, session)
    Session { user_id: Uuid, session_id: Uuid },
    /// Monthly-style: one payment per (user, month, year)
    Period {
        user_id: Uuid,
        month: u32,
        year: i32,
    },
}

impl PaymentKey {
    /// Whether `payment` falls in this partition.
    pub fn matches(&self, payment: &Payment) -> bool {
        match *self {
            PaymentKey::Session {
                user_id,
                session_id,
            } => payment.user_id == user_id && payment.session_id == Some(session_id),
            PaymentKey::Period {
                user_id,
                month,
                year,
            } => {
                payment.user_id == user_id
                    && payment.session_id.is_none()
                    && payment.month == Some(month)
                    && payment.year == Some(year)
            }
        }
    }
}
