// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod booking;
pub mod payment;
pub mod profile;
pub mod session;

pub use booking::{Booking, BookingStatus};
pub use payment::{Payment, PaymentKey, PaymentStatus, PaymentType};
pub use payment::{MONTHLY_FEE_PENCE, WEEKLY_FEE_PENCE};
pub use profile::{Credential, PaymentPreference, Profile, Role};
pub use session::Session;
