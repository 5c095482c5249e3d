//! Storage layer: the club store port and its adapters.

pub mod firestore;
pub mod memory;
pub mod store;

pub use self::firestore::FirestoreStore;
pub use self::memory::MemoryStore;
pub use self::store::{BookingOutcome, ClubStore, PaymentOutcome};

/// Collection names as constants.
pub mod collections {
    pub const PROFILES: &str = "profiles";
    /// Login credentials, keyed by lowercased email
    pub const CREDENTIALS: &str = "credentials";
    pub const SESSIONS: &str = "sessions";
    pub const BOOKINGS: &str = "bookings";
    pub const PAYMENTS: &str = "payments";
}
