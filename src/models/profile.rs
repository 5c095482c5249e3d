//! Member profile model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Club member role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Player,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Player => "player",
            Role::Admin => "admin",
        }
    }
}

/// How a member prefers to pay their dues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentPreference {
    Weekly,
    Monthly,
}

/// Member profile stored in the club store.
///
/// The profile id is the auth identity: exactly one profile exists per
/// account, created at signup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Auth identity (also used as document ID)
    pub id: Uuid,
    /// Email address (unique across accounts)
    pub email: String,
    /// Full display name
    pub full_name: String,
    pub role: Role,
    pub payment_preference: PaymentPreference,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Login credential, stored separately from the profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// Profile this credential belongs to
    pub user_id: Uuid,
    /// Lowercased email used as the lookup key
    pub email: String,
    /// bcrypt hash of the password
    pub password_hash: String,
}
