// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account signup and sign-in.
//!
//! Credentials are bcrypt-hashed and stored next to, but separate from,
//! the member profile. Signup creates both in one atomic store call, so
//! there is exactly one profile per account.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::db::ClubStore;
use crate::error::{AppError, Result};
use crate::models::{Credential, PaymentPreference, Profile, Role};

/// Signup payload.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(length(min = 1, max = 120))]
    pub full_name: String,
    /// Defaults to weekly when not chosen at signup
    pub payment_preference: Option<PaymentPreference>,
}

/// Login payload.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Signup and sign-in over the club store.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn ClubStore>,
}

impl AuthService {
    pub fn new(store: Arc<dyn ClubStore>) -> Self {
        Self { store }
    }

    /// Create an account: credential plus player profile.
    pub async fn sign_up(&self, req: SignupRequest, now: DateTime<Utc>) -> Result<Profile> {
        req.validate()?;

        let email = req.email.trim().to_lowercase();
        let password_hash = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Password hashing failed: {}", e)))?;

        let profile = Profile {
            id: Uuid::new_v4(),
            email: email.clone(),
            full_name: req.full_name.trim().to_string(),
            role: Role::Player,
            payment_preference: req.payment_preference.unwrap_or(PaymentPreference::Weekly),
            created_at: now,
            updated_at: now,
        };
        let credential = Credential {
            user_id: profile.id,
            email,
            password_hash,
        };

        self.store.create_account(&profile, &credential).await?;

        tracing::info!(user_id = %profile.id, "Member signed up");

        Ok(profile)
    }

    /// Verify a password and return the profile.
    ///
    /// Every failure path reports the same unauthenticated error; whether
    /// the email exists is not revealed.
    pub async fn sign_in(&self, req: LoginRequest) -> Result<Profile> {
        let email = req.email.trim().to_lowercase();

        let credential = self
            .store
            .find_credential(&email)
            .await?
            .ok_or(AppError::Unauthorized)?;

        let valid = bcrypt::verify(&req.password, &credential.password_hash)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Password check failed: {}", e)))?;
        if !valid {
            return Err(AppError::Unauthorized);
        }

        self.store
            .get_profile(credential.user_id)
            .await?
            .ok_or(AppError::Unauthorized)
    }
}
