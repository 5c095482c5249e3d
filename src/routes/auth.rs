// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Signup, login and logout routes.

use axum::{extract::State, routing::post, Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, SESSION_COOKIE};
use crate::routes::api::ProfileResponse;
use crate::services::auth::{LoginRequest, SignupRequest};
use crate::AppState;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
}

/// Session response returned by signup and login.
#[derive(serde::Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AuthResponse {
    /// Bearer token for non-browser clients; browsers get it as a cookie
    pub token: String,
    pub profile: ProfileResponse,
}

/// Build the session cookie.
///
/// HttpOnly and SameSite=Lax; `Secure` is left to the proxy in front of
/// the service (localhost development has no TLS).
fn session_cookie(token: String, max_age: time::Duration) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, token);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_max_age(max_age);
    cookie
}

/// Create an account and sign straight in.
async fn signup(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<SignupRequest>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    let profile = state.auth.sign_up(req, chrono::Utc::now()).await?;

    let token = create_jwt(profile.id, profile.role, &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    let jar = jar.add(session_cookie(token.clone(), time::Duration::days(30)));

    Ok((
        jar,
        Json(AuthResponse {
            token,
            profile: ProfileResponse::from(profile),
        }),
    ))
}

/// Verify credentials and start a session.
async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    let profile = state.auth.sign_in(req).await?;

    let token = create_jwt(profile.id, profile.role, &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    tracing::info!(user_id = %profile.id, "Member logged in");

    let jar = jar.add(session_cookie(token.clone(), time::Duration::days(30)));

    Ok((
        jar,
        Json(AuthResponse {
            token,
            profile: ProfileResponse::from(profile),
        }),
    ))
}

#[derive(serde::Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LogoutResponse {
    pub success: bool,
}

/// End the session by expiring the cookie.
///
/// The removal cookie carries the same attributes as the session cookie
/// so browsers match and drop it.
async fn logout(jar: CookieJar) -> (CookieJar, Json<LogoutResponse>) {
    let jar = jar.add(session_cookie(String::new(), time::Duration::ZERO));
    (jar, Json(LogoutResponse { success: true }))
}
