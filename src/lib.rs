// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Blue Shuttle: booking and payment backend for a weekly badminton club.
//!
//! This crate provides the API for managing session bookings and tracking
//! member payments, for both players and organizers.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use std::sync::Arc;

use config::Config;
use db::ClubStore;
use services::{AuthService, LedgerService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn ClubStore>,
    pub ledger: LedgerService,
    pub auth: AuthService,
}

impl AppState {
    /// Build the state from a config and a storage adapter.
    pub fn new(config: Config, store: Arc<dyn ClubStore>) -> Self {
        let ledger = LedgerService::new(store.clone());
        let auth = AuthService::new(store.clone());
        Self {
            config,
            store,
            ledger,
            auth,
        }
    }
}
