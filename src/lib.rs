// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Legends Proxy - Authenticated gateway to the Legends of Learning API
//!
//! This crate serves a browser UI's `/api/*` calls by forwarding them to
//! the Legends REST API with an OAuth2 bearer token kept in an HTTP-only
//! cookie.
//!
//! ## Modules
//!
//! - `api` - HTTP handlers and router (Axum)
//! - `auth` - Client credentials and token storage
//! - `upstream` - Transport, retry policy and the Legends API client
//! - `normalize` - Uniform error bodies from heterogeneous upstream errors
//! - `rate_limit` - Per-resource fixed-window limiting
//! - `seed` - Demo data seeding against a live Legends API

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod normalize;
pub mod rate_limit;
pub mod seed;
pub mod state;
pub mod telemetry;
pub mod upstream;
