// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Bearer tokens for the Legends API are minted with the OAuth2
//! client-credentials grant and kept in an HTTP-only cookie.
//!
//! ## Auth Flow
//!
//! 1. The UI posts `{client_id, client_secret}` to `POST /api/auth`
//!    (or relies on server-side credentials from the environment)
//! 2. The proxy exchanges them at `{base}/{version}/oauth2/token`
//! 3. The returned `access_token` is written to the `auth_token` cookie
//!    with `Max-Age = expires_in`
//! 4. Proxied requests read the cookie and send `Authorization: Bearer <token>`
//!
//! ## Security
//!
//! - The token cookie is HTTP-only and never echoed in a response body
//! - Client secrets never leave the server and are redacted in `Debug`
//! - An upstream 401 invalidates the cookie regardless of its local expiry

pub mod credentials;
pub mod token;

pub use credentials::ClientCredentials;
pub use token::{BearerToken, CookieSettings, CookieTokenStore, MemoryTokenStore, TokenStore};
