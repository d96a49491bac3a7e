// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token storage.
//!
//! Expiry is enforced lazily: nothing evicts a token in the background.
//! A caller that finds no token (or an expired one) goes back to the token
//! endpoint, and an upstream 401 clears the store even if the local expiry
//! has not elapsed.

use std::fmt;

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::config::ProxyConfig;

/// Token lifetime assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 7200;

/// An opaque bearer token with an optional absolute expiry.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl BearerToken {
    /// A token whose lifetime is unknown (e.g. read back from a cookie).
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            expires_at: None,
        }
    }

    /// A token expiring `ttl_secs` seconds from now.
    pub fn with_ttl(value: impl Into<String>, ttl_secs: u64) -> Self {
        let ttl = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
        let expires_at =
            ChronoDuration::try_seconds(ttl).and_then(|d| Utc::now().checked_add_signed(d));
        Self {
            value: value.into(),
            expires_at,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }

    /// Whole seconds left before expiry, rounded up. `None` when unknown.
    pub fn remaining_secs(&self) -> Option<u64> {
        let at = self.expires_at?;
        let millis = (at - Utc::now()).num_milliseconds().max(0) as u64;
        Some(millis.div_ceil(1000))
    }

    /// Value for the `Authorization` header.
    pub fn authorization_value(&self) -> String {
        format!("Bearer {}", self.value)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Holds the current bearer token for one session scope.
pub trait TokenStore: Send {
    /// Current token, or `None` when absent or expired.
    fn get(&self) -> Option<BearerToken>;

    /// Persist a token, replacing any previous one.
    fn set(&mut self, token: BearerToken);

    /// Forget the token.
    fn clear(&mut self);
}

/// In-process store, used for server-to-server calls and in tests.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Option<BearerToken>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: BearerToken) -> Self {
        Self { token: Some(token) }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<BearerToken> {
        self.token.clone().filter(|t| !t.is_expired())
    }

    fn set(&mut self, token: BearerToken) {
        self.token = Some(token);
    }

    fn clear(&mut self) {
        self.token = None;
    }
}

/// Attributes of the token cookie.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub name: String,
    pub secure: bool,
    pub same_site: SameSite,
    pub path: String,
}

impl CookieSettings {
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self {
            name: config.cookie_name.clone(),
            secure: config.environment.is_production(),
            same_site: SameSite::Lax,
            path: "/".to_string(),
        }
    }
}

/// Token store backed by the request's cookie jar.
///
/// Mutations are recorded as jar deltas; hand the jar back with the
/// response via [`CookieTokenStore::into_jar`] so the `Set-Cookie`
/// headers are emitted.
pub struct CookieTokenStore {
    jar: CookieJar,
    settings: CookieSettings,
}

impl CookieTokenStore {
    pub fn new(jar: CookieJar, settings: CookieSettings) -> Self {
        Self { jar, settings }
    }

    pub fn into_jar(self) -> CookieJar {
        self.jar
    }

    fn cookie(&self, value: String, max_age_secs: i64) -> Cookie<'static> {
        Cookie::build((self.settings.name.clone(), value))
            .http_only(true)
            .secure(self.settings.secure)
            .same_site(self.settings.same_site)
            .path(self.settings.path.clone())
            .max_age(time::Duration::seconds(max_age_secs))
            .build()
    }
}

impl TokenStore for CookieTokenStore {
    fn get(&self) -> Option<BearerToken> {
        self.jar
            .get(&self.settings.name)
            .map(|cookie| cookie.value().trim().to_string())
            .filter(|value| !value.is_empty())
            .map(BearerToken::new)
    }

    fn set(&mut self, token: BearerToken) {
        let max_age = token.remaining_secs().unwrap_or(DEFAULT_TOKEN_TTL_SECS);
        let cookie = self.cookie(
            token.value().to_string(),
            i64::try_from(max_age).unwrap_or(i64::MAX),
        );
        self.jar = std::mem::take(&mut self.jar).add(cookie);
    }

    fn clear(&mut self) {
        let cookie = self.cookie(String::new(), 0);
        self.jar = std::mem::take(&mut self.jar).add(cookie);
    }
}
