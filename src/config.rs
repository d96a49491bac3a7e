// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, default values and the
//! [`ProxyConfig`] loaded from them once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `LEGENDS_API_URL` | Upstream base URL (includes its own `/api` segment) | `https://api.smartlittlecookies.com/api` |
//! | `LEGENDS_API_VERSION` | Upstream API version segment | `v3` |
//! | `LEGENDS_CLIENT_ID` / `CLIENT_ID` | Server-side OAuth2 client id | Optional |
//! | `LEGENDS_CLIENT_SECRET` / `CLIENT_SECRET` | Server-side OAuth2 client secret | Optional |
//! | `AUTH_COOKIE_NAME` | Cookie holding the bearer token | `auth_token` |
//! | `APP_ENV` | `development` or `production` (secure cookies) | `development` |
//! | `UPSTREAM_TIMEOUT_SECS` | Per-call upstream timeout | `30` |
//! | `RETRY_MAX_ATTEMPTS` | Connection-reset retries per request | `3` |
//! | `RETRY_BASE_DELAY_MS` | Backoff base delay | `1000` |
//! | `RETRY_MAX_DELAY_MS` | Backoff delay cap | `10000` |
//! | `RATE_LIMIT_MAX_REQUESTS` | Requests per window and resource (`0` disables) | `100` |
//! | `RATE_LIMIT_WINDOW_SECS` | Fixed window length | `60` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//! | `SEED_STUDENT_COUNT` | Students created by the `seed` binary | `24` |

use std::time::Duration;

use tracing::warn;

use crate::auth::ClientCredentials;

pub const LEGENDS_API_URL_ENV: &str = "LEGENDS_API_URL";
pub const LEGENDS_API_VERSION_ENV: &str = "LEGENDS_API_VERSION";
pub const LEGENDS_CLIENT_ID_ENV: &str = "LEGENDS_CLIENT_ID";
pub const LEGENDS_CLIENT_SECRET_ENV: &str = "LEGENDS_CLIENT_SECRET";
/// Short aliases accepted when the `LEGENDS_` names are unset.
pub const CLIENT_ID_ENV: &str = "CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "CLIENT_SECRET";
pub const AUTH_COOKIE_NAME_ENV: &str = "AUTH_COOKIE_NAME";
pub const APP_ENV_ENV: &str = "APP_ENV";
pub const UPSTREAM_TIMEOUT_SECS_ENV: &str = "UPSTREAM_TIMEOUT_SECS";
pub const RETRY_MAX_ATTEMPTS_ENV: &str = "RETRY_MAX_ATTEMPTS";
pub const RETRY_BASE_DELAY_MS_ENV: &str = "RETRY_BASE_DELAY_MS";
pub const RETRY_MAX_DELAY_MS_ENV: &str = "RETRY_MAX_DELAY_MS";
pub const RATE_LIMIT_MAX_REQUESTS_ENV: &str = "RATE_LIMIT_MAX_REQUESTS";
pub const RATE_LIMIT_WINDOW_SECS_ENV: &str = "RATE_LIMIT_WINDOW_SECS";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
pub const SEED_STUDENT_COUNT_ENV: &str = "SEED_STUDENT_COUNT";

pub const DEFAULT_API_URL: &str = "https://api.smartlittlecookies.com/api";
pub const DEFAULT_API_VERSION: &str = "v3";
pub const DEFAULT_COOKIE_NAME: &str = "auth_token";
/// Default log filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;
const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 10_000;
const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u32 = 100;
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} is not a valid URL: {reason}")]
    InvalidUrl { name: &'static str, reason: String },

    #[error("{name} must be an absolute http(s) URL")]
    UnsupportedScheme { name: &'static str },
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppEnv {
    #[default]
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: Option<String>) -> Self {
        match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("production") | Some("prod") => AppEnv::Production,
            _ => AppEnv::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == AppEnv::Production
    }
}

/// Log output format selected by `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    /// Read `LOG_FORMAT` directly; logging starts before the full config loads.
    pub fn from_env() -> Self {
        match env_optional(LOG_FORMAT_ENV).as_deref() {
            Some(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Complete proxy configuration.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Upstream base URL without trailing slash, e.g. `https://host/api`.
    pub api_url: String,
    /// Version segment inserted after the base URL, e.g. `v3`.
    pub api_version: String,
    /// Server-side credentials used to mint and refresh tokens.
    pub credentials: Option<ClientCredentials>,
    pub cookie_name: String,
    pub environment: AppEnv,
    pub upstream_timeout: Duration,
    pub retry_max_attempts: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    pub rate_limit_max_requests: u32,
    pub rate_limit_window: Duration,
    pub host: String,
    pub port: u16,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            credentials: None,
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            environment: AppEnv::Development,
            upstream_timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
            retry_max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            retry_base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
            retry_max_delay: Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MS),
            rate_limit_max_requests: DEFAULT_RATE_LIMIT_MAX_REQUESTS,
            rate_limit_window: Duration::from_secs(DEFAULT_RATE_LIMIT_WINDOW_SECS),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ProxyConfig {
    /// Load the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_optional)
    }

    /// Load the configuration through an arbitrary variable lookup.
    ///
    /// Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_url = get(LEGENDS_API_URL_ENV)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        validate_url(LEGENDS_API_URL_ENV, &api_url)?;

        let api_version = get(LEGENDS_API_VERSION_ENV)
            .map(|v| v.trim_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_VERSION.to_string());

        let client_id = get(LEGENDS_CLIENT_ID_ENV).or_else(|| get(CLIENT_ID_ENV));
        let client_secret = get(LEGENDS_CLIENT_SECRET_ENV).or_else(|| get(CLIENT_SECRET_ENV));
        let credentials = match (client_id, client_secret) {
            (Some(id), Some(secret)) => Some(ClientCredentials::new(id, secret)),
            (None, None) => None,
            _ => {
                warn!("Only one of the client id / client secret variables is set; ignoring both");
                None
            }
        };

        let defaults = Self::default();

        Ok(Self {
            api_url,
            api_version,
            credentials,
            cookie_name: get(AUTH_COOKIE_NAME_ENV).unwrap_or(defaults.cookie_name),
            environment: AppEnv::parse(get(APP_ENV_ENV)),
            upstream_timeout: Duration::from_secs(parse_or(
                UPSTREAM_TIMEOUT_SECS_ENV,
                get(UPSTREAM_TIMEOUT_SECS_ENV),
                DEFAULT_UPSTREAM_TIMEOUT_SECS,
            )),
            retry_max_attempts: parse_or(
                RETRY_MAX_ATTEMPTS_ENV,
                get(RETRY_MAX_ATTEMPTS_ENV),
                DEFAULT_RETRY_MAX_ATTEMPTS,
            ),
            retry_base_delay: Duration::from_millis(parse_or(
                RETRY_BASE_DELAY_MS_ENV,
                get(RETRY_BASE_DELAY_MS_ENV),
                DEFAULT_RETRY_BASE_DELAY_MS,
            )),
            retry_max_delay: Duration::from_millis(parse_or(
                RETRY_MAX_DELAY_MS_ENV,
                get(RETRY_MAX_DELAY_MS_ENV),
                DEFAULT_RETRY_MAX_DELAY_MS,
            )),
            rate_limit_max_requests: parse_or(
                RATE_LIMIT_MAX_REQUESTS_ENV,
                get(RATE_LIMIT_MAX_REQUESTS_ENV),
                DEFAULT_RATE_LIMIT_MAX_REQUESTS,
            ),
            rate_limit_window: Duration::from_secs(parse_or(
                RATE_LIMIT_WINDOW_SECS_ENV,
                get(RATE_LIMIT_WINDOW_SECS_ENV),
                DEFAULT_RATE_LIMIT_WINDOW_SECS,
            )),
            host: get(HOST_ENV).unwrap_or(defaults.host),
            port: parse_or(PORT_ENV, get(PORT_ENV), DEFAULT_PORT),
        })
    }
}

fn validate_url(name: &'static str, value: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        name,
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(ConfigError::UnsupportedScheme { name }),
    }
}

pub(crate) fn parse_or<T>(name: &str, raw: Option<String>, default: T) -> T
where
    T: std::str::FromStr + Copy + std::fmt::Display,
{
    match raw {
        None => default,
        Some(value) => value.parse().unwrap_or_else(|_| {
            warn!(
                variable = name,
                value = %value,
                default = %default,
                "Invalid numeric value, using default"
            );
            default
        }),
    }
}

pub(crate) fn env_optional(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
