// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use axum_extra::extract::cookie::CookieJar;

use crate::{
    auth::{CookieSettings, CookieTokenStore},
    config::ProxyConfig,
    rate_limit::{FixedWindowRateLimiter, NoopRateLimiter, RateLimiter},
    upstream::{LegendsClient, ReqwestTransport, Transport, TransportError},
};

/// Shared, immutable-after-startup application state.
#[derive(Clone)]
pub struct AppState {
    pub client: Arc<LegendsClient>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub cookies: CookieSettings,
}

impl AppState {
    pub fn new(
        config: ProxyConfig,
        transport: Arc<dyn Transport>,
        rate_limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        let client = LegendsClient::new(transport, &config);
        let cookies = CookieSettings::from_config(&config);
        Self {
            client: Arc::new(client),
            rate_limiter,
            cookies,
        }
    }

    /// Production wiring: `reqwest` transport and the configured limiter.
    pub fn from_config(config: ProxyConfig) -> Result<Self, TransportError> {
        let transport = Arc::new(ReqwestTransport::new(config.upstream_timeout)?);
        let rate_limiter: Arc<dyn RateLimiter> = if config.rate_limit_max_requests == 0 {
            Arc::new(NoopRateLimiter)
        } else {
            Arc::new(FixedWindowRateLimiter::new(
                config.rate_limit_max_requests,
                config.rate_limit_window,
            ))
        };
        Ok(Self::new(config, transport, rate_limiter))
    }

    /// Token store over the request's cookies.
    pub fn token_store(&self, jar: CookieJar) -> CookieTokenStore {
        CookieTokenStore::new(jar, self.cookies.clone())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::time::Duration;

    use super::*;
    use crate::{auth::ClientCredentials, upstream::transport::fake::FakeTransport};

    pub(crate) fn test_config(with_credentials: bool) -> ProxyConfig {
        ProxyConfig {
            api_url: "https://legends.test/api".to_string(),
            credentials: with_credentials.then(|| ClientCredentials::new("abc", "xyz")),
            retry_base_delay: Duration::from_millis(100),
            retry_max_delay: Duration::from_millis(1000),
            ..ProxyConfig::default()
        }
    }

    /// State over a scripted transport with rate limiting disabled.
    pub(crate) fn test_state(fake: &Arc<FakeTransport>, with_credentials: bool) -> AppState {
        AppState::new(
            test_config(with_credentials),
            fake.clone(),
            Arc::new(NoopRateLimiter),
        )
    }
}
