// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Legends API client: token acquisition, revocation and authenticated
//! forwarding with one-shot reauthentication.

use std::sync::Arc;

use axum::{
    body::Bytes,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{
    retry::RetryPolicy,
    transport::{Transport, UpstreamRequest, UpstreamResponse},
};
use crate::{
    auth::{token::DEFAULT_TOKEN_TTL_SECS, BearerToken, ClientCredentials, TokenStore},
    config::ProxyConfig,
    error::ProxyError,
};

const JSON: &str = "application/json";
const FORM: &str = "application/x-www-form-urlencoded";

/// Stages of one proxied request, logged at `debug` as they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyStage {
    Received,
    TokenResolved,
    Forwarded,
    ReauthRetry,
    Success,
    Failed,
}

/// A request bound for the upstream API.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    /// Upstream path below the base URL, already versioned (`v3/content`).
    pub path: String,
    /// Raw query string without the leading `?`.
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl ProxyRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.query = (!query.is_empty()).then_some(query);
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }

    /// Attach a JSON body and the matching content type.
    pub fn with_json(mut self, value: &Value) -> Result<Self, ProxyError> {
        let body = serde_json::to_vec(value)
            .map_err(|e| ProxyError::Internal(format!("failed to encode request body: {e}")))?;
        self.headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON));
        self.body = Some(Bytes::from(body));
        Ok(self)
    }

    /// First path segment after the version, e.g. `content` for
    /// `v3/content/123`. Used as the rate-limit key.
    pub fn resource(&self) -> &str {
        let mut segments = self.path.split('/').filter(|s| !s.is_empty());
        let first = segments.next().unwrap_or_default();
        let is_version = first.len() > 1
            && first.starts_with('v')
            && first[1..].chars().all(|c| c.is_ascii_digit());
        if is_version {
            segments.next().unwrap_or(first)
        } else {
            first
        }
    }
}

/// Prefix `rest` with the API version unless it already carries it.
pub fn versioned_path(rest: &str, version: &str) -> String {
    let rest = rest.trim_start_matches('/');
    if rest.is_empty() {
        version.to_string()
    } else if rest == version || rest.starts_with(&format!("{version}/")) {
        rest.to_string()
    } else {
        format!("{version}/{rest}")
    }
}

/// Decoded token endpoint response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in: u64,
}

impl TokenGrant {
    pub fn into_token(self) -> BearerToken {
        BearerToken::with_ttl(self.access_token, self.expires_in)
    }
}

#[derive(Deserialize)]
struct RawGrant {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Client for the Legends REST API.
#[derive(Clone)]
pub struct LegendsClient {
    transport: Arc<dyn Transport>,
    api_url: String,
    api_version: String,
    credentials: Option<ClientCredentials>,
    retry: RetryPolicy,
}

impl LegendsClient {
    pub fn new(transport: Arc<dyn Transport>, config: &ProxyConfig) -> Self {
        Self {
            transport,
            api_url: config.api_url.clone(),
            api_version: config.api_version.clone(),
            credentials: config.credentials.clone(),
            retry: RetryPolicy::new(
                config.retry_max_attempts,
                config.retry_base_delay,
                config.retry_max_delay,
            ),
        }
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Whether server-side credentials are available for token refresh.
    pub fn has_server_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    pub fn server_credentials(&self) -> Option<&ClientCredentials> {
        self.credentials.as_ref()
    }

    fn oauth_url(&self, action: &str) -> String {
        format!("{}/{}/oauth2/{}", self.api_url, self.api_version, action)
    }

    fn url_for(&self, request: &ProxyRequest) -> String {
        let mut url = format!("{}/{}", self.api_url, request.path.trim_start_matches('/'));
        if let Some(query) = &request.query {
            url.push('?');
            url.push_str(query);
        }
        url
    }

    fn form_request(&self, action: &str, body: String) -> UpstreamRequest {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(FORM));
        headers.insert(header::ACCEPT, HeaderValue::from_static(JSON));
        UpstreamRequest {
            method: Method::POST,
            url: self.oauth_url(action),
            headers,
            body: Some(Bytes::from(body)),
        }
    }

    /// Exchange client credentials for a bearer token.
    ///
    /// Not retried: a failed grant is reported to the caller as-is.
    pub async fn acquire_token(
        &self,
        credentials: &ClientCredentials,
    ) -> Result<TokenGrant, ProxyError> {
        if !credentials.is_complete() {
            return Err(ProxyError::Configuration(
                "client id and client secret must not be empty".to_string(),
            ));
        }

        let form = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "client_credentials")
            .append_pair("client_id", &credentials.client_id)
            .append_pair("client_secret", credentials.client_secret())
            .finish();

        let response = self.transport.send(self.form_request("token", form)).await?;

        if !response.status.is_success() {
            let message = serde_json::from_slice::<Value>(&response.body)
                .ok()
                .and_then(|body| {
                    ["error_description", "message"]
                        .into_iter()
                        .find_map(|key| {
                            body.get(key).and_then(Value::as_str).map(str::to_string)
                        })
                })
                .unwrap_or_else(|| "Invalid credentials".to_string());
            warn!(status = response.status.as_u16(), "Token request rejected");
            return Err(ProxyError::Authentication {
                status: response.status,
                message,
            });
        }

        let raw: RawGrant = response
            .json()
            .map_err(|e| ProxyError::Protocol(format!("token response is not valid JSON: {e}")))?;
        let access_token = raw
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProxyError::Protocol("token response has no access_token".to_string()))?;
        let expires_in = raw.expires_in.unwrap_or(DEFAULT_TOKEN_TTL_SECS);

        info!(expires_in, "Acquired upstream access token");
        Ok(TokenGrant {
            access_token,
            expires_in,
        })
    }

    /// Best-effort token revocation. Failures are logged and swallowed.
    pub async fn revoke_token(&self, token: &BearerToken) {
        let form = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("token", token.value())
            .finish();

        match self.transport.send(self.form_request("revoke", form)).await {
            Ok(response) if response.status.is_success() => {
                debug!("Upstream token revoked");
            }
            Ok(response) => {
                warn!(status = response.status.as_u16(), "Token revocation rejected");
            }
            Err(error) => {
                warn!(error = %error, "Token revocation failed");
            }
        }
    }

    /// Send `request` with the stored token, acquiring or refreshing it as
    /// needed. Upstream error statuses are returned as responses, not errors.
    pub async fn send(
        &self,
        request: &ProxyRequest,
        store: &mut dyn TokenStore,
    ) -> Result<UpstreamResponse, ProxyError> {
        debug!(stage = ?ProxyStage::Received, method = %request.method, path = %request.path);

        let token = match (store.get(), &self.credentials) {
            (Some(token), _) => Some(token),
            (None, Some(credentials)) => {
                let token = self.acquire_token(credentials).await?.into_token();
                store.set(token.clone());
                Some(token)
            }
            (None, None) => None,
        };
        debug!(stage = ?ProxyStage::TokenResolved, has_token = token.is_some());

        let response = self.forward(request, token.as_ref()).await?;
        if response.status != StatusCode::UNAUTHORIZED {
            return Ok(finish(response));
        }

        store.clear();
        let Some(credentials) = &self.credentials else {
            return Ok(finish(response));
        };

        debug!(stage = ?ProxyStage::ReauthRetry, path = %request.path);
        let token = self.acquire_token(credentials).await?.into_token();
        store.set(token.clone());

        let response = self.forward(request, Some(&token)).await?;
        if response.status == StatusCode::UNAUTHORIZED {
            store.clear();
        }
        Ok(finish(response))
    }

    async fn forward(
        &self,
        request: &ProxyRequest,
        token: Option<&BearerToken>,
    ) -> Result<UpstreamResponse, ProxyError> {
        let url = self.url_for(request);
        let mut headers = request.headers.clone();

        let authorization = token.map(BearerToken::authorization_value).unwrap_or_default();
        let authorization = HeaderValue::from_str(&authorization).map_err(|_| {
            ProxyError::Protocol("bearer token is not a valid header value".to_string())
        })?;
        headers.insert(header::AUTHORIZATION, authorization);
        if !headers.contains_key(header::ACCEPT) {
            headers.insert(header::ACCEPT, HeaderValue::from_static(JSON));
        }
        if request.body.is_some() && !headers.contains_key(header::CONTENT_TYPE) {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON));
        }

        let upstream = UpstreamRequest {
            method: request.method.clone(),
            url,
            headers,
            body: request.body.clone(),
        };

        let response = self
            .retry
            .run(|| self.transport.send(upstream.clone()))
            .await
            .inspect_err(|error| {
                debug!(stage = ?ProxyStage::Failed, error = %error);
            })?;

        debug!(
            stage = ?ProxyStage::Forwarded,
            method = %upstream.method,
            url = %upstream.url,
            status = response.status.as_u16()
        );
        Ok(response)
    }
}

fn finish(response: UpstreamResponse) -> UpstreamResponse {
    let stage = if response.status.is_success() {
        ProxyStage::Success
    } else {
        ProxyStage::Failed
    };
    debug!(stage = ?stage, status = response.status.as_u16());
    response
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::{
        auth::MemoryTokenStore,
        upstream::transport::{
            fake::{json_response, FakeTransport},
            TransportError,
        },
    };

    fn config(with_credentials: bool) -> ProxyConfig {
        ProxyConfig {
            api_url: "https://legends.test/api".to_string(),
            credentials: with_credentials.then(|| ClientCredentials::new("abc", "xyz")),
            retry_base_delay: Duration::from_millis(1),
            retry_max_delay: Duration::from_millis(4),
            ..ProxyConfig::default()
        }
    }

    fn client(fake: &Arc<FakeTransport>, with_credentials: bool) -> LegendsClient {
        LegendsClient::new(fake.clone(), &config(with_credentials))
    }

    fn header_str<'a>(request: &'a UpstreamRequest, name: header::HeaderName) -> &'a str {
        request.headers.get(name).unwrap().to_str().unwrap()
    }

    #[test]
    fn versioned_path_adds_version_once() {
        assert_eq!(versioned_path("content", "v3"), "v3/content");
        assert_eq!(versioned_path("/users/1", "v3"), "v3/users/1");
        assert_eq!(versioned_path("v3/content", "v3"), "v3/content");
        assert_eq!(versioned_path("v3", "v3"), "v3");
        assert_eq!(versioned_path("v3x/items", "v3"), "v3/v3x/items");
        assert_eq!(versioned_path("", "v3"), "v3");
    }

    #[test]
    fn resource_skips_version_segment() {
        assert_eq!(ProxyRequest::get("v3/content/12").resource(), "content");
        assert_eq!(ProxyRequest::get("content").resource(), "content");
        assert_eq!(ProxyRequest::get("videos/1").resource(), "videos");
        assert_eq!(ProxyRequest::get("v3").resource(), "v3");
    }

    #[tokio::test]
    async fn acquire_token_posts_form_grant() {
        let fake = Arc::new(FakeTransport::new());
        fake.push_token("tok123", 7200);

        let grant = client(&fake, false)
            .acquire_token(&ClientCredentials::new("abc", "xyz"))
            .await
            .unwrap();
        assert_eq!(
            grant,
            TokenGrant {
                access_token: "tok123".to_string(),
                expires_in: 7200
            }
        );

        let calls = fake.token_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, Method::POST);
        assert_eq!(calls[0].url, "https://legends.test/api/v3/oauth2/token");
        assert_eq!(header_str(&calls[0], header::CONTENT_TYPE), FORM);
        assert_eq!(header_str(&calls[0], header::ACCEPT), JSON);
        let body = String::from_utf8(calls[0].body.clone().unwrap().to_vec()).unwrap();
        assert_eq!(body, "grant_type=client_credentials&client_id=abc&client_secret=xyz");
    }

    #[tokio::test]
    async fn acquire_token_defaults_expiry() {
        let fake = Arc::new(FakeTransport::new());
        fake.push_token_response(json_response(200, json!({ "access_token": "tok" })));
        let grant = client(&fake, false)
            .acquire_token(&ClientCredentials::new("abc", "xyz"))
            .await
            .unwrap();
        assert_eq!(grant.expires_in, DEFAULT_TOKEN_TTL_SECS);
    }

    #[tokio::test]
    async fn blank_credentials_fail_without_network() {
        let fake = Arc::new(FakeTransport::new());
        let err = client(&fake, false)
            .acquire_token(&ClientCredentials::new("", "xyz"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Configuration(_)));
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn rejected_grant_surfaces_error_description() {
        let fake = Arc::new(FakeTransport::new());
        fake.push_token_response(json_response(
            401,
            json!({
                "error": "invalid_client",
                "error_description": "Client authentication failed"
            }),
        ));
        let err = client(&fake, false)
            .acquire_token(&ClientCredentials::new("abc", "bad"))
            .await
            .unwrap_err();
        match err {
            ProxyError::Authentication { status, message } => {
                assert_eq!(status, StatusCode::UNAUTHORIZED);
                assert_eq!(message, "Client authentication failed");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn grant_without_access_token_is_a_protocol_error() {
        let fake = Arc::new(FakeTransport::new());
        fake.push_token_response(json_response(200, json!({ "token_type": "bearer" })));
        let err = client(&fake, false)
            .acquire_token(&ClientCredentials::new("abc", "xyz"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Protocol(_)));
    }

    #[tokio::test]
    async fn revoke_failure_is_swallowed() {
        let fake = Arc::new(FakeTransport::new());
        client(&fake, false).revoke_token(&BearerToken::new("tok")).await;
        let calls = fake.token_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].url, "https://legends.test/api/v3/oauth2/revoke");
    }

    #[tokio::test]
    async fn send_uses_stored_token_and_default_headers() {
        let fake = Arc::new(FakeTransport::new());
        fake.push_json(200, json!({ "ok": true }));
        let mut store = MemoryTokenStore::with_token(BearerToken::with_ttl("stored", 60));

        let request = ProxyRequest::get("v3/content").with_query("page=2");
        let response = client(&fake, true).send(&request, &mut store).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);

        let calls = fake.api_calls();
        assert_eq!(calls[0].url, "https://legends.test/api/v3/content?page=2");
        assert_eq!(header_str(&calls[0], header::AUTHORIZATION), "Bearer stored");
        assert_eq!(header_str(&calls[0], header::ACCEPT), JSON);
        assert!(calls[0].headers.get(header::CONTENT_TYPE).is_none());
        assert!(fake.token_calls().is_empty());
    }

    #[tokio::test]
    async fn send_acquires_token_when_store_is_empty() {
        let fake = Arc::new(FakeTransport::new());
        fake.push_token("fresh", 3600);
        fake.push_json(200, json!([]));
        let mut store = MemoryTokenStore::new();

        client(&fake, true)
            .send(&ProxyRequest::get("v3/users"), &mut store)
            .await
            .unwrap();

        assert_eq!(store.get().unwrap().value(), "fresh");
        assert_eq!(header_str(&fake.api_calls()[0], header::AUTHORIZATION), "Bearer fresh");
    }

    #[tokio::test]
    async fn send_without_token_or_credentials_sends_empty_authorization() {
        let fake = Arc::new(FakeTransport::new());
        fake.push_json(401, json!({ "error": "unauthorized" }));
        let mut store = MemoryTokenStore::new();

        let response = client(&fake, false)
            .send(&ProxyRequest::get("v3/users"), &mut store)
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(header_str(&fake.api_calls()[0], header::AUTHORIZATION), "");
        assert_eq!(fake.calls().len(), 1);
    }

    #[tokio::test]
    async fn single_refresh_on_repeated_unauthorized() {
        let fake = Arc::new(FakeTransport::new());
        fake.push_json(401, json!({ "error": "expired" }));
        fake.push_token("second", 7200);
        fake.push_json(401, json!({ "error": "still expired" }));
        let mut store = MemoryTokenStore::with_token(BearerToken::with_ttl("first", 60));

        let response = client(&fake, true)
            .send(&ProxyRequest::get("v3/content"), &mut store)
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(fake.api_calls().len(), 2);
        assert_eq!(fake.token_calls().len(), 1);
        assert!(store.get().is_none());
    }

    #[tokio::test]
    async fn refresh_then_success_keeps_new_token() {
        let fake = Arc::new(FakeTransport::new());
        fake.push_json(401, json!({}));
        fake.push_token("second", 7200);
        fake.push_json(200, json!({ "id": 1 }));
        let mut store = MemoryTokenStore::with_token(BearerToken::with_ttl("first", 60));

        let response = client(&fake, true)
            .send(&ProxyRequest::get("v3/content/1"), &mut store)
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(store.get().unwrap().value(), "second");
        let calls = fake.api_calls();
        assert_eq!(header_str(&calls[1], header::AUTHORIZATION), "Bearer second");
    }

    #[tokio::test]
    async fn exhausted_resets_become_network_error() {
        let fake = Arc::new(FakeTransport::new());
        fake.push_resets(4);
        let mut store = MemoryTokenStore::with_token(BearerToken::with_ttl("tok", 60));

        let err = client(&fake, true)
            .send(&ProxyRequest::get("v3/content"), &mut store)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ProxyError::Network(TransportError::ConnectionReset(_))
        ));
        assert_eq!(fake.api_calls().len(), 4);
    }

    #[tokio::test]
    async fn body_gets_default_json_content_type() {
        let fake = Arc::new(FakeTransport::new());
        fake.push_json(201, json!({}));
        let mut store = MemoryTokenStore::with_token(BearerToken::with_ttl("tok", 60));

        let request =
            ProxyRequest::new(Method::POST, "v3/assignments").with_body(Bytes::from_static(b"{}"));
        client(&fake, true).send(&request, &mut store).await.unwrap();

        let calls = fake.api_calls();
        assert_eq!(header_str(&calls[0], header::CONTENT_TYPE), JSON);
        assert_eq!(calls[0].body.as_deref(), Some(&b"{}"[..]));
    }
}
