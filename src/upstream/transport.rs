// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP transport to the Legends API.
//!
//! [`Transport`] is the single seam between the proxy and the network: the
//! production implementation wraps `reqwest`, tests substitute a scripted
//! fake.

use std::{error::Error as StdError, future::Future, io, pin::Pin, time::Duration};

use axum::{
    body::Bytes,
    http::{header, HeaderMap, Method, StatusCode},
};
use reqwest::Client;
use serde::de::DeserializeOwned;

/// Boxed future returned by [`Transport::send`].
pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<UpstreamResponse, TransportError>> + Send + 'a>>;

/// A fully resolved outbound request.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

/// A buffered upstream response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Whether the upstream declared a JSON media type (`application/json`,
    /// `application/problem+json`, ...).
    pub fn is_json(&self) -> bool {
        self.content_type().is_some_and(|ct| {
            let media = ct.split(';').next().unwrap_or_default().trim();
            media.eq_ignore_ascii_case("application/json") || media.ends_with("+json")
        })
    }

    /// Upstream correlation id from `x-request-id` or `x-requestid`.
    pub fn request_id(&self) -> Option<&str> {
        request_id(&self.headers)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Read the upstream correlation id from a header map.
pub fn request_id(headers: &HeaderMap) -> Option<&str> {
    ["x-request-id", "x-requestid"]
        .into_iter()
        .find_map(|name| headers.get(name))
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// Network-level failure: no HTTP response was received.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection reset: {0}")]
    ConnectionReset(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Other(String),
}

/// Sends requests to the upstream API.
pub trait Transport: Send + Sync {
    fn send(&self, request: UpstreamRequest) -> TransportFuture<'_>;
}

/// Production transport built on a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    /// Create a transport whose calls are bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: UpstreamRequest) -> TransportFuture<'_> {
        Box::pin(async move {
            let mut builder = self
                .http
                .request(request.method, request.url.as_str())
                .headers(request.headers);
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder.send().await.map_err(classify)?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await.map_err(classify)?;

            Ok(UpstreamResponse {
                status,
                headers,
                body,
            })
        })
    }
}

fn classify(error: reqwest::Error) -> TransportError {
    let detail = error.to_string();
    if is_connection_reset(&error) {
        TransportError::ConnectionReset(detail)
    } else if error.is_timeout() {
        TransportError::Timeout(detail)
    } else if error.is_connect() {
        TransportError::Connect(detail)
    } else {
        TransportError::Other(detail)
    }
}

/// Walk the source chain looking for a reset-style I/O error.
fn is_connection_reset(error: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(io_error) = err.downcast_ref::<io::Error>() {
            if matches!(
                io_error.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            ) {
                return true;
            }
        }
        current = err.source();
    }
    false
}

#[cfg(test)]
pub(crate) mod fake {
    //! Scripted transport for tests.

    use std::{collections::VecDeque, sync::Mutex};

    use axum::http::{HeaderValue, StatusCode};
    use serde_json::Value;

    use super::*;

    type Scripted = Result<UpstreamResponse, TransportError>;

    /// Replays queued responses and records every request.
    ///
    /// Calls to `.../oauth2/*` draw from the token queue, everything else
    /// from the API queue. An empty queue yields `TransportError::Other`.
    #[derive(Default)]
    pub(crate) struct FakeTransport {
        token_script: Mutex<VecDeque<Scripted>>,
        api_script: Mutex<VecDeque<Scripted>>,
        calls: Mutex<Vec<UpstreamRequest>>,
    }

    pub(crate) fn json_response(status: u16, body: Value) -> UpstreamResponse {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        UpstreamResponse {
            status: StatusCode::from_u16(status).unwrap(),
            headers,
            body: Bytes::from(serde_json::to_vec(&body).unwrap()),
        }
    }

    pub(crate) fn text_response(
        status: u16,
        content_type: &'static str,
        body: &str,
    ) -> UpstreamResponse {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        UpstreamResponse {
            status: StatusCode::from_u16(status).unwrap(),
            headers,
            body: Bytes::from(body.to_string()),
        }
    }

    impl FakeTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn push_token(&self, access_token: &str, expires_in: u64) -> &Self {
            self.push_token_response(json_response(
                200,
                serde_json::json!({
                    "access_token": access_token,
                    "token_type": "bearer",
                    "expires_in": expires_in,
                }),
            ))
        }

        pub(crate) fn push_token_response(&self, response: UpstreamResponse) -> &Self {
            self.token_script.lock().unwrap().push_back(Ok(response));
            self
        }

        pub(crate) fn push_response(&self, response: UpstreamResponse) -> &Self {
            self.api_script.lock().unwrap().push_back(Ok(response));
            self
        }

        pub(crate) fn push_json(&self, status: u16, body: Value) -> &Self {
            self.push_response(json_response(status, body))
        }

        pub(crate) fn push_error(&self, error: TransportError) -> &Self {
            self.api_script.lock().unwrap().push_back(Err(error));
            self
        }

        pub(crate) fn push_resets(&self, count: usize) -> &Self {
            for _ in 0..count {
                self.push_error(TransportError::ConnectionReset("ECONNRESET".to_string()));
            }
            self
        }

        pub(crate) fn calls(&self) -> Vec<UpstreamRequest> {
            self.calls.lock().unwrap().clone()
        }

        pub(crate) fn token_calls(&self) -> Vec<UpstreamRequest> {
            self.calls()
                .into_iter()
                .filter(|c| is_oauth(&c.url))
                .collect()
        }

        pub(crate) fn api_calls(&self) -> Vec<UpstreamRequest> {
            self.calls()
                .into_iter()
                .filter(|c| !is_oauth(&c.url))
                .collect()
        }
    }

    fn is_oauth(url: &str) -> bool {
        url.contains("/oauth2/")
    }

    impl Transport for FakeTransport {
        fn send(&self, request: UpstreamRequest) -> TransportFuture<'_> {
            let script = if is_oauth(&request.url) {
                &self.token_script
            } else {
                &self.api_script
            };
            let next = script.lock().unwrap().pop_front();
            self.calls.lock().unwrap().push(request);
            Box::pin(async move {
                next.unwrap_or_else(|| {
                    Err(TransportError::Other("no scripted response".to_string()))
                })
            })
        }
    }
}
