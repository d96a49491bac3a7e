// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Generic `/api/*` forwarding and the response policy shared by every
//! proxied route.

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::Value;
use tracing::warn;

use crate::{
    error::ProxyError,
    normalize::{normalize, NormalizedError},
    state::AppState,
    upstream::{versioned_path, ProxyRequest, UpstreamResponse},
};

pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please login again.";
pub const SESSION_EXPIRED_CODE: &str = "SESSION_EXPIRED";

const API_PREFIX: &str = "/api/";

/// Inbound headers never copied upstream. Hop-by-hop headers, the
/// browser's cookies, and headers the transport recomputes.
const STRIPPED_HEADERS: &[&str] = &[
    "cookie",
    "host",
    "content-length",
    "accept-encoding",
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "te",
    "trailer",
    "upgrade",
];

/// Copy inbound headers minus [`STRIPPED_HEADERS`].
pub fn filter_inbound_headers(headers: &HeaderMap) -> HeaderMap {
    let mut filtered = headers.clone();
    for name in STRIPPED_HEADERS {
        filtered.remove(*name);
    }
    filtered
}

fn carries_body(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD)
}

/// Forward any `/api/*` request not claimed by a typed route.
pub async fn forward(
    State(state): State<AppState>,
    jar: CookieJar,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(rest) = uri.path().strip_prefix(API_PREFIX) else {
        return NormalizedError::new(StatusCode::NOT_FOUND, "Not Found")
            .with_code("NOT_FOUND")
            .into_response();
    };

    let path = versioned_path(rest, state.client.api_version());
    let mut request = ProxyRequest::new(method.clone(), path)
        .with_query(uri.query().unwrap_or_default())
        .with_headers(filter_inbound_headers(&headers));
    if carries_body(&method) && !body.is_empty() {
        request = request.with_body(body);
    }

    let (jar, result) = execute(&state, jar, &request).await;
    respond(jar, result, relay)
}

/// Rate-limit, then send through the client with the cookie-backed token
/// store. Returns the jar carrying any cookie changes.
pub(crate) async fn execute(
    state: &AppState,
    jar: CookieJar,
    request: &ProxyRequest,
) -> (CookieJar, Result<UpstreamResponse, ProxyError>) {
    let resource = request.resource();
    let decision = state.rate_limiter.check(resource);
    if !decision.allowed {
        warn!(
            resource,
            retry_after_secs = decision.retry_after_secs(),
            "Rate limit exceeded"
        );
        let error = ProxyError::RateLimited {
            key: resource.to_string(),
            retry_after: decision.retry_after_secs(),
        };
        return (jar, Err(error));
    }

    let mut store = state.token_store(jar);
    let result = state.client.send(request, &mut store).await;
    (store.into_jar(), result)
}

/// Apply the response policy: 401 becomes "session expired", other
/// failures are normalized, successes go through `on_success`.
pub(crate) fn respond<F>(
    jar: CookieJar,
    result: Result<UpstreamResponse, ProxyError>,
    on_success: F,
) -> Response
where
    F: FnOnce(UpstreamResponse) -> Response,
{
    let upstream = match result {
        Ok(upstream) => upstream,
        Err(error) => return (jar, error).into_response(),
    };

    if upstream.status == StatusCode::UNAUTHORIZED {
        let body = NormalizedError::new(StatusCode::UNAUTHORIZED, SESSION_EXPIRED_MESSAGE)
            .with_code(SESSION_EXPIRED_CODE)
            .with_request_id(upstream.request_id());
        return (jar, body).into_response();
    }

    if !upstream.status.is_success() {
        let normalized = normalize(upstream.status, &upstream.headers, &upstream.body);
        return (jar, normalized).into_response();
    }

    let request_id = upstream
        .request_id()
        .and_then(|id| HeaderValue::from_str(id).ok());
    let mut response = on_success(upstream);
    if let Some(id) = request_id {
        response.headers_mut().insert("x-request-id", id);
    }
    (jar, response).into_response()
}

/// Relay a successful upstream response: bytes and content type as sent.
/// A 204 gets an empty body with a JSON content type.
pub(crate) fn relay(upstream: UpstreamResponse) -> Response {
    relay_with_status(upstream, None)
}

pub(crate) fn relay_with_status(
    upstream: UpstreamResponse,
    status: Option<StatusCode>,
) -> Response {
    if upstream.status == StatusCode::NO_CONTENT {
        return (
            StatusCode::NO_CONTENT,
            [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        )
            .into_response();
    }

    let content_type = upstream.headers.get(header::CONTENT_TYPE).cloned();
    let mut response = Response::new(Body::from(upstream.body));
    *response.status_mut() = status.unwrap_or(upstream.status);
    if let Some(content_type) = content_type {
        response.headers_mut().insert(header::CONTENT_TYPE, content_type);
    }
    response
}

/// Relay a JSON success through `transform`. Non-JSON or unparsable
/// bodies fall back to [`relay`].
pub(crate) fn relay_json(upstream: UpstreamResponse, transform: fn(Value) -> Value) -> Response {
    if !upstream.is_json() || upstream.status == StatusCode::NO_CONTENT {
        return relay(upstream);
    }
    match upstream.json::<Value>() {
        Ok(body) => (upstream.status, axum::Json(transform(body))).into_response(),
        Err(error) => {
            warn!(error = %error, "Upstream declared JSON but body did not parse; relaying raw");
            relay(upstream)
        }
    }
}
