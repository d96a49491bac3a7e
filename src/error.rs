// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::{
    normalize::{FieldErrors, NormalizedError},
    upstream::transport::TransportError,
};

/// Failures raised by the proxy itself (as opposed to upstream error
/// responses, which are relayed through the normalizer).
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("Client credentials are required")]
    MissingCredentials,

    #[error("{message}")]
    Authentication { status: StatusCode, message: String },

    #[error("{message}")]
    Validation {
        message: String,
        fields: Option<FieldErrors>,
    },

    #[error("unexpected upstream response: {0}")]
    Protocol(String),

    #[error("upstream failure: {0}")]
    Upstream(String),

    #[error("upstream unreachable: {0}")]
    Network(#[from] TransportError),

    #[error("Too many requests for '{key}'")]
    RateLimited { key: String, retry_after: u64 },

    #[error("internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            fields: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Configuration(_) | ProxyError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ProxyError::MissingCredentials | ProxyError::Validation { .. } => {
                StatusCode::BAD_REQUEST
            }
            ProxyError::Authentication { status, .. } => *status,
            ProxyError::Protocol(_) | ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Network(TransportError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Network(_) => StatusCode::BAD_GATEWAY,
            ProxyError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ProxyError::Configuration(_) => "CONFIGURATION_ERROR",
            ProxyError::MissingCredentials => "MISSING_CREDENTIALS",
            ProxyError::Authentication { .. } => "AUTHENTICATION_FAILED",
            ProxyError::Validation { .. } => "VALIDATION_ERROR",
            ProxyError::Protocol(_) => "PROTOCOL_ERROR",
            ProxyError::Upstream(_) => "UPSTREAM_ERROR",
            ProxyError::Network(_) => "NETWORK_ERROR",
            ProxyError::RateLimited { .. } => "RATE_LIMITED",
            ProxyError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn to_normalized(&self) -> NormalizedError {
        let mut normalized =
            NormalizedError::new(self.status(), self.to_string()).with_code(self.code());
        if let ProxyError::Validation { fields, .. } = self {
            normalized.errors = fields.clone();
        }
        normalized
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(
                code = self.code(),
                status = status.as_u16(),
                error = %self,
                "Proxy request failed"
            );
        }

        let retry_after = match &self {
            ProxyError::RateLimited { retry_after, .. } => Some(*retry_after),
            _ => None,
        };

        let mut response = self.to_normalized().into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    use crate::normalize::{add_field_error, FieldMessages};

    #[test]
    fn variants_map_to_status_and_code() {
        let cases = [
            (ProxyError::Configuration("x".into()), 500, "CONFIGURATION_ERROR"),
            (ProxyError::MissingCredentials, 400, "MISSING_CREDENTIALS"),
            (ProxyError::validation("bad"), 400, "VALIDATION_ERROR"),
            (ProxyError::Protocol("x".into()), 502, "PROTOCOL_ERROR"),
            (ProxyError::Upstream("x".into()), 502, "UPSTREAM_ERROR"),
            (
                ProxyError::Network(TransportError::ConnectionReset("x".into())),
                502,
                "NETWORK_ERROR",
            ),
            (
                ProxyError::Network(TransportError::Timeout("x".into())),
                504,
                "NETWORK_ERROR",
            ),
            (
                ProxyError::RateLimited {
                    key: "content".into(),
                    retry_after: 3,
                },
                429,
                "RATE_LIMITED",
            ),
            (ProxyError::Internal("x".into()), 500, "INTERNAL_ERROR"),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status().as_u16(), status, "{err}");
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn authentication_keeps_upstream_status() {
        let err = ProxyError::Authentication {
            status: StatusCode::FORBIDDEN,
            message: "invalid_client".into(),
        };
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.to_string(), "invalid_client");
    }

    #[tokio::test]
    async fn into_response_returns_normalized_json_body() {
        let mut fields = FieldErrors::new();
        add_field_error(&mut fields, "type", "is required");
        let response = ProxyError::Validation {
            message: "Missing required fields: type".into(),
            fields: Some(fields),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["error"], "Missing required fields: type");
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["status"], 400);
        assert_eq!(
            serde_json::from_value::<FieldMessages>(body["errors"]["type"].clone()).unwrap(),
            FieldMessages::One("is required".into())
        );
    }

    #[tokio::test]
    async fn rate_limited_response_sets_retry_after() {
        let response = ProxyError::RateLimited {
            key: "content".into(),
            retry_after: 42,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }
}
