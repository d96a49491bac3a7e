// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the routes the proxy serves itself.
//! Everything else is relayed from the Legends API without a local model.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

// =============================================================================
// Auth
// =============================================================================

/// Login body. Both fields are optional; when either is missing the
/// server-side credentials are used instead.
#[derive(Clone, Default, Deserialize, ToSchema)]
#[cfg_attr(test, derive(Debug))]
pub struct LoginRequest {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub success: bool,
    /// Token lifetime in seconds; also the cookie `Max-Age`.
    pub expires_in: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Whether a token cookie is present. The token itself is never returned.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    pub authenticated: bool,
}

// =============================================================================
// Assignments
// =============================================================================

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AssignmentListQuery {
    /// Page number (default 1).
    pub page: Option<u32>,
    /// Page size (default 10).
    pub limit: Option<u32>,
}

/// Body accepted by `POST /api/assignments`.
///
/// Each field may be a string or a number; blank, `0`, `false` and `null`
/// count as missing.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateAssignmentRequest {
    #[serde(rename = "type")]
    #[schema(value_type = String)]
    pub assignment_type: serde_json::Value,
    #[schema(value_type = String)]
    pub standard_id: serde_json::Value,
    #[schema(value_type = String)]
    pub application_user_id: serde_json::Value,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct CreateJoinRequest {
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub application_user_id: Option<serde_json::Value>,
    /// Join target (default `awakening`).
    #[serde(default)]
    pub target: Option<String>,
}
