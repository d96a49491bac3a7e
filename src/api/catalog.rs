// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::State,
    http::{HeaderMap, Uri},
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use super::{
    proxy::{execute, filter_inbound_headers, relay, relay_json, respond},
    transform::{content_query, transform_content, transform_search},
};
use crate::{
    state::AppState,
    upstream::{versioned_path, ProxyRequest},
};

fn catalog_request(
    state: &AppState,
    path: &str,
    query: String,
    headers: &HeaderMap,
) -> ProxyRequest {
    ProxyRequest::get(versioned_path(path, state.client.api_version()))
        .with_query(query)
        .with_headers(filter_inbound_headers(headers))
}

/// List content with UI parameter names translated for the upstream.
#[utoipa::path(
    get,
    path = "/api/content",
    tag = "Catalog",
    params(
        ("query" = Option<String>, Query, description = "Free-text search (sent as `q`)"),
        ("type" = Option<String>, Query, description = "Game type (sent as `game_type`)"),
        ("grades" = Option<String>, Query, description = "Comma-separated grades (sent as `grade_levels`)"),
        ("standard_set" = Option<String>, Query, description = "Standard set"),
        ("school_level" = Option<String>, Query, description = "School level"),
        ("supports_tts" = Option<bool>, Query, description = "Only sent when `true`"),
        ("supports_ipad" = Option<bool>, Query, description = "Only sent when `true`"),
        ("page" = Option<u32>, Query, description = "Page number"),
        ("per_page" = Option<u32>, Query, description = "Page size (sent as `page_size`)")
    ),
    responses(
        (status = 200, description = "Content entries with `grade_levels` and `stats`"),
        (status = 401, description = "Session expired")
    )
)]
pub async fn list_content(
    State(state): State<AppState>,
    jar: CookieJar,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let request = catalog_request(&state, "content", content_query(uri.query()), &headers);
    let (jar, result) = execute(&state, jar, &request).await;
    respond(jar, result, |upstream| relay_json(upstream, transform_content))
}

/// Search content and standards.
#[utoipa::path(
    get,
    path = "/api/searches",
    tag = "Catalog",
    responses(
        (status = 200, description = "Search hits with normalized `content_type`"),
        (status = 401, description = "Session expired")
    )
)]
pub async fn search(
    State(state): State<AppState>,
    jar: CookieJar,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let query = uri.query().unwrap_or_default().to_string();
    let request = catalog_request(&state, "searches", query, &headers);
    let (jar, result) = execute(&state, jar, &request).await;
    respond(jar, result, |upstream| relay_json(upstream, transform_search))
}

/// Fetch one standard. The upstream serves it at `standards/{id}`.
#[utoipa::path(
    get,
    path = "/api/standard_sets/standards/{id}",
    tag = "Catalog",
    params(("id" = String, Path, description = "Standard id")),
    responses(
        (status = 200, description = "The standard"),
        (status = 404, description = "Unknown standard")
    )
)]
pub async fn get_standard(
    State(state): State<AppState>,
    jar: CookieJar,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    // Reuse the still-encoded segment rather than the decoded path param.
    let id = uri.path().rsplit('/').next().unwrap_or_default();
    let query = uri.query().unwrap_or_default().to_string();
    let request = catalog_request(&state, &format!("standards/{id}"), query, &headers);
    let (jar, result) = execute(&state, jar, &request).await;
    respond(jar, result, relay)
}
