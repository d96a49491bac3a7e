// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::{json, Map, Value};
use url::form_urlencoded;

use super::proxy::{execute, filter_inbound_headers, relay, relay_with_status, respond};
use crate::{
    error::ProxyError,
    models::{AssignmentListQuery, CreateAssignmentRequest, CreateJoinRequest},
    normalize::{add_field_error, FieldErrors},
    state::AppState,
    upstream::{versioned_path, ProxyRequest},
};

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_LIMIT: u32 = 10;
const DEFAULT_JOIN_TARGET: &str = "awakening";
const ASSIGNMENT_FIELDS: &[&str] = &["type", "standard_id", "application_user_id"];

/// `null`, `false`, `0`, `""` and absent values count as missing.
fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Bool(b)) => !b,
        Some(Value::Number(n)) => n.as_f64().is_none_or(|f| f == 0.0),
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

fn parse_object(body: &[u8]) -> Result<Map<String, Value>, ProxyError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(ProxyError::validation("Request body must be a JSON object")),
    }
}

fn missing_fields(body: &Map<String, Value>, required: &[&str]) -> Result<(), ProxyError> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|field| is_missing(body.get(*field)))
        .collect();
    if missing.is_empty() {
        return Ok(());
    }

    let mut fields = FieldErrors::new();
    for field in &missing {
        add_field_error(&mut fields, *field, "is required");
    }
    Err(ProxyError::Validation {
        message: format!("Missing required fields: {}", missing.join(", ")),
        fields: Some(fields),
    })
}

fn list_query(raw: Option<&str>) -> AssignmentListQuery {
    let mut query = AssignmentListQuery::default();
    for (key, value) in form_urlencoded::parse(raw.unwrap_or_default().as_bytes()) {
        match key.as_ref() {
            "page" if query.page.is_none() => query.page = value.parse().ok(),
            "limit" if query.limit.is_none() => query.limit = value.parse().ok(),
            _ => {}
        }
    }
    query
}

/// List assignments, paginated.
#[utoipa::path(
    get,
    path = "/api/assignments",
    tag = "Assignments",
    params(AssignmentListQuery),
    responses(
        (status = 200, description = "Assignments page"),
        (status = 401, description = "Session expired")
    )
)]
pub async fn list_assignments(
    State(state): State<AppState>,
    jar: CookieJar,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let query = list_query(uri.query());
    let upstream_query = form_urlencoded::Serializer::new(String::new())
        .append_pair("page", &query.page.unwrap_or(DEFAULT_PAGE).to_string())
        .append_pair("limit", &query.limit.unwrap_or(DEFAULT_LIMIT).to_string())
        .finish();

    let request = ProxyRequest::get(versioned_path("assignments", state.client.api_version()))
        .with_query(upstream_query)
        .with_headers(filter_inbound_headers(&headers));
    let (jar, result) = execute(&state, jar, &request).await;
    respond(jar, result, relay)
}

/// Create an assignment. Only `type`, `standard_id` and
/// `application_user_id` are forwarded.
#[utoipa::path(
    post,
    path = "/api/assignments",
    tag = "Assignments",
    request_body = CreateAssignmentRequest,
    responses(
        (status = 200, description = "Assignment created"),
        (status = 400, description = "Missing required fields"),
        (status = 401, description = "Session expired")
    )
)]
pub async fn create_assignment(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body = match parse_object(&body).and_then(|body| {
        missing_fields(&body, ASSIGNMENT_FIELDS)?;
        Ok(body)
    }) {
        Ok(body) => body,
        Err(error) => return (jar, error).into_response(),
    };

    let payload: Map<String, Value> = ASSIGNMENT_FIELDS
        .iter()
        .filter_map(|field| body.get(*field).map(|v| (field.to_string(), v.clone())))
        .collect();

    let request = ProxyRequest::new(
        Method::POST,
        versioned_path("assignments", state.client.api_version()),
    )
    .with_headers(filter_inbound_headers(&headers))
    .with_json(&Value::Object(payload));
    let request = match request {
        Ok(request) => request,
        Err(error) => return (jar, error).into_response(),
    };

    let (jar, result) = execute(&state, jar, &request).await;
    respond(jar, result, relay)
}

/// Create a join link for an assignment. Success is reported as 201.
#[utoipa::path(
    post,
    path = "/api/assignments/{id}/joins",
    tag = "Assignments",
    params(("id" = String, Path, description = "Assignment id")),
    request_body = CreateJoinRequest,
    responses(
        (status = 201, description = "Join created"),
        (status = 400, description = "Missing application_user_id"),
        (status = 401, description = "Session expired")
    )
)]
pub async fn create_join(
    State(state): State<AppState>,
    jar: CookieJar,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body = match parse_object(&body).and_then(|body| {
        missing_fields(&body, &["application_user_id"])?;
        Ok(body)
    }) {
        Ok(body) => body,
        Err(error) => return (jar, error).into_response(),
    };

    let target = body
        .get("target")
        .filter(|t| !is_missing(Some(*t)))
        .cloned()
        .unwrap_or_else(|| Value::from(DEFAULT_JOIN_TARGET));
    let payload = json!({
        "application_user_id": body.get("application_user_id").cloned().unwrap_or(Value::Null),
        "target": target,
    });

    // Raw path keeps the assignment id exactly as the caller encoded it.
    let rest = uri.path().trim_start_matches("/api/");
    let request = ProxyRequest::new(Method::POST, versioned_path(rest, state.client.api_version()))
        .with_headers(filter_inbound_headers(&headers))
        .with_json(&payload);
    let request = match request {
        Ok(request) => request,
        Err(error) => return (jar, error).into_response(),
    };

    let (jar, result) = execute(&state, jar, &request).await;
    respond(jar, result, |upstream| {
        relay_with_status(upstream, Some(StatusCode::CREATED))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falsy_values_count_as_missing() {
        assert!(is_missing(None));
        assert!(is_missing(Some(&json!(null))));
        assert!(is_missing(Some(&json!(""))));
        assert!(is_missing(Some(&json!(0))));
        assert!(is_missing(Some(&json!(false))));
        assert!(!is_missing(Some(&json!("0"))));
        assert!(!is_missing(Some(&json!(12))));
        assert!(!is_missing(Some(&json!([]))));
    }

    #[test]
    fn missing_fields_lists_every_absent_field() {
        let body = parse_object(br#"{"type":"standard","standard_id":0}"#).unwrap();
        let err = missing_fields(&body, ASSIGNMENT_FIELDS).unwrap_err();
        match err {
            ProxyError::Validation { message, fields } => {
                assert_eq!(
                    message,
                    "Missing required fields: standard_id, application_user_id"
                );
                let fields = fields.unwrap();
                assert!(fields.contains_key("standard_id"));
                assert!(fields.contains_key("application_user_id"));
                assert!(!fields.contains_key("type"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn non_object_bodies_are_rejected() {
        assert!(parse_object(b"[1,2]").is_err());
        assert!(parse_object(b"").is_err());
    }

    #[test]
    fn list_query_parses_page_and_limit() {
        let query = list_query(Some("page=3&limit=25&page=9"));
        assert_eq!(query.page, Some(3));
        assert_eq!(query.limit, Some(25));

        let fallback = list_query(Some("page=abc"));
        assert_eq!(fallback.page, None);
    }
}
