// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Upstream Error Normalization
//!
//! The Legends API reports failures in several shapes:
//!
//! - `{"error": "..."}` flat string
//! - `{"error": {"message": "...", "code": "...", "errors": {...}}}` nested object
//! - `{"errors": {"field": ["..."]}}` field map
//! - `{"invalid_params": [{"name": "...", "reason": "..."}]}` (RFC 7807 style)
//! - `{"errors": ["field: message", ...]}` array of strings
//!
//! [`normalize`] folds every one of them into [`NormalizedError`]. Each
//! shape is recognised by a small typed matcher; matchers run in a fixed
//! order and the first hit wins. Anything that is not JSON degrades to the
//! raw text plus a generic message. Normalization never fails and always
//! keeps the HTTP status.

use std::collections::BTreeMap;

use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::upstream::transport::request_id;

/// Field name used for list entries that carry no field.
pub const BASE_FIELD: &str = "base";

/// Message(s) attached to one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldMessages {
    One(String),
    Many(Vec<String>),
    /// Upstream `errors` map value that is neither a string nor a list of
    /// strings; kept as sent.
    Verbatim(Value),
}

impl FieldMessages {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) => FieldMessages::One(s.clone()),
            Value::Array(items) if items.iter().all(Value::is_string) => FieldMessages::Many(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
            ),
            other => FieldMessages::Verbatim(other.clone()),
        }
    }

    fn push(self, message: String) -> Self {
        match self {
            FieldMessages::One(first) => FieldMessages::Many(vec![first, message]),
            FieldMessages::Many(mut all) => {
                all.push(message);
                FieldMessages::Many(all)
            }
            FieldMessages::Verbatim(value) => FieldMessages::Many(vec![value.to_string(), message]),
        }
    }
}

pub type FieldErrors = BTreeMap<String, FieldMessages>;

/// Insert a message for `field`, collecting repeats into a list.
pub fn add_field_error(
    errors: &mut FieldErrors,
    field: impl Into<String>,
    message: impl Into<String>,
) {
    let field = field.into();
    let message = message.into();
    let merged = match errors.remove(&field) {
        Some(existing) => existing.push(message),
        None => FieldMessages::One(message),
    };
    errors.insert(field, merged);
}

/// The uniform, client-facing error body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedError {
    pub status: u16,
    #[serde(rename = "error")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl NormalizedError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: status.as_u16(),
            message: message.into(),
            code: None,
            errors: None,
            request_id: None,
            hint: None,
            docs_url: None,
            raw: None,
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: Option<&str>) -> Self {
        self.request_id = request_id.map(str::to_string);
        self
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::BAD_GATEWAY)
    }
}

impl IntoResponse for NormalizedError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let request_id = self
            .request_id
            .as_deref()
            .and_then(|id| HeaderValue::from_str(id).ok());
        let mut response = (status, Json(self)).into_response();
        if let Some(id) = request_id {
            response.headers_mut().insert("x-request-id", id);
        }
        response
    }
}

/// Generic fallback message, e.g. `API error: 422 Unprocessable Entity`.
pub fn generic_message(status: StatusCode) -> String {
    format!(
        "API error: {} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown Status")
    )
}

/// Classified upstream error body.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorBody {
    Object(Map<String, Value>),
    /// Valid JSON that is not an object (string, array, number, ...).
    Other(Value),
    /// Not JSON at all.
    Opaque(String),
}

impl ErrorBody {
    pub fn parse(body: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(map)) => ErrorBody::Object(map),
            Ok(value) => ErrorBody::Other(value),
            Err(_) => ErrorBody::Opaque(String::from_utf8_lossy(body).into_owned()),
        }
    }
}

type MessageMatcher = fn(&Map<String, Value>) -> Option<String>;
type FieldMatcher = fn(&Map<String, Value>) -> Option<FieldErrors>;

const MESSAGE_MATCHERS: &[MessageMatcher] =
    &[top_level_error, top_level_message, nested_error_message];

const FIELD_MATCHERS: &[FieldMatcher] = &[errors_object, invalid_params, errors_list];

const NESTED_FIELD_MATCHERS: &[FieldMatcher] = &[
    errors_object,
    invalid_params,
    errors_list,
    fields_object,
    fields_list,
];

/// Convert any upstream failure into a [`NormalizedError`].
pub fn normalize(status: StatusCode, headers: &HeaderMap, body: &[u8]) -> NormalizedError {
    let mut normalized =
        NormalizedError::new(status, generic_message(status)).with_request_id(request_id(headers));

    match ErrorBody::parse(body) {
        ErrorBody::Object(object) => {
            if let Some(message) = first_match(MESSAGE_MATCHERS, &object) {
                normalized.message = message;
            }
            normalized.errors = field_errors(&object);
            normalized.code = passthrough(&object, "code");
            normalized.hint = passthrough(&object, "hint");
            normalized.docs_url = passthrough(&object, "docs_url");
        }
        ErrorBody::Other(Value::String(message)) if !message.trim().is_empty() => {
            normalized.message = message;
        }
        ErrorBody::Other(Value::Array(items)) => {
            let mut wrapper = Map::new();
            wrapper.insert("errors".to_string(), Value::Array(items));
            normalized.errors = errors_list(&wrapper);
        }
        ErrorBody::Other(_) => {}
        ErrorBody::Opaque(text) => {
            if !text.trim().is_empty() {
                normalized.raw = Some(text);
            }
        }
    }

    normalized
}

fn first_match<T>(
    matchers: &[fn(&Map<String, Value>) -> Option<T>],
    object: &Map<String, Value>,
) -> Option<T> {
    matchers.iter().find_map(|matcher| matcher(object))
}

fn field_errors(object: &Map<String, Value>) -> Option<FieldErrors> {
    first_match(FIELD_MATCHERS, object).or_else(|| {
        nested_error(object).and_then(|nested| first_match(NESTED_FIELD_MATCHERS, nested))
    })
}

fn nested_error(object: &Map<String, Value>) -> Option<&Map<String, Value>> {
    object.get("error").and_then(Value::as_object)
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// -----------------------------------------------------------------------------
// Message matchers
// -----------------------------------------------------------------------------

fn top_level_error(object: &Map<String, Value>) -> Option<String> {
    non_empty_string(object.get("error"))
}

fn top_level_message(object: &Map<String, Value>) -> Option<String> {
    non_empty_string(object.get("message"))
}

fn nested_error_message(object: &Map<String, Value>) -> Option<String> {
    nested_error(object).and_then(|nested| non_empty_string(nested.get("message")))
}

// -----------------------------------------------------------------------------
// Field error matchers
// -----------------------------------------------------------------------------

/// One entry of an `errors`/`fields`/`invalid_params` list. Entries are
/// decoded one at a time so a malformed neighbour never hides the rest.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListEntry {
    Text(String),
    Item {
        #[serde(default)]
        field: Option<String>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        message: Option<Value>,
        #[serde(default)]
        reason: Option<Value>,
    },
}

/// Message text of a list entry. Non-string values are kept as JSON text.
fn entry_text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        other => Some(other.to_string()),
    }
}

fn entry_field(field: Option<String>, name: Option<String>) -> String {
    field
        .or(name)
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| BASE_FIELD.to_string())
}

fn errors_object(object: &Map<String, Value>) -> Option<FieldErrors> {
    object_map(object, "errors")
}

fn fields_object(object: &Map<String, Value>) -> Option<FieldErrors> {
    object_map(object, "fields")
}

fn errors_list(object: &Map<String, Value>) -> Option<FieldErrors> {
    entry_list(object, "errors")
}

fn fields_list(object: &Map<String, Value>) -> Option<FieldErrors> {
    entry_list(object, "fields")
}

fn object_map(object: &Map<String, Value>, key: &str) -> Option<FieldErrors> {
    let map = object.get(key)?.as_object()?;
    if map.is_empty() {
        return None;
    }
    Some(
        map.iter()
            .map(|(field, value)| (field.clone(), FieldMessages::from_value(value)))
            .collect(),
    )
}

fn invalid_params(object: &Map<String, Value>) -> Option<FieldErrors> {
    let items = object.get("invalid_params")?.as_array()?;
    let mut errors = FieldErrors::new();
    for item in items {
        let Ok(ListEntry::Item {
            field,
            name,
            message,
            reason,
        }) = serde_json::from_value::<ListEntry>(item.clone())
        else {
            continue;
        };
        let reason = entry_text(reason).or_else(|| entry_text(message));
        if reason.is_none() && field.is_none() && name.is_none() {
            continue;
        }
        let reason = reason.unwrap_or_else(|| "is invalid".to_string());
        add_field_error(&mut errors, entry_field(field, name), reason);
    }
    (!errors.is_empty()).then_some(errors)
}

fn entry_list(object: &Map<String, Value>, key: &str) -> Option<FieldErrors> {
    let items = object.get(key)?.as_array()?;
    let mut errors = FieldErrors::new();
    for item in items {
        let Ok(entry) = serde_json::from_value::<ListEntry>(item.clone()) else {
            continue;
        };
        match entry {
            ListEntry::Text(text) => match text.split_once(':') {
                Some((field, message)) if !field.trim().is_empty() => {
                    add_field_error(&mut errors, field.trim(), message.trim());
                }
                _ => add_field_error(&mut errors, BASE_FIELD, text.trim()),
            },
            ListEntry::Item {
                field,
                name,
                message,
                reason,
            } => {
                let Some(message) = entry_text(message).or_else(|| entry_text(reason)) else {
                    continue;
                };
                add_field_error(&mut errors, entry_field(field, name), message);
            }
        }
    }
    (!errors.is_empty()).then_some(errors)
}

// -----------------------------------------------------------------------------
// Pass-through fields
// -----------------------------------------------------------------------------

fn scalar_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn passthrough(object: &Map<String, Value>, key: &str) -> Option<String> {
    scalar_string(object.get(key))
        .or_else(|| nested_error(object).and_then(|n| scalar_string(n.get(key))))
}
