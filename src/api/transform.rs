// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request and response reshaping for the catalog routes.

use std::cmp::Ordering;

use serde_json::{Map, Value};
use url::form_urlencoded;

/// UI parameter name -> upstream parameter name.
const CONTENT_PARAM_RENAMES: &[(&str, &str)] = &[
    ("query", "q"),
    ("type", "game_type"),
    ("per_page", "page_size"),
    ("standard_set", "standard_set"),
    ("school_level", "school_level"),
];

const CONTENT_FLAGS: &[&str] = &["supports_tts", "supports_ipad"];

/// Rewrite the UI's content query into the upstream's parameter names.
///
/// Unknown parameters are dropped. `grades=k,1` becomes
/// `grade_levels=["k","1"]`; boolean flags are only sent when `true`.
pub fn content_query(raw: Option<&str>) -> String {
    let pairs: Vec<(String, String)> = form_urlencoded::parse(raw.unwrap_or_default().as_bytes())
        .into_owned()
        .collect();
    let first = |name: &str| {
        pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
            .filter(|value| !value.is_empty())
    };

    let mut out = form_urlencoded::Serializer::new(String::new());
    for (from, to) in CONTENT_PARAM_RENAMES {
        if let Some(value) = first(from) {
            out.append_pair(to, value);
        }
    }
    if let Some(grades) = first("grades") {
        let grades: Vec<&str> = grades.split(',').collect();
        out.append_pair("grade_levels", &Value::from(grades).to_string());
    }
    for flag in CONTENT_FLAGS {
        if first(flag) == Some("true") {
            out.append_pair(flag, "true");
        }
    }
    if let Some(page) = first("page") {
        out.append_pair("page", page);
    }
    out.finish()
}

/// Reshape each entry of a content listing: `audience`, `banner` and
/// `stat` are dropped, `grade_levels` and `stats` are added.
///
/// Bodies without an `entries` array are returned unchanged.
pub fn transform_content(mut body: Value) -> Value {
    let Some(entries) = body.get_mut("entries").and_then(Value::as_array_mut) else {
        return body;
    };
    for entry in entries.iter_mut() {
        if let Value::Object(fields) = entry {
            reshape_entry(fields);
        }
    }
    body
}

fn reshape_entry(fields: &mut Map<String, Value>) {
    let audience = fields.remove("audience");
    fields.remove("banner");
    let stat = fields.remove("stat");

    let mut grades: Vec<String> = audience
        .as_ref()
        .and_then(Value::as_object)
        .map(|audience| {
            audience
                .iter()
                .filter(|(_, enabled)| enabled.as_bool() == Some(true))
                .map(|(key, _)| grade_label(key))
                .collect()
        })
        .unwrap_or_default();
    grades.sort_by(|a, b| compare_grades(a, b));

    fields.insert("grade_levels".to_string(), Value::from(grades));
    if let Some(stat) = stat.filter(|s| !s.is_null()) {
        fields.insert("stats".to_string(), stat);
    }
}

/// `k` -> `K`, `g3` -> `3`.
fn grade_label(key: &str) -> String {
    if key == "k" {
        "K".to_string()
    } else {
        key.chars().skip(1).collect()
    }
}

/// Kindergarten first, then numeric grades, then anything else.
fn compare_grades(a: &str, b: &str) -> Ordering {
    fn rank(grade: &str) -> (u8, u32, &str) {
        match grade {
            "K" => (0, 0, grade),
            _ => match grade.parse::<u32>() {
                Ok(n) => (1, n, grade),
                Err(_) => (2, 0, grade),
            },
        }
    }
    rank(a).cmp(&rank(b))
}

/// Normalize search hits: `content_type` collapses to `standard` or
/// `content`, and `data.content_type` is renamed to the content model.
///
/// Bodies without a `hits` array are returned unchanged.
pub fn transform_search(mut body: Value) -> Value {
    let Some(hits) = body.get_mut("hits").and_then(Value::as_array_mut) else {
        return body;
    };
    for hit in hits.iter_mut() {
        if let Value::Object(fields) = hit {
            reshape_hit(fields);
        }
    }
    body
}

fn reshape_hit(fields: &mut Map<String, Value>) {
    let data = fields.remove("data");
    let kind = match fields.remove("content_type") {
        Some(Value::String(kind)) if kind == "standard" => "standard",
        _ => "content",
    };
    fields.insert("content_type".to_string(), Value::from(kind));

    let content = data
        .and_then(|mut data| data.get_mut("content_type").map(Value::take))
        .and_then(|content| match content {
            Value::Object(content) => Some(content),
            _ => None,
        });
    if let Some(content) = content {
        let mut wrapped = Map::new();
        wrapped.insert(
            "content_type".to_string(),
            Value::Object(rename_content_type(content)),
        );
        fields.insert("data".to_string(), Value::Object(wrapped));
    }
}

fn rename_content_type(mut content: Map<String, Value>) -> Map<String, Value> {
    let grades = content.remove("grades");
    let standard = content.remove("standard");
    let learning_objective = content.remove("learning_objective");
    let mut subject = match content.remove("subject") {
        Some(Value::Object(subject)) => subject,
        _ => Map::new(),
    };

    let renamed = [
        ("grade_levels", grades),
        ("standard_set", standard),
        ("standard", learning_objective),
    ];
    for (key, value) in renamed {
        if let Some(value) = value {
            content.insert(key.to_string(), value);
        }
    }

    if let Some(level) = subject.get("grade_level").cloned() {
        subject.insert("school_level".to_string(), level);
    }
    content.insert("subject".to_string(), Value::Object(subject));
    content
}
