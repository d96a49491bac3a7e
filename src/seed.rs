// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Demo Data Seeding
//!
//! Populates a Legends account with a small classroom so the showcase UI
//! has something to show:
//!
//! 1. Mint a token from the server-side client credentials
//! 2. Pick a standard (from the first standard set) and up to three games
//! 3. Create a teacher and `SEED_STUDENT_COUNT` students
//! 4. Create one assignment for the teacher
//! 5. Create a join link per student
//!
//! A student or join link that fails is logged and skipped. Any other
//! failure aborts the run.

use std::time::Duration;

use axum::http::Method;
use chrono::Utc;
use rand::{seq::IndexedRandom, Rng};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{
    auth::{MemoryTokenStore, TokenStore},
    config::{env_optional, parse_or, SEED_STUDENT_COUNT_ENV},
    error::ProxyError,
    normalize::normalize,
    upstream::{versioned_path, LegendsClient, ProxyRequest},
};

pub const DEFAULT_STUDENT_COUNT: usize = 24;

const CONTENT_PICKS: usize = 3;
const CONTENT_ACTIVITIES: usize = 2;
const JOIN_TARGET: &str = "awakening";
const LISTING_QUERY: &str = "page=1&page_size=100";
const CONTENT_QUERY: &str = "page=1&per_page=50";

const FIRST_NAMES: &[&str] = &[
    "Alex", "Sam", "Jordan", "Taylor", "Casey", "Riley", "Quinn", "Avery", "Jamie", "Morgan",
    "Cameron", "Rowan", "Charlie", "Drew",
];
const LAST_NAMES: &[&str] = &[
    "Rivera", "Patel", "Nguyen", "Smith", "Johnson", "Lee", "O'Neil", "Khan", "Garcia", "Lopez",
    "Martin", "Kim", "Brown", "Clark",
];

/// Knobs for one seeding run.
#[derive(Debug, Clone)]
pub struct SeedOptions {
    pub student_count: usize,
    /// Pause after creating the teacher.
    pub teacher_pause: Duration,
    /// Pause after each student attempt.
    pub student_pause: Duration,
    /// Pause after each join link attempt.
    pub join_pause: Duration,
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self {
            student_count: DEFAULT_STUDENT_COUNT,
            teacher_pause: Duration::from_millis(100),
            student_pause: Duration::from_millis(50),
            join_pause: Duration::from_millis(25),
        }
    }
}

impl SeedOptions {
    pub fn from_env() -> Self {
        Self {
            student_count: parse_or(
                SEED_STUDENT_COUNT_ENV,
                env_optional(SEED_STUDENT_COUNT_ENV),
                DEFAULT_STUDENT_COUNT,
            ),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PickedStandard {
    pub id: Value,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PickedContent {
    pub id: Value,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinLink {
    pub student: String,
    pub join_url: Option<String>,
}

/// Outcome of a seeding run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeedReport {
    pub teacher_id: String,
    pub teacher_name: String,
    pub standard: PickedStandard,
    pub content: Vec<PickedContent>,
    pub students_requested: usize,
    /// Application user ids of the students that were created.
    pub students: Vec<String>,
    pub assignment_id: String,
    pub joins: Vec<JoinLink>,
}

/// Application user ids shared by one run.
struct RunIds {
    stamp: i64,
    suffix: u16,
}

impl RunIds {
    fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            stamp: Utc::now().timestamp_millis(),
            suffix: rng.random_range(0..10_000),
        }
    }

    fn teacher(&self) -> String {
        format!("seed-teacher-{}-{:04}", self.stamp, self.suffix)
    }

    fn student(&self, n: usize) -> String {
        format!("seed-student-{}-{:02}", self.stamp, n)
    }
}

fn random_name<R: Rng + ?Sized>(rng: &mut R) -> (&'static str, &'static str) {
    (
        FIRST_NAMES.choose(rng).copied().unwrap_or("Alex"),
        LAST_NAMES.choose(rng).copied().unwrap_or("Rivera"),
    )
}

/// Ids arrive as numbers or numeric strings.
fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn numeric_id(value: &Value) -> Value {
    match value {
        Value::Number(_) => value.clone(),
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map(Value::from)
            .unwrap_or_else(|_| value.clone()),
        _ => value.clone(),
    }
}

fn list<'v>(body: &'v Value, key: &str) -> &'v [Value] {
    body.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn text(entry: &Value, key: &str) -> Option<String> {
    entry.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Drives one seeding run against the Legends API.
pub struct Seeder<'a> {
    client: &'a LegendsClient,
    store: MemoryTokenStore,
    options: SeedOptions,
}

impl<'a> Seeder<'a> {
    pub fn new(client: &'a LegendsClient, options: SeedOptions) -> Self {
        Self {
            client,
            store: MemoryTokenStore::new(),
            options,
        }
    }

    pub async fn run<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<SeedReport, ProxyError> {
        let client = self.client;
        let credentials = client
            .server_credentials()
            .ok_or(ProxyError::MissingCredentials)?;
        info!(
            client = %credentials.redacted_id(),
            api = %format!("{}/{}", client.api_url(), client.api_version()),
            "Seeding Legends API"
        );

        let grant = client.acquire_token(credentials).await?;
        self.store.set(grant.into_token());

        let standard = self.pick_standard(rng).await.inspect_err(|error| {
            warn!(error = %error, "Standard selection failed");
        })?;
        let content = match self.pick_content(CONTENT_PICKS).await {
            Ok(content) => content,
            Err(error) => {
                warn!(error = %error, "Content selection failed; continuing without games");
                Vec::new()
            }
        };
        info!(standard = ?standard.id, content = content.len(), "Picked activities");

        let ids = RunIds::new(rng);
        let teacher_id = ids.teacher();
        let (first, last) = random_name(rng);
        self.create_user("teacher", first, last, &teacher_id).await?;
        info!(teacher = %teacher_id, "Created teacher");
        sleep(self.options.teacher_pause).await;

        let mut students = Vec::new();
        for n in 1..=self.options.student_count {
            let student_id = ids.student(n);
            let (first, last) = random_name(rng);
            match self.create_user("student", first, last, &student_id).await {
                Ok(created) => {
                    students.push(text(&created, "application_user_id").unwrap_or(student_id));
                }
                Err(error) => {
                    warn!(student = %student_id, error = %error, "Failed to create student");
                }
            }
            sleep(self.options.student_pause).await;
        }
        info!(
            created = students.len(),
            requested = self.options.student_count,
            "Created students"
        );

        let assignment_id = self.create_assignment(&teacher_id, &standard, &content).await?;
        info!(assignment = %assignment_id, "Created assignment");

        let mut joins = Vec::new();
        for student in &students {
            let path = format!("assignments/{assignment_id}/joins");
            let body = json!({ "application_user_id": student, "target": JOIN_TARGET });
            match self.post(&path, &body).await {
                Ok(created) => joins.push(JoinLink {
                    student: student.clone(),
                    join_url: text(&created, "join_url"),
                }),
                Err(error) => {
                    warn!(student = %student, error = %error, "Join link failed");
                }
            }
            sleep(self.options.join_pause).await;
        }

        Ok(SeedReport {
            teacher_id,
            teacher_name: format!("{first} {last}"),
            standard,
            content,
            students_requested: self.options.student_count,
            students,
            assignment_id,
            joins,
        })
    }

    async fn pick_standard<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
    ) -> Result<PickedStandard, ProxyError> {
        let sets = self.get("standard_sets", LISTING_QUERY).await?;
        let set_id = list(&sets, "results")
            .first()
            .and_then(|set| set.get("id"))
            .and_then(id_text)
            .ok_or_else(|| ProxyError::Protocol("no standard sets available".to_string()))?;

        let path = format!("standard_sets/{set_id}/standards");
        let standards = self.get(&path, LISTING_QUERY).await?;
        let chosen = list(&standards, "entries")
            .choose(rng)
            .ok_or_else(|| ProxyError::Protocol(format!("standard set {set_id} is empty")))?;

        Ok(PickedStandard {
            id: chosen.get("id").cloned().unwrap_or(Value::Null),
            label: text(chosen, "standard"),
        })
    }

    async fn pick_content(&mut self, limit: usize) -> Result<Vec<PickedContent>, ProxyError> {
        let page = self.get("content", CONTENT_QUERY).await?;
        Ok(list(&page, "entries")
            .iter()
            .filter(|entry| {
                text(entry, "content_type").is_none_or(|t| !t.eq_ignore_ascii_case("video"))
            })
            .take(limit)
            .map(|entry| PickedContent {
                id: entry.get("id").cloned().unwrap_or(Value::Null),
                name: text(entry, "game"),
            })
            .collect())
    }

    async fn create_user(
        &mut self,
        role: &str,
        first_name: &str,
        last_name: &str,
        application_user_id: &str,
    ) -> Result<Value, ProxyError> {
        let body = json!({
            "role": role,
            "first_name": first_name,
            "last_name": last_name,
            "application_user_id": application_user_id,
        });
        self.post("users", &body).await
    }

    async fn create_assignment(
        &mut self,
        teacher_id: &str,
        standard: &PickedStandard,
        content: &[PickedContent],
    ) -> Result<String, ProxyError> {
        let mut activities = vec![json!({ "standard_id": numeric_id(&standard.id) })];
        activities.extend(
            content
                .iter()
                .take(CONTENT_ACTIVITIES)
                .map(|c| json!({ "content_id": numeric_id(&c.id) })),
        );

        let name = format!("Seed Assignment {}", Utc::now().format("%Y-%m-%d %H:%M:%S"));
        let body = json!({
            "application_user_id": teacher_id,
            "name": name,
            "activities": activities,
        });
        let created = self.post("assignments", &body).await?;
        created
            .get("assignment_id")
            .and_then(id_text)
            .ok_or_else(|| {
                ProxyError::Protocol("assignment creation did not return assignment_id".to_string())
            })
    }

    async fn get(&mut self, path: &str, query: &str) -> Result<Value, ProxyError> {
        let request =
            ProxyRequest::get(versioned_path(path, self.client.api_version())).with_query(query);
        let response = self.client.send(&request, &mut self.store).await?;
        if !response.status.is_success() {
            return Err(ProxyError::Upstream(format!(
                "GET {path} failed: {}",
                response.status
            )));
        }
        response
            .json()
            .map_err(|e| ProxyError::Protocol(format!("GET {path} returned invalid JSON: {e}")))
    }

    /// POST a JSON body. A success without a JSON body reads as `{}`.
    async fn post(&mut self, path: &str, body: &Value) -> Result<Value, ProxyError> {
        let request = ProxyRequest::new(
            Method::POST,
            versioned_path(path, self.client.api_version()),
        )
        .with_json(body)?;
        let response = self.client.send(&request, &mut self.store).await?;
        if !response.status.is_success() {
            let detail = normalize(response.status, &response.headers, &response.body);
            return Err(ProxyError::Upstream(format!(
                "POST {path} failed: {}: {}",
                response.status, detail.message
            )));
        }
        debug!(path, status = response.status.as_u16(), "Seed request succeeded");
        Ok(response
            .json()
            .unwrap_or_else(|_| Value::Object(Map::new())))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::{
        state::test_support::test_config,
        upstream::{transport::fake::FakeTransport, UpstreamRequest},
    };

    fn unpaced(student_count: usize) -> SeedOptions {
        SeedOptions {
            student_count,
            teacher_pause: Duration::ZERO,
            student_pause: Duration::ZERO,
            join_pause: Duration::ZERO,
        }
    }

    fn body(request: &UpstreamRequest) -> Value {
        serde_json::from_slice(request.body.as_ref().unwrap()).unwrap()
    }

    fn script_catalog(fake: &FakeTransport) {
        fake.push_token("seed-tok", 7200);
        fake.push_json(200, json!({ "results": [{ "id": 7, "name": "CCSS Math" }] }));
        fake.push_json(
            200,
            json!({ "entries": [{ "id": "42", "standard": "3.NF.A.1" }] }),
        );
        fake.push_json(
            200,
            json!({ "entries": [
                { "id": 1, "content_type": "Video", "game": "Watch" },
                { "id": 2, "content_type": "game", "game": "Fraction Frenzy" },
                { "id": 3, "game": "Pie Party" },
                { "id": 4, "content_type": "game", "game": "Extra" }
            ] }),
        );
    }

    #[tokio::test]
    async fn seeds_classroom_and_skips_failed_students_and_joins() {
        let fake = Arc::new(FakeTransport::new());
        script_catalog(&fake);
        fake.push_json(201, json!({ "id": 1 }));
        fake.push_json(201, json!({}));
        fake.push_json(422, json!({ "errors": { "first_name": ["is taken"] } }));
        fake.push_json(201, json!({ "application_user_id": "student-three" }));
        fake.push_json(201, json!({ "assignment_id": 99 }));
        fake.push_json(201, json!({ "join_url": "https://play.test/join/1" }));
        fake.push_json(500, json!({ "error": "boom" }));

        let client = LegendsClient::new(fake.clone(), &test_config(true));
        let mut seeder = Seeder::new(&client, unpaced(3));
        let report = seeder.run(&mut StdRng::seed_from_u64(7)).await.unwrap();

        let calls = fake.api_calls();
        let paths: Vec<&str> = calls
            .iter()
            .map(|c| c.url.trim_start_matches("https://legends.test/api/"))
            .collect();
        assert_eq!(
            paths,
            [
                "v3/standard_sets?page=1&page_size=100",
                "v3/standard_sets/7/standards?page=1&page_size=100",
                "v3/content?page=1&per_page=50",
                "v3/users",
                "v3/users",
                "v3/users",
                "v3/users",
                "v3/assignments",
                "v3/assignments/99/joins",
                "v3/assignments/99/joins",
            ]
        );
        assert_eq!(fake.token_calls().len(), 1);
        assert!(calls
            .iter()
            .all(|c| c.headers["authorization"] == "Bearer seed-tok"));

        let teacher = body(&calls[3]);
        assert_eq!(teacher["role"], "teacher");
        assert_eq!(teacher["application_user_id"], report.teacher_id.as_str());
        assert!(report.teacher_id.starts_with("seed-teacher-"));

        let first_student = body(&calls[4]);
        assert_eq!(first_student["role"], "student");
        let first_id = first_student["application_user_id"].as_str().unwrap();
        assert!(first_id.starts_with("seed-student-") && first_id.ends_with("-01"));
        assert_eq!(report.students, [first_id, "student-three"]);
        assert_eq!(report.students_requested, 3);

        let assignment = body(&calls[7]);
        assert_eq!(assignment["application_user_id"], report.teacher_id.as_str());
        assert_eq!(
            assignment["activities"],
            json!([{ "standard_id": 42 }, { "content_id": 2 }, { "content_id": 3 }])
        );
        assert!(assignment["name"]
            .as_str()
            .unwrap()
            .starts_with("Seed Assignment "));
        assert_eq!(report.assignment_id, "99");
        assert_eq!(report.content.len(), 3);
        assert_eq!(report.standard.label.as_deref(), Some("3.NF.A.1"));

        assert_eq!(
            body(&calls[8]),
            json!({ "application_user_id": first_id, "target": "awakening" })
        );
        assert_eq!(
            report.joins,
            [JoinLink {
                student: first_id.to_string(),
                join_url: Some("https://play.test/join/1".to_string()),
            }]
        );
    }

    #[tokio::test]
    async fn content_failure_still_seeds_with_the_standard() {
        let fake = Arc::new(FakeTransport::new());
        fake.push_token("seed-tok", 7200);
        fake.push_json(200, json!({ "results": [{ "id": "set-1" }] }));
        fake.push_json(200, json!({ "entries": [{ "id": 5, "standard": "K.CC.1" }] }));
        fake.push_json(503, json!({ "error": "catalog offline" }));
        fake.push_json(201, json!({}));
        fake.push_json(201, json!({ "assignment_id": "a-1" }));

        let client = LegendsClient::new(fake.clone(), &test_config(true));
        let report = Seeder::new(&client, unpaced(0))
            .run(&mut StdRng::seed_from_u64(1))
            .await
            .unwrap();

        assert!(report.content.is_empty());
        assert!(report.students.is_empty());
        assert!(report.joins.is_empty());
        let calls = fake.api_calls();
        assert!(calls[1].url.contains("/v3/standard_sets/set-1/standards"));
        assert_eq!(body(&calls[4])["activities"], json!([{ "standard_id": 5 }]));
    }

    #[tokio::test]
    async fn missing_server_credentials_abort_before_any_call() {
        let fake = Arc::new(FakeTransport::new());
        let client = LegendsClient::new(fake.clone(), &test_config(false));

        let err = Seeder::new(&client, unpaced(2))
            .run(&mut StdRng::seed_from_u64(1))
            .await
            .unwrap_err();

        assert!(matches!(err, ProxyError::MissingCredentials));
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn teacher_failure_aborts_the_run() {
        let fake = Arc::new(FakeTransport::new());
        script_catalog(&fake);
        fake.push_json(409, json!({ "error": "duplicate application_user_id" }));

        let client = LegendsClient::new(fake.clone(), &test_config(true));
        let err = Seeder::new(&client, unpaced(2))
            .run(&mut StdRng::seed_from_u64(1))
            .await
            .unwrap_err();

        match err {
            ProxyError::Upstream(message) => {
                assert!(message.contains("POST users failed"), "{message}");
                assert!(message.contains("duplicate application_user_id"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(fake.api_calls().len(), 4);
    }

    #[tokio::test]
    async fn empty_standard_set_is_fatal() {
        let fake = Arc::new(FakeTransport::new());
        fake.push_token("seed-tok", 7200);
        fake.push_json(200, json!({ "results": [{ "id": 7 }] }));
        fake.push_json(200, json!({ "entries": [] }));

        let client = LegendsClient::new(fake.clone(), &test_config(true));
        let err = Seeder::new(&client, unpaced(1))
            .run(&mut StdRng::seed_from_u64(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Protocol(_)));
    }

    #[test]
    fn ids_are_normalized_for_activities() {
        assert_eq!(numeric_id(&json!("42")), json!(42));
        assert_eq!(numeric_id(&json!(7)), json!(7));
        assert_eq!(numeric_id(&json!("std-9")), json!("std-9"));
        assert_eq!(id_text(&json!(99)).as_deref(), Some("99"));
        assert!(id_text(&json!(null)).is_none());
    }
}
