// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Seed a Legends account with a teacher, students, an assignment and
//! join links.
//!
//! ```text
//! CLIENT_ID=... CLIENT_SECRET=... LEGENDS_API_URL=http://localhost:4000/api cargo run --bin seed
//! ```

use std::sync::Arc;

use legends_proxy::{
    config::{LogFormat, ProxyConfig},
    seed::{SeedOptions, Seeder},
    telemetry::init_tracing,
    upstream::{LegendsClient, ReqwestTransport},
};
use tracing::{error, info};

const SAMPLE_JOIN_LINKS: usize = 5;

#[tokio::main]
async fn main() {
    init_tracing(LogFormat::from_env());

    let config = match ProxyConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };
    if config.credentials.is_none() {
        error!("CLIENT_ID and CLIENT_SECRET must be set to seed");
        std::process::exit(1);
    }

    let transport = match ReqwestTransport::new(config.upstream_timeout) {
        Ok(transport) => transport,
        Err(e) => {
            error!("Failed to build upstream client: {e}");
            std::process::exit(1);
        }
    };
    let client = LegendsClient::new(Arc::new(transport), &config);

    let mut seeder = Seeder::new(&client, SeedOptions::from_env());
    let report = match seeder.run(&mut rand::rng()).await {
        Ok(report) => report,
        Err(e) => {
            error!(code = e.code(), "Seeding failed: {e}");
            std::process::exit(1);
        }
    };

    info!(
        teacher = %report.teacher_id,
        name = %report.teacher_name,
        students = report.students.len(),
        requested = report.students_requested,
        assignment = %report.assignment_id,
        joins = report.joins.len(),
        "Seeding complete"
    );
    for join in report.joins.iter().take(SAMPLE_JOIN_LINKS) {
        info!(
            student = %join.student,
            join_url = join.join_url.as_deref().unwrap_or("(no url)"),
            "Join link"
        );
    }
}
