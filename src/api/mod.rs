// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{
        CreateAssignmentRequest, CreateJoinRequest, LoginRequest, LoginResponse, SessionResponse,
        SuccessResponse,
    },
    state::AppState,
};

pub mod assignments;
pub mod auth;
pub mod catalog;
pub mod health;
pub mod proxy;
pub mod transform;

/// Build the application router.
///
/// Typed routes handle the methods they document; any other method on
/// those paths, and every other `/api/*` path, goes to the generic proxy.
pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route(
            "/api/auth",
            post(auth::login)
                .delete(auth::logout)
                .fallback(proxy::forward),
        )
        .route(
            "/api/auth/login",
            post(auth::login).fallback(proxy::forward),
        )
        .route(
            "/api/auth/logout",
            post(auth::logout).fallback(proxy::forward),
        )
        .route(
            "/api/auth/session",
            get(auth::session).fallback(proxy::forward),
        )
        .route(
            "/api/content",
            get(catalog::list_content).fallback(proxy::forward),
        )
        .route(
            "/api/searches",
            get(catalog::search).fallback(proxy::forward),
        )
        .route(
            "/api/assignments",
            get(assignments::list_assignments)
                .post(assignments::create_assignment)
                .fallback(proxy::forward),
        )
        .route(
            "/api/assignments/{id}/joins",
            post(assignments::create_join).fallback(proxy::forward),
        )
        .route(
            "/api/standard_sets/standards/{id}",
            get(catalog::get_standard).fallback(proxy::forward),
        )
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .fallback(proxy::forward)
        .with_state(state);

    Router::new()
        .merge(routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::login,
        auth::logout,
        auth::session,
        catalog::list_content,
        catalog::search,
        catalog::get_standard,
        assignments::list_assignments,
        assignments::create_assignment,
        assignments::create_join,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            LoginRequest,
            LoginResponse,
            SuccessResponse,
            SessionResponse,
            CreateAssignmentRequest,
            CreateJoinRequest,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Auth", description = "Token cookie lifecycle"),
        (name = "Catalog", description = "Content, search and standards"),
        (name = "Assignments", description = "Assignments and join links"),
        (name = "Health", description = "Probes")
    )
)]
struct ApiDoc;
