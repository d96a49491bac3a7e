// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{body::Bytes, extract::State, Json};
use axum_extra::extract::cookie::CookieJar;
use tracing::info;

use crate::{
    auth::{ClientCredentials, TokenStore},
    error::ProxyError,
    models::{LoginRequest, LoginResponse, SessionResponse, SuccessResponse},
    state::AppState,
};

/// Parse the optional login body. An empty body means "use the server's
/// credentials".
fn parse_login(body: &[u8]) -> Result<LoginRequest, ProxyError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(LoginRequest::default());
    }
    // The serde message can echo input, so it is not surfaced.
    serde_json::from_slice(body)
        .map_err(|_| ProxyError::validation("Login body must be a JSON object"))
}

/// Body value if present and non-blank, otherwise the server's.
fn pick<'a>(body: Option<&'a str>, server: Option<&'a str>) -> Option<&'a str> {
    body.filter(|v| !v.trim().is_empty()).or(server)
}

/// Merge body credentials with the server's, field by field.
fn resolve_credentials(
    request: &LoginRequest,
    server: Option<&ClientCredentials>,
) -> Option<ClientCredentials> {
    ClientCredentials::from_parts(
        pick(request.client_id.as_deref(), server.map(|c| c.client_id.as_str())),
        pick(request.client_secret.as_deref(), server.map(ClientCredentials::client_secret)),
    )
}

#[utoipa::path(
    post,
    path = "/api/auth",
    tag = "Auth",
    request_body(content = LoginRequest, description = "Optional client credentials"),
    responses(
        (status = 200, description = "Token cookie set", body = LoginResponse),
        (status = 400, description = "No credentials available"),
        (status = 401, description = "Credentials rejected upstream")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Bytes,
) -> Result<(CookieJar, Json<LoginResponse>), ProxyError> {
    let request = parse_login(&body)?;

    let credentials = resolve_credentials(&request, state.client.server_credentials())
        .ok_or(ProxyError::MissingCredentials)?;

    let grant = state.client.acquire_token(&credentials).await?;
    let expires_in = grant.expires_in;

    let mut store = state.token_store(jar);
    store.set(grant.into_token());

    info!(expires_in, "Login succeeded");
    Ok((
        store.into_jar(),
        Json(LoginResponse {
            success: true,
            expires_in,
        }),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/auth",
    tag = "Auth",
    responses(
        (status = 200, description = "Token cookie cleared", body = SuccessResponse)
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<SuccessResponse>) {
    let mut store = state.token_store(jar);
    if let Some(token) = store.get() {
        state.client.revoke_token(&token).await;
    }
    store.clear();

    info!("Logged out");
    (store.into_jar(), Json(SuccessResponse { success: true }))
}

#[utoipa::path(
    get,
    path = "/api/auth/session",
    tag = "Auth",
    responses(
        (status = 200, description = "Whether a token cookie is present", body = SessionResponse)
    )
)]
pub async fn session(State(state): State<AppState>, jar: CookieJar) -> Json<SessionResponse> {
    let authenticated = state.token_store(jar).get().is_some();
    Json(SessionResponse { authenticated })
}
