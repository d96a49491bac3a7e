// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Upstream Module
//!
//! Everything that talks to the Legends API:
//!
//! - `transport` - the HTTP seam (`reqwest` in production, scripted in tests)
//! - `retry` - bounded exponential backoff for connection resets
//! - `client` - token grant/revoke and authenticated forwarding

pub mod client;
pub mod retry;
pub mod transport;

pub use client::{versioned_path, LegendsClient, ProxyRequest, ProxyStage, TokenGrant};
pub use retry::RetryPolicy;
pub use transport::{ReqwestTransport, Transport, TransportError, UpstreamRequest, UpstreamResponse};
