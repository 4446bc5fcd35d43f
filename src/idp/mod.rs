// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Identity Provider Gateway
//!
//! Outbound calls to the OIDC identity provider: authorization-code exchange,
//! userinfo lookup and token introspection.
//!
//! ## Resilience
//!
//! - every call is bounded by `token_request_timeout_seconds`
//! - each command has its own circuit breaker ([`circuit_breaker`])
//! - successful userinfo answers can be cached per access token ([`cache`])
//! - nothing is retried automatically

pub mod cache;
pub mod circuit_breaker;
pub mod client;
pub mod error;
pub mod types;

pub use client::IdpClient;
pub use error::IdpError;
pub use types::{IntrospectionData, TokenResponse, UserinfoData};
