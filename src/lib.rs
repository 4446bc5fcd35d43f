// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Auth Gateway - OpenID Connect login broker
//!
//! Runs the Authorization Code flow with PKCE (S256) against a remote identity
//! provider on behalf of statically configured applications, sets the
//! resulting tokens as cookies and re-validates identity on every request.
//!
//! ## Modules
//!
//! - `api` - HTTP handlers and router (Axum)
//! - `auth` - PKCE secrets, ID-token verification and the identity middleware
//! - `config` - YAML configuration and validation
//! - `idp` - Identity provider client with timeouts, circuit breaking and caching
//! - `storage` - In-memory store of pending authentication flows

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod idp;
pub mod logging;
pub mod models;
pub mod state;
pub mod storage;

#[cfg(test)]
mod test_support;
