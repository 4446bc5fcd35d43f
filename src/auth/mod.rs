// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Request-time identity for the gateway, plus the secrets used to start a
//! login flow.
//!
//! ## Auth Flow
//!
//! 1. `/v1/auth` generates `state` and a PKCE verifier ([`pkce`]) and sends the
//!    browser to the identity provider.
//! 2. `/v1/dropoff` exchanges the code and sets the ID-token and access-token
//!    cookies.
//! 3. Every later request passes through [`middleware::identity_middleware`]:
//!    - `Authorization: Bearer` is accepted as an opaque access token
//!    - otherwise the ID-token cookie is verified against the configured RSA
//!      keys (signature, expiry, issuer, audience)
//!
//! ## Security
//!
//! - All routes other than the login flow and `/` require identity
//! - Only RSA algorithms from the configured allow-list are accepted
//! - Clock skew tolerance is 60 seconds

pub mod claims;
pub mod error;
pub mod extractor;
pub mod groups;
pub mod keys;
pub mod middleware;
pub mod pkce;

pub use claims::IdentityContext;
pub use error::AuthError;
pub use extractor::Identity;
pub use keys::SigningKeys;
