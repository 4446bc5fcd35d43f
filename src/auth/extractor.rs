// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for the request identity.
//!
//! ```rust,ignore
//! async fn my_handler(Identity(identity): Identity) -> impl IntoResponse {
//!     // identity is IdentityContext
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};

use super::{AuthError, IdentityContext};
use crate::error::{request_id_of, ApiError};

/// Identity placed in the request extensions by the identity middleware.
///
/// Rejects with `401` when the middleware did not run for this route, so a
/// handler can never observe an unauthenticated caller.
pub struct Identity(pub IdentityContext);

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<IdentityContext>()
            .cloned()
            .map(Identity)
            .ok_or_else(|| AuthError::MissingCredentials.to_api_error(request_id_of(&parts.headers)))
    }
}
