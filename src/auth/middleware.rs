// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity middleware for Axum.
//!
//! Runs in front of every route except the public allow-list (the login
//! flow endpoints and the liveness probe). On success the resulting
//! [`IdentityContext`] is inserted into the request extensions; on failure the
//! request is answered with `401` before reaching a handler.
//!
//! ## Credential Order
//!
//! 1. `Authorization: Bearer <token>` is taken as an opaque access token. It
//!    is not validated here; handlers that need it present it to the IDP.
//! 2. Otherwise the ID-token cookie is verified against each configured key
//!    and must be accompanied by the access-token cookie, when one is configured.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use jsonwebtoken::{decode, errors::ErrorKind, Validation};
use tracing::{debug, warn};

use super::claims::{IdTokenClaims, IdentityContext};
use super::keys::SigningKeys;
use super::AuthError;
use crate::error::request_id_of;
use crate::state::AppState;

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Requests served without any identity.
pub fn is_public_route(method: &Method, path: &str) -> bool {
    *method == Method::GET && matches!(path, "/" | "/v1/auth" | "/v1/dropoff" | "/v1/logout")
}

/// Identity middleware function.
///
/// ```rust,ignore
/// let app = Router::new()
///     .route("/v1/userinfo", get(userinfo))
///     .layer(axum::middleware::from_fn_with_state(state.clone(), identity_middleware));
/// ```
pub async fn identity_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    if is_public_route(request.method(), request.uri().path()) {
        return next.run(request).await;
    }

    match authenticate(&state, request.headers(), &jar) {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(e) => {
            let request_id = request_id_of(request.headers());
            if e.is_anonymous() {
                debug!(path = %request.uri().path(), "Rejected request without credentials");
            } else {
                warn!(
                    path = %request.uri().path(),
                    error_code = e.error_code(),
                    error = %e,
                    "Rejected request with invalid credentials"
                );
            }
            e.to_api_error(request_id).into_response()
        }
    }
}

/// Build the identity for a request from its headers and cookies.
pub fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    jar: &CookieJar,
) -> Result<IdentityContext, AuthError> {
    if let Some(token) = bearer_token(headers) {
        return Ok(IdentityContext::from_bearer(token));
    }

    let oidc = &state.config.security.oidc;
    let id_token = jar
        .get(&oidc.id_token_cookie_name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(AuthError::MissingCredentials)?;

    let access_token = match &oidc.access_token_cookie_name {
        Some(name) => Some(
            jar.get(name)
                .map(|c| c.value().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(AuthError::MissingAccessToken)?,
        ),
        None => None,
    };

    let audience = oidc.allowed_audience.as_deref();
    let claims = verify_id_token(
        &id_token,
        &state.keys,
        audience,
        oidc.allowed_issuer.as_deref(),
    )?;

    Ok(IdentityContext::from_claims(claims, id_token, access_token, audience))
}

/// Token from an `Authorization: Bearer <token>` header.
///
/// Any other Authorization value (`Basic`, an empty bearer) is ignored so the
/// cookie pair can still identify the caller.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Verify an ID token against each key in turn.
///
/// Only a signature mismatch moves on to the next key. Once a key verifies the
/// signature, any claim failure (expiry, audience, issuer) is final. With an
/// allowed audience configured the token must name exactly that audience.
pub fn verify_id_token(
    token: &str,
    keys: &SigningKeys,
    audience: Option<&str>,
    issuer: Option<&str>,
) -> Result<IdTokenClaims, AuthError> {
    let mut validation = Validation::default();
    validation.algorithms = keys.algorithms().to_vec();
    validation.leeway = CLOCK_SKEW_LEEWAY;
    validation.set_required_spec_claims(&["exp", "sub"]);

    match audience {
        Some(aud) => validation.set_audience(&[aud]),
        None => validation.validate_aud = false,
    }
    if let Some(iss) = issuer {
        validation.set_issuer(&[iss]);
    }

    for key in keys.keys() {
        match decode::<IdTokenClaims>(token, key, &validation) {
            Ok(data) if audience.is_some() && data.claims.aud.len() != 1 => {
                return Err(AuthError::InvalidAudience);
            }
            Ok(data) => return Ok(data.claims),
            Err(e) if matches!(e.kind(), ErrorKind::InvalidSignature) => continue,
            Err(e) => return Err(AuthError::from(&e)),
        }
    }
    Err(AuthError::InvalidSignature)
}
