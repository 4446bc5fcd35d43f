// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity endpoints.
//!
//! `/v1/userinfo` asks the identity provider who the access token belongs to
//! and cross-checks the answer against the locally verified ID token.
//! `/v1/frontend-userinfo` answers from the ID token alone.

use axum::{extract::State, Json};
use tracing::warn;

use crate::{
    auth::{groups::filter_relevant_groups, groups::unconfirmed_groups, Identity, IdentityContext},
    error::{ApiError, ErrorKind, RequestId},
    idp::{IdpError, UserinfoData},
    models::UserInfoResponse,
    state::AppState,
};

const IDP_REJECTED: &str = "identity provider rejected your token - see log for details";
const IDP_UNREACHABLE: &str = "identity provider could not be reached - see log for details";
const IDP_ERROR_STATUS: &str = "identity provider returned error status - see log for details";

/// Identity confirmed live by the identity provider.
#[utoipa::path(
    get,
    path = "/v1/userinfo",
    tag = "Identity",
    responses(
        (status = 200, body = UserInfoResponse),
        (status = 401, description = "Missing, invalid or rejected credentials", body = crate::error::ErrorBody),
        (status = 502, description = "Identity provider unavailable", body = crate::error::ErrorBody)
    )
)]
pub async fn userinfo(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    Identity(identity): Identity,
) -> Result<Json<UserInfoResponse>, ApiError> {
    if !state.idp.has_userinfo_endpoint() {
        warn!("No userinfo endpoint configured, answering from local claims");
        return local_userinfo(&state, &identity, request_id).map(Json);
    }

    let Some(access_token) = identity.access_token.as_deref() else {
        return Err(ApiError::unauthorized("no access token provided", request_id));
    };

    if state.idp.has_introspection_endpoint() {
        let introspection = state
            .idp
            .introspect(access_token)
            .await
            .map_err(|e| idp_failure(e, &request_id))?;
        if !introspection.active {
            warn!(subject = %identity.subject, "Access token reported inactive by introspection");
            return Err(ApiError::upstream_rejected(IDP_REJECTED, request_id));
        }
    }

    let data = state
        .idp
        .fetch_userinfo(access_token)
        .await
        .map_err(|e| idp_failure(e, &request_id))?;

    if identity.has_verified_id_token() {
        cross_check(&state, &identity, &data, &request_id)?;
    }

    let relevant = &state.config.security.oidc.relevant_groups;
    let audiences = if data.audience.is_empty() {
        configured_audience(&state, &identity)
    } else {
        data.audience
    };

    Ok(Json(UserInfoResponse {
        audiences,
        groups: filter_relevant_groups(&data.groups, &data.sub, relevant),
        subject: data.sub,
        name: data.name,
        email: data.email,
        email_verified: data.email_verified,
    }))
}

/// Identity from the locally verified ID token, without an IDP round trip.
#[utoipa::path(
    get,
    path = "/v1/frontend-userinfo",
    tag = "Identity",
    responses(
        (status = 200, body = UserInfoResponse),
        (status = 401, description = "Missing or invalid identity cookies", body = crate::error::ErrorBody)
    )
)]
pub async fn frontend_userinfo(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    Identity(identity): Identity,
) -> Result<Json<UserInfoResponse>, ApiError> {
    local_userinfo(&state, &identity, request_id).map(Json)
}

fn local_userinfo(
    state: &AppState,
    identity: &IdentityContext,
    request_id: String,
) -> Result<UserInfoResponse, ApiError> {
    let access_required = state.config.security.oidc.access_token_cookie_name.is_some();
    if !identity.has_verified_id_token() || (access_required && identity.access_token.is_none()) {
        return Err(ApiError::unauthorized(
            "local userinfo requires the identity and access token cookies",
            request_id,
        ));
    }

    let relevant = &state.config.security.oidc.relevant_groups;
    Ok(UserInfoResponse {
        audiences: configured_audience(state, identity),
        subject: identity.subject.clone(),
        name: identity.name.clone(),
        email: identity.email.clone(),
        email_verified: identity.email_verified,
        groups: filter_relevant_groups(&identity.groups, &identity.subject, relevant),
    })
}

/// The IDP answer must describe the same person the ID token does.
fn cross_check(
    state: &AppState,
    identity: &IdentityContext,
    data: &UserinfoData,
    request_id: &str,
) -> Result<(), ApiError> {
    if data.sub != identity.subject {
        warn!(
            local_subject = %identity.subject,
            idp_subject = %data.sub,
            "Userinfo subject does not match ID token"
        );
        return Err(ApiError::upstream_rejected(IDP_REJECTED, request_id));
    }
    if data.email != identity.email {
        warn!(subject = %identity.subject, "Userinfo email does not match ID token");
        return Err(ApiError::upstream_rejected(IDP_REJECTED, request_id));
    }

    let relevant = &state.config.security.oidc.relevant_groups;
    let unconfirmed = unconfirmed_groups(&identity.groups, &data.groups, relevant);
    if !unconfirmed.is_empty() {
        warn!(
            subject = %identity.subject,
            groups = ?unconfirmed,
            "Groups claimed by ID token not confirmed by identity provider"
        );
        return Err(ApiError::upstream_rejected(IDP_REJECTED, request_id));
    }
    Ok(())
}

fn configured_audience(state: &AppState, identity: &IdentityContext) -> Vec<String> {
    state
        .config
        .security
        .oidc
        .allowed_audience
        .clone()
        .or_else(|| identity.audience.clone())
        .into_iter()
        .collect()
}

fn idp_failure(e: IdpError, request_id: &str) -> ApiError {
    warn!(error = %e, "Userinfo lookup failed");
    match e {
        IdpError::Rejected { .. } => ApiError::upstream_rejected(IDP_REJECTED, request_id),
        IdpError::Status { .. } => ApiError::upstream_unavailable(IDP_ERROR_STATUS, request_id),
        IdpError::Unavailable(_) | IdpError::InvalidResponse(_) => {
            ApiError::upstream_unavailable(IDP_UNREACHABLE, request_id)
        }
        IdpError::NotConfigured(_) => ApiError::new(ErrorKind::Internal, "internal error", request_id),
    }
}
