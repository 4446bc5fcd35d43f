// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    response::Response,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use tracing::{error, info, warn};
use utoipa::IntoParams;

use super::error_page::FlowError;
use super::found;
use crate::{
    error::{ErrorKind, RequestId},
    state::AppState,
    storage::StorageError,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct DropoffParams {
    pub state: Option<String>,
    /// Authorization code, present on success.
    pub code: Option<String>,
    /// Set by the identity provider when it refused the login.
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Complete a flow: redeem the code, set the session cookies and return the
/// browser to where it started.
#[utoipa::path(
    get,
    path = "/v1/dropoff",
    params(DropoffParams),
    tag = "Flow",
    responses(
        (status = 302, description = "Cookies set, redirect to the return URL"),
        (status = 400, description = "Missing parameters or login refused by the identity provider"),
        (status = 404, description = "Unknown or expired flow"),
        (status = 500, description = "Flow refers to an application no longer configured"),
        (status = 502, description = "Identity provider unreachable")
    )
)]
pub async fn complete_auth(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    jar: CookieJar,
    params: Result<Query<DropoffParams>, QueryRejection>,
) -> Result<(CookieJar, Response), FlowError> {
    let params = params.map(|Query(p)| p).unwrap_or_default();

    let Some(flow_state) = params.state.filter(|s| !s.is_empty()) else {
        return Err(FlowError::invalid_parameters(request_id));
    };

    let flow = state.flows.consume(&flow_state).map_err(|e| match e {
        StorageError::NotFound(_) | StorageError::Expired(_) => {
            info!(error = %e, "Dropoff for unknown flow");
            FlowError::new(
                ErrorKind::NotFound,
                "auth request not found or timed out",
                request_id.as_str(),
            )
            .retry(state.config.service.error_url.as_deref())
        }
        _ => {
            error!(error = %e, "Failed to read pending flow");
            FlowError::new(ErrorKind::Internal, "internal error", request_id.as_str())
        }
    })?;

    let Some(app) = state.config.application(&flow.application) else {
        error!(application = %flow.application, "Pending flow refers to unknown application");
        return Err(FlowError::new(ErrorKind::Internal, "internal error", request_id));
    };
    let retry = Some(app.default_dropoff_url.as_str());

    if let Some(idp_error) = params.error.filter(|e| !e.is_empty()) {
        let description = params.error_description.unwrap_or_default();
        warn!(
            application = %flow.application,
            error = %idp_error,
            description = %description,
            "Identity provider refused the login"
        );
        return Err(FlowError::new(
            ErrorKind::BadRequest,
            format!("{idp_error}: {description}"),
            request_id,
        )
        .retry(retry));
    }

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        return Err(FlowError::invalid_parameters(request_id).retry(retry));
    };

    let tokens = state
        .idp
        .exchange_code(app, &code, &flow.pkce_verifier)
        .await
        .map_err(|e| FlowError::with_status(e.status(), "failed to fetch token", request_id.as_str()).retry(retry))?;

    let policy = state.cookie_policy;
    let mut jar = jar.add(policy.session_cookie(&app.cookie_name, &tokens.id_token, app));
    if let Some(name) = &state.config.security.oidc.access_token_cookie_name {
        jar = jar.add(policy.session_cookie(name, &tokens.access_token, app));
    }

    info!(application = %flow.application, "Authentication flow completed");
    Ok((jar, found(&flow.return_url)))
}
