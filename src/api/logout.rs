// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    response::Response,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;

use super::error_page::FlowError;
use super::found;
use crate::{
    error::{ErrorKind, RequestId},
    state::AppState,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct LogoutParams {
    pub app_name: Option<String>,
}

/// Clear the application's session cookies.
#[utoipa::path(
    get,
    path = "/v1/logout",
    params(LogoutParams),
    tag = "Flow",
    responses(
        (status = 302, description = "Cookies cleared, redirect to the application"),
        (status = 400, description = "Missing application name"),
        (status = 404, description = "Unknown application")
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    jar: CookieJar,
    params: Result<Query<LogoutParams>, QueryRejection>,
) -> Result<(CookieJar, Response), FlowError> {
    let params = params.map(|Query(p)| p).unwrap_or_default();
    let Some(app_name) = params.app_name.filter(|name| !name.is_empty()) else {
        return Err(FlowError::invalid_parameters(request_id));
    };
    let Some(app) = state.config.application(&app_name) else {
        return Err(FlowError::new(ErrorKind::NotFound, "invalid parameters", request_id));
    };

    let policy = state.cookie_policy;
    let mut jar = jar.add(policy.expired_cookie(&app.cookie_name, app));
    if let Some(name) = &state.config.security.oidc.access_token_cookie_name {
        jar = jar.add(policy.expired_cookie(name, app));
    }

    info!(application = %app_name, "Session cookies cleared");
    Ok((jar, found(&app.default_dropoff_url)))
}
