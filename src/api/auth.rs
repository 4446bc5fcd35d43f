// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    response::Response,
};
use chrono::{TimeDelta, Utc};
use serde::Deserialize;
use tracing::{error, info, warn};
use url::Url;
use utoipa::IntoParams;

use super::error_page::FlowError;
use super::found;
use crate::{
    auth::pkce::{code_challenge, generate_state, generate_verifier, CHALLENGE_METHOD},
    config::ApplicationConfig,
    error::{ErrorKind, RequestId},
    models::PendingFlow,
    state::AppState,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct AuthParams {
    /// Registered application starting the login.
    pub app_name: Option<String>,
    /// Where to send the browser afterwards. Must match the application's pattern.
    pub dropoff_url: Option<String>,
}

/// Start an authentication flow and send the browser to the identity provider.
#[utoipa::path(
    get,
    path = "/v1/auth",
    params(AuthParams),
    tag = "Flow",
    responses(
        (status = 302, description = "Redirect to the identity provider"),
        (status = 400, description = "Missing application name"),
        (status = 403, description = "Return URL not allowed for this application"),
        (status = 404, description = "Unknown application"),
        (status = 500, description = "Flow could not be stored")
    )
)]
pub async fn start_auth(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    params: Result<Query<AuthParams>, QueryRejection>,
) -> Result<Response, FlowError> {
    let params = params.map(|Query(p)| p).unwrap_or_default();

    let Some(app_name) = params.app_name.filter(|name| !name.is_empty()) else {
        return Err(FlowError::invalid_parameters(request_id));
    };
    let Some(app) = state.config.application(&app_name) else {
        warn!(application = %app_name, "Auth request for unknown application");
        return Err(FlowError::new(ErrorKind::NotFound, "invalid parameters", request_id));
    };

    let return_url = match params.dropoff_url.filter(|url| !url.is_empty()) {
        Some(url) if app.allows_dropoff(&url) => url,
        Some(url) => {
            warn!(application = %app_name, dropoff_url = %url, "Rejected dropoff url");
            return Err(FlowError::new(
                ErrorKind::Forbidden,
                "dropoff url not allowed for this application",
                request_id,
            )
            .retry(Some(&app.default_dropoff_url)));
        }
        None => app.default_dropoff_url.clone(),
    };

    let internal = |request_id: &str| FlowError::new(ErrorKind::Internal, "internal error", request_id);

    let (flow_state, verifier) = match generate_state().and_then(|s| Ok((s, generate_verifier()?))) {
        Ok(secrets) => secrets,
        Err(e) => {
            error!(error = %e, "Failed to generate flow secrets");
            return Err(internal(&request_id));
        }
    };

    let expires_at = TimeDelta::from_std(state.config.flow_ttl())
        .ok()
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .ok_or_else(|| internal(&request_id))?;

    let location = match authorization_url(
        &state.config.identity_provider.authorization_endpoint,
        app,
        &flow_state,
        &code_challenge(&verifier),
        &state.config.service.dropoff_endpoint_url,
    ) {
        Ok(url) => url,
        Err(e) => {
            error!(error = %e, "Authorization endpoint is not a valid URL");
            return Err(internal(&request_id));
        }
    };

    let flow = PendingFlow {
        state: flow_state,
        application: app_name.clone(),
        pkce_verifier: verifier,
        return_url,
        expires_at,
    };
    if let Err(e) = state.flows.add(&flow) {
        error!(application = %app_name, error = %e, "Failed to store pending flow");
        return Err(internal(&request_id));
    }

    info!(application = %app_name, expires_at = %flow.expires_at, "Authentication flow started");
    Ok(found(location.as_str()))
}

/// Authorization request URL for `app` (RFC 6749 section 4.1.1 with PKCE).
fn authorization_url(
    endpoint: &str,
    app: &ApplicationConfig,
    state: &str,
    challenge: &str,
    dropoff_endpoint: &str,
) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(endpoint)?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &app.client_id)
        .append_pair("scope", &app.scope)
        .append_pair("state", state)
        .append_pair("code_challenge", challenge)
        .append_pair("code_challenge_method", CHALLENGE_METHOD)
        .append_pair("redirect_url", dropoff_endpoint)
        .append_pair("redirect_uri", dropoff_endpoint);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::http::{header::LOCATION, StatusCode};

    use super::*;
    use crate::auth::pkce::{STATE_LENGTH, VERIFIER_LENGTH};
    use crate::test_support::{body_text, get, test_state};

    fn location_of(response: &Response) -> Url {
        Url::parse(response.headers()[LOCATION].to_str().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn redirects_to_authorization_endpoint() {
        let state = test_state("http://localhost:9999");
        let response = get(&state, "/v1/auth?app_name=example-service", &[]).await;
        assert_eq!(response.status(), StatusCode::FOUND);

        let location = location_of(&response);
        assert_eq!(location.host_str(), Some("auth.example.com"));
        assert_eq!(location.path(), "/auth");

        let query: HashMap<String, String> = location.query_pairs().into_owned().collect();
        assert_eq!(query["response_type"], "code");
        assert_eq!(query["client_id"], "IAmNotSoSecret.");
        assert_eq!(query["scope"], "example");
        assert_eq!(query["code_challenge_method"], "S256");
        assert_eq!(query["redirect_url"], "http://localhost:8081/v1/dropoff");
        assert_eq!(query["redirect_uri"], "http://localhost:8081/v1/dropoff");
        assert_eq!(query["state"].len(), STATE_LENGTH);

        let flow = state.flows.consume(&query["state"]).unwrap();
        assert_eq!(flow.application, "example-service");
        assert_eq!(flow.return_url, "https://example.com/app/");
        assert_eq!(flow.pkce_verifier.len(), VERIFIER_LENGTH);
        assert_eq!(query["code_challenge"], code_challenge(&flow.pkce_verifier));
    }

    #[tokio::test]
    async fn keeps_allowed_dropoff_url() {
        let state = test_state("http://localhost:9999");
        let response = get(
            &state,
            "/v1/auth?app_name=example-service&dropoff_url=https%3A%2F%2Fexample.com%2Fapp%2Fpage%3Fid%3D7",
            &[],
        )
        .await;
        assert_eq!(response.status(), StatusCode::FOUND);

        let location = location_of(&response);
        let flow_state = location
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        let flow = state.flows.consume(&flow_state).unwrap();
        assert_eq!(flow.return_url, "https://example.com/app/page?id=7");
    }

    #[tokio::test]
    async fn missing_app_name_is_bad_request() {
        let state = test_state("http://localhost:9999");
        let response = get(&state, "/v1/auth", &[]).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("invalid parameters"));
        assert!(state.flows.is_empty());
    }

    #[tokio::test]
    async fn unknown_application_is_not_found() {
        let state = test_state("http://localhost:9999");
        let response = get(&state, "/v1/auth?app_name=nope", &[]).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn foreign_dropoff_url_is_forbidden() {
        let state = test_state("http://localhost:9999");
        let response = get(
            &state,
            "/v1/auth?app_name=example-service&dropoff_url=https%3A%2F%2Fevil.com%2F",
            &[],
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(state.flows.is_empty());
    }
}
