// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared fixtures for unit tests: a complete configuration pointing at a
//! mock identity provider, and helpers to mint signed ID tokens.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header::SET_COOKIE, Request},
    response::Response,
    Router,
};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};

use crate::api::router;
use crate::config::GatewayConfig;
use crate::state::AppState;
use crate::storage::FlowStore;

pub const PRIMARY_PRIVATE_PEM: &str = include_str!("../testdata/primary_private.pem");
pub const PRIMARY_PUBLIC_PEM: &str = include_str!("../testdata/primary_public.pem");
pub const ROTATED_PRIVATE_PEM: &str = include_str!("../testdata/rotated_private.pem");
pub const ROTATED_PUBLIC_PEM: &str = include_str!("../testdata/rotated_public.pem");

pub const TEST_AUDIENCE: &str = "example-client";
pub const TEST_ISSUER: &str = "https://idp.example.com";

fn indent(text: &str, spaces: usize) -> String {
    let pad = " ".repeat(spaces);
    text.lines()
        .map(|line| format!("{pad}{line}\n"))
        .collect()
}

/// Configuration document with the IDP token and userinfo endpoints under `idp_base`.
pub fn test_config_yaml(idp_base: &str) -> String {
    format!(
        r#"service:
  name: auth-gateway
  dropoff_endpoint_url: http://localhost:8081/v1/dropoff
  error_url: https://example.com/error
server:
  port: 8081
security:
  cors:
    disable: false
  oidc:
    id_token_cookie_name: JWT
    access_token_cookie_name: AUTH
    allowed_audience: {TEST_AUDIENCE}
    allowed_issuer: {TEST_ISSUER}
    token_public_keys_pem:
      - |
{pem}    relevant_groups:
      staff: []
      admin: ["1234567890"]
identity_provider:
  authorization_endpoint: https://auth.example.com/auth
  token_endpoint: {idp_base}/token
  user_info_endpoint: {idp_base}/userinfo
  token_request_timeout_seconds: 2
  auth_request_timeout_seconds: 600
application_configs:
  example-service:
    display_name: Example Service
    scope: example
    client_id: IAmNotSoSecret.
    client_secret: IAmEvenMoreSecret
    default_dropoff_url: https://example.com/app/
    dropoff_url_pattern: '^https://example\.com/app/'
    cookie_name: JWT
    cookie_domain: example.com
    cookie_path: /
    cookie_expiry_seconds: 21600
"#,
        pem = indent(PRIMARY_PUBLIC_PEM, 8),
    )
}

pub fn test_config(idp_base: &str) -> GatewayConfig {
    GatewayConfig::from_yaml_str(&test_config_yaml(idp_base)).expect("test config is valid")
}

pub fn test_state(idp_base: &str) -> AppState {
    test_state_with(test_config(idp_base))
}

pub fn test_state_with(config: GatewayConfig) -> AppState {
    AppState::from_config(config, Arc::new(FlowStore::new())).expect("test state builds")
}

/// ID-token claims for `subject`, valid for an hour.
pub fn user_claims(subject: &str, groups: &[&str]) -> Value {
    let now = chrono::Utc::now().timestamp();
    json!({
        "sub": subject,
        "email": "jsquirrel_github_9a6d@packetloss.de",
        "email_verified": true,
        "name": "John Doe",
        "groups": groups,
        "aud": TEST_AUDIENCE,
        "iss": TEST_ISSUER,
        "iat": now,
        "exp": now + 3600,
    })
}

pub fn mint_id_token(claims: &Value) -> String {
    mint_id_token_with_key(claims, PRIMARY_PRIVATE_PEM, Algorithm::RS256)
}

pub fn mint_id_token_with_key(claims: &Value, private_pem: &str, algorithm: Algorithm) -> String {
    let key = EncodingKey::from_rsa_pem(private_pem.as_bytes()).expect("test key parses");
    encode(&Header::new(algorithm), claims, &key).expect("token encodes")
}

/// Drive one GET request through the full router for `state`.
pub async fn get(state: &AppState, uri: &str, headers: &[(&str, &str)]) -> Response {
    use tower::ServiceExt;

    let mut request = Request::builder().uri(uri);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    let app: Router = router(state.clone());
    app.oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Every `Set-Cookie` header of `response`.
pub fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// `Cookie` header value for a signed-in browser.
pub fn session_cookies(id_token: &str, access_token: &str) -> String {
    format!("JWT={id_token}; AUTH={access_token}")
}
