// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP client for the identity provider.
//!
//! Every call is bounded by the configured request timeout and runs through
//! the circuit breaker of its command. Successful userinfo lookups may be
//! served from a short-lived per-credential cache.

use std::future::Future;
use std::time::Duration;

use axum::http::{header::ACCEPT, StatusCode};
use reqwest::Client;
use tracing::{debug, warn};

use super::cache::ResponseCache;
use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use super::types::{IntrospectionData, OAuthErrorBody, TokenResponse, UserinfoData};
use super::IdpError;
use crate::config::{ApplicationConfig, ConfigError, GatewayConfig};

pub const TOKEN_COMMAND: &str = "idp_token";
pub const USERINFO_COMMAND: &str = "idp_userinfo";
pub const INTROSPECT_COMMAND: &str = "idp_introspect";

pub struct IdpClient {
    http: Client,
    token_endpoint: String,
    userinfo_endpoint: Option<String>,
    introspection_endpoint: Option<String>,
    /// Our own `/v1/dropoff`, repeated in the token request as `redirect_uri`.
    redirect_uri: String,
    timeout: Duration,
    token_breaker: CircuitBreaker,
    userinfo_breaker: CircuitBreaker,
    introspect_breaker: CircuitBreaker,
    userinfo_cache: Option<ResponseCache<UserinfoData>>,
}

impl IdpClient {
    pub fn from_config(config: &GatewayConfig) -> Result<Self, ConfigError> {
        let idp = &config.identity_provider;
        let timeout = config.token_request_timeout();

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Setup {
                component: "identity provider client",
                message: format!("failed to build HTTP client: {e}"),
            })?;

        let breaker_config = CircuitBreakerConfig::from(&idp.circuit_breaker);
        let userinfo_cache = config
            .user_info_cache_ttl()
            .map(|ttl| ResponseCache::new(idp.user_info_cache_entries, ttl));

        Ok(Self {
            http,
            token_endpoint: idp.token_endpoint.clone(),
            userinfo_endpoint: non_empty(&idp.user_info_endpoint),
            introspection_endpoint: non_empty(&idp.introspection_endpoint),
            redirect_uri: config.service.dropoff_endpoint_url.clone(),
            timeout,
            token_breaker: CircuitBreaker::new(TOKEN_COMMAND, breaker_config.clone()),
            userinfo_breaker: CircuitBreaker::new(USERINFO_COMMAND, breaker_config.clone()),
            introspect_breaker: CircuitBreaker::new(INTROSPECT_COMMAND, breaker_config),
            userinfo_cache,
        })
    }

    pub fn has_userinfo_endpoint(&self) -> bool {
        self.userinfo_endpoint.is_some()
    }

    pub fn has_introspection_endpoint(&self) -> bool {
        self.introspection_endpoint.is_some()
    }

    /// Redeem an authorization code together with its PKCE verifier.
    pub async fn exchange_code(
        &self,
        application: &ApplicationConfig,
        code: &str,
        verifier: &str,
    ) -> Result<TokenResponse, IdpError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("client_id", application.client_id.as_str()),
            ("client_secret", application.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("code", code),
            ("code_verifier", verifier),
        ];

        let tokens = self
            .token_breaker
            .call(self.bounded(async {
                let response = self
                    .http
                    .post(&self.token_endpoint)
                    .header(ACCEPT, "application/json")
                    .form(&form)
                    .send()
                    .await?;
                let status = response.status();
                let body = response.bytes().await?;

                if status != StatusCode::OK {
                    return Err(IdpError::Status {
                        status,
                        detail: OAuthErrorBody::from_slice(&body).describe(),
                    });
                }

                let tokens: TokenResponse = serde_json::from_slice(&body)
                    .map_err(|e| IdpError::InvalidResponse(format!("token response: {e}")))?;
                if !tokens.error.is_empty() || !tokens.error_description.is_empty() {
                    return Err(IdpError::InvalidResponse(format!(
                        "token response carried error {}: {}",
                        tokens.error, tokens.error_description
                    )));
                }
                if tokens.id_token.is_empty() || tokens.access_token.is_empty() {
                    return Err(IdpError::InvalidResponse(
                        "token response lacks id_token or access_token".to_string(),
                    ));
                }
                Ok(tokens)
            }))
            .await;

        if let Err(e) = &tokens {
            warn!(
                client_id = %application.client_id,
                error = %e,
                "Token exchange with identity provider failed"
            );
        }
        tokens
    }

    /// Look up the current identity for an access token.
    pub async fn fetch_userinfo(&self, access_token: &str) -> Result<UserinfoData, IdpError> {
        let url = self
            .userinfo_endpoint
            .as_deref()
            .ok_or(IdpError::NotConfigured("user_info_endpoint"))?;

        if let Some(hit) = self
            .userinfo_cache
            .as_ref()
            .and_then(|cache| cache.get(access_token, "GET", url))
        {
            debug!("Userinfo served from cache");
            return Ok(hit);
        }

        let data = self
            .userinfo_breaker
            .call(self.bounded(async {
                let response = self.http.get(url).bearer_auth(access_token).send().await?;
                let status = response.status();
                let body = response.bytes().await?;
                check_credential_status(status, &body)?;

                let error_body = OAuthErrorBody::from_slice(&body);
                if error_body.is_error() {
                    return Err(IdpError::InvalidResponse(format!(
                        "userinfo carried error {}",
                        error_body.describe()
                    )));
                }
                serde_json::from_slice::<UserinfoData>(&body)
                    .map_err(|e| IdpError::InvalidResponse(format!("userinfo response: {e}")))
            }))
            .await?;

        if let Some(cache) = &self.userinfo_cache {
            cache.put(access_token, "GET", url, data.clone());
        }
        Ok(data)
    }

    /// RFC 7662 token introspection.
    pub async fn introspect(&self, access_token: &str) -> Result<IntrospectionData, IdpError> {
        let url = self
            .introspection_endpoint
            .as_deref()
            .ok_or(IdpError::NotConfigured("introspection_endpoint"))?;
        let form = [("token", access_token), ("token_type_hint", "access_token")];

        self.introspect_breaker
            .call(self.bounded(async {
                let response = self
                    .http
                    .post(url)
                    .bearer_auth(access_token)
                    .header(ACCEPT, "application/json")
                    .form(&form)
                    .send()
                    .await?;
                let status = response.status();
                let body = response.bytes().await?;
                check_credential_status(status, &body)?;

                serde_json::from_slice::<IntrospectionData>(&body)
                    .map_err(|e| IdpError::InvalidResponse(format!("introspection response: {e}")))
            }))
            .await
    }

    async fn bounded<T>(
        &self,
        request: impl Future<Output = Result<T, IdpError>>,
    ) -> Result<T, IdpError> {
        tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| {
                IdpError::Unavailable(format!(
                    "no response within {} ms",
                    self.timeout.as_millis()
                ))
            })?
    }
}

/// Map the status of a credential-bearing call.
fn check_credential_status(status: StatusCode, body: &[u8]) -> Result<(), IdpError> {
    match status {
        StatusCode::OK => Ok(()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(IdpError::Rejected { status }),
        _ => Err(IdpError::Status {
            status,
            detail: OAuthErrorBody::from_slice(body).describe(),
        }),
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.trim().is_empty()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idp::circuit_breaker::CircuitState;
    use crate::test_support::test_config;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> (IdpClient, GatewayConfig) {
        let config = test_config(&server.uri());
        (IdpClient::from_config(&config).unwrap(), config)
    }

    #[tokio::test]
    async fn exchange_code_posts_pkce_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=the-code"))
            .and(body_string_contains("code_verifier=the-verifier"))
            .and(body_string_contains("client_id=IAmNotSoSecret."))
            .and(body_string_contains(
                "redirect_uri=http%3A%2F%2Flocalhost%3A8081%2Fv1%2Fdropoff",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-123",
                "id_token": "id-456",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (client, config) = client_for(&server);
        let app = config.application("example-service").unwrap();
        let tokens = client.exchange_code(app, "the-code", "the-verifier").await.unwrap();

        assert_eq!(tokens.access_token, "access-123");
        assert_eq!(tokens.id_token, "id-456");
    }

    #[tokio::test]
    async fn exchange_code_reports_idp_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "code already used"
            })))
            .mount(&server)
            .await;

        let (client, config) = client_for(&server);
        let app = config.application("example-service").unwrap();
        let err = client.exchange_code(app, "c", "v").await.unwrap_err();

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("invalid_grant: code already used"));
    }

    #[tokio::test]
    async fn error_body_with_ok_status_is_bad_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": "server_error",
                "error_description": "try later"
            })))
            .mount(&server)
            .await;

        let (client, config) = client_for(&server);
        let app = config.application("example-service").unwrap();
        let err = client.exchange_code(app, "c", "v").await.unwrap_err();
        assert!(matches!(err, IdpError::InvalidResponse(_)));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn slow_idp_times_out_as_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let mut config = test_config(&server.uri());
        config.identity_provider.token_request_timeout_seconds = 1;
        let client = IdpClient::from_config(&config).unwrap();

        let err = client.fetch_userinfo("token").await.unwrap_err();
        assert!(matches!(err, IdpError::Unavailable(_)));
    }

    #[tokio::test]
    async fn userinfo_rejection_is_distinct() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let (client, _) = client_for(&server);
        let err = client.fetch_userinfo("token").await.unwrap_err();
        assert!(matches!(err, IdpError::Rejected { status } if status == StatusCode::FORBIDDEN));
        assert_eq!(client.userinfo_breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn userinfo_is_cached_per_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .and(header("authorization", "Bearer token-a"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sub": "101",
                "email": "a@example.com",
                "groups": ["staff"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = test_config(&server.uri());
        config.identity_provider.user_info_cache_seconds = 60;
        let client = IdpClient::from_config(&config).unwrap();

        let first = client.fetch_userinfo("token-a").await.unwrap();
        let second = client.fetch_userinfo("token-a").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.groups, vec!["staff"]);
    }

    #[tokio::test]
    async fn server_errors_open_the_userinfo_circuit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(503))
            .expect(5)
            .mount(&server)
            .await;

        let (client, _) = client_for(&server);
        for _ in 0..5 {
            let err = client.fetch_userinfo("token").await.unwrap_err();
            assert!(matches!(err, IdpError::Status { .. }));
        }
        assert_eq!(client.userinfo_breaker.state(), CircuitState::Open);

        let err = client.fetch_userinfo("token").await.unwrap_err();
        assert!(matches!(err, IdpError::Unavailable(_)));
        assert_eq!(client.token_breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn introspection_reports_activity() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/introspect"))
            .and(body_string_contains("token=access-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "active": true,
                "sub": "101",
                "client_id": "IAmNotSoSecret."
            })))
            .mount(&server)
            .await;

        let mut config = test_config(&server.uri());
        config.identity_provider.introspection_endpoint = Some(format!("{}/introspect", server.uri()));
        let client = IdpClient::from_config(&config).unwrap();

        let data = client.introspect("access-1").await.unwrap();
        assert!(data.active);
        assert_eq!(data.sub, "101");
    }

    #[tokio::test]
    async fn missing_endpoint_is_not_configured() {
        let mut config = test_config("http://localhost:9");
        config.identity_provider.user_info_endpoint = None;
        let client = IdpClient::from_config(&config).unwrap();

        assert!(!client.has_userinfo_endpoint());
        assert!(matches!(
            client.fetch_userinfo("t").await,
            Err(IdpError::NotConfigured(_))
        ));
        assert!(matches!(
            client.introspect("t").await,
            Err(IdpError::NotConfigured(_))
        ));
    }
}
