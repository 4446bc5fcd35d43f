// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Gateway Configuration
//!
//! The gateway reads a YAML document at startup (path taken from
//! `AUTH_GATEWAY_CONFIG`) and validates it before any listener is bound.
//! Every problem found during validation is reported at once.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `AUTH_GATEWAY_CONFIG` | Path to the YAML configuration file | `config.yaml` |
//! | `HOST` | Server bind address (overrides `server.host`) | `0.0.0.0` |
//! | `PORT` | Server bind port (overrides `server.port`) | `8081` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::auth::keys::SigningKeys;

/// Environment variable holding the configuration file path.
pub const CONFIG_PATH_ENV: &str = "AUTH_GATEWAY_CONFIG";

/// Configuration file used when `AUTH_GATEWAY_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Environment variable overriding the bind address.
pub const HOST_ENV: &str = "HOST";

/// Environment variable overriding the bind port.
pub const PORT_ENV: &str = "PORT";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
    #[error("failed to set up {component}: {message}")]
    Setup {
        component: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub identity_provider: IdentityProviderConfig,
    #[serde(default)]
    pub application_configs: BTreeMap<String, ApplicationConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub name: String,
    /// Externally visible URL of `/v1/dropoff`, sent to the IDP as the redirect target.
    #[serde(default)]
    pub dropoff_endpoint_url: String,
    /// Generic retry target shown when a flow cannot be attributed to an application.
    #[serde(default)]
    pub error_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub oidc: OidcConfig,
}

/// Local development switches. All of them weaken the cookie or CORS posture.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CorsConfig {
    /// Send credentialed CORS headers for `allow_origin` and issue `SameSite=None` cookies.
    #[serde(default)]
    pub disable: bool,
    #[serde(default)]
    pub allow_origin: String,
    #[serde(default)]
    pub insecure_cookies: bool,
    #[serde(default)]
    pub disable_http_only_cookies: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OidcConfig {
    #[serde(default)]
    pub id_token_cookie_name: String,
    #[serde(default)]
    pub access_token_cookie_name: Option<String>,
    /// Public RSA keys in PEM format. More than one key allows rotation.
    #[serde(default)]
    pub token_public_keys_pem: Vec<String>,
    #[serde(default = "default_signing_algorithms")]
    pub signing_algorithms: Vec<String>,
    #[serde(default)]
    pub allowed_audience: Option<String>,
    #[serde(default)]
    pub allowed_issuer: Option<String>,
    /// Group name mapped to the subjects allowed to hold it. An empty list means no restriction.
    #[serde(default)]
    pub relevant_groups: BTreeMap<String, Vec<String>>,
}

impl Default for OidcConfig {
    fn default() -> Self {
        Self {
            id_token_cookie_name: String::new(),
            access_token_cookie_name: None,
            token_public_keys_pem: Vec::new(),
            signing_algorithms: default_signing_algorithms(),
            allowed_audience: None,
            allowed_issuer: None,
            relevant_groups: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityProviderConfig {
    #[serde(default)]
    pub authorization_endpoint: String,
    #[serde(default)]
    pub token_endpoint: String,
    #[serde(default)]
    pub user_info_endpoint: Option<String>,
    #[serde(default)]
    pub introspection_endpoint: Option<String>,
    #[serde(default = "default_token_request_timeout")]
    pub token_request_timeout_seconds: u64,
    /// Lifetime of a pending authentication flow.
    #[serde(default = "default_auth_request_timeout")]
    pub auth_request_timeout_seconds: u64,
    /// Zero disables the userinfo response cache.
    #[serde(default)]
    pub user_info_cache_seconds: u64,
    #[serde(default = "default_user_info_cache_entries")]
    pub user_info_cache_entries: usize,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerSettings,
}

impl Default for IdentityProviderConfig {
    fn default() -> Self {
        Self {
            authorization_endpoint: String::new(),
            token_endpoint: String::new(),
            user_info_endpoint: None,
            introspection_endpoint: None,
            token_request_timeout_seconds: default_token_request_timeout(),
            auth_request_timeout_seconds: default_auth_request_timeout(),
            user_info_cache_seconds: 0,
            user_info_cache_entries: default_user_info_cache_entries(),
            circuit_breaker: CircuitBreakerSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: u32,
    pub cool_down_seconds: u64,
    pub half_open_max_probes: u32,
    pub success_threshold: u32,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cool_down_seconds: 60,
            half_open_max_probes: 10,
            success_threshold: 2,
        }
    }
}

/// A statically configured client application.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationConfig {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub default_dropoff_url: String,
    /// Unanchored regular expression a caller-supplied return URL must match.
    /// Left empty, no override is accepted.
    #[serde(default)]
    pub dropoff_url_pattern: String,
    #[serde(default)]
    pub cookie_name: String,
    #[serde(default)]
    pub cookie_domain: String,
    #[serde(default)]
    pub cookie_path: String,
    #[serde(default)]
    pub cookie_expiry_seconds: i64,
    #[serde(skip)]
    dropoff_regex: Option<Regex>,
}

impl ApplicationConfig {
    /// Whether a caller-supplied return URL is acceptable for this application.
    pub fn allows_dropoff(&self, url: &str) -> bool {
        self.dropoff_regex
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(url))
    }
}

impl GatewayConfig {
    /// Read, parse and validate the configuration file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Parse and validate a YAML configuration document.
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let mut config: GatewayConfig = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `HOST` and `PORT` from the process environment and validate again.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let host = std::env::var(HOST_ENV).ok();
        let port = match std::env::var(PORT_ENV) {
            Ok(raw) => Some(raw.trim().parse().map_err(|_| {
                ConfigError::Invalid(vec![format!("{PORT_ENV}={raw} is not a valid port")])
            })?),
            Err(_) => None,
        };
        self.with_overrides(host, port)
    }

    /// Replace the bind address and port, then re-run validation.
    pub fn with_overrides(
        &mut self,
        host: Option<String>,
        port: Option<u16>,
    ) -> Result<(), ConfigError> {
        if let Some(host) = host {
            self.server.host = host;
        }
        if let Some(port) = port {
            self.server.port = port;
        }
        self.validate()
    }

    pub fn application(&self, name: &str) -> Option<&ApplicationConfig> {
        self.application_configs.get(name)
    }

    pub fn flow_ttl(&self) -> Duration {
        Duration::from_secs(self.identity_provider.auth_request_timeout_seconds)
    }

    pub fn token_request_timeout(&self) -> Duration {
        Duration::from_secs(self.identity_provider.token_request_timeout_seconds)
    }

    pub fn user_info_cache_ttl(&self) -> Option<Duration> {
        match self.identity_provider.user_info_cache_seconds {
            0 => None,
            seconds => Some(Duration::from_secs(seconds)),
        }
    }

    /// Check the whole document, compiling return-URL patterns on the way.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        blank_as_none(&mut self.security.oidc.access_token_cookie_name);
        blank_as_none(&mut self.security.oidc.allowed_audience);
        blank_as_none(&mut self.security.oidc.allowed_issuer);
        blank_as_none(&mut self.identity_provider.user_info_endpoint);
        blank_as_none(&mut self.identity_provider.introspection_endpoint);

        if self.server.port < 1024 {
            problems.push(format!(
                "server.port {} is a privileged port, use 1024 or above",
                self.server.port
            ));
        }
        if self.service.dropoff_endpoint_url.trim().is_empty() {
            problems.push("service.dropoff_endpoint_url must be set".to_string());
        }

        let cors = &self.security.cors;
        if cors.disable && cors.insecure_cookies {
            problems.push(
                "security.cors.disable requires secure cookies (SameSite=None cookies must be Secure)"
                    .to_string(),
            );
        }
        if cors.disable && cors.allow_origin.trim().is_empty() {
            problems.push("security.cors.allow_origin must be set when cors is disabled".to_string());
        }

        let oidc = &self.security.oidc;
        if oidc.id_token_cookie_name.trim().is_empty() {
            problems.push("security.oidc.id_token_cookie_name must be set".to_string());
        }
        if let Err(e) = SigningKeys::from_config(oidc) {
            problems.push(format!("security.oidc: {e}"));
        }

        let idp = &self.identity_provider;
        if idp.authorization_endpoint.trim().is_empty() {
            problems.push("identity_provider.authorization_endpoint must be set".to_string());
        } else if url::Url::parse(&idp.authorization_endpoint).is_err() {
            problems.push("identity_provider.authorization_endpoint is not a valid URL".to_string());
        }
        if idp.token_endpoint.trim().is_empty() {
            problems.push("identity_provider.token_endpoint must be set".to_string());
        }
        if idp.token_request_timeout_seconds == 0 {
            problems.push("identity_provider.token_request_timeout_seconds must be positive".to_string());
        }
        if idp.auth_request_timeout_seconds == 0 {
            problems.push("identity_provider.auth_request_timeout_seconds must be positive".to_string());
        }
        if idp.circuit_breaker.failure_threshold == 0 || idp.circuit_breaker.half_open_max_probes == 0 {
            problems.push(
                "identity_provider.circuit_breaker thresholds must be positive".to_string(),
            );
        }

        if self.application_configs.is_empty() {
            problems.push("application_configs must contain at least one application".to_string());
        }
        for (name, app) in self.application_configs.iter_mut() {
            let required = [
                ("display_name", &app.display_name),
                ("scope", &app.scope),
                ("client_id", &app.client_id),
                ("client_secret", &app.client_secret),
                ("default_dropoff_url", &app.default_dropoff_url),
                ("cookie_name", &app.cookie_name),
                ("cookie_domain", &app.cookie_domain),
                ("cookie_path", &app.cookie_path),
            ];
            for (field, value) in required {
                if value.trim().is_empty() {
                    problems.push(format!("application_configs.{name}.{field} must be set"));
                }
            }
            if app.cookie_expiry_seconds <= 0 {
                problems.push(format!(
                    "application_configs.{name}.cookie_expiry_seconds must be positive"
                ));
            }
            if app.dropoff_url_pattern.is_empty() {
                app.dropoff_regex = None;
            } else {
                match Regex::new(&app.dropoff_url_pattern) {
                    Ok(pattern) => app.dropoff_regex = Some(pattern),
                    Err(e) => problems.push(format!(
                        "application_configs.{name}.dropoff_url_pattern does not compile: {e}"
                    )),
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }
}

/// Optional settings written as `""` are treated as unset.
fn blank_as_none(value: &mut Option<String>) {
    if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
        *value = None;
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8081
}

fn default_signing_algorithms() -> Vec<String> {
    vec!["RS256".to_string(), "RS512".to_string()]
}

fn default_token_request_timeout() -> u64 {
    5
}

fn default_auth_request_timeout() -> u64 {
    600
}

fn default_user_info_cache_entries() -> usize {
    256
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_config, test_config_yaml};

    #[test]
    fn loads_complete_document() {
        let config = test_config("http://localhost:9999");
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.flow_ttl(), Duration::from_secs(600));
        assert_eq!(config.security.oidc.signing_algorithms, vec!["RS256", "RS512"]);
        assert!(config.user_info_cache_ttl().is_none());

        let app = config.application("example-service").unwrap();
        assert_eq!(app.client_id, "IAmNotSoSecret.");
        assert!(config.application("unknown").is_none());
    }

    #[test]
    fn dropoff_pattern_is_unanchored_match() {
        let config = test_config("http://localhost:9999");
        let app = config.application("example-service").unwrap();
        assert!(app.allows_dropoff("https://example.com/app/?foo=bar"));
        assert!(!app.allows_dropoff("https://evil.com/app/"));
    }

    #[test]
    fn empty_pattern_rejects_every_override() {
        let app = ApplicationConfig::default();
        assert!(!app.allows_dropoff("https://example.com/app/"));
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, test_config_yaml("http://localhost:9999")).unwrap();

        let config = GatewayConfig::load(&path).unwrap();
        assert_eq!(config.service.name, "auth-gateway");
    }

    #[test]
    fn missing_file_is_read_error() {
        let result = GatewayConfig::load("/nonexistent/gateway.yaml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn validation_collects_every_problem() {
        let result = GatewayConfig::from_yaml_str("server:\n  port: 80\n");
        let Err(ConfigError::Invalid(problems)) = result else {
            panic!("expected validation failure");
        };
        assert!(problems.iter().any(|p| p.contains("privileged port")));
        assert!(problems.iter().any(|p| p.contains("dropoff_endpoint_url")));
        assert!(problems.iter().any(|p| p.contains("authorization_endpoint")));
        assert!(problems.iter().any(|p| p.contains("at least one application")));
        assert!(problems.iter().any(|p| p.contains("no token signing keys")));
    }

    #[test]
    fn cors_disable_requires_secure_cookies() {
        let yaml = test_config_yaml("http://localhost:9999").replace(
            "    disable: false\n",
            "    disable: true\n    allow_origin: http://localhost:3000\n    insecure_cookies: true\n",
        );
        let Err(ConfigError::Invalid(problems)) = GatewayConfig::from_yaml_str(&yaml) else {
            panic!("expected validation failure");
        };
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("requires secure cookies"));
    }

    #[test]
    fn bad_pattern_is_reported() {
        let yaml = test_config_yaml("http://localhost:9999").replace(
            r"dropoff_url_pattern: '^https://example\.com/app/'",
            "dropoff_url_pattern: '(unclosed'",
        );
        let Err(ConfigError::Invalid(problems)) = GatewayConfig::from_yaml_str(&yaml) else {
            panic!("expected validation failure");
        };
        assert!(problems[0].contains("dropoff_url_pattern does not compile"));
    }

    #[test]
    fn blank_optional_settings_are_unset() {
        let yaml = test_config_yaml("http://localhost:9999")
            .replace("    access_token_cookie_name: AUTH\n", "    access_token_cookie_name: \"\"\n")
            .replace(
                "  user_info_endpoint: http://localhost:9999/userinfo\n",
                "  user_info_endpoint: \"  \"\n",
            );
        let config = GatewayConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(config.security.oidc.access_token_cookie_name, None);
        assert_eq!(config.identity_provider.user_info_endpoint, None);
        assert_eq!(
            config.security.oidc.allowed_audience.as_deref(),
            Some("example-client")
        );
    }

    #[test]
    fn overrides_are_validated() {
        let mut config = test_config("http://localhost:9999");
        let Err(ConfigError::Invalid(problems)) = config.with_overrides(None, Some(80)) else {
            panic!("expected validation failure");
        };
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("privileged port"));

        let mut config = test_config("http://localhost:9999");
        config
            .with_overrides(Some("127.0.0.1".to_string()), Some(9090))
            .unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
    }

    #[test]
    fn cache_ttl_enabled_by_seconds() {
        let mut config = test_config("http://localhost:9999");
        config.identity_provider.user_info_cache_seconds = 30;
        assert_eq!(config.user_info_cache_ttl(), Some(Duration::from_secs(30)));
    }
}
