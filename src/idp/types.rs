// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity-provider response bodies.
//!
//! All readers are tolerant: missing or `null` fields take defaults and
//! unknown fields are ignored.

use serde::Deserialize;

use crate::auth::claims::{null_as_default, one_or_many};

/// Token endpoint response (RFC 6749 section 5.1, plus the OIDC `id_token`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TokenResponse {
    #[serde(deserialize_with = "null_as_default")]
    pub access_token: String,
    #[serde(deserialize_with = "null_as_default")]
    pub id_token: String,
    #[serde(deserialize_with = "null_as_default")]
    pub token_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub expires_in: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub scope: String,
    #[serde(deserialize_with = "null_as_default")]
    pub refresh_token: String,
    #[serde(deserialize_with = "null_as_default")]
    pub error: String,
    #[serde(deserialize_with = "null_as_default")]
    pub error_description: String,
}

/// OAuth error body (RFC 6749 section 5.2).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OAuthErrorBody {
    #[serde(deserialize_with = "null_as_default")]
    pub error: String,
    #[serde(deserialize_with = "null_as_default")]
    pub error_description: String,
}

impl OAuthErrorBody {
    pub fn from_slice(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }

    pub fn is_error(&self) -> bool {
        !self.error.is_empty() || !self.error_description.is_empty()
    }

    pub fn describe(&self) -> String {
        match (self.error.is_empty(), self.error_description.is_empty()) {
            (true, true) => "no error body".to_string(),
            (false, true) => self.error.clone(),
            _ => format!("{}: {}", self.error, self.error_description),
        }
    }
}

/// OIDC userinfo response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UserinfoData {
    #[serde(deserialize_with = "null_as_default")]
    pub sub: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(deserialize_with = "null_as_default")]
    pub email_verified: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub groups: Vec<String>,
    #[serde(rename = "aud", deserialize_with = "one_or_many")]
    pub audience: Vec<String>,
}

/// Token introspection response (RFC 7662).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IntrospectionData {
    #[serde(deserialize_with = "null_as_default")]
    pub active: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub sub: String,
    #[serde(deserialize_with = "null_as_default")]
    pub scope: String,
    #[serde(deserialize_with = "null_as_default")]
    pub client_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub username: String,
    #[serde(deserialize_with = "null_as_default")]
    pub exp: i64,
}
