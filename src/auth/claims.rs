// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! ID-token claims and the per-request identity built from them.

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer};

/// Claims read from a verified ID token.
///
/// Registered claims (`exp`, `nbf`, `iss`, `aud`) are checked by `jsonwebtoken`
/// during decoding; only the fields needed afterwards are kept here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IdTokenClaims {
    #[serde(deserialize_with = "null_as_default")]
    pub sub: String,
    #[serde(deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(deserialize_with = "null_as_default")]
    pub email_verified: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub groups: Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub aud: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub iss: String,
    #[serde(deserialize_with = "null_as_default")]
    pub exp: i64,
}

/// Identity of the caller, attached to the request extensions by the
/// identity middleware and read by handlers through [`super::Identity`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityContext {
    pub subject: String,
    pub email: String,
    pub email_verified: bool,
    pub name: String,
    pub audience: Option<String>,
    pub groups: BTreeSet<String>,
    /// Present only when a signed ID token was validated.
    pub id_token: Option<String>,
    pub access_token: Option<String>,
}

impl IdentityContext {
    /// Identity from a verified ID token and its companion access token.
    ///
    /// When several audiences are present the configured one is preferred.
    pub fn from_claims(
        claims: IdTokenClaims,
        id_token: String,
        access_token: Option<String>,
        allowed_audience: Option<&str>,
    ) -> Self {
        let audience = match allowed_audience {
            Some(allowed) if claims.aud.iter().any(|a| a == allowed) => Some(allowed.to_string()),
            _ => claims.aud.into_iter().next(),
        };
        Self {
            subject: claims.sub,
            email: claims.email,
            email_verified: claims.email_verified,
            name: claims.name,
            audience,
            groups: claims.groups.into_iter().collect(),
            id_token: Some(id_token),
            access_token,
        }
    }

    /// Identity carrying only an opaque bearer access token.
    pub fn from_bearer(access_token: String) -> Self {
        Self {
            access_token: Some(access_token),
            ..Self::default()
        }
    }

    pub fn has_verified_id_token(&self) -> bool {
        self.id_token.is_some()
    }

    pub fn is_member_of(&self, group: &str) -> bool {
        self.groups.contains(group)
    }
}

/// Read an explicit `null` as the field's default.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Accept either a single string or a list of strings, as the `aud` claim does.
pub fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
        Null(()),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
        OneOrMany::Null(()) => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn audience_accepts_string_or_list() {
        let single: IdTokenClaims = serde_json::from_value(json!({"sub": "1", "aud": "a"})).unwrap();
        assert_eq!(single.aud, vec!["a"]);

        let many: IdTokenClaims =
            serde_json::from_value(json!({"sub": "1", "aud": ["a", "b"]})).unwrap();
        assert_eq!(many.aud, vec!["a", "b"]);

        let missing: IdTokenClaims = serde_json::from_value(json!({"sub": "1"})).unwrap();
        assert!(missing.aud.is_empty());
    }

    #[test]
    fn null_claims_take_defaults() {
        let claims: IdTokenClaims = serde_json::from_value(json!({
            "sub": "1",
            "email": null,
            "email_verified": null,
            "name": null,
            "groups": null,
            "aud": null
        }))
        .unwrap();
        assert_eq!(claims.sub, "1");
        assert!(claims.name.is_empty());
        assert!(claims.groups.is_empty());
        assert!(!claims.email_verified);
        assert!(claims.aud.is_empty());
    }

    #[test]
    fn prefers_configured_audience() {
        let claims: IdTokenClaims = serde_json::from_value(json!({
            "sub": "1234567890",
            "aud": ["other", "example-client"],
            "groups": ["staff", "admin", "staff"]
        }))
        .unwrap();

        let identity = IdentityContext::from_claims(
            claims,
            "id.token".to_string(),
            Some("access".to_string()),
            Some("example-client"),
        );
        assert_eq!(identity.audience.as_deref(), Some("example-client"));
        assert_eq!(identity.groups.len(), 2);
        assert!(identity.is_member_of("admin"));
        assert!(identity.has_verified_id_token());
    }

    #[test]
    fn bearer_identity_has_no_claims() {
        let identity = IdentityContext::from_bearer("opaque".to_string());
        assert!(!identity.has_verified_id_token());
        assert!(identity.subject.is_empty());
        assert_eq!(identity.access_token.as_deref(), Some("opaque"));
    }
}
