// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use crate::error::ApiError;

/// Why a request could not be given an identity.
///
/// Every variant ends in a `401`; the distinction exists for the logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Neither a bearer header nor an ID-token cookie was sent
    MissingCredentials,
    /// ID-token cookie present without its access-token companion
    MissingAccessToken,
    /// Token is malformed or uses a disallowed algorithm
    MalformedToken,
    /// No configured key verifies the signature
    InvalidSignature,
    /// Token has expired
    TokenExpired,
    /// Token is not yet valid
    TokenNotYetValid,
    /// Token issuer is invalid
    InvalidIssuer,
    /// Token audience is invalid
    InvalidAudience,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials => "missing_credentials",
            AuthError::MissingAccessToken => "missing_access_token",
            AuthError::MalformedToken => "malformed_token",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::TokenNotYetValid => "token_not_yet_valid",
            AuthError::InvalidIssuer => "invalid_issuer",
            AuthError::InvalidAudience => "invalid_audience",
        }
    }

    /// True when the caller sent no credential at all.
    pub fn is_anonymous(&self) -> bool {
        matches!(self, AuthError::MissingCredentials)
    }

    /// Public `401` response. The specific cause stays in the logs.
    pub fn to_api_error(&self, request_id: impl Into<String>) -> ApiError {
        let details = if self.is_anonymous() {
            "no authorization provided"
        } else {
            "authorization failed to check out during local validation - please see logs for details"
        };
        ApiError::unauthorized(details, request_id)
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingCredentials => write!(f, "No bearer token or identity cookie presented"),
            AuthError::MissingAccessToken => {
                write!(f, "Identity cookie presented without access token cookie")
            }
            AuthError::MalformedToken => write!(f, "Token is malformed"),
            AuthError::InvalidSignature => write!(f, "Token signature is invalid for every configured key"),
            AuthError::TokenExpired => write!(f, "Token has expired"),
            AuthError::TokenNotYetValid => write!(f, "Token is not yet valid"),
            AuthError::InvalidIssuer => write!(f, "Token issuer is invalid"),
            AuthError::InvalidAudience => write!(f, "Token audience is invalid"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<&jsonwebtoken::errors::Error> for AuthError {
    fn from(e: &jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
            ErrorKind::InvalidAudience => AuthError::InvalidAudience,
            ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
            _ => AuthError::MalformedToken,
        }
    }
}
