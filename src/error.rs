// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JSON error responses for the identity endpoints.
//!
//! Bodies look like
//! `{"message":"auth.unauthorized","timestamp":"...","details":{"details":["..."]},"request_id":"..."}`.
//! The `message` is a stable machine-readable code; `details` carries the
//! public human-readable explanation. Internal causes are logged, never sent.

use std::collections::BTreeMap;
use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Header carrying the per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Reported when a request somehow reaches a handler without an id.
pub const UNKNOWN_REQUEST_ID: &str = "00000000";

/// Failure categories shared by the JSON and HTML error surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    NotFound,
    Forbidden,
    Unauthorized,
    UpstreamUnavailable,
    UpstreamRejected,
    Internal,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "auth.bad.request",
            ErrorKind::NotFound => "auth.not.found",
            ErrorKind::Forbidden => "auth.forbidden",
            ErrorKind::Unauthorized | ErrorKind::UpstreamRejected => "auth.unauthorized",
            ErrorKind::UpstreamUnavailable => "auth.idp.error",
            ErrorKind::Internal => "auth.internal.error",
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Unauthorized | ErrorKind::UpstreamRejected => StatusCode::UNAUTHORIZED,
            ErrorKind::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub details: String,
    pub request_id: String,
}

/// Wire shape of [`ApiError`].
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub message: String,
    pub timestamp: String,
    pub details: BTreeMap<String, Vec<String>>,
    pub request_id: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, details: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            kind,
            details: details.into(),
            request_id: request_id.into(),
        }
    }

    pub fn unauthorized(details: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, details, request_id)
    }

    pub fn upstream_unavailable(details: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(ErrorKind::UpstreamUnavailable, details, request_id)
    }

    pub fn upstream_rejected(details: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(ErrorKind::UpstreamRejected, details, request_id)
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }

    fn body(&self) -> ErrorBody {
        ErrorBody {
            message: self.kind.code().to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            details: BTreeMap::from([("details".to_string(), vec![self.details.clone()])]),
            request_id: self.request_id.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

/// Read the correlation id set by the request-id layer.
pub fn request_id_of(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .unwrap_or(UNKNOWN_REQUEST_ID)
        .to_string()
}

/// Extractor for the current request's correlation id.
pub struct RequestId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for RequestId {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RequestId(request_id_of(&parts.headers)))
    }
}
