// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::http::StatusCode;

/// Identity-provider call failures.
#[derive(Debug, thiserror::Error)]
pub enum IdpError {
    /// Transport failure, timeout, or an open circuit.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),

    /// The IDP refused the presented credential (`401`/`403`).
    #[error("identity provider rejected the credential with status {status}")]
    Rejected { status: StatusCode },

    /// Any other non-success status.
    #[error("identity provider returned status {status}: {detail}")]
    Status { status: StatusCode, detail: String },

    /// Successful status, but the body could not be used.
    #[error("identity provider response unusable: {0}")]
    InvalidResponse(String),

    #[error("identity provider endpoint not configured: {0}")]
    NotConfigured(&'static str),
}

impl IdpError {
    /// Status reported to the browser when a flow step fails on this error.
    pub fn status(&self) -> StatusCode {
        match self {
            IdpError::Unavailable(_) | IdpError::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
            IdpError::Rejected { status } | IdpError::Status { status, .. } => *status,
            IdpError::NotConfigured(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this outcome counts against the circuit breaker.
    ///
    /// Client errors mean the IDP answered, so only transport errors and
    /// server-side statuses trip the breaker.
    pub fn counts_as_failure(&self) -> bool {
        match self {
            IdpError::Unavailable(_) => true,
            IdpError::Status { status, .. } => status.is_server_error(),
            IdpError::Rejected { .. } | IdpError::InvalidResponse(_) | IdpError::NotConfigured(_) => {
                false
            }
        }
    }
}

impl From<reqwest::Error> for IdpError {
    fn from(e: reqwest::Error) -> Self {
        IdpError::Unavailable(e.to_string())
    }
}
