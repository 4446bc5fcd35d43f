// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// An authentication flow started by `/v1/auth` and not yet completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFlow {
    /// Opaque random key, echoed back by the IDP.
    pub state: String,
    /// Name of the application the flow belongs to.
    pub application: String,
    pub pkce_verifier: String,
    /// Where the browser goes once the cookies are set.
    pub return_url: String,
    pub expires_at: DateTime<Utc>,
}

impl PendingFlow {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Identity as reported by `/v1/userinfo` and `/v1/frontend-userinfo`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserInfoResponse {
    pub audiences: Vec<String>,
    pub subject: String,
    pub name: String,
    pub email: String,
    pub email_verified: bool,
    /// Relevant groups only, sorted.
    pub groups: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn flow_expires_at_deadline() {
        let now = Utc::now();
        let flow = PendingFlow {
            state: "s".to_string(),
            application: "example-service".to_string(),
            pkce_verifier: "v".to_string(),
            return_url: "https://example.com/app/".to_string(),
            expires_at: now,
        };
        assert!(!flow.is_expired_at(now - Duration::seconds(1)));
        assert!(flow.is_expired_at(now));
    }
}
