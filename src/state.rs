// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::api::cookies::CookiePolicy;
use crate::auth::SigningKeys;
use crate::config::{ConfigError, GatewayConfig};
use crate::idp::IdpClient;
use crate::storage::FlowStore;

/// Shared handles injected into every handler and the identity middleware.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub flows: Arc<FlowStore>,
    pub idp: Arc<IdpClient>,
    pub keys: Arc<SigningKeys>,
    pub cookie_policy: CookiePolicy,
}

impl AppState {
    /// Build the state from a validated configuration and an opened flow store.
    pub fn from_config(config: GatewayConfig, flows: Arc<FlowStore>) -> Result<Self, ConfigError> {
        let keys = SigningKeys::from_config(&config.security.oidc).map_err(|e| ConfigError::Setup {
            component: "token signing keys",
            message: e.to_string(),
        })?;
        let idp = IdpClient::from_config(&config)?;
        let cookie_policy = CookiePolicy::from_config(&config.security.cors);

        Ok(Self {
            config: Arc::new(config),
            flows,
            idp: Arc::new(idp),
            keys: Arc::new(keys),
            cookie_policy,
        })
    }
}
