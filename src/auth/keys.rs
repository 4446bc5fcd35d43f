// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The configured set of ID-token verification keys.

use std::str::FromStr;

use jsonwebtoken::{Algorithm, DecodingKey};

use crate::config::OidcConfig;

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("no token signing keys configured")]
    NoKeys,
    #[error("public key #{index} is not a valid RSA PEM: {source}")]
    InvalidPem {
        index: usize,
        #[source]
        source: jsonwebtoken::errors::Error,
    },
    #[error("unsupported signing algorithm '{0}' (RSA algorithms only)")]
    UnsupportedAlgorithm(String),
    #[error("no signing algorithms configured")]
    NoAlgorithms,
}

/// RSA public keys tried in order, plus the algorithms a token may use.
#[derive(Clone)]
pub struct SigningKeys {
    keys: Vec<DecodingKey>,
    algorithms: Vec<Algorithm>,
}

impl SigningKeys {
    pub fn from_config(oidc: &OidcConfig) -> Result<Self, KeyError> {
        let algorithms = oidc
            .signing_algorithms
            .iter()
            .map(|name| parse_algorithm(name))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_pems(&oidc.token_public_keys_pem, algorithms)
    }

    pub fn from_pems<S: AsRef<str>>(pems: &[S], algorithms: Vec<Algorithm>) -> Result<Self, KeyError> {
        if pems.is_empty() {
            return Err(KeyError::NoKeys);
        }
        if algorithms.is_empty() {
            return Err(KeyError::NoAlgorithms);
        }
        let keys = pems
            .iter()
            .enumerate()
            .map(|(index, pem)| {
                DecodingKey::from_rsa_pem(pem.as_ref().as_bytes())
                    .map_err(|source| KeyError::InvalidPem { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { keys, algorithms })
    }

    pub fn keys(&self) -> &[DecodingKey] {
        &self.keys
    }

    pub fn algorithms(&self) -> &[Algorithm] {
        &self.algorithms
    }
}

impl std::fmt::Debug for SigningKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeys")
            .field("keys", &self.keys.len())
            .field("algorithms", &self.algorithms)
            .finish()
    }
}

pub fn parse_algorithm(name: &str) -> Result<Algorithm, KeyError> {
    match Algorithm::from_str(name) {
        Ok(
            alg @ (Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512),
        ) => Ok(alg),
        _ => Err(KeyError::UnsupportedAlgorithm(name.to_string())),
    }
}
