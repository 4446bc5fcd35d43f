// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Flow secrets: the `state` parameter and the PKCE verifier/challenge pair
//! (RFC 7636, `S256` only).

use base64ct::{Base64UrlUnpadded, Encoding};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};

/// Length of the `state` parameter.
pub const STATE_LENGTH: usize = 40;

/// Length of the PKCE verifier (the RFC 7636 maximum).
pub const VERIFIER_LENGTH: usize = 128;

pub const CHALLENGE_METHOD: &str = "S256";

const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Unreserved characters allowed in a verifier, RFC 7636 section 4.1.
const VERIFIER_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

#[derive(Debug, thiserror::Error)]
#[error("system random number generator failed")]
pub struct RandomSourceError;

pub fn generate_state() -> Result<String, RandomSourceError> {
    random_string(&SystemRandom::new(), ALPHANUMERIC, STATE_LENGTH)
}

pub fn generate_verifier() -> Result<String, RandomSourceError> {
    random_string(&SystemRandom::new(), VERIFIER_ALPHABET, VERIFIER_LENGTH)
}

/// `base64url-no-pad(sha256(verifier))`
pub fn code_challenge(verifier: &str) -> String {
    Base64UrlUnpadded::encode_string(&Sha256::digest(verifier.as_bytes()))
}

/// Draw `len` characters uniformly from `alphabet`.
///
/// Bytes at or above the largest multiple of the alphabet size are discarded,
/// so no character is more likely than another.
fn random_string(
    rng: &dyn SecureRandom,
    alphabet: &[u8],
    len: usize,
) -> Result<String, RandomSourceError> {
    let limit = 256 - (256 % alphabet.len());
    let mut out = String::with_capacity(len);
    let mut buf = [0u8; 64];

    while out.len() < len {
        rng.fill(&mut buf).map_err(|_| RandomSourceError)?;
        for &byte in &buf {
            if usize::from(byte) < limit {
                out.push(char::from(alphabet[usize::from(byte) % alphabet.len()]));
                if out.len() == len {
                    break;
                }
            }
        }
    }
    Ok(out)
}
