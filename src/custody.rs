// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Key Custody Codec
//!
//! Symmetric authenticated encryption of custodial private keys while the
//! server still holds them (pending enrollment) and while they travel back
//! and forth with the client (votes, password changes).
//!
//! ## Envelope Format
//!
//! ```text
//! v1.<base64url(nonce)>.<base64url(ciphertext || tag)>
//! ```
//!
//! The cipher is AES-256-GCM with a random 96-bit nonce per envelope. The
//! server-held key is process configuration and never derived from user input.
//! Losing it strands every envelope not yet decrypted.

use std::fmt;

use base64ct::{Base64UrlUnpadded, Encoding};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Current envelope version tag.
const ENVELOPE_VERSION: &str = "v1";

/// Additional authenticated data binding envelopes to this purpose.
const ENVELOPE_AAD: &[u8] = b"voting-enrollment/custody/v1";

/// Length of the server-held custody key in bytes.
pub const CUSTODY_KEY_LEN: usize = 32;

/// Opaque encrypted container for private-key material.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct Envelope(String);

impl Envelope {
    /// Wrap a client-supplied envelope string. Validation happens on decrypt.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Envelope({} bytes)", self.0.len())
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors raised by the custody codec.
///
/// None of the variants carry key or plaintext material.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CustodyError {
    #[error("invalid custody key: expected {CUSTODY_KEY_LEN} bytes")]
    InvalidKey,

    #[error("malformed envelope")]
    MalformedEnvelope,

    #[error("unsupported envelope version")]
    UnsupportedVersion,

    #[error("envelope failed authentication")]
    IntegrityFailure,

    #[error("encryption failed")]
    EncryptionFailed,
}

/// AES-256-GCM codec under a process-wide custody key.
pub struct KeyCustody {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl KeyCustody {
    /// Build a codec from raw key bytes.
    pub fn new(key_bytes: &[u8]) -> Result<Self, CustodyError> {
        if key_bytes.len() != CUSTODY_KEY_LEN {
            return Err(CustodyError::InvalidKey);
        }
        let unbound =
            UnboundKey::new(&AES_256_GCM, key_bytes).map_err(|_| CustodyError::InvalidKey)?;
        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    /// Build a codec from a 64-character hex key (optionally `0x`-prefixed).
    pub fn from_hex(hex_key: &str) -> Result<Self, CustodyError> {
        let trimmed = hex_key.trim();
        let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = alloy::hex::decode(trimmed).map_err(|_| CustodyError::InvalidKey)?;
        Self::new(&bytes)
    }

    /// Encrypt secret material into a self-describing envelope.
    pub fn encrypt(&self, secret: &[u8]) -> Result<Envelope, CustodyError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| CustodyError::EncryptionFailed)?;

        let mut in_out = secret.to_vec();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::from(ENVELOPE_AAD),
                &mut in_out,
            )
            .map_err(|_| CustodyError::EncryptionFailed)?;

        Ok(Envelope(format!(
            "{ENVELOPE_VERSION}.{}.{}",
            Base64UrlUnpadded::encode_string(&nonce_bytes),
            Base64UrlUnpadded::encode_string(&in_out)
        )))
    }

    /// Decrypt an envelope. Any tampering, wrong key or bad framing fails
    /// as a whole; partial plaintext is never returned.
    pub fn decrypt(&self, envelope: &Envelope) -> Result<Vec<u8>, CustodyError> {
        let mut parts = envelope.as_str().split('.');
        let (version, nonce_b64, body_b64) = match (parts.next(), parts.next(), parts.next()) {
            (Some(v), Some(n), Some(b)) if parts.next().is_none() => (v, n, b),
            _ => return Err(CustodyError::MalformedEnvelope),
        };
        if version != ENVELOPE_VERSION {
            return Err(CustodyError::UnsupportedVersion);
        }

        let nonce_raw =
            Base64UrlUnpadded::decode_vec(nonce_b64).map_err(|_| CustodyError::MalformedEnvelope)?;
        let nonce_bytes: [u8; NONCE_LEN] = nonce_raw
            .as_slice()
            .try_into()
            .map_err(|_| CustodyError::MalformedEnvelope)?;
        let mut in_out =
            Base64UrlUnpadded::decode_vec(body_b64).map_err(|_| CustodyError::MalformedEnvelope)?;

        let plaintext = self
            .key
            .open_in_place(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::from(ENVELOPE_AAD),
                &mut in_out,
            )
            .map_err(|_| CustodyError::IntegrityFailure)?;

        Ok(plaintext.to_vec())
    }
}

impl fmt::Debug for KeyCustody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyCustody").finish_non_exhaustive()
    }
}
