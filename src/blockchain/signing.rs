// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signer construction, password hashing and ballot signing.

use alloy::{
    primitives::{keccak256, Address, B256},
    signers::{local::PrivateKeySigner, Signer},
};

use super::ledger::LedgerError;
use super::types::SignedBallot;

/// Create a signer from raw secp256k1 private key bytes.
pub fn signer_from_key_bytes(key_bytes: &[u8]) -> Result<PrivateKeySigner, LedgerError> {
    PrivateKeySigner::from_slice(key_bytes)
        .map_err(|_| LedgerError::InvalidInput("Invalid private key".to_string()))
}

/// Create a signer from a hex private key (with or without `0x`).
pub fn signer_from_hex(private_key_hex: &str) -> Result<PrivateKeySigner, LedgerError> {
    let trimmed = private_key_hex.trim();
    let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let key_bytes = alloy::hex::decode(trimmed)
        .map_err(|_| LedgerError::InvalidInput("Invalid private key encoding".to_string()))?;
    signer_from_key_bytes(&key_bytes)
}

/// Password hash stored by the contract: keccak256 of the UTF-8 password.
pub fn password_hash(password: &str) -> B256 {
    keccak256(password.as_bytes())
}

/// Human-readable statement a voter signs for a ballot.
pub fn ballot_message(candidate_id: u64, voter: Address) -> String {
    format!("Vote for candidate {candidate_id} by {voter}")
}

/// Sign a ballot with the voter's custodial wallet.
///
/// The contract recovers the voter from an EIP-191 signature over the
/// keccak256 hash of [`ballot_message`].
pub async fn sign_ballot(
    signer: &PrivateKeySigner,
    candidate_id: u64,
) -> Result<SignedBallot, LedgerError> {
    let message_hash = keccak256(ballot_message(candidate_id, signer.address()).as_bytes());
    let signature = signer
        .sign_message(message_hash.as_slice())
        .await
        .map_err(|e| LedgerError::InvalidInput(format!("Failed to sign ballot: {e}")))?;

    Ok(SignedBallot {
        candidate_id,
        message_hash,
        signature: signature.as_bytes().to_vec(),
    })
}
