// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Custodial wallets.
//!
//! - [`WalletProvisioner`] creates and funds a fresh keypair per enrollment
//! - [`CustodialWallet::seal`] moves the key into a custody envelope
//! - [`custodial_signer`] reopens an envelope to sign on the voter's behalf
//! - [`BalanceMaintainer`] keeps a wallet able to pay its own gas

pub mod balance;
pub mod provisioner;

use alloy::primitives::{keccak256, Address};
use alloy::signers::local::PrivateKeySigner;
use k256::ecdsa::{SigningKey, VerifyingKey};
use k256::elliptic_curve::zeroize::Zeroize;
use serde::Serialize;

use crate::blockchain::{signer_from_key_bytes, TxReceipt};
use crate::custody::{CustodyError, Envelope, KeyCustody};

pub use balance::{BalanceMaintainer, TopUpOutcome};
pub use provisioner::{ProvisioningError, WalletProvisioner};

/// Freshly provisioned wallet, still holding its plaintext key.
///
/// The only way out is [`CustodialWallet::seal`], which consumes it. The key
/// is zeroized when the signing key is dropped.
pub struct CustodialWallet {
    pub address: Address,
    signing_key: SigningKey,
    pub funding: TxReceipt,
}

impl std::fmt::Debug for CustodialWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustodialWallet")
            .field("address", &self.address)
            .field("signing_key", &"[REDACTED]")
            .field("funding", &self.funding)
            .finish()
    }
}

impl CustodialWallet {
    pub(crate) fn new(signing_key: SigningKey, funding: TxReceipt) -> Self {
        Self {
            address: derive_address(signing_key.verifying_key()),
            signing_key,
            funding,
        }
    }

    /// Encrypt the private key under the custody key and drop the plaintext.
    pub fn seal(self, custody: &KeyCustody) -> Result<SealedWallet, CustodyError> {
        let mut raw: [u8; 32] = self.signing_key.to_bytes().into();
        let sealed = custody.encrypt(&raw);
        raw.zeroize();

        Ok(SealedWallet {
            address: self.address,
            encrypted_private_key: sealed?,
            funding: self.funding,
        })
    }
}

/// Wallet whose key exists only as a custody envelope.
#[derive(Debug, Clone, Serialize)]
pub struct SealedWallet {
    pub address: Address,
    pub encrypted_private_key: Envelope,
    pub funding: TxReceipt,
}

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error(transparent)]
    Custody(#[from] CustodyError),

    #[error("custody envelope does not hold a valid private key")]
    InvalidKey,
}

/// Decrypt a custody envelope into a signer for the wallet it holds.
pub fn custodial_signer(
    custody: &KeyCustody,
    envelope: &Envelope,
) -> Result<PrivateKeySigner, WalletError> {
    let mut key_bytes = custody.decrypt(envelope)?;
    let signer = signer_from_key_bytes(&key_bytes).map_err(|_| WalletError::InvalidKey);
    key_bytes.zeroize();
    signer
}

/// Ethereum address of a secp256k1 public key.
///
/// keccak256 of the uncompressed point without its `0x04` prefix, last 20 bytes.
pub fn derive_address(verifying_key: &VerifyingKey) -> Address {
    let point = verifying_key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}
