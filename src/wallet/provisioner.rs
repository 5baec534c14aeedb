// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fresh custodial wallet generation and initial funding.

use std::sync::Arc;

use alloy::primitives::U256;
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::rand_core::OsRng;

use super::CustodialWallet;
use crate::blockchain::{format_amount, Ledger, LedgerError, NATIVE_DECIMALS};

#[derive(Debug, thiserror::Error)]
pub enum ProvisioningError {
    #[error("initial funding failed: {0}")]
    Funding(#[from] LedgerError),
}

/// Creates a keypair per enrollment and funds it from the funder identity.
pub struct WalletProvisioner {
    ledger: Arc<dyn Ledger>,
    initial_funding: U256,
}

impl WalletProvisioner {
    pub fn new(ledger: Arc<dyn Ledger>, initial_funding: U256) -> Self {
        Self {
            ledger,
            initial_funding,
        }
    }

    pub fn initial_funding(&self) -> U256 {
        self.initial_funding
    }

    /// Generate a keypair and wait for its funding transfer to confirm.
    ///
    /// On funding failure the keypair is dropped and nothing is persisted.
    /// Funds already sent by a failed attempt are not reclaimed.
    pub async fn provision(&self) -> Result<CustodialWallet, ProvisioningError> {
        let signing_key = SigningKey::random(&mut OsRng);
        let address = super::derive_address(signing_key.verifying_key());

        let funding = self
            .ledger
            .transfer(address, self.initial_funding)
            .await
            .inspect_err(|e| {
                tracing::error!(address = %address, error = %e, "Initial wallet funding failed");
            })?;

        tracing::info!(
            address = %address,
            amount = %format_amount(self.initial_funding, NATIVE_DECIMALS),
            tx_hash = %funding.tx_hash,
            "Custodial wallet provisioned"
        );

        Ok(CustodialWallet::new(signing_key, funding))
    }
}
