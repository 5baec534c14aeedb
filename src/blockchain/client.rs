// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! EVM client for the voting contract.

use std::str::FromStr;

use alloy::{
    network::{EthereumWallet, TransactionBuilder},
    primitives::{Address, Bytes, B256, U256},
    providers::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder},
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
};
use async_trait::async_trait;

use super::contract::IVotingContract::{self, IVotingContractInstance};
use super::ledger::{classify_revert, Ledger, LedgerError};
use super::signing::signer_from_hex;
use super::types::{
    timestamp_from_chain, FinalizedIdentity, IdentityCommit, SignedBallot, TxReceipt, VotingStatus,
};

/// Ledger client backed by an HTTP JSON-RPC node.
///
/// Administrative calls (identity commits, logins, funding transfers) are
/// signed by the funder identity. Votes and password changes are signed by the
/// user's custodial wallet and pay their own gas.
pub struct EvmLedger {
    rpc_url: url::Url,
    contract_address: Address,
    funder: Address,
    /// Provider with the funder wallet attached
    provider: DynProvider,
}

impl EvmLedger {
    /// Connect to the node and attach the funder identity.
    pub fn connect(
        rpc_url: &str,
        contract_address: &str,
        funder_private_key_hex: &str,
    ) -> Result<Self, LedgerError> {
        let url: url::Url = rpc_url
            .parse()
            .map_err(|e: url::ParseError| LedgerError::InvalidInput(format!("Invalid RPC URL: {e}")))?;
        let contract_address = Address::from_str(contract_address)
            .map_err(|e| LedgerError::InvalidInput(format!("Invalid contract address: {e}")))?;

        let funder_signer = signer_from_hex(funder_private_key_hex)?;
        let funder = funder_signer.address();

        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(funder_signer))
            .connect_http(url.clone())
            .erased();

        Ok(Self {
            rpc_url: url,
            contract_address,
            funder,
            provider,
        })
    }

    /// Contract bound to the funder-signing provider.
    fn contract(&self) -> IVotingContractInstance<DynProvider> {
        IVotingContract::new(self.contract_address, self.provider.clone())
    }

    /// Contract bound to a provider signing with the given custodial wallet.
    fn contract_as(&self, signer: &PrivateKeySigner) -> IVotingContractInstance<DynProvider> {
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer.clone()))
            .connect_http(self.rpc_url.clone())
            .erased();
        IVotingContract::new(self.contract_address, provider)
    }
}

/// Map an RPC failure: error responses from the node are reverts,
/// everything else means the node could not be reached.
fn rpc_failure(error_response: Option<String>, display: String) -> LedgerError {
    match error_response {
        Some(reason) => classify_revert(&reason),
        None => LedgerError::Unavailable(display),
    }
}

fn contract_failure(err: alloy::contract::Error) -> LedgerError {
    match err {
        alloy::contract::Error::TransportError(e) => {
            let response = e.as_error_resp().map(|p| p.message.to_string());
            rpc_failure(response, e.to_string())
        }
        other => LedgerError::Reverted(other.to_string()),
    }
}

/// Wait for a sent transaction to be mined and convert its receipt.
async fn confirm(pending: PendingTransactionBuilder<alloy::network::Ethereum>) -> Result<TxReceipt, LedgerError> {
    let receipt = pending
        .get_receipt()
        .await
        .map_err(|e| LedgerError::Unavailable(format!("Failed to confirm transaction: {e}")))?;

    let tx_hash = format!("{:?}", receipt.transaction_hash);
    if !receipt.status() {
        return Err(LedgerError::Reverted(format!("transaction {tx_hash} failed")));
    }

    Ok(TxReceipt {
        tx_hash,
        block_number: receipt.block_number.unwrap_or(0),
        gas_used: receipt.gas_used as u64,
    })
}

#[async_trait]
impl Ledger for EvmLedger {
    fn funder_address(&self) -> Address {
        self.funder
    }

    async fn identity(
        &self,
        institutional_id: &str,
    ) -> Result<Option<FinalizedIdentity>, LedgerError> {
        let result = self
            .contract()
            .getUserByNIM(institutional_id.to_string())
            .call()
            .await;

        let user = match result.map_err(contract_failure) {
            Ok(user) => user,
            // The contract reverts for unknown ids
            Err(LedgerError::Reverted(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        if !user.isRegistered {
            return Ok(None);
        }

        Ok(Some(FinalizedIdentity {
            institutional_id: institutional_id.to_string(),
            email: user.email,
            username: user.username,
            program: user.prodi,
            wallet_address: user.walletAddress,
            registered_at: timestamp_from_chain(user.registeredAt),
            last_login_at: timestamp_from_chain(user.lastLoginAt),
            is_locked: user.isLocked,
            password_changed_at: timestamp_from_chain(user.passwordChangedAt),
        }))
    }

    async fn commit_identity(&self, identity: &IdentityCommit) -> Result<TxReceipt, LedgerError> {
        let pending = self
            .contract()
            .registerUser(
                identity.institutional_id.clone(),
                identity.email.clone(),
                identity.username.clone(),
                identity.program.clone(),
                identity.password_hash,
                identity.wallet_address,
            )
            .send()
            .await
            .map_err(contract_failure)?;

        confirm(pending).await
    }

    async fn transfer(&self, to: Address, amount: U256) -> Result<TxReceipt, LedgerError> {
        let tx = TransactionRequest::default()
            .with_from(self.funder)
            .with_to(to)
            .with_value(amount);

        let pending = self.provider.send_transaction(tx).await.map_err(|e| {
            let response = e.as_error_resp().map(|p| p.message.to_string());
            rpc_failure(response, e.to_string())
        })?;

        confirm(pending).await
    }

    async fn balance_of(&self, address: Address) -> Result<U256, LedgerError> {
        self.provider
            .get_balance(address)
            .await
            .map_err(|e| LedgerError::Unavailable(e.to_string()))
    }

    async fn login(
        &self,
        institutional_id: &str,
        password_hash: B256,
    ) -> Result<TxReceipt, LedgerError> {
        let pending = self
            .contract()
            .login(institutional_id.to_string(), password_hash)
            .send()
            .await
            .map_err(contract_failure)?;

        confirm(pending).await
    }

    async fn change_password(
        &self,
        signer: &PrivateKeySigner,
        institutional_id: &str,
        old_hash: B256,
        new_hash: B256,
    ) -> Result<TxReceipt, LedgerError> {
        let pending = self
            .contract_as(signer)
            .changePassword(institutional_id.to_string(), old_hash, new_hash)
            .send()
            .await
            .map_err(contract_failure)?;

        confirm(pending).await
    }

    async fn cast_vote(
        &self,
        signer: &PrivateKeySigner,
        ballot: &SignedBallot,
    ) -> Result<TxReceipt, LedgerError> {
        let pending = self
            .contract_as(signer)
            .vote(
                U256::from(ballot.candidate_id),
                ballot.message_hash,
                Bytes::from(ballot.signature.clone()),
            )
            .send()
            .await
            .map_err(contract_failure)?;

        confirm(pending).await
    }

    async fn has_voted(&self, address: Address) -> Result<bool, LedgerError> {
        self.contract()
            .hasVoted(address)
            .call()
            .await
            .map_err(contract_failure)
    }

    async fn voting_status(&self) -> Result<VotingStatus, LedgerError> {
        let status = self
            .contract()
            .getVotingStatus()
            .call()
            .await
            .map_err(contract_failure)?;

        Ok(VotingStatus {
            active: status.active,
            session_name: status.sessionName,
            start_time: timestamp_from_chain(status.startTime),
            end_time: timestamp_from_chain(status.endTime),
            current_time: timestamp_from_chain(status.currentTime),
        })
    }

    async fn block_number(&self) -> Result<u64, LedgerError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| LedgerError::Unavailable(e.to_string()))
    }
}
