// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Boundary contract of the voting ledger.
//!
//! Voting rules (duplicate votes, session windows, account locking) live in
//! the contract; this trait only describes the calls the service makes.

use alloy::primitives::{Address, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;

use super::types::{FinalizedIdentity, IdentityCommit, SignedBallot, TxReceipt, VotingStatus};

/// Errors surfaced by ledger calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("identity already registered on the ledger")]
    DuplicateIdentity,

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    #[error("transaction reverted: {0}")]
    Reverted(String),

    #[error("invalid ledger input: {0}")]
    InvalidInput(String),
}

impl LedgerError {
    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Unavailable(_))
    }
}

/// Classify a revert reason reported by the contract or node.
pub fn classify_revert(reason: &str) -> LedgerError {
    let lower = reason.to_ascii_lowercase();
    if lower.contains("already registered") {
        LedgerError::DuplicateIdentity
    } else if lower.contains("insufficient funds") {
        LedgerError::InsufficientFunds(reason.to_string())
    } else {
        LedgerError::Reverted(reason.to_string())
    }
}

/// Calls the service makes against the voting ledger.
///
/// State-changing calls return only after the transaction is confirmed.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Address of the system-controlled funder identity.
    fn funder_address(&self) -> Address;

    /// Look up a finalized identity by institutional id.
    async fn identity(&self, institutional_id: &str)
        -> Result<Option<FinalizedIdentity>, LedgerError>;

    /// Whether an institutional id is already finalized.
    async fn identity_exists(&self, institutional_id: &str) -> Result<bool, LedgerError> {
        Ok(self.identity(institutional_id).await?.is_some())
    }

    /// Commit a finalized identity (signed by the funder identity).
    async fn commit_identity(&self, identity: &IdentityCommit) -> Result<TxReceipt, LedgerError>;

    /// Transfer native currency from the funder identity.
    async fn transfer(&self, to: Address, amount: U256) -> Result<TxReceipt, LedgerError>;

    /// Current native balance of an address.
    async fn balance_of(&self, address: Address) -> Result<U256, LedgerError>;

    /// Record a login; reverts on bad credentials or a locked account.
    async fn login(&self, institutional_id: &str, password_hash: B256)
        -> Result<TxReceipt, LedgerError>;

    /// Change a password, signed and paid for by the user's custodial wallet.
    async fn change_password(
        &self,
        signer: &PrivateKeySigner,
        institutional_id: &str,
        old_hash: B256,
        new_hash: B256,
    ) -> Result<TxReceipt, LedgerError>;

    /// Submit a ballot, signed and paid for by the user's custodial wallet.
    async fn cast_vote(
        &self,
        signer: &PrivateKeySigner,
        ballot: &SignedBallot,
    ) -> Result<TxReceipt, LedgerError>;

    /// Whether an address has already voted.
    async fn has_voted(&self, address: Address) -> Result<bool, LedgerError>;

    /// Current voting session window.
    async fn voting_status(&self) -> Result<VotingStatus, LedgerError>;

    /// Latest block number, used by readiness checks.
    async fn block_number(&self) -> Result<u64, LedgerError>;
}
