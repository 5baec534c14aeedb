// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory ledger double for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use alloy::primitives::{Address, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use chrono::Utc;

use super::ledger::{Ledger, LedgerError};
use super::types::{FinalizedIdentity, IdentityCommit, SignedBallot, TxReceipt, VotingStatus};

#[derive(Default)]
struct MockState {
    identities: HashMap<String, (FinalizedIdentity, B256)>,
    balances: HashMap<Address, U256>,
    transfers: Vec<(Address, U256)>,
    votes: Vec<(Address, SignedBallot)>,
    voted: HashSet<Address>,
    commit_attempts: usize,
    fail_transfers: Option<LedgerError>,
    fail_next_commits: Vec<LedgerError>,
    unavailable: bool,
    voting_status: Option<VotingStatus>,
}

/// Ledger double that keeps identities and balances in memory.
///
/// Duplicate commits are rejected with `DuplicateIdentity`, like the contract.
pub struct MockLedger {
    funder: Address,
    next_block: AtomicU64,
    state: Mutex<MockState>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            funder: PrivateKeySigner::random().address(),
            next_block: AtomicU64::new(1),
            state: Mutex::new(MockState::default()),
        }
    }

    fn receipt(&self) -> TxReceipt {
        let block = self.next_block.fetch_add(1, Ordering::SeqCst);
        TxReceipt {
            tx_hash: format!("0x{block:064x}"),
            block_number: block,
            gas_used: 21_000,
        }
    }

    pub fn set_balance(&self, address: Address, amount: U256) {
        self.state.lock().unwrap().balances.insert(address, amount);
    }

    pub fn balance(&self, address: Address) -> U256 {
        self.state
            .lock()
            .unwrap()
            .balances
            .get(&address)
            .copied()
            .unwrap_or(U256::ZERO)
    }

    pub fn transfers(&self) -> Vec<(Address, U256)> {
        self.state.lock().unwrap().transfers.clone()
    }

    pub fn votes(&self) -> Vec<(Address, SignedBallot)> {
        self.state.lock().unwrap().votes.clone()
    }

    pub fn identity_count(&self) -> usize {
        self.state.lock().unwrap().identities.len()
    }

    pub fn commit_attempts(&self) -> usize {
        self.state.lock().unwrap().commit_attempts
    }

    pub fn stored_password_hash(&self, institutional_id: &str) -> Option<B256> {
        self.state
            .lock()
            .unwrap()
            .identities
            .get(institutional_id)
            .map(|(_, hash)| *hash)
    }

    /// Make every transfer fail with the given error.
    pub fn fail_transfers(&self, err: LedgerError) {
        self.state.lock().unwrap().fail_transfers = Some(err);
    }

    /// Fail the next commit with the given error (queued, FIFO).
    pub fn fail_next_commit(&self, err: LedgerError) {
        self.state.lock().unwrap().fail_next_commits.push(err);
    }

    pub fn set_voting_status(&self, status: VotingStatus) {
        self.state.lock().unwrap().voting_status = Some(status);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap().unavailable = unavailable;
    }

    /// Register an identity directly, bypassing enrollment.
    pub fn seed_identity(&self, identity: FinalizedIdentity, password_hash: B256) {
        self.state
            .lock()
            .unwrap()
            .identities
            .insert(identity.institutional_id.clone(), (identity, password_hash));
    }

    fn check_available(state: &MockState) -> Result<(), LedgerError> {
        if state.unavailable {
            Err(LedgerError::Unavailable("mock ledger offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Ledger for MockLedger {
    fn funder_address(&self) -> Address {
        self.funder
    }

    async fn identity(
        &self,
        institutional_id: &str,
    ) -> Result<Option<FinalizedIdentity>, LedgerError> {
        let state = self.state.lock().unwrap();
        Self::check_available(&state)?;
        Ok(state
            .identities
            .get(institutional_id)
            .map(|(identity, _)| identity.clone()))
    }

    async fn commit_identity(&self, identity: &IdentityCommit) -> Result<TxReceipt, LedgerError> {
        let mut state = self.state.lock().unwrap();
        Self::check_available(&state)?;
        state.commit_attempts += 1;
        if !state.fail_next_commits.is_empty() {
            return Err(state.fail_next_commits.remove(0));
        }
        if state.identities.contains_key(&identity.institutional_id) {
            return Err(LedgerError::DuplicateIdentity);
        }
        state.identities.insert(
            identity.institutional_id.clone(),
            (
                FinalizedIdentity {
                    institutional_id: identity.institutional_id.clone(),
                    email: identity.email.clone(),
                    username: identity.username.clone(),
                    program: identity.program.clone(),
                    wallet_address: identity.wallet_address,
                    registered_at: Some(Utc::now()),
                    last_login_at: None,
                    is_locked: false,
                    password_changed_at: None,
                },
                identity.password_hash,
            ),
        );
        drop(state);
        Ok(self.receipt())
    }

    async fn transfer(&self, to: Address, amount: U256) -> Result<TxReceipt, LedgerError> {
        let mut state = self.state.lock().unwrap();
        Self::check_available(&state)?;
        if let Some(err) = state.fail_transfers.clone() {
            return Err(err);
        }
        state.transfers.push((to, amount));
        let balance = state.balances.entry(to).or_insert(U256::ZERO);
        *balance += amount;
        drop(state);
        Ok(self.receipt())
    }

    async fn balance_of(&self, address: Address) -> Result<U256, LedgerError> {
        let state = self.state.lock().unwrap();
        Self::check_available(&state)?;
        Ok(state.balances.get(&address).copied().unwrap_or(U256::ZERO))
    }

    async fn login(
        &self,
        institutional_id: &str,
        password_hash: B256,
    ) -> Result<TxReceipt, LedgerError> {
        {
            let mut state = self.state.lock().unwrap();
            Self::check_available(&state)?;
            match state.identities.get_mut(institutional_id) {
                Some((identity, hash)) if *hash == password_hash => {
                    identity.last_login_at = Some(Utc::now());
                }
                Some(_) => return Err(LedgerError::Reverted("Invalid credentials".to_string())),
                None => return Err(LedgerError::Reverted("User not registered".to_string())),
            }
        }
        Ok(self.receipt())
    }

    async fn change_password(
        &self,
        signer: &PrivateKeySigner,
        institutional_id: &str,
        old_hash: B256,
        new_hash: B256,
    ) -> Result<TxReceipt, LedgerError> {
        {
            let mut state = self.state.lock().unwrap();
            Self::check_available(&state)?;
            match state.identities.get_mut(institutional_id) {
                Some((identity, hash)) if identity.wallet_address == signer.address() => {
                    if *hash != old_hash {
                        return Err(LedgerError::Reverted("Invalid old password".to_string()));
                    }
                    *hash = new_hash;
                    identity.password_changed_at = Some(Utc::now());
                }
                _ => return Err(LedgerError::Reverted("Not authorized".to_string())),
            }
        }
        Ok(self.receipt())
    }

    async fn cast_vote(
        &self,
        signer: &PrivateKeySigner,
        ballot: &SignedBallot,
    ) -> Result<TxReceipt, LedgerError> {
        {
            let mut state = self.state.lock().unwrap();
            Self::check_available(&state)?;
            let voter = signer.address();
            if state.balances.get(&voter).copied().unwrap_or(U256::ZERO).is_zero() {
                return Err(LedgerError::InsufficientFunds(
                    "insufficient funds for gas".to_string(),
                ));
            }
            if !state.voted.insert(voter) {
                return Err(LedgerError::Reverted("Already voted".to_string()));
            }
            state.votes.push((voter, ballot.clone()));
        }
        Ok(self.receipt())
    }

    async fn has_voted(&self, address: Address) -> Result<bool, LedgerError> {
        let state = self.state.lock().unwrap();
        Self::check_available(&state)?;
        Ok(state.voted.contains(&address))
    }

    async fn voting_status(&self) -> Result<VotingStatus, LedgerError> {
        let state = self.state.lock().unwrap();
        Self::check_available(&state)?;
        Ok(state.voting_status.clone().unwrap_or(VotingStatus {
            active: false,
            session_name: String::new(),
            start_time: None,
            end_time: None,
            current_time: Some(Utc::now()),
        }))
    }

    async fn block_number(&self) -> Result<u64, LedgerError> {
        let state = self.state.lock().unwrap();
        Self::check_available(&state)?;
        Ok(self.next_block.load(Ordering::SeqCst))
    }
}
