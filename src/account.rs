// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Voter Account Operations
//!
//! Operations available to a voter after enrollment:
//!
//! - login against the ledger's stored password hash
//! - profile lookup
//! - password change and vote casting, both signed by the custodial wallet
//!   reopened from the client-held envelope
//! - wallet balance, vote check and the voting session window
//!
//! Every call the custodial wallet pays gas for is preceded by a balance
//! top-up check.
//!
//! Operators (admin tokens) can read any wallet's balance, the funder's
//! balance, and trigger a top-up for a wallet.

use std::sync::Arc;

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::{AuthError, SessionClaims, SessionTokens};
use crate::blockchain::{
    format_amount, password_hash, sign_ballot, FinalizedIdentity, Ledger, LedgerError,
    TxReceipt, VotingStatus, NATIVE_DECIMALS,
};
use crate::custody::{Envelope, KeyCustody};
use crate::enrollment::profile::validate_password;
use crate::wallet::{custodial_signer, BalanceMaintainer, TopUpOutcome, WalletError};

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("invalid institutional id or password")]
    InvalidCredentials,

    #[error("account is locked")]
    AccountLocked,

    #[error("identity not found")]
    NotFound,

    #[error("encrypted private key is invalid")]
    InvalidEnvelope,

    #[error("encrypted private key does not belong to this account")]
    WalletMismatch,

    #[error("this wallet has already voted")]
    AlreadyVoted,

    #[error("rejected by the voting contract: {0}")]
    Rejected(String),

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("session token failure: {0}")]
    Session(#[from] AuthError),
}

impl From<LedgerError> for AccountError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Unavailable(m) => AccountError::LedgerUnavailable(m),
            LedgerError::InsufficientFunds(m) => AccountError::InsufficientFunds(m),
            LedgerError::Reverted(m) => AccountError::Rejected(m),
            LedgerError::InvalidInput(m) => AccountError::InvalidInput(m),
            LedgerError::DuplicateIdentity => AccountError::Rejected(err.to_string()),
        }
    }
}

impl From<WalletError> for AccountError {
    fn from(_: WalletError) -> Self {
        AccountError::InvalidEnvelope
    }
}

/// Finalized identity as shown to its owner.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub institutional_id: String,
    pub email: String,
    pub username: String,
    pub program: String,
    pub wallet_address: String,
    pub registered_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub has_voted: bool,
}

impl UserProfile {
    fn new(identity: FinalizedIdentity, has_voted: bool) -> Self {
        Self {
            institutional_id: identity.institutional_id,
            email: identity.email,
            username: identity.username,
            program: identity.program,
            wallet_address: identity.wallet_address.to_string(),
            registered_at: identity.registered_at,
            last_login_at: identity.last_login_at,
            has_voted,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginOutcome {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChanged {
    pub transaction: TxReceipt,
    pub top_up: TopUpOutcome,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VoteCast {
    pub candidate_id: u64,
    pub voter: String,
    pub transaction: TxReceipt,
    pub top_up: TopUpOutcome,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WalletBalance {
    pub address: String,
    /// Native units (e.g. "0.05")
    pub balance: String,
    pub balance_wei: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VoteCheck {
    pub has_voted: bool,
    pub wallet_address: String,
}

pub struct AccountService {
    ledger: Arc<dyn Ledger>,
    custody: Arc<KeyCustody>,
    balance: BalanceMaintainer,
    tokens: Arc<SessionTokens>,
}

impl AccountService {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        custody: Arc<KeyCustody>,
        balance: BalanceMaintainer,
        tokens: Arc<SessionTokens>,
    ) -> Self {
        Self {
            ledger,
            custody,
            balance,
            tokens,
        }
    }

    pub async fn login(
        &self,
        institutional_id: &str,
        password: &str,
    ) -> Result<LoginOutcome, AccountError> {
        let institutional_id = institutional_id.trim();
        if institutional_id.is_empty() || password.is_empty() {
            return Err(AccountError::InvalidInput(
                "institutional id and password are required".to_string(),
            ));
        }

        let identity = self
            .ledger
            .identity(institutional_id)
            .await?
            .ok_or(AccountError::InvalidCredentials)?;
        if identity.is_locked {
            return Err(AccountError::AccountLocked);
        }

        match self
            .ledger
            .login(institutional_id, password_hash(password))
            .await
        {
            Ok(_) => {}
            Err(LedgerError::Reverted(reason)) => {
                tracing::info!(institutional_id, "Login rejected by contract");
                return Err(if reason.to_ascii_lowercase().contains("locked") {
                    AccountError::AccountLocked
                } else {
                    AccountError::InvalidCredentials
                });
            }
            Err(e) => return Err(e.into()),
        }

        let has_voted = self.ledger.has_voted(identity.wallet_address).await?;
        let claims = self.tokens.claims_for(
            &identity.institutional_id,
            &identity.email,
            &identity.wallet_address.to_string(),
        );
        let token = self.tokens.issue(&claims)?;

        tracing::info!(institutional_id, "Voter logged in");

        Ok(LoginOutcome {
            token,
            user: UserProfile::new(identity, has_voted),
        })
    }

    pub async fn profile(&self, claims: &SessionClaims) -> Result<UserProfile, AccountError> {
        let identity = self
            .ledger
            .identity(claims.institutional_id())
            .await?
            .ok_or(AccountError::NotFound)?;
        let has_voted = self.ledger.has_voted(identity.wallet_address).await?;
        Ok(UserProfile::new(identity, has_voted))
    }

    pub async fn change_password(
        &self,
        claims: &SessionClaims,
        old_password: &str,
        new_password: &str,
        envelope: &Envelope,
    ) -> Result<PasswordChanged, AccountError> {
        validate_password(new_password).map_err(AccountError::InvalidInput)?;
        if old_password == new_password {
            return Err(AccountError::InvalidInput(
                "new password must differ from the old one".to_string(),
            ));
        }

        let signer = self.owned_signer(claims, envelope)?;
        let top_up = self.balance.ensure_minimum_balance(signer.address()).await?;

        let transaction = self
            .ledger
            .change_password(
                &signer,
                claims.institutional_id(),
                password_hash(old_password),
                password_hash(new_password),
            )
            .await?;

        tracing::info!(
            institutional_id = %claims.sub,
            tx_hash = %transaction.tx_hash,
            "Password changed"
        );

        Ok(PasswordChanged {
            transaction,
            top_up,
        })
    }

    pub async fn cast_vote(
        &self,
        claims: &SessionClaims,
        candidate_id: u64,
        envelope: &Envelope,
    ) -> Result<VoteCast, AccountError> {
        let signer = self.owned_signer(claims, envelope)?;
        let voter = signer.address();

        if self.ledger.has_voted(voter).await? {
            return Err(AccountError::AlreadyVoted);
        }

        let top_up = self.balance.ensure_minimum_balance(voter).await?;
        let ballot = sign_ballot(&signer, candidate_id).await?;

        let transaction = match self.ledger.cast_vote(&signer, &ballot).await {
            Ok(receipt) => receipt,
            Err(LedgerError::Reverted(reason))
                if reason.to_ascii_lowercase().contains("already voted") =>
            {
                return Err(AccountError::AlreadyVoted);
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            voter = %voter,
            candidate_id,
            tx_hash = %transaction.tx_hash,
            "Vote cast"
        );

        Ok(VoteCast {
            candidate_id,
            voter: voter.to_string(),
            transaction,
            top_up,
        })
    }

    pub async fn wallet_balance(&self, claims: &SessionClaims) -> Result<WalletBalance, AccountError> {
        self.balance_at(session_wallet(claims)?).await
    }

    pub async fn vote_check(&self, claims: &SessionClaims) -> Result<VoteCheck, AccountError> {
        let address = session_wallet(claims)?;
        let has_voted = self.ledger.has_voted(address).await?;
        Ok(VoteCheck {
            has_voted,
            wallet_address: address.to_string(),
        })
    }

    pub async fn voting_status(&self) -> Result<VotingStatus, AccountError> {
        Ok(self.ledger.voting_status().await?)
    }

    // =========================================================================
    // Operator
    // =========================================================================

    pub async fn funder_balance(&self) -> Result<WalletBalance, AccountError> {
        self.balance_at(self.ledger.funder_address()).await
    }

    pub async fn address_balance(&self, address: &str) -> Result<WalletBalance, AccountError> {
        self.balance_at(parse_address(address)?).await
    }

    /// Top a wallet up from the funder if it is below the minimum balance.
    pub async fn refund_wallet(
        &self,
        operator: &SessionClaims,
        address: &str,
    ) -> Result<TopUpOutcome, AccountError> {
        let address = parse_address(address)?;
        let outcome = self.balance.ensure_minimum_balance(address).await?;

        tracing::info!(
            operator = %operator.sub,
            address = %address,
            topped_up = outcome.topped_up,
            "Operator wallet refund"
        );

        Ok(outcome)
    }

    async fn balance_at(&self, address: Address) -> Result<WalletBalance, AccountError> {
        let balance = self.ledger.balance_of(address).await?;
        Ok(WalletBalance {
            address: address.to_string(),
            balance: format_amount(balance, NATIVE_DECIMALS),
            balance_wei: balance.to_string(),
        })
    }

    /// Reopen the client-held envelope and check it is the session's wallet.
    fn owned_signer(
        &self,
        claims: &SessionClaims,
        envelope: &Envelope,
    ) -> Result<PrivateKeySigner, AccountError> {
        let signer = custodial_signer(&self.custody, envelope)?;
        if signer.address() != session_wallet(claims)? {
            tracing::warn!(institutional_id = %claims.sub, "Envelope does not match session wallet");
            return Err(AccountError::WalletMismatch);
        }
        Ok(signer)
    }
}

fn parse_address(raw: &str) -> Result<Address, AccountError> {
    raw.trim()
        .parse()
        .map_err(|_| AccountError::InvalidInput(format!("invalid wallet address: {raw}")))
}

fn session_wallet(claims: &SessionClaims) -> Result<Address, AccountError> {
    claims
        .wallet_address
        .parse()
        .map_err(|_| AccountError::WalletMismatch)
}
