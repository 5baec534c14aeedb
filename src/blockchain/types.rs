// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger-facing types and amount helpers.

use alloy::primitives::{Address, B256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ledger::LedgerError;

/// Decimals of the chain's native currency.
pub const NATIVE_DECIMALS: u8 = 18;

/// Confirmation receipt of a state-changing ledger call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TxReceipt {
    /// Transaction hash (0x-prefixed)
    pub tx_hash: String,
    /// Block where the transaction was included
    pub block_number: u64,
    /// Gas actually used
    pub gas_used: u64,
}

/// Identity payload committed to the voting contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityCommit {
    pub institutional_id: String,
    pub email: String,
    pub username: String,
    pub program: String,
    pub password_hash: B256,
    pub wallet_address: Address,
}

/// Finalized identity as read back from the voting contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedIdentity {
    pub institutional_id: String,
    pub email: String,
    pub username: String,
    pub program: String,
    pub wallet_address: Address,
    pub registered_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub is_locked: bool,
    pub password_changed_at: Option<DateTime<Utc>>,
}

/// Voting session window as reported by the contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VotingStatus {
    pub active: bool,
    pub session_name: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Block time the contract evaluated the window at
    pub current_time: Option<DateTime<Utc>>,
}

/// A vote signed by the voter's custodial wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedBallot {
    pub candidate_id: u64,
    pub message_hash: B256,
    pub signature: Vec<u8>,
}

/// Parse a human-readable amount to wei.
///
/// # Arguments
/// * `amount` - Amount as a string (e.g., "0.05")
/// * `decimals` - Number of decimals (18 for the native currency)
pub fn parse_amount(amount: &str, decimals: u8) -> Result<U256, LedgerError> {
    let parts: Vec<&str> = amount.trim().split('.').collect();

    if parts.len() > 2 || parts[0].is_empty() {
        return Err(LedgerError::InvalidInput(format!(
            "Invalid amount format: {amount}"
        )));
    }

    let whole = parts[0]
        .parse::<u128>()
        .map_err(|_| LedgerError::InvalidInput("Invalid whole number".to_string()))?;

    let decimal_part = if parts.len() == 2 {
        let dec_str = parts[1];
        if dec_str.len() > decimals as usize {
            return Err(LedgerError::InvalidInput(format!(
                "Too many decimal places (max {decimals})"
            )));
        }
        // Pad with zeros to match decimals
        let padded = format!("{:0<width$}", dec_str, width = decimals as usize);
        padded
            .parse::<u128>()
            .map_err(|_| LedgerError::InvalidInput("Invalid decimal".to_string()))?
    } else {
        0u128
    };

    let multiplier = 10u128.pow(decimals as u32);
    let total = whole
        .checked_mul(multiplier)
        .and_then(|w| w.checked_add(decimal_part))
        .ok_or_else(|| LedgerError::InvalidInput("Amount overflow".to_string()))?;

    Ok(U256::from(total))
}

/// Format wei to a human-readable amount.
pub fn format_amount(amount: U256, decimals: u8) -> String {
    if amount.is_zero() {
        return "0".to_string();
    }

    let divisor = U256::from(10u64).pow(U256::from(decimals));
    let whole = amount / divisor;
    let remainder = amount % divisor;

    if remainder.is_zero() {
        whole.to_string()
    } else {
        let decimal_str = format!("{:0>width$}", remainder, width = decimals as usize);
        let trimmed = decimal_str.trim_end_matches('0');
        format!("{whole}.{trimmed}")
    }
}

/// Convert an on-chain unix timestamp to a UTC datetime, treating 0 as unset.
pub(crate) fn timestamp_from_chain(secs: U256) -> Option<DateTime<Utc>> {
    let secs: i64 = secs.saturating_to();
    if secs == 0 {
        return None;
    }
    DateTime::from_timestamp(secs, 0)
}
