// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Gas top-ups for custodial wallets.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use serde::Serialize;
use utoipa::ToSchema;

use crate::blockchain::{format_amount, Ledger, LedgerError, TxReceipt, NATIVE_DECIMALS};

/// Result of a balance check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TopUpOutcome {
    pub topped_up: bool,
    /// Amount transferred (native units), present only when topped up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    /// Balance after the check (native units)
    pub balance: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<TxReceipt>,
}

/// Tops a wallet up from the funder when it drops below a threshold.
///
/// Concurrent calls for the same address may both observe a low balance
/// and both top up. The overshoot is bounded by the top-up amount.
pub struct BalanceMaintainer {
    ledger: Arc<dyn Ledger>,
    min_balance: U256,
    top_up_amount: U256,
}

impl BalanceMaintainer {
    pub fn new(ledger: Arc<dyn Ledger>, min_balance: U256, top_up_amount: U256) -> Self {
        Self {
            ledger,
            min_balance,
            top_up_amount,
        }
    }

    /// Read the balance and, if below the minimum, transfer one top-up and
    /// wait for it to confirm.
    pub async fn ensure_minimum_balance(
        &self,
        address: Address,
    ) -> Result<TopUpOutcome, LedgerError> {
        let balance = self.ledger.balance_of(address).await?;

        if balance >= self.min_balance {
            return Ok(TopUpOutcome {
                topped_up: false,
                amount: None,
                balance: format_amount(balance, NATIVE_DECIMALS),
                transaction: None,
            });
        }

        tracing::info!(
            address = %address,
            balance = %format_amount(balance, NATIVE_DECIMALS),
            "Wallet below minimum balance, topping up"
        );

        let receipt = self.ledger.transfer(address, self.top_up_amount).await?;

        Ok(TopUpOutcome {
            topped_up: true,
            amount: Some(format_amount(self.top_up_amount, NATIVE_DECIMALS)),
            balance: format_amount(balance + self.top_up_amount, NATIVE_DECIMALS),
            transaction: Some(receipt),
        })
    }
}
