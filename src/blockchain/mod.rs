// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain integration for the voting contract.
//!
//! This module provides:
//! - The [`Ledger`] boundary trait the rest of the service depends on
//! - [`EvmLedger`], the alloy-backed implementation
//! - Signer construction, password hashing and ballot signing
//! - Amount parsing/formatting in wei

pub mod client;
pub mod contract;
pub mod ledger;
pub mod signing;
pub mod types;

#[cfg(test)]
pub mod mock;

pub use client::EvmLedger;
pub use ledger::{Ledger, LedgerError};
pub use signing::{password_hash, sign_ballot, signer_from_hex, signer_from_key_bytes};
pub use types::*;
