// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Voting Enrollment Server - Custodial Identity Onboarding
//!
//! Enrolls voters in two code-gated phases: a custodial EVM wallet is
//! provisioned and funded up front, and the voter identity is committed to
//! the voting contract once the one-time code is verified. The client keeps
//! the wallet key as an envelope sealed under the server's custody key.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `account` - login, profile, password change, voting
//! - `auth` - session tokens (HS256 JWT)
//! - `blockchain` - voting contract client
//! - `custody` - key envelope codec
//! - `enrollment` - one-time codes, pending store, enrollment state machine
//! - `notify` - out-of-band code delivery
//! - `wallet` - custodial wallet provisioning and balance top-ups

pub mod account;
pub mod api;
pub mod auth;
pub mod blockchain;
pub mod config;
pub mod custody;
pub mod enrollment;
pub mod error;
pub mod models;
pub mod notify;
pub mod state;
pub mod wallet;
