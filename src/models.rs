// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Request Models
//!
//! Request bodies accepted by the REST API. Response bodies live next to the
//! service that produces them (`enrollment`, `account`).
//!
//! Field names are camelCase on the wire. The legacy field names used by
//! existing clients (`nim`, `otp`) are accepted as aliases.

use serde::Deserialize;
use utoipa::ToSchema;

use crate::custody::Envelope;

// =============================================================================
// Enrollment
// =============================================================================

/// Second enrollment phase: the code delivered to `email`.
#[derive(Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCodeRequest {
    pub email: String,
    #[serde(alias = "otp")]
    pub code: String,
}

impl std::fmt::Debug for VerifyCodeRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifyCodeRequest")
            .field("email", &self.email)
            .field("code", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ResendCodeRequest {
    pub email: String,
}

// =============================================================================
// Account
// =============================================================================

#[derive(Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(alias = "nim")]
    pub institutional_id: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("institutional_id", &self.institutional_id)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Password change, signed by the caller's custodial wallet.
#[derive(Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
    /// Envelope returned at enrollment
    pub encrypted_private_key: Envelope,
}

impl std::fmt::Debug for ChangePasswordRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangePasswordRequest")
            .field("old_password", &"<redacted>")
            .field("new_password", &"<redacted>")
            .field("encrypted_private_key", &self.encrypted_private_key)
            .finish()
    }
}

// =============================================================================
// Voting
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub candidate_id: u64,
    /// Envelope returned at enrollment
    pub encrypted_private_key: Envelope,
}

// =============================================================================
// Operator
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    /// Wallet to top up (0x-prefixed)
    pub address: String,
}
