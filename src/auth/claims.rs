// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session token claims.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Role carried by every voter session.
pub const VOTER_ROLE: &str = "user";

/// Role of operator tokens, minted out of band with the same secret.
pub const ADMIN_ROLE: &str = "admin";

/// Claims of a session token bound to a finalized identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SessionClaims {
    /// Institutional id of the finalized identity
    pub sub: String,
    pub email: String,
    /// Custodial wallet address registered on the ledger
    pub wallet_address: String,
    pub role: String,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiry (unix seconds)
    pub exp: i64,
    /// Unique token id
    pub jti: String,
}

impl SessionClaims {
    pub fn new(
        institutional_id: impl Into<String>,
        email: impl Into<String>,
        wallet_address: impl Into<String>,
        ttl: TimeDelta,
    ) -> Self {
        Self::issued_at(institutional_id, email, wallet_address, ttl, Utc::now())
    }

    pub(crate) fn issued_at(
        institutional_id: impl Into<String>,
        email: impl Into<String>,
        wallet_address: impl Into<String>,
        ttl: TimeDelta,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            sub: institutional_id.into(),
            email: email.into(),
            wallet_address: wallet_address.into(),
            role: VOTER_ROLE.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn institutional_id(&self) -> &str {
        &self.sub
    }

    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}
