// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Session tokens issued to voters after enrollment or login.
//!
//! ## Auth Flow
//!
//! 1. Enrollment completion or login issues an HS256 token bound to the
//!    finalized identity (`sub` = institutional id)
//! 2. Clients send `Authorization: Bearer <token>`
//! 3. The [`Auth`] extractor verifies signature and expiry and hands the
//!    claims to the handler
//!
//! Operator tokens carry role `admin` and are minted out of band with the
//! same secret. [`AdminOnly`] refuses every other role with 403.
//!
//! Clock skew tolerance is 60 seconds.

pub mod claims;
pub mod error;
pub mod extractor;
pub mod tokens;

pub use claims::{SessionClaims, ADMIN_ROLE, VOTER_ROLE};
pub use error::AuthError;
pub use extractor::{AdminOnly, Auth};
pub use tokens::SessionTokens;
