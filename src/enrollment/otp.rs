// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! One-time code manager.
//!
//! At most one live code exists per subject. Issuing a new code replaces the
//! previous one, so a stale code can never be replayed after a resend. Each
//! code allows a bounded number of verification attempts.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};
use k256::elliptic_curve::rand_core::{OsRng, RngCore};
use subtle::ConstantTimeEq;

/// Default number of digits in a code.
pub const DEFAULT_CODE_LENGTH: usize = 6;

/// Default code lifetime (10 minutes).
pub const DEFAULT_CODE_TTL: TimeDelta = TimeDelta::minutes(10);

/// Default verification attempt ceiling.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Code generation and verification limits.
#[derive(Debug, Clone)]
pub struct OtpConfig {
    /// Number of decimal digits (1..=18)
    pub length: usize,
    /// Lifetime from issuance
    pub ttl: TimeDelta,
    /// Attempts allowed before the code is burned
    pub max_attempts: u32,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            length: DEFAULT_CODE_LENGTH,
            ttl: DEFAULT_CODE_TTL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Stored code for one subject.
#[derive(Clone)]
struct OneTimeCode {
    code: String,
    #[allow(dead_code)]
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    attempt_count: u32,
}

/// Why a verification did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodeError {
    #[error("no active verification code; request a new one")]
    NotFound,

    #[error("verification code expired; request a new one")]
    Expired,

    #[error("too many failed attempts; request a new code")]
    TooManyAttempts,

    #[error("invalid verification code")]
    Mismatch { attempts_left: u32 },
}

/// Issues, verifies and expires one-time codes keyed by subject.
pub struct OtpManager {
    config: OtpConfig,
    codes: Mutex<HashMap<String, OneTimeCode>>,
}

impl OtpManager {
    pub fn new(config: OtpConfig) -> Self {
        Self {
            config,
            codes: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &OtpConfig {
        &self.config
    }

    /// Issue a fresh code for `subject`, invalidating any previous one.
    pub fn issue(&self, subject: &str) -> String {
        self.issue_at(subject, Utc::now())
    }

    pub(crate) fn issue_at(&self, subject: &str, now: DateTime<Utc>) -> String {
        let code = generate_code(self.config.length);
        let record = OneTimeCode {
            code: code.clone(),
            issued_at: now,
            expires_at: now + self.config.ttl,
            attempt_count: 0,
        };

        let replaced = self
            .codes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(subject.to_string(), record)
            .is_some();

        tracing::debug!(subject, replaced, "Verification code issued");
        code
    }

    /// Verify a candidate code for `subject`.
    ///
    /// The record is evicted on success, on expiry and once the attempt
    /// ceiling is exceeded. A mismatch keeps it and reports attempts left.
    pub fn verify(&self, subject: &str, candidate: &str) -> Result<(), CodeError> {
        self.verify_at(subject, candidate, Utc::now())
    }

    pub(crate) fn verify_at(
        &self,
        subject: &str,
        candidate: &str,
        now: DateTime<Utc>,
    ) -> Result<(), CodeError> {
        let mut codes = self.codes.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(stored) = codes.get_mut(subject) else {
            return Err(CodeError::NotFound);
        };

        if now > stored.expires_at {
            codes.remove(subject);
            return Err(CodeError::Expired);
        }

        stored.attempt_count += 1;

        if stored.attempt_count > self.config.max_attempts {
            codes.remove(subject);
            tracing::warn!(subject, "Verification code burned after too many attempts");
            return Err(CodeError::TooManyAttempts);
        }

        if !codes_match(&stored.code, candidate.trim()) {
            return Err(CodeError::Mismatch {
                attempts_left: self.config.max_attempts - stored.attempt_count,
            });
        }

        codes.remove(subject);
        Ok(())
    }

    /// Explicitly invalidate the live code for `subject`, if any.
    pub fn revoke(&self, subject: &str) -> bool {
        self.codes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(subject)
            .is_some()
    }

    /// Whether `subject` currently has an unexpired code.
    pub fn has_live_code(&self, subject: &str) -> bool {
        let now = Utc::now();
        self.codes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(subject)
            .is_some_and(|c| now <= c.expires_at)
    }

    /// Remove every expired code. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now())
    }

    pub(crate) fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut codes = self.codes.lock().unwrap_or_else(PoisonError::into_inner);
        let before = codes.len();
        codes.retain(|_, c| now <= c.expires_at);
        before - codes.len()
    }

    /// Number of stored codes (monitoring).
    pub fn len(&self) -> usize {
        self.codes.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Constant-time over the code bytes. Length is public.
fn codes_match(stored: &str, candidate: &str) -> bool {
    stored.as_bytes().ct_eq(candidate.as_bytes()).into()
}

/// Uniformly random fixed-width numeric code, leading zeros preserved.
fn generate_code(length: usize) -> String {
    let length = length.clamp(1, 18);
    let modulus = 10u64.pow(length as u32);
    // Reject the biased tail of the u64 range
    let zone = u64::MAX - (u64::MAX % modulus);
    loop {
        let value = OsRng.next_u64();
        if value < zone {
            return format!("{:0width$}", value % modulus, width = length);
        }
    }
}
