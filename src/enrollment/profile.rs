// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Enrollment request validation and contact-address normalization.

use alloy::primitives::B256;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use utoipa::ToSchema;

use crate::blockchain::password_hash;

pub const MIN_USERNAME_LEN: usize = 3;
pub const MIN_INSTITUTIONAL_ID_LEN: usize = 8;
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;

/// Canonical form of a contact address: trimmed, NFKC-normalized, lowercase.
///
/// Every store in the enrollment flow is keyed by this form.
pub fn normalize_subject(raw: &str) -> String {
    raw.trim().nfkc().collect::<String>().to_lowercase()
}

/// Validation rules that depend on deployment.
#[derive(Debug, Clone, Default)]
pub struct ProfilePolicy {
    /// Accepted email domains (lowercase, without `@`). Empty accepts any.
    pub allowed_email_domains: Vec<String>,
}

/// A single rejected field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Raw enrollment request as submitted by a voter.
#[derive(Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentRequest {
    pub email: String,
    pub username: String,
    #[serde(alias = "nim")]
    pub institutional_id: String,
    #[serde(alias = "prodi")]
    pub program: String,
    pub password: String,
}

impl std::fmt::Debug for EnrollmentRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnrollmentRequest")
            .field("email", &self.email)
            .field("username", &self.username)
            .field("institutional_id", &self.institutional_id)
            .field("program", &self.program)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Validated profile held in the pending store until the code is verified.
///
/// Only the password hash is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftProfile {
    pub username: String,
    pub institutional_id: String,
    pub program: String,
    /// keccak256 of the password
    pub password_hash: B256,
}

impl EnrollmentRequest {
    /// Validate every field and return the normalized subject with its draft.
    ///
    /// All failing fields are reported together.
    pub fn validate(&self, policy: &ProfilePolicy) -> Result<(String, DraftProfile), Vec<FieldError>> {
        let mut errors = Vec::new();
        let subject = normalize_subject(&self.email);

        if !is_valid_email(&subject) {
            errors.push(FieldError::new("email", "invalid email format"));
        } else if !domain_allowed(&subject, &policy.allowed_email_domains) {
            errors.push(FieldError::new(
                "email",
                format!(
                    "email domain must be one of: {}",
                    policy.allowed_email_domains.join(", ")
                ),
            ));
        }

        let username = self.username.trim();
        if username.chars().count() < MIN_USERNAME_LEN {
            errors.push(FieldError::new(
                "username",
                format!("username must be at least {MIN_USERNAME_LEN} characters"),
            ));
        }

        let institutional_id = self.institutional_id.trim();
        if institutional_id.len() < MIN_INSTITUTIONAL_ID_LEN
            || !institutional_id.chars().all(|c| c.is_ascii_digit())
        {
            errors.push(FieldError::new(
                "institutionalId",
                format!("institutional id must be at least {MIN_INSTITUTIONAL_ID_LEN} digits"),
            ));
        }

        let program = self.program.trim();
        if program.is_empty() {
            errors.push(FieldError::new("program", "program is required"));
        }

        if let Err(message) = validate_password(&self.password) {
            errors.push(FieldError::new("password", message));
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok((
            subject,
            DraftProfile {
                username: username.to_string(),
                institutional_id: institutional_id.to_string(),
                program: program.to_string(),
                password_hash: password_hash(&self.password),
            },
        ))
    }
}

/// Password length rule shared by enrollment and password change.
pub fn validate_password(password: &str) -> Result<(), String> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(format!(
            "password must be between {MIN_PASSWORD_LEN} and {MAX_PASSWORD_LEN} characters"
        ));
    }
    Ok(())
}

/// `local@domain.tld` with no whitespace and a single `@`.
fn is_valid_email(address: &str) -> bool {
    if address.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = address.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i < domain.len() - 1)
}

fn domain_allowed(address: &str, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    address
        .rsplit_once('@')
        .is_some_and(|(_, domain)| allowed.iter().any(|d| d == domain))
}
