// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Enrollment Orchestrator
//!
//! Two-phase, code-gated enrollment:
//!
//! 1. [`EnrollmentService::begin_enrollment`] validates the profile, checks
//!    the ledger for an existing identity, provisions and funds a custodial
//!    wallet, seals its key, stores the pending record, issues a code and
//!    delivers it.
//! 2. [`EnrollmentService::complete_enrollment`] verifies the code, commits
//!    the identity to the ledger, evicts the pending record and issues a
//!    session token. The sealed key is handed to the client.
//!
//! A commit that fails on the ledger keeps the pending record. The verified
//! code is remembered as a keyed digest so the same code can retry the
//! commit. A ledger rejection for a duplicate identity bound to the same
//! wallet counts as already applied.
//!
//! Per-subject work runs under [`SubjectLocks`]. Provisioning and code
//! delivery happen outside the lock.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use k256::elliptic_curve::rand_core::{OsRng, RngCore};
use serde::Serialize;
use sha2::Sha256;
use utoipa::ToSchema;

use super::locks::SubjectLocks;
use super::otp::{CodeError, OtpManager};
use super::pending::{PendingEnrollment, PendingStore, PendingStoreError};
use super::profile::{normalize_subject, EnrollmentRequest, FieldError, ProfilePolicy};
use crate::auth::{AuthError, SessionTokens};
use crate::blockchain::{IdentityCommit, Ledger, LedgerError, TxReceipt};
use crate::custody::{CustodyError, Envelope, KeyCustody};
use crate::notify::{Notification, Notifier, NotifyError};
use crate::wallet::{ProvisioningError, WalletProvisioner};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum EnrollmentError {
    #[error("invalid enrollment profile")]
    InvalidProfile(Vec<FieldError>),

    #[error("institutional id is already registered")]
    AlreadyRegistered,

    #[error("wallet provisioning failed: {0}")]
    ProvisioningFailed(#[from] ProvisioningError),

    #[error(transparent)]
    Code(#[from] CodeError),

    #[error("enrollment session expired; please register again")]
    SessionExpired,

    #[error("no pending enrollment for this address")]
    NoPendingEnrollment,

    #[error("ledger commit failed: {0}")]
    CommitFailed(LedgerError),

    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("key custody failure: {0}")]
    Custody(#[from] CustodyError),

    #[error("pending store failure: {0}")]
    Store(#[from] PendingStoreError),

    #[error("code delivery failed: {0}")]
    DeliveryFailed(NotifyError),

    #[error("session token failure: {0}")]
    Session(#[from] AuthError),

    #[error("internal enrollment error: {0}")]
    Internal(String),
}

impl EnrollmentError {
    fn from_lookup(err: LedgerError) -> Self {
        EnrollmentError::LedgerUnavailable(err.to_string())
    }

    fn from_commit(err: LedgerError) -> Self {
        if err.is_transient() {
            EnrollmentError::LedgerUnavailable(err.to_string())
        } else {
            EnrollmentError::CommitFailed(err)
        }
    }
}

/// Phase 1 acknowledgment.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentStarted {
    pub email: String,
    pub institutional_id: String,
    pub wallet_address: String,
    pub funding: TxReceipt,
    /// False when the code could not be delivered; request a resend
    pub code_delivered: bool,
    pub code_expires_in_secs: i64,
    pub message: String,
}

/// Identity as committed to the ledger.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrolledUser {
    pub institutional_id: String,
    pub email: String,
    pub username: String,
    pub program: String,
    pub wallet_address: String,
}

/// Phase 2 result. The client becomes the holder of the sealed key.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentCompleted {
    pub token: String,
    pub user: EnrolledUser,
    #[schema(value_type = String)]
    pub encrypted_private_key: Envelope,
    /// Commit receipt; absent when a previous attempt already committed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<TxReceipt>,
    pub already_committed: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CodeResent {
    pub email: String,
    pub code_expires_in_secs: i64,
}

/// Collaborators of the orchestrator.
pub struct EnrollmentDeps {
    pub ledger: Arc<dyn Ledger>,
    pub provisioner: WalletProvisioner,
    pub custody: Arc<KeyCustody>,
    pub pending: Arc<dyn PendingStore>,
    pub codes: Arc<OtpManager>,
    pub notifier: Arc<dyn Notifier>,
    pub tokens: Arc<SessionTokens>,
    pub policy: ProfilePolicy,
}

pub struct EnrollmentService {
    ledger: Arc<dyn Ledger>,
    provisioner: WalletProvisioner,
    custody: Arc<KeyCustody>,
    pending: Arc<dyn PendingStore>,
    codes: Arc<OtpManager>,
    notifier: Arc<dyn Notifier>,
    tokens: Arc<SessionTokens>,
    policy: ProfilePolicy,
    locks: SubjectLocks,
    /// Per-process key for verified-code digests
    digest_key: [u8; 32],
}

impl EnrollmentService {
    pub fn new(deps: EnrollmentDeps) -> Self {
        let mut digest_key = [0u8; 32];
        OsRng.fill_bytes(&mut digest_key);

        Self {
            ledger: deps.ledger,
            provisioner: deps.provisioner,
            custody: deps.custody,
            pending: deps.pending,
            codes: deps.codes,
            notifier: deps.notifier,
            tokens: deps.tokens,
            policy: deps.policy,
            locks: SubjectLocks::new(),
            digest_key,
        }
    }

    fn code_ttl_secs(&self) -> i64 {
        self.codes.config().ttl.num_seconds()
    }

    // =========================================================================
    // Phase 1
    // =========================================================================

    pub async fn begin_enrollment(
        &self,
        request: &EnrollmentRequest,
    ) -> Result<EnrollmentStarted, EnrollmentError> {
        let (subject, draft) = request
            .validate(&self.policy)
            .map_err(EnrollmentError::InvalidProfile)?;

        if self
            .ledger
            .identity_exists(&draft.institutional_id)
            .await
            .map_err(EnrollmentError::from_lookup)?
        {
            return Err(EnrollmentError::AlreadyRegistered);
        }

        let wallet = self.provisioner.provision().await?;
        let sealed = wallet.seal(&self.custody)?;

        let (record, code) = {
            let _guard = self.locks.acquire(&subject).await;
            let record = self.pending.put(&subject, draft, sealed)?;
            let code = self.codes.issue(&subject);
            (record, code)
        };

        tracing::info!(
            subject = %subject,
            institutional_id = %record.profile.institutional_id,
            wallet = %record.wallet_address,
            "Enrollment started"
        );

        let code_delivered = match self.deliver_code(&subject, code).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(subject = %subject, error = %e, "Enrollment code delivery failed");
                false
            }
        };

        let message = if code_delivered {
            "Verification code sent. Submit it to complete enrollment."
        } else {
            "Enrollment saved but the verification code could not be delivered. Request a resend."
        };

        Ok(EnrollmentStarted {
            email: subject,
            institutional_id: record.profile.institutional_id,
            wallet_address: record.wallet_address.to_string(),
            funding: record.funding,
            code_delivered,
            code_expires_in_secs: self.code_ttl_secs(),
            message: message.to_string(),
        })
    }

    // =========================================================================
    // Phase 2
    // =========================================================================

    pub async fn complete_enrollment(
        &self,
        raw_subject: &str,
        code: &str,
    ) -> Result<EnrollmentCompleted, EnrollmentError> {
        let subject = normalize_subject(raw_subject);
        let code = code.trim();

        let completed = {
            let _guard = self.locks.acquire(&subject).await;
            self.verify_and_commit(&subject, code).await?
        };

        let notice = Notification::EnrollmentComplete {
            username: completed.user.username.clone(),
        };
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.deliver(&subject, notice).await {
                tracing::warn!(subject = %subject, error = %e, "Completion notice delivery failed");
            }
        });

        Ok(completed)
    }

    async fn verify_and_commit(
        &self,
        subject: &str,
        code: &str,
    ) -> Result<EnrollmentCompleted, EnrollmentError> {
        match self.codes.verify(subject, code) {
            Ok(()) => {
                let Some(mut record) = self.pending.get(subject)? else {
                    return Err(EnrollmentError::SessionExpired);
                };
                record.verified_code_digest = Some(self.code_digest(subject, code)?);
                record.retry_attempts = 0;
                self.pending.insert(record.clone())?;
                self.commit(record).await
            }
            Err(CodeError::NotFound) => self.retry_commit(subject, code).await,
            Err(e) => Err(e.into()),
        }
    }

    /// Retry with a code consumed by an earlier attempt whose commit failed.
    ///
    /// Attempts against the stored digest share the code's attempt ceiling.
    /// Past it the digest is dropped and only a resent code can complete.
    async fn retry_commit(
        &self,
        subject: &str,
        code: &str,
    ) -> Result<EnrollmentCompleted, EnrollmentError> {
        let Some(mut record) = self.pending.get(subject)? else {
            return Err(CodeError::NotFound.into());
        };
        if record.verified_code_digest.is_none() {
            return Err(CodeError::NotFound.into());
        }

        let max_attempts = self.codes.config().max_attempts;
        record.retry_attempts += 1;

        if record.retry_attempts > max_attempts {
            record.verified_code_digest = None;
            record.retry_attempts = 0;
            self.pending.insert(record)?;
            tracing::warn!(subject, "Verified code dropped after too many retry attempts");
            return Err(CodeError::TooManyAttempts.into());
        }

        let matches = self.digest_matches(subject, code, &record)?;
        let attempts_left = max_attempts - record.retry_attempts;
        self.pending.insert(record.clone())?;

        if !matches {
            return Err(CodeError::Mismatch { attempts_left }.into());
        }

        tracing::info!(subject, "Retrying enrollment commit with verified code");
        self.commit(record).await
    }

    async fn commit(
        &self,
        record: PendingEnrollment,
    ) -> Result<EnrollmentCompleted, EnrollmentError> {
        let commit = IdentityCommit {
            institutional_id: record.profile.institutional_id.clone(),
            email: record.subject.clone(),
            username: record.profile.username.clone(),
            program: record.profile.program.clone(),
            password_hash: record.profile.password_hash,
            wallet_address: record.wallet_address,
        };

        let receipt = match self.ledger.commit_identity(&commit).await {
            Ok(receipt) => Some(receipt),
            Err(LedgerError::DuplicateIdentity) => {
                self.confirm_already_applied(&record).await?;
                None
            }
            Err(e) => {
                tracing::warn!(
                    subject = %record.subject,
                    error = %e,
                    "Enrollment commit failed; pending record kept for retry"
                );
                return Err(EnrollmentError::from_commit(e));
            }
        };

        if let Err(e) = self.pending.remove(&record.subject) {
            tracing::error!(
                subject = %record.subject,
                error = %e,
                "Failed to evict committed enrollment; it will expire"
            );
        }

        let claims = self.tokens.claims_for(
            &commit.institutional_id,
            &commit.email,
            &commit.wallet_address.to_string(),
        );
        let token = self.tokens.issue(&claims)?;

        tracing::info!(
            subject = %record.subject,
            institutional_id = %commit.institutional_id,
            tx_hash = receipt.as_ref().map(|r| r.tx_hash.as_str()).unwrap_or("-"),
            "Enrollment committed"
        );

        Ok(EnrollmentCompleted {
            token,
            user: EnrolledUser {
                institutional_id: commit.institutional_id,
                email: commit.email,
                username: commit.username,
                program: commit.program,
                wallet_address: commit.wallet_address.to_string(),
            },
            encrypted_private_key: record.encrypted_private_key,
            already_committed: receipt.is_none(),
            commit: receipt,
        })
    }

    /// A duplicate rejection is success only if the ledger holds this
    /// enrollment's wallet. Otherwise the id belongs to someone else.
    async fn confirm_already_applied(
        &self,
        record: &PendingEnrollment,
    ) -> Result<(), EnrollmentError> {
        let existing = self
            .ledger
            .identity(&record.profile.institutional_id)
            .await
            .map_err(EnrollmentError::from_lookup)?;

        match existing {
            Some(identity) if identity.wallet_address == record.wallet_address => {
                tracing::info!(
                    subject = %record.subject,
                    "Identity already committed by an earlier attempt"
                );
                Ok(())
            }
            _ => {
                self.pending.remove(&record.subject)?;
                Err(EnrollmentError::AlreadyRegistered)
            }
        }
    }

    // =========================================================================
    // Resend
    // =========================================================================

    pub async fn resend_code(&self, raw_subject: &str) -> Result<CodeResent, EnrollmentError> {
        let subject = normalize_subject(raw_subject);

        let code = {
            let _guard = self.locks.acquire(&subject).await;
            if self.pending.get(&subject)?.is_none() {
                return Err(EnrollmentError::NoPendingEnrollment);
            }
            self.codes.revoke(&subject);
            self.codes.issue(&subject)
        };

        self.deliver_code(&subject, code)
            .await
            .map_err(EnrollmentError::DeliveryFailed)?;

        tracing::info!(subject = %subject, "Enrollment code reissued");

        Ok(CodeResent {
            email: subject,
            code_expires_in_secs: self.code_ttl_secs(),
        })
    }

    async fn deliver_code(&self, subject: &str, code: String) -> Result<(), NotifyError> {
        let ttl_minutes = self.codes.config().ttl.num_minutes().max(1) as u64;
        self.notifier
            .deliver(subject, Notification::EnrollmentCode { code, ttl_minutes })
            .await
    }

    // =========================================================================
    // Verified-code digests
    // =========================================================================

    fn mac(&self, subject: &str, code: &str) -> Result<HmacSha256, EnrollmentError> {
        let mut mac = HmacSha256::new_from_slice(&self.digest_key)
            .map_err(|_| EnrollmentError::Internal("invalid digest key".to_string()))?;
        mac.update(subject.as_bytes());
        mac.update(&[0]);
        mac.update(code.as_bytes());
        Ok(mac)
    }

    fn code_digest(&self, subject: &str, code: &str) -> Result<String, EnrollmentError> {
        let tag = self.mac(subject, code)?.finalize().into_bytes();
        Ok(alloy::hex::encode(tag))
    }

    fn digest_matches(
        &self,
        subject: &str,
        code: &str,
        record: &PendingEnrollment,
    ) -> Result<bool, EnrollmentError> {
        let Some(stored) = record.verified_code_digest.as_deref() else {
            return Ok(false);
        };
        let Ok(expected) = alloy::hex::decode(stored) else {
            return Ok(false);
        };
        Ok(self.mac(subject, code)?.verify_slice(&expected).is_ok())
    }

    /// Wallet of the pending record for `subject`, if any.
    #[cfg(test)]
    pub(crate) fn pending_wallet(&self, subject: &str) -> Option<alloy::primitives::Address> {
        self.pending.get(subject).ok().flatten().map(|r| r.wallet_address)
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{Address, U256};
    use chrono::{TimeDelta, Utc};

    use super::*;
    use crate::blockchain::mock::MockLedger;
    use crate::blockchain::{password_hash, FinalizedIdentity};
    use crate::enrollment::otp::OtpConfig;
    use crate::enrollment::pending::InMemoryPendingStore;
    use crate::notify::testing::RecordingNotifier;
    use crate::wallet::custodial_signer;

    const SUBJECT: &str = "u@inst.edu";

    struct Harness {
        service: Arc<EnrollmentService>,
        ledger: Arc<MockLedger>,
        notifier: Arc<RecordingNotifier>,
        pending: Arc<InMemoryPendingStore>,
        custody: Arc<KeyCustody>,
        tokens: Arc<SessionTokens>,
    }

    fn harness() -> Harness {
        let ledger = Arc::new(MockLedger::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let pending = Arc::new(InMemoryPendingStore::new(64, TimeDelta::minutes(10)));
        let custody = Arc::new(KeyCustody::new(&[9u8; 32]).unwrap());
        let tokens = Arc::new(
            SessionTokens::new(b"test-session-secret-0123456789abcdef", TimeDelta::hours(1))
                .unwrap(),
        );

        let service = EnrollmentService::new(EnrollmentDeps {
            ledger: ledger.clone(),
            provisioner: WalletProvisioner::new(ledger.clone(), U256::from(100_000u64)),
            custody: custody.clone(),
            pending: pending.clone(),
            codes: Arc::new(OtpManager::new(OtpConfig::default())),
            notifier: notifier.clone(),
            tokens: tokens.clone(),
            policy: ProfilePolicy::default(),
        });

        Harness {
            service: Arc::new(service),
            ledger,
            notifier,
            pending,
            custody,
            tokens,
        }
    }

    fn request(email: &str) -> EnrollmentRequest {
        EnrollmentRequest {
            email: email.to_string(),
            username: "Alice".to_string(),
            institutional_id: "12345678".to_string(),
            program: "CS".to_string(),
            password: "password123".to_string(),
        }
    }

    fn wrong_code(code: &str) -> &'static str {
        if code == "000000" {
            "111111"
        } else {
            "000000"
        }
    }

    async fn begin(h: &Harness) -> (EnrollmentStarted, String) {
        let started = h.service.begin_enrollment(&request(SUBJECT)).await.unwrap();
        let code = h.notifier.last_code(SUBJECT).unwrap();
        (started, code)
    }

    #[tokio::test]
    async fn begin_provisions_funds_and_delivers_code() {
        let h = harness();
        let (started, code) = begin(&h).await;

        assert!(started.code_delivered);
        assert_eq!(started.email, SUBJECT);
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));

        let address: Address = started.wallet_address.parse().unwrap();
        assert_eq!(h.ledger.transfers(), vec![(address, U256::from(100_000u64))]);

        let record = h.pending.get(SUBJECT).unwrap().unwrap();
        assert_eq!(record.wallet_address, address);
        assert_eq!(record.profile.password_hash, password_hash("password123"));
        assert!(record.verified_code_digest.is_none());

        let signer = custodial_signer(&h.custody, &record.encrypted_private_key).unwrap();
        assert_eq!(signer.address(), address);
    }

    #[tokio::test]
    async fn wrong_then_right_code_commits_exactly_once() {
        let h = harness();
        let (started, code) = begin(&h).await;

        let err = h
            .service
            .complete_enrollment(SUBJECT, wrong_code(&code))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EnrollmentError::Code(CodeError::Mismatch { attempts_left: 4 })
        ));

        let done = h.service.complete_enrollment(SUBJECT, &code).await.unwrap();
        assert_eq!(done.user.wallet_address, started.wallet_address);
        assert!(!done.already_committed);
        assert!(done.commit.is_some());
        assert_eq!(h.ledger.identity_count(), 1);
        assert!(h.pending.get(SUBJECT).unwrap().is_none());

        let again = h.service.complete_enrollment(SUBJECT, &code).await.unwrap_err();
        assert!(matches!(again, EnrollmentError::Code(CodeError::NotFound)));
        assert_eq!(h.ledger.identity_count(), 1);
        assert_eq!(h.ledger.commit_attempts(), 1);
    }

    #[tokio::test]
    async fn completion_returns_token_and_sealed_key() {
        let h = harness();
        let (started, code) = begin(&h).await;
        let done = h.service.complete_enrollment(SUBJECT, &code).await.unwrap();

        let claims = h.tokens.verify(&done.token).unwrap();
        assert_eq!(claims.sub, "12345678");
        assert_eq!(claims.email, SUBJECT);
        assert_eq!(claims.wallet_address, started.wallet_address);

        let signer = custodial_signer(&h.custody, &done.encrypted_private_key).unwrap();
        assert_eq!(signer.address().to_string(), started.wallet_address);

        assert_eq!(
            h.notifier.completion_notice(SUBJECT).await.as_deref(),
            Some("Alice")
        );
    }

    #[tokio::test]
    async fn completion_does_not_wait_on_notice_delivery() {
        let h = harness();
        let (_, code) = begin(&h).await;
        h.notifier.set_failing(true);

        let done = h.service.complete_enrollment(SUBJECT, &code).await.unwrap();
        assert!(!done.already_committed);
        assert_eq!(h.ledger.identity_count(), 1);
        assert!(h.notifier.completion_notice(SUBJECT).await.is_none());
    }

    #[tokio::test]
    async fn subject_is_normalized_across_phases() {
        let h = harness();
        h.service
            .begin_enrollment(&request("  U@Inst.EDU "))
            .await
            .unwrap();
        let code = h.notifier.last_code(SUBJECT).unwrap();

        h.service
            .complete_enrollment("u@INST.edu", &code)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn invalid_profile_has_no_side_effects() {
        let h = harness();
        let mut bad = request(SUBJECT);
        bad.institutional_id = "123".to_string();

        let err = h.service.begin_enrollment(&bad).await.unwrap_err();
        assert!(matches!(err, EnrollmentError::InvalidProfile(ref f) if f[0].field == "institutionalId"));
        assert!(h.ledger.transfers().is_empty());
        assert!(h.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn already_registered_id_is_rejected_before_provisioning() {
        let h = harness();
        h.ledger.seed_identity(
            FinalizedIdentity {
                institutional_id: "12345678".to_string(),
                email: "other@inst.edu".to_string(),
                username: "Other".to_string(),
                program: "CS".to_string(),
                wallet_address: Address::repeat_byte(0x33),
                registered_at: Some(Utc::now()),
                last_login_at: None,
                password_changed_at: None,
                is_locked: false,
            },
            password_hash("whatever1"),
        );

        let err = h.service.begin_enrollment(&request(SUBJECT)).await.unwrap_err();
        assert!(matches!(err, EnrollmentError::AlreadyRegistered));
        assert!(h.ledger.transfers().is_empty());
        assert!(h.pending.get(SUBJECT).unwrap().is_none());
    }

    #[tokio::test]
    async fn provisioning_failure_leaves_no_state() {
        let h = harness();
        h.ledger
            .fail_transfers(LedgerError::InsufficientFunds("funder empty".to_string()));

        let err = h.service.begin_enrollment(&request(SUBJECT)).await.unwrap_err();
        assert!(matches!(err, EnrollmentError::ProvisioningFailed(_)));
        assert!(h.pending.get(SUBJECT).unwrap().is_none());
        assert!(h.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn delivery_failure_keeps_pending_record() {
        let h = harness();
        h.notifier.set_failing(true);

        let started = h.service.begin_enrollment(&request(SUBJECT)).await.unwrap();
        assert!(!started.code_delivered);
        assert!(h.pending.get(SUBJECT).unwrap().is_some());

        h.notifier.set_failing(false);
        h.service.resend_code(SUBJECT).await.unwrap();
        let code = h.notifier.last_code(SUBJECT).unwrap();
        h.service.complete_enrollment(SUBJECT, &code).await.unwrap();
    }

    #[tokio::test]
    async fn lost_pending_record_is_session_expired() {
        let h = harness();
        let (_, code) = begin(&h).await;
        h.pending.remove(SUBJECT).unwrap();

        let err = h.service.complete_enrollment(SUBJECT, &code).await.unwrap_err();
        assert!(matches!(err, EnrollmentError::SessionExpired));
        assert_eq!(h.ledger.commit_attempts(), 0);
    }

    #[tokio::test]
    async fn ledger_failure_is_retriable_with_same_code() {
        let h = harness();
        let (started, code) = begin(&h).await;
        h.ledger
            .fail_next_commit(LedgerError::Unavailable("rpc timeout".to_string()));

        let err = h.service.complete_enrollment(SUBJECT, &code).await.unwrap_err();
        assert!(matches!(err, EnrollmentError::LedgerUnavailable(_)));
        assert_eq!(
            h.service.pending_wallet(SUBJECT).map(|a| a.to_string()),
            Some(started.wallet_address.clone())
        );

        // Wrong code does not ride on the stored digest
        let wrong = h
            .service
            .complete_enrollment(SUBJECT, wrong_code(&code))
            .await
            .unwrap_err();
        assert!(matches!(
            wrong,
            EnrollmentError::Code(CodeError::Mismatch { attempts_left: 4 })
        ));

        let done = h.service.complete_enrollment(SUBJECT, &code).await.unwrap();
        assert_eq!(done.user.wallet_address, started.wallet_address);
        assert_eq!(h.ledger.identity_count(), 1);
        assert_eq!(h.ledger.commit_attempts(), 2);
        assert_eq!(h.ledger.transfers().len(), 1);
    }

    #[tokio::test]
    async fn retries_after_failed_commit_share_the_attempt_ceiling() {
        let h = harness();
        let (_, code) = begin(&h).await;
        h.ledger
            .fail_next_commit(LedgerError::Unavailable("rpc timeout".to_string()));
        h.service.complete_enrollment(SUBJECT, &code).await.unwrap_err();

        for expected_left in (0..5).rev() {
            let err = h
                .service
                .complete_enrollment(SUBJECT, wrong_code(&code))
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                EnrollmentError::Code(CodeError::Mismatch { attempts_left }) if attempts_left == expected_left
            ));
        }

        // The verified code no longer completes once the ceiling is spent
        let err = h.service.complete_enrollment(SUBJECT, &code).await.unwrap_err();
        assert!(matches!(err, EnrollmentError::Code(CodeError::TooManyAttempts)));
        let err = h.service.complete_enrollment(SUBJECT, &code).await.unwrap_err();
        assert!(matches!(err, EnrollmentError::Code(CodeError::NotFound)));
        assert_eq!(h.ledger.identity_count(), 0);
        assert_eq!(h.ledger.commit_attempts(), 1);

        let record = h.pending.get(SUBJECT).unwrap().unwrap();
        assert!(record.verified_code_digest.is_none());

        h.service.resend_code(SUBJECT).await.unwrap();
        let fresh = h.notifier.last_code(SUBJECT).unwrap();
        h.service.complete_enrollment(SUBJECT, &fresh).await.unwrap();
        assert_eq!(h.ledger.identity_count(), 1);
    }

    #[tokio::test]
    async fn duplicate_for_same_wallet_counts_as_applied() {
        let h = harness();
        let (started, code) = begin(&h).await;
        let wallet: Address = started.wallet_address.parse().unwrap();

        // An earlier commit landed but its response was lost
        h.ledger.seed_identity(
            FinalizedIdentity {
                institutional_id: "12345678".to_string(),
                email: SUBJECT.to_string(),
                username: "Alice".to_string(),
                program: "CS".to_string(),
                wallet_address: wallet,
                registered_at: Some(Utc::now()),
                last_login_at: None,
                password_changed_at: None,
                is_locked: false,
            },
            password_hash("password123"),
        );

        let done = h.service.complete_enrollment(SUBJECT, &code).await.unwrap();
        assert!(done.already_committed);
        assert!(done.commit.is_none());
        assert_eq!(h.ledger.identity_count(), 1);
        assert!(h.pending.get(SUBJECT).unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_for_other_wallet_is_already_registered() {
        let h = harness();
        let (_, code) = begin(&h).await;
        h.ledger.seed_identity(
            FinalizedIdentity {
                institutional_id: "12345678".to_string(),
                email: "someone@inst.edu".to_string(),
                username: "Mallory".to_string(),
                program: "CS".to_string(),
                wallet_address: Address::repeat_byte(0x44),
                registered_at: Some(Utc::now()),
                last_login_at: None,
                password_changed_at: None,
                is_locked: false,
            },
            password_hash("password999"),
        );

        let err = h.service.complete_enrollment(SUBJECT, &code).await.unwrap_err();
        assert!(matches!(err, EnrollmentError::AlreadyRegistered));
        assert!(h.pending.get(SUBJECT).unwrap().is_none());
    }

    #[tokio::test]
    async fn resend_requires_pending_enrollment() {
        let h = harness();
        let err = h.service.resend_code(SUBJECT).await.unwrap_err();
        assert!(matches!(err, EnrollmentError::NoPendingEnrollment));
    }

    #[tokio::test]
    async fn resend_within_pending_ttl_invalidates_old_code() {
        let h = harness();
        let (_, old_code) = begin(&h).await;

        // Age the pending record to 9 minutes of a 10 minute TTL
        let mut record = h.pending.get(SUBJECT).unwrap().unwrap();
        record.created_at = Utc::now() - TimeDelta::minutes(9);
        h.pending.insert(record).unwrap();

        h.service.resend_code(SUBJECT).await.unwrap();
        let new_code = h.notifier.last_code(SUBJECT).unwrap();

        if new_code != old_code {
            let err = h
                .service
                .complete_enrollment(SUBJECT, &old_code)
                .await
                .unwrap_err();
            assert!(matches!(err, EnrollmentError::Code(CodeError::Mismatch { .. })));
        }

        h.service.complete_enrollment(SUBJECT, &new_code).await.unwrap();
        assert_eq!(h.ledger.identity_count(), 1);
    }

    #[tokio::test]
    async fn resend_after_pending_ttl_fails() {
        let h = harness();
        begin(&h).await;

        let mut record = h.pending.get(SUBJECT).unwrap().unwrap();
        record.created_at = Utc::now() - TimeDelta::minutes(11);
        h.pending.insert(record).unwrap();

        let err = h.service.resend_code(SUBJECT).await.unwrap_err();
        assert!(matches!(err, EnrollmentError::NoPendingEnrollment));
    }

    #[tokio::test]
    async fn resend_delivery_failure_is_reported() {
        let h = harness();
        begin(&h).await;
        h.notifier.set_failing(true);

        let err = h.service.resend_code(SUBJECT).await.unwrap_err();
        assert!(matches!(err, EnrollmentError::DeliveryFailed(_)));
    }

    #[tokio::test]
    async fn concurrent_completions_commit_once() {
        let h = harness();
        let (_, code) = begin(&h).await;

        let a = {
            let service = h.service.clone();
            let code = code.clone();
            tokio::spawn(async move { service.complete_enrollment(SUBJECT, &code).await })
        };
        let b = {
            let service = h.service.clone();
            let code = code.clone();
            tokio::spawn(async move { service.complete_enrollment(SUBJECT, &code).await })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(h.ledger.identity_count(), 1);
        assert_eq!(h.ledger.commit_attempts(), 1);
    }

    #[tokio::test]
    async fn re_enrollment_supersedes_pending_record() {
        let h = harness();
        let (first, _) = begin(&h).await;
        let (second, code) = begin(&h).await;
        assert_ne!(first.wallet_address, second.wallet_address);

        let done = h.service.complete_enrollment(SUBJECT, &code).await.unwrap();
        assert_eq!(done.user.wallet_address, second.wallet_address);
    }
}
