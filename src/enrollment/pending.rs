// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Pending enrollment store.
//!
//! Holds a draft profile and its sealed wallet between code issuance and
//! ledger commit. Records older than the TTL are treated as absent on read,
//! whether or not the sweeper has removed them yet.
//!
//! Two backends:
//! - [`InMemoryPendingStore`]: bounded LRU, lost on restart
//! - [`RedbPendingStore`]: embedded redb file, survives restarts

use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use alloy::primitives::Address;
use chrono::{DateTime, TimeDelta, Utc};
use lru::LruCache;
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::{Deserialize, Serialize};

use super::profile::DraftProfile;
use crate::blockchain::TxReceipt;
use crate::custody::Envelope;
use crate::wallet::SealedWallet;

/// Default pending-enrollment lifetime (10 minutes).
pub const DEFAULT_PENDING_TTL: TimeDelta = TimeDelta::minutes(10);

/// Enrollment awaiting code verification and ledger commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEnrollment {
    pub subject: String,
    pub profile: DraftProfile,
    pub wallet_address: Address,
    pub encrypted_private_key: Envelope,
    pub funding: TxReceipt,
    pub created_at: DateTime<Utc>,
    /// Keyed digest of a code that already passed verification.
    ///
    /// Lets a completion retry after a ledger failure without a new code.
    #[serde(default)]
    pub verified_code_digest: Option<String>,
    /// Attempts made against `verified_code_digest`.
    #[serde(default)]
    pub retry_attempts: u32,
}

impl PendingEnrollment {
    pub fn new(subject: &str, profile: DraftProfile, wallet: SealedWallet) -> Self {
        Self {
            subject: subject.to_string(),
            profile,
            wallet_address: wallet.address,
            encrypted_private_key: wallet.encrypted_private_key,
            funding: wallet.funding,
            created_at: Utc::now(),
            verified_code_digest: None,
            retry_attempts: 0,
        }
    }

    pub fn is_expired(&self, ttl: TimeDelta, now: DateTime<Utc>) -> bool {
        now - self.created_at > ttl
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PendingStoreError {
    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type PendingResult<T> = Result<T, PendingStoreError>;

/// Storage for in-flight enrollments keyed by normalized subject.
pub trait PendingStore: Send + Sync {
    fn ttl(&self) -> TimeDelta;

    /// Store a record as-is, replacing any existing record for its subject.
    fn insert(&self, record: PendingEnrollment) -> PendingResult<()>;

    /// Read a record, treating expired records as absent (and dropping them).
    fn get_at(&self, subject: &str, now: DateTime<Utc>) -> PendingResult<Option<PendingEnrollment>>;

    /// Remove a record. Returns whether one existed.
    fn remove(&self, subject: &str) -> PendingResult<bool>;

    /// Remove every record older than the TTL. Returns how many were removed.
    fn purge_expired_at(&self, now: DateTime<Utc>) -> PendingResult<usize>;

    /// Number of stored records, expired or not.
    fn len(&self) -> PendingResult<usize>;

    fn put(
        &self,
        subject: &str,
        profile: DraftProfile,
        wallet: SealedWallet,
    ) -> PendingResult<PendingEnrollment> {
        let record = PendingEnrollment::new(subject, profile, wallet);
        self.insert(record.clone())?;
        Ok(record)
    }

    fn get(&self, subject: &str) -> PendingResult<Option<PendingEnrollment>> {
        self.get_at(subject, Utc::now())
    }

    fn purge_expired(&self) -> PendingResult<usize> {
        self.purge_expired_at(Utc::now())
    }
}

// =============================================================================
// In-memory backend
// =============================================================================

/// Bounded in-process store.
///
/// When full, the least recently used record is evicted to make room.
pub struct InMemoryPendingStore {
    records: Mutex<LruCache<String, PendingEnrollment>>,
    ttl: TimeDelta,
}

impl InMemoryPendingStore {
    pub fn new(capacity: usize, ttl: TimeDelta) -> Self {
        Self {
            records: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            ttl,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, PendingEnrollment>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PendingStore for InMemoryPendingStore {
    fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    fn insert(&self, record: PendingEnrollment) -> PendingResult<()> {
        let subject = record.subject.clone();
        if let Some((evicted, _)) = self.lock().push(subject.clone(), record) {
            if evicted != subject {
                tracing::warn!(evicted = %evicted, "Pending store full; evicted oldest enrollment");
            }
        }
        Ok(())
    }

    fn get_at(&self, subject: &str, now: DateTime<Utc>) -> PendingResult<Option<PendingEnrollment>> {
        let mut records = self.lock();
        match records.get(subject) {
            Some(record) if record.is_expired(self.ttl, now) => {
                records.pop(subject);
                Ok(None)
            }
            Some(record) => Ok(Some(record.clone())),
            None => Ok(None),
        }
    }

    fn remove(&self, subject: &str) -> PendingResult<bool> {
        Ok(self.lock().pop(subject).is_some())
    }

    fn purge_expired_at(&self, now: DateTime<Utc>) -> PendingResult<usize> {
        let mut records = self.lock();
        let expired: Vec<String> = records
            .iter()
            .filter(|(_, r)| r.is_expired(self.ttl, now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            records.pop(key);
        }
        Ok(expired.len())
    }

    fn len(&self) -> PendingResult<usize> {
        Ok(self.lock().len())
    }
}

// =============================================================================
// redb backend
// =============================================================================

/// subject → serialized PendingEnrollment (JSON bytes).
const PENDING_ENROLLMENTS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("pending_enrollments");

/// Durable store backed by an embedded redb file.
pub struct RedbPendingStore {
    db: Database,
    ttl: TimeDelta,
}

impl RedbPendingStore {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path, ttl: TimeDelta) -> PendingResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create the table so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(PENDING_ENROLLMENTS)?;
        }
        write_txn.commit()?;

        Ok(Self { db, ttl })
    }

    fn read(&self, subject: &str) -> PendingResult<Option<PendingEnrollment>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PENDING_ENROLLMENTS)?;
        match table.get(subject)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }
}

impl PendingStore for RedbPendingStore {
    fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    fn insert(&self, record: PendingEnrollment) -> PendingResult<()> {
        let json = serde_json::to_vec(&record)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(PENDING_ENROLLMENTS)?;
            table.insert(record.subject.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn get_at(&self, subject: &str, now: DateTime<Utc>) -> PendingResult<Option<PendingEnrollment>> {
        match self.read(subject)? {
            Some(record) if record.is_expired(self.ttl, now) => {
                self.remove(subject)?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    fn remove(&self, subject: &str) -> PendingResult<bool> {
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(PENDING_ENROLLMENTS)?;
            let removed = table.remove(subject)?;
            removed.is_some()
        };
        write_txn.commit()?;
        Ok(existed)
    }

    fn purge_expired_at(&self, now: DateTime<Utc>) -> PendingResult<usize> {
        let write_txn = self.db.begin_write()?;
        let purged = {
            let mut table = write_txn.open_table(PENDING_ENROLLMENTS)?;

            let mut expired = Vec::new();
            for entry in table.iter()? {
                let (key, value) = entry?;
                // Unreadable records are purged along with expired ones
                let stale = serde_json::from_slice::<PendingEnrollment>(value.value())
                    .map(|r| r.is_expired(self.ttl, now))
                    .unwrap_or(true);
                if stale {
                    expired.push(key.value().to_string());
                }
            }

            for key in &expired {
                table.remove(key.as_str())?;
            }
            expired.len()
        };
        write_txn.commit()?;
        Ok(purged)
    }

    fn len(&self) -> PendingResult<usize> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PENDING_ENROLLMENTS)?;
        Ok(table.len()? as usize)
    }
}
