// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-subject mutual exclusion.
//!
//! Operations on different subjects never contend. Idle entries are pruned
//! on each acquisition so the map stays bounded by in-flight subjects.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
pub struct SubjectLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl SubjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `subject`. Released when the guard drops.
    pub async fn acquire(&self, subject: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Only the map holds idle entries
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            locks.entry(subject.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of subjects with a live lock entry.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_subject_is_exclusive() {
        let locks = Arc::new(SubjectLocks::new());
        let guard = locks.acquire("a@inst.edu").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.acquire("a@inst.edu").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn different_subjects_do_not_contend() {
        let locks = SubjectLocks::new();
        let _a = locks.acquire("a@inst.edu").await;
        let _b = tokio::time::timeout(Duration::from_secs(1), locks.acquire("b@inst.edu"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn idle_entries_are_pruned() {
        let locks = SubjectLocks::new();
        drop(locks.acquire("a@inst.edu").await);
        drop(locks.acquire("b@inst.edu").await);
        let _c = locks.acquire("c@inst.edu").await;
        assert_eq!(locks.len(), 1);
    }
}
