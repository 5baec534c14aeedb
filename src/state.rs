// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::account::AccountService;
use crate::auth::SessionTokens;
use crate::blockchain::Ledger;
use crate::enrollment::EnrollmentService;

/// Shared handles for request handlers.
#[derive(Clone)]
pub struct AppState {
    pub enrollment: Arc<EnrollmentService>,
    pub accounts: Arc<AccountService>,
    pub tokens: Arc<SessionTokens>,
    pub ledger: Arc<dyn Ledger>,
}

impl AppState {
    pub fn new(
        enrollment: EnrollmentService,
        accounts: AccountService,
        tokens: Arc<SessionTokens>,
        ledger: Arc<dyn Ledger>,
    ) -> Self {
        Self {
            enrollment: Arc::new(enrollment),
            accounts: Arc::new(accounts),
            tokens,
            ledger,
        }
    }
}

/// Fully wired state over in-memory doubles.
#[cfg(test)]
pub mod testing {
    use std::sync::Arc;

    use chrono::TimeDelta;

    use super::AppState;
    use crate::account::AccountService;
    use crate::auth::SessionTokens;
    use crate::blockchain::mock::MockLedger;
    use crate::blockchain::{parse_amount, Ledger, NATIVE_DECIMALS};
    use crate::custody::KeyCustody;
    use crate::enrollment::{
        EnrollmentDeps, EnrollmentService, InMemoryPendingStore, OtpConfig, OtpManager,
        ProfilePolicy,
    };
    use crate::notify::testing::RecordingNotifier;
    use crate::wallet::{BalanceMaintainer, WalletProvisioner};

    pub struct TestState {
        pub state: AppState,
        pub ledger: Arc<MockLedger>,
        pub notifier: Arc<RecordingNotifier>,
        pub custody: Arc<KeyCustody>,
    }

    pub fn test_state() -> TestState {
        let ledger = Arc::new(MockLedger::new());
        let dyn_ledger: Arc<dyn Ledger> = ledger.clone();
        let notifier = Arc::new(RecordingNotifier::default());
        let custody = Arc::new(KeyCustody::new(&[7u8; 32]).unwrap());
        let tokens = Arc::new(
            SessionTokens::new(b"test-session-secret-0123456789abcdef", TimeDelta::hours(1))
                .unwrap(),
        );
        let eth = |s: &str| parse_amount(s, NATIVE_DECIMALS).unwrap();

        let enrollment = EnrollmentService::new(EnrollmentDeps {
            ledger: dyn_ledger.clone(),
            provisioner: WalletProvisioner::new(dyn_ledger.clone(), eth("0.1")),
            custody: custody.clone(),
            pending: Arc::new(InMemoryPendingStore::new(64, TimeDelta::minutes(10))),
            codes: Arc::new(OtpManager::new(OtpConfig::default())),
            notifier: notifier.clone(),
            tokens: tokens.clone(),
            policy: ProfilePolicy::default(),
        });
        let accounts = AccountService::new(
            dyn_ledger.clone(),
            custody.clone(),
            BalanceMaintainer::new(dyn_ledger.clone(), eth("0.01"), eth("0.05")),
            tokens.clone(),
        );

        TestState {
            state: AppState::new(enrollment, accounts, tokens, dyn_ledger),
            ledger,
            notifier,
            custody,
        }
    }
}
