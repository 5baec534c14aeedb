// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Expiry Sweeper
//!
//! Background task that periodically removes expired one-time codes and
//! pending enrollments, bounding growth from abandoned attempts. Reads
//! already ignore expired entries, so the sweep only reclaims memory and
//! disk.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken`. [`Sweeper::spawn`] returns a
//! [`SweeperHandle`] whose `stop` cancels the loop and waits for it to exit.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::otp::OtpManager;
use super::pending::PendingStore;

/// Default interval between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Periodic expiry sweep over the code manager and pending store.
pub struct Sweeper {
    codes: Arc<OtpManager>,
    pending: Arc<dyn PendingStore>,
    interval: Duration,
}

impl Sweeper {
    pub fn new(codes: Arc<OtpManager>, pending: Arc<dyn PendingStore>) -> Self {
        Self {
            codes,
            pending,
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Start the loop on the runtime and return a handle that stops it.
    pub fn spawn(self, shutdown: CancellationToken) -> SweeperHandle {
        let token = shutdown.child_token();
        let task = tokio::spawn(self.run(token.clone()));
        SweeperHandle { token, task }
    }

    /// Run the sweep loop until the cancellation token is triggered.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Expiry sweeper starting"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Expiry sweeper shutting down");
                    return;
                }
            }

            self.sweep_once();
        }
    }

    /// One pass over both stores. Returns `(codes, pending)` removed.
    pub fn sweep_once(&self) -> (usize, usize) {
        let codes = self.codes.sweep_expired();
        let pending = match self.pending.purge_expired() {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "Expiry sweeper: failed to purge pending enrollments");
                0
            }
        };

        if codes > 0 || pending > 0 {
            info!(codes, pending, "Expiry sweeper removed expired entries");
        } else {
            debug!("Expiry sweeper: nothing to remove");
        }
        (codes, pending)
    }
}

/// Handle to a running sweeper.
pub struct SweeperHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Cancel the loop and wait for it to finish.
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Expiry sweeper task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
