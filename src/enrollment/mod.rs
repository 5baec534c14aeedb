// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Code-gated voter enrollment.
//!
//! - [`otp`]: one-time codes, one live code per subject
//! - [`pending`]: in-flight enrollments between the two phases
//! - [`profile`]: request validation and subject normalization
//! - [`orchestrator`]: the two-phase state machine
//! - [`sweeper`]: periodic expiry of codes and pending records

pub mod locks;
pub mod orchestrator;
pub mod otp;
pub mod pending;
pub mod profile;
pub mod sweeper;

pub use orchestrator::{
    CodeResent, EnrolledUser, EnrollmentCompleted, EnrollmentDeps, EnrollmentError,
    EnrollmentService, EnrollmentStarted,
};
pub use otp::{CodeError, OtpConfig, OtpManager};
pub use pending::{InMemoryPendingStore, PendingEnrollment, PendingStore, RedbPendingStore};
pub use profile::{normalize_subject, EnrollmentRequest, FieldError, ProfilePolicy};
pub use sweeper::{Sweeper, SweeperHandle};
