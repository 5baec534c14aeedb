// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Notification Channel
//!
//! Out-of-band delivery of enrollment codes and completion notices.
//!
//! - [`WebhookNotifier`] posts a JSON message to a mail/SMS relay.
//! - [`LogNotifier`] only records that a message would have been sent. With
//!   the `dev` feature it also prints the code so local enrollments can be
//!   completed without a relay.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

/// Message delivered to a contact address.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// One-time code for an in-flight enrollment.
    EnrollmentCode { code: String, ttl_minutes: u64 },
    /// Enrollment has been committed to the ledger.
    EnrollmentComplete { username: String },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::EnrollmentCode { .. } => "enrollment_code",
            Notification::EnrollmentComplete { .. } => "enrollment_complete",
        }
    }
}

impl std::fmt::Debug for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Codes never appear in debug output
        write!(f, "Notification({})", self.kind())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("relay rejected message with status {0}")]
    Rejected(u16),
}

/// Out-of-band delivery channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, destination: &str, notification: Notification)
        -> Result<(), NotifyError>;
}

/// Request body posted to the relay.
#[derive(Serialize)]
struct RelayMessage<'a> {
    to: &'a str,
    #[serde(flatten)]
    notification: &'a Notification,
}

/// Notifier posting to an HTTP mail/SMS relay.
pub struct WebhookNotifier {
    client: reqwest::Client,
    endpoint: String,
    bearer_token: Option<String>,
}

impl WebhookNotifier {
    pub fn new(endpoint: impl Into<String>, bearer_token: Option<String>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| NotifyError::Delivery(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            bearer_token,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn deliver(
        &self,
        destination: &str,
        notification: Notification,
    ) -> Result<(), NotifyError> {
        let mut request = self.client.post(&self.endpoint).json(&RelayMessage {
            to: destination,
            notification: &notification,
        });
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NotifyError::Delivery(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }

        tracing::debug!(kind = notification.kind(), "Notification relayed");
        Ok(())
    }
}

/// Notifier that only logs (development and tests without a relay).
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(
        &self,
        destination: &str,
        notification: Notification,
    ) -> Result<(), NotifyError> {
        if cfg!(feature = "dev") {
            if let Notification::EnrollmentCode { code, .. } = &notification {
                tracing::warn!(destination, code = %code, "[dev] enrollment code");
            }
        }

        tracing::info!(
            destination,
            kind = notification.kind(),
            "Notification not relayed (log-only notifier)"
        );
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_never_contains_code() {
        let n = Notification::EnrollmentCode {
            code: "123456".to_string(),
            ttl_minutes: 10,
        };
        assert!(!format!("{n:?}").contains("123456"));
    }

    #[test]
    fn relay_message_is_tagged_json() {
        let n = Notification::EnrollmentCode {
            code: "012345".to_string(),
            ttl_minutes: 10,
        };
        let body = serde_json::to_value(RelayMessage {
            to: "u@inst.edu",
            notification: &n,
        })
        .unwrap();
        assert_eq!(body["to"], "u@inst.edu");
        assert_eq!(body["kind"], "enrollment_code");
        assert_eq!(body["code"], "012345");
        assert_eq!(body["ttl_minutes"], 10);
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        LogNotifier
            .deliver(
                "u@inst.edu",
                Notification::EnrollmentComplete {
                    username: "A".into(),
                },
            )
            .await
            .unwrap();
    }
}
