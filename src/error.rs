// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP error envelope.
//!
//! Every handler error renders as
//! `{"error": ..., "error_code": ..., "attempts_left"?: n, "details"?: [...]}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::account::AccountError;
use crate::auth::AuthError;
use crate::enrollment::{CodeError, EnrollmentError, FieldError};

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub error_code: &'static str,
    pub attempts_left: Option<u32>,
    pub details: Vec<FieldError>,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    error: String,
    error_code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    attempts_left: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<FieldError>,
}

impl ApiError {
    pub fn new(status: StatusCode, error_code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            error_code,
            attempts_left: None,
            details: Vec::new(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "LEDGER_UNAVAILABLE", message)
    }

    /// Generic 500. The cause is logged, never returned.
    pub fn internal(cause: impl std::fmt::Display) -> Self {
        tracing::error!(error = %cause, "Internal error");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "internal server error",
        )
    }

    fn with_attempts_left(mut self, attempts_left: u32) -> Self {
        self.attempts_left = Some(attempts_left);
        self
    }

    fn with_details(mut self, details: Vec<FieldError>) -> Self {
        self.details = details;
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            error_code: self.error_code,
            attempts_left: self.attempts_left,
            details: self.details,
        });
        (self.status, body).into_response()
    }
}

impl From<CodeError> for ApiError {
    fn from(err: CodeError) -> Self {
        let message = err.to_string();
        match err {
            CodeError::NotFound => Self::new(StatusCode::BAD_REQUEST, "CODE_NOT_FOUND", message),
            CodeError::Expired => Self::new(StatusCode::BAD_REQUEST, "CODE_EXPIRED", message),
            CodeError::TooManyAttempts => {
                Self::new(StatusCode::TOO_MANY_REQUESTS, "TOO_MANY_ATTEMPTS", message)
            }
            CodeError::Mismatch { attempts_left } => {
                Self::new(StatusCode::BAD_REQUEST, "CODE_MISMATCH", message)
                    .with_attempts_left(attempts_left)
            }
        }
    }
}

impl From<EnrollmentError> for ApiError {
    fn from(err: EnrollmentError) -> Self {
        let message = err.to_string();
        match err {
            EnrollmentError::InvalidProfile(fields) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, "INVALID_PROFILE", message)
                    .with_details(fields)
            }
            EnrollmentError::AlreadyRegistered => {
                Self::new(StatusCode::CONFLICT, "ALREADY_REGISTERED", message)
            }
            EnrollmentError::Code(code) => code.into(),
            EnrollmentError::SessionExpired => {
                Self::new(StatusCode::GONE, "SESSION_EXPIRED", message)
            }
            EnrollmentError::NoPendingEnrollment => {
                Self::new(StatusCode::NOT_FOUND, "NO_PENDING_ENROLLMENT", message)
            }
            EnrollmentError::LedgerUnavailable(_) => Self::unavailable(message),
            EnrollmentError::ProvisioningFailed(_) => {
                Self::new(StatusCode::BAD_GATEWAY, "PROVISIONING_FAILED", message)
            }
            EnrollmentError::CommitFailed(_) => {
                Self::new(StatusCode::BAD_GATEWAY, "COMMIT_FAILED", message)
            }
            EnrollmentError::DeliveryFailed(_) => {
                Self::new(StatusCode::BAD_GATEWAY, "DELIVERY_FAILED", message)
            }
            EnrollmentError::Custody(e) => Self::internal(e),
            EnrollmentError::Store(e) => Self::internal(e),
            EnrollmentError::Session(e) => Self::internal(e),
            EnrollmentError::Internal(e) => Self::internal(e),
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        let message = err.to_string();
        match err {
            AccountError::InvalidInput(_) => Self::new(StatusCode::BAD_REQUEST, "INVALID_INPUT", message),
            AccountError::InvalidCredentials => {
                Self::new(StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS", message)
            }
            AccountError::AccountLocked => Self::new(StatusCode::LOCKED, "ACCOUNT_LOCKED", message),
            AccountError::NotFound => Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message),
            AccountError::InvalidEnvelope => {
                Self::new(StatusCode::BAD_REQUEST, "INVALID_ENVELOPE", message)
            }
            AccountError::WalletMismatch => {
                Self::new(StatusCode::FORBIDDEN, "WALLET_MISMATCH", message)
            }
            AccountError::AlreadyVoted => Self::new(StatusCode::CONFLICT, "ALREADY_VOTED", message),
            AccountError::Rejected(_) => {
                Self::new(StatusCode::BAD_REQUEST, "REJECTED_BY_CONTRACT", message)
            }
            AccountError::InsufficientFunds(_) => {
                Self::new(StatusCode::BAD_GATEWAY, "INSUFFICIENT_FUNDS", message)
            }
            AccountError::LedgerUnavailable(_) => Self::unavailable(message),
            AccountError::Session(e) => Self::internal(e),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        if let AuthError::InternalError(cause) = &err {
            return Self::internal(cause);
        }
        Self::new(err.status_code(), err.error_code(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    use crate::blockchain::LedgerError;

    async fn body_json(err: impl Into<ApiError>) -> (StatusCode, Value) {
        let response = err.into().into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::bad_request("bad data").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"bad data","error_code":"BAD_REQUEST"}"#);
    }

    #[tokio::test]
    async fn mismatch_carries_attempts_left() {
        let (status, body) = body_json(EnrollmentError::Code(CodeError::Mismatch {
            attempts_left: 4,
        }))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "CODE_MISMATCH");
        assert_eq!(body["attempts_left"], 4);
    }

    #[test]
    fn enrollment_errors_map_to_statuses() {
        let cases = [
            (EnrollmentError::AlreadyRegistered, StatusCode::CONFLICT),
            (EnrollmentError::SessionExpired, StatusCode::GONE),
            (EnrollmentError::NoPendingEnrollment, StatusCode::NOT_FOUND),
            (
                EnrollmentError::Code(CodeError::TooManyAttempts),
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                EnrollmentError::LedgerUnavailable("timeout".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                EnrollmentError::CommitFailed(LedgerError::Reverted("nope".into())),
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status, expected);
        }
    }

    #[tokio::test]
    async fn invalid_profile_lists_fields() {
        let (status, body) = body_json(EnrollmentError::InvalidProfile(vec![FieldError {
            field: "username",
            message: "too short".to_string(),
        }]))
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["details"][0]["field"], "username");
    }

    #[tokio::test]
    async fn internal_errors_hide_cause() {
        let (status, body) =
            body_json(EnrollmentError::Internal("disk on fire at /var/secret".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "internal server error");
    }

    #[test]
    fn account_errors_map_to_statuses() {
        assert_eq!(
            ApiError::from(AccountError::InvalidCredentials).status,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(AccountError::AccountLocked).status,
            StatusCode::LOCKED
        );
        assert_eq!(
            ApiError::from(AccountError::InvalidEnvelope).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(AuthError::TokenExpired).status,
            StatusCode::UNAUTHORIZED
        );
    }
}
