// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Enrollment and session endpoints.

use axum::{extract::State, http::StatusCode, Json};

use crate::{
    account::{LoginOutcome, PasswordChanged, UserProfile},
    auth::Auth,
    enrollment::{CodeResent, EnrollmentCompleted, EnrollmentRequest, EnrollmentStarted},
    error::{ApiError, ErrorBody},
    models::{ChangePasswordRequest, LoginRequest, ResendCodeRequest, VerifyCodeRequest},
    state::AppState,
};

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = EnrollmentRequest,
    tag = "Enrollment",
    responses(
        (status = 201, description = "Wallet provisioned, code sent", body = EnrollmentStarted),
        (status = 409, description = "Institutional id already registered", body = ErrorBody),
        (status = 422, description = "Invalid profile", body = ErrorBody)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<EnrollmentRequest>,
) -> Result<(StatusCode, Json<EnrollmentStarted>), ApiError> {
    let started = state.enrollment.begin_enrollment(&request).await?;
    Ok((StatusCode::CREATED, Json(started)))
}

#[utoipa::path(
    post,
    path = "/v1/auth/verify-otp",
    request_body = VerifyCodeRequest,
    tag = "Enrollment",
    responses(
        (status = 200, description = "Identity committed", body = EnrollmentCompleted),
        (status = 400, description = "Wrong or expired code", body = ErrorBody),
        (status = 429, description = "Too many attempts", body = ErrorBody)
    )
)]
pub async fn verify_code(
    State(state): State<AppState>,
    Json(request): Json<VerifyCodeRequest>,
) -> Result<Json<EnrollmentCompleted>, ApiError> {
    let completed = state
        .enrollment
        .complete_enrollment(&request.email, &request.code)
        .await?;
    Ok(Json(completed))
}

#[utoipa::path(
    post,
    path = "/v1/auth/resend-otp",
    request_body = ResendCodeRequest,
    tag = "Enrollment",
    responses(
        (status = 200, description = "New code sent", body = CodeResent),
        (status = 404, description = "No pending enrollment", body = ErrorBody)
    )
)]
pub async fn resend_code(
    State(state): State<AppState>,
    Json(request): Json<ResendCodeRequest>,
) -> Result<Json<CodeResent>, ApiError> {
    Ok(Json(state.enrollment.resend_code(&request.email).await?))
}

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    tag = "Account",
    responses(
        (status = 200, body = LoginOutcome),
        (status = 401, description = "Invalid credentials", body = ErrorBody),
        (status = 423, description = "Account locked", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginOutcome>, ApiError> {
    let outcome = state
        .accounts
        .login(&request.institutional_id, &request.password)
        .await?;
    Ok(Json(outcome))
}

#[utoipa::path(
    get,
    path = "/v1/auth/profile",
    tag = "Account",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, body = UserProfile),
        (status = 401, body = ErrorBody)
    )
)]
pub async fn profile(
    State(state): State<AppState>,
    Auth(claims): Auth,
) -> Result<Json<UserProfile>, ApiError> {
    Ok(Json(state.accounts.profile(&claims).await?))
}

#[utoipa::path(
    post,
    path = "/v1/auth/change-password",
    request_body = ChangePasswordRequest,
    tag = "Account",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, body = PasswordChanged),
        (status = 400, description = "Invalid password or envelope", body = ErrorBody),
        (status = 403, description = "Envelope belongs to another wallet", body = ErrorBody)
    )
)]
pub async fn change_password(
    State(state): State<AppState>,
    Auth(claims): Auth,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<PasswordChanged>, ApiError> {
    let changed = state
        .accounts
        .change_password(
            &claims,
            &request.old_password,
            &request.new_password,
            &request.encrypted_private_key,
        )
        .await?;
    Ok(Json(changed))
}
