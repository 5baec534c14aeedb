// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    body::Body,
    http::Request,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    account::{LoginOutcome, PasswordChanged, UserProfile, VoteCast, VoteCheck, WalletBalance},
    blockchain::{TxReceipt, VotingStatus},
    custody::Envelope,
    enrollment::{
        CodeResent, EnrolledUser, EnrollmentCompleted, EnrollmentRequest, EnrollmentStarted,
        FieldError,
    },
    error::ErrorBody,
    models::{
        ChangePasswordRequest, LoginRequest, RefundRequest, ResendCodeRequest, VerifyCodeRequest,
        VoteRequest,
    },
    state::AppState,
    wallet::TopUpOutcome,
};

pub mod admin;
pub mod auth;
pub mod health;
pub mod vote;
pub mod wallet;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/verify-otp", post(auth::verify_code))
        .route("/auth/resend-otp", post(auth::resend_code))
        .route("/auth/login", post(auth::login))
        .route("/auth/profile", get(auth::profile))
        .route("/auth/change-password", post(auth::change_password))
        .route("/vote", post(vote::cast_vote))
        .route("/vote/check", get(vote::check_voted))
        .route("/vote/status", get(vote::voting_status))
        .route("/wallet/balance", get(wallet::wallet_balance))
        .route("/admin/funder/balance", get(admin::funder_balance))
        .route("/admin/wallet/refund", post(admin::refund_wallet))
        .route("/admin/wallet/{address}", get(admin::wallet_balance));

    let health_routes = Router::new()
        .route("/live", get(health::liveness))
        .route("/ready", get(health::readiness));

    let http_layers = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "http",
                    method = %request.method(),
                    uri = %request.uri().path(),
                    request_id,
                )
            }),
        )
        .layer(PropagateRequestIdLayer::x_request_id());

    Router::new()
        .nest("/v1", v1_routes)
        .nest("/health", health_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(http_layers)
        .layer(CorsLayer::permissive())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register,
        auth::verify_code,
        auth::resend_code,
        auth::login,
        auth::profile,
        auth::change_password,
        vote::cast_vote,
        vote::check_voted,
        vote::voting_status,
        wallet::wallet_balance,
        admin::funder_balance,
        admin::wallet_balance,
        admin::refund_wallet,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            EnrollmentRequest,
            EnrollmentStarted,
            EnrollmentCompleted,
            EnrolledUser,
            CodeResent,
            VerifyCodeRequest,
            ResendCodeRequest,
            LoginRequest,
            LoginOutcome,
            UserProfile,
            ChangePasswordRequest,
            PasswordChanged,
            VoteRequest,
            VoteCast,
            VoteCheck,
            VotingStatus,
            WalletBalance,
            RefundRequest,
            TopUpOutcome,
            TxReceipt,
            Envelope,
            FieldError,
            ErrorBody,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Enrollment", description = "Code-gated voter enrollment"),
        (name = "Account", description = "Login, profile and password management"),
        (name = "Voting", description = "Ballot submission"),
        (name = "Wallet", description = "Custodial wallet utilities"),
        (name = "Admin", description = "Operator wallet tooling"),
        (name = "Health", description = "Liveness and readiness checks")
    )
)]
struct ApiDoc;
