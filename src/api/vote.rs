// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};

use crate::{
    account::{VoteCast, VoteCheck},
    auth::Auth,
    blockchain::VotingStatus,
    error::{ApiError, ErrorBody},
    models::VoteRequest,
    state::AppState,
};

/// Cast the caller's ballot, signed by their custodial wallet.
///
/// The wallet is topped up first when its balance is below the threshold.
#[utoipa::path(
    post,
    path = "/v1/vote",
    request_body = VoteRequest,
    tag = "Voting",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, body = VoteCast),
        (status = 403, description = "Envelope belongs to another wallet", body = ErrorBody),
        (status = 409, description = "Already voted", body = ErrorBody)
    )
)]
pub async fn cast_vote(
    State(state): State<AppState>,
    Auth(claims): Auth,
    Json(request): Json<VoteRequest>,
) -> Result<Json<VoteCast>, ApiError> {
    let cast = state
        .accounts
        .cast_vote(&claims, request.candidate_id, &request.encrypted_private_key)
        .await?;
    Ok(Json(cast))
}

/// Whether the caller's wallet has already voted.
#[utoipa::path(
    get,
    path = "/v1/vote/check",
    tag = "Voting",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, body = VoteCheck),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    )
)]
pub async fn check_voted(
    State(state): State<AppState>,
    Auth(claims): Auth,
) -> Result<Json<VoteCheck>, ApiError> {
    Ok(Json(state.accounts.vote_check(&claims).await?))
}

/// Current voting session window.
#[utoipa::path(
    get,
    path = "/v1/vote/status",
    tag = "Voting",
    responses(
        (status = 200, body = VotingStatus),
        (status = 503, description = "Ledger unavailable", body = ErrorBody)
    )
)]
pub async fn voting_status(State(state): State<AppState>) -> Result<Json<VotingStatus>, ApiError> {
    Ok(Json(state.accounts.voting_status().await?))
}
