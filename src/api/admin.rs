// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Operator endpoints for funder and custodial wallet balances.
//!
//! Every route requires a session token with role `admin`.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    account::WalletBalance,
    auth::AdminOnly,
    error::{ApiError, ErrorBody},
    models::RefundRequest,
    state::AppState,
    wallet::TopUpOutcome,
};

#[utoipa::path(
    get,
    path = "/v1/admin/funder/balance",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Funder balance", body = WalletBalance),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Not authorized (admin required)", body = ErrorBody)
    )
)]
pub async fn funder_balance(
    AdminOnly(_operator): AdminOnly,
    State(state): State<AppState>,
) -> Result<Json<WalletBalance>, ApiError> {
    Ok(Json(state.accounts.funder_balance().await?))
}

#[utoipa::path(
    get,
    path = "/v1/admin/wallet/{address}",
    tag = "Admin",
    params(("address" = String, Path, description = "Wallet address (0x-prefixed)")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Wallet balance", body = WalletBalance),
        (status = 400, description = "Invalid address", body = ErrorBody),
        (status = 403, description = "Not authorized (admin required)", body = ErrorBody)
    )
)]
pub async fn wallet_balance(
    AdminOnly(_operator): AdminOnly,
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<WalletBalance>, ApiError> {
    Ok(Json(state.accounts.address_balance(&address).await?))
}

/// Top a wallet up from the funder when it is below the minimum balance.
#[utoipa::path(
    post,
    path = "/v1/admin/wallet/refund",
    request_body = RefundRequest,
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Balance check result", body = TopUpOutcome),
        (status = 400, description = "Invalid address", body = ErrorBody),
        (status = 403, description = "Not authorized (admin required)", body = ErrorBody),
        (status = 502, description = "Funder could not pay", body = ErrorBody)
    )
)]
pub async fn refund_wallet(
    AdminOnly(operator): AdminOnly,
    State(state): State<AppState>,
    Json(request): Json<RefundRequest>,
) -> Result<Json<TopUpOutcome>, ApiError> {
    Ok(Json(
        state
            .accounts
            .refund_wallet(&operator, &request.address)
            .await?,
    ))
}
