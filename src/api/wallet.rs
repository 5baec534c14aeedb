// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};

use crate::{
    account::WalletBalance,
    auth::Auth,
    error::{ApiError, ErrorBody},
    state::AppState,
};

#[utoipa::path(
    get,
    path = "/v1/wallet/balance",
    tag = "Wallet",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, body = WalletBalance),
        (status = 503, description = "Ledger unavailable", body = ErrorBody)
    )
)]
pub async fn wallet_balance(
    State(state): State<AppState>,
    Auth(claims): Auth,
) -> Result<Json<WalletBalance>, ApiError> {
    Ok(Json(state.accounts.wallet_balance(&claims).await?))
}
