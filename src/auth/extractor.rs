// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for authenticated sessions.
//!
//! ```rust,ignore
//! async fn my_handler(Auth(claims): Auth) -> impl IntoResponse {
//!     // claims is SessionClaims
//! }
//!
//! async fn operator_only(AdminOnly(claims): AdminOnly) -> impl IntoResponse {
//!     // claims.role == "admin"
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::{AuthError, SessionClaims};
use crate::state::AppState;

/// Extractor requiring a valid `Authorization: Bearer <session token>`.
pub struct Auth(pub SessionClaims);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidAuthHeader)?;

        let claims = state.tokens.verify(token.trim())?;
        Ok(Auth(claims))
    }
}

/// Extractor that requires the admin role.
pub struct AdminOnly(pub SessionClaims);

impl FromRequestParts<AppState> for AdminOnly {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Auth(claims) = Auth::from_request_parts(parts, state).await?;

        if !claims.is_admin() {
            tracing::warn!(sub = %claims.sub, role = %claims.role, "Admin route refused");
            return Err(AuthError::InsufficientPermissions);
        }

        Ok(AdminOnly(claims))
    }
}
