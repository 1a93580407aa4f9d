// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for credential administration.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::error::ErrorCode;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct RemoveResponse {
    pub account: String,
    pub removed: bool,
}

/// `GET /api/v1/credentials`: cached accounts, no token material.
pub async fn credentials_status(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    Json(s.broker.status().await)
}

/// `DELETE /api/v1/credentials/{account}`: evict one account.
pub async fn remove_credential(
    State(s): State<Arc<AppState>>,
    Path(account): Path<String>,
) -> impl IntoResponse {
    if s.broker.remove(&account).await {
        Json(RemoveResponse { account, removed: true }).into_response()
    } else {
        ErrorCode::AccountNotFound
            .to_http_response(format!("no cached credential for account {account}"))
            .into_response()
    }
}
