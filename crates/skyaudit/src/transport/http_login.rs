// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Browser-facing login redirect and callback.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;
use crate::login::LoginError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    #[serde(default)]
    pub account: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub account: String,
    pub message: String,
}

/// `GET /auth/login?account=...`: redirect to the identity provider.
pub async fn login(State(s): State<Arc<AppState>>, Query(q): Query<LoginQuery>) -> impl IntoResponse {
    let start = s.login.begin(q.account).await;
    (StatusCode::FOUND, [(header::LOCATION, start.authorization_url)])
}

/// `GET /auth/callback?state=...&code=...`
pub async fn callback(
    State(s): State<Arc<AppState>>,
    Query(q): Query<CallbackQuery>,
) -> impl IntoResponse {
    if let Some(error) = q.error {
        tracing::warn!(provider_error = %error, "identity provider returned an error");
        if let Some(state) = q.state.as_deref() {
            s.login.abandon(state).await;
        }
        return ErrorCode::LoginFailed
            .to_http_response("The identity provider did not complete the login.")
            .into_response();
    }
    let (Some(state), Some(code)) = (q.state, q.code) else {
        return rejection(&LoginError::InvalidState);
    };

    match s.login.complete(&state, &code).await {
        Ok(outcome) => Json(LoginResponse {
            message: format!("Logged in for account {}. You can close this window.", outcome.account),
            account: outcome.account,
        })
        .into_response(),
        Err(e) => {
            tracing::warn!(err = %e, "login rejected");
            rejection(&e)
        }
    }
}

fn rejection(e: &LoginError) -> axum::response::Response {
    ErrorCode::from(e).to_http_response(e.reason()).into_response()
}
