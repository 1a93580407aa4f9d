// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP transport: admin API and browser login.

pub mod auth;
pub mod http;
pub mod http_cred;
pub mod http_login;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the axum `Router` with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health (no auth)
        .route("/api/v1/health", get(http::health))
        // Tasks
        .route("/api/v1/tasks", get(http::list_tasks).post(http::create_task))
        .route("/api/v1/tasks/due", get(http::due_tasks))
        .route(
            "/api/v1/tasks/{id}",
            get(http::get_task).put(http::update_task).delete(http::delete_task),
        )
        .route("/api/v1/tasks/{id}/execute", post(http::execute_task))
        // Settings
        .route("/api/v1/settings", get(http::get_settings).put(http::update_settings))
        // Credential administration
        .route("/api/v1/credentials", get(http_cred::credentials_status))
        .route("/api/v1/credentials/{account}", delete(http_cred::remove_credential))
        // Browser login (no auth)
        .route("/auth/login", get(http_login::login))
        .route("/auth/callback", get(http_login::callback))
        // Middleware
        .layer(middleware::from_fn_with_state(state.clone(), auth::auth_layer))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
