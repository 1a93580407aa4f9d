// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for health, tasks and settings.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;
use crate::settings::SettingsUpdate;
use crate::state::AppState;
use crate::task::{SchedulerError, TaskSpec};

// -- Request/Response types ---------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub task_count: usize,
    pub cached_accounts: usize,
    pub pending_logins: usize,
}

#[derive(Debug, Deserialize)]
pub struct DueQuery {
    #[serde(default = "default_within")]
    pub within_secs: u64,
}

fn default_within() -> u64 {
    3600
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub id: String,
    pub removed: bool,
}

fn scheduler_error(e: &SchedulerError) -> axum::response::Response {
    ErrorCode::from(e).to_http_response(e.to_string()).into_response()
}

// -- Handlers -----------------------------------------------------------------

/// `GET /api/v1/health`
pub async fn health(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "running".to_owned(),
        task_count: s.scheduler.len().await,
        cached_accounts: s.broker.status().await.len(),
        pending_logins: s.login.pending_count().await,
    })
}

/// `GET /api/v1/tasks`
pub async fn list_tasks(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    Json(s.scheduler.list_all().await)
}

/// `POST /api/v1/tasks`
pub async fn create_task(
    State(s): State<Arc<AppState>>,
    Json(spec): Json<TaskSpec>,
) -> impl IntoResponse {
    match s.scheduler.create(spec).await {
        Ok(view) => (StatusCode::CREATED, Json(view)).into_response(),
        Err(e) => scheduler_error(&e),
    }
}

/// `GET /api/v1/tasks/due?within_secs=N`
pub async fn due_tasks(
    State(s): State<Arc<AppState>>,
    Query(q): Query<DueQuery>,
) -> impl IntoResponse {
    Json(s.scheduler.due_within(Duration::from_secs(q.within_secs)).await)
}

/// `GET /api/v1/tasks/{id}`
pub async fn get_task(State(s): State<Arc<AppState>>, Path(id): Path<String>) -> impl IntoResponse {
    match s.scheduler.get(&id).await {
        Ok(view) => Json(view).into_response(),
        Err(e) => scheduler_error(&e),
    }
}

/// `PUT /api/v1/tasks/{id}`
pub async fn update_task(
    State(s): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(spec): Json<TaskSpec>,
) -> impl IntoResponse {
    match s.scheduler.update(&id, spec).await {
        Ok(view) => Json(view).into_response(),
        Err(e) => scheduler_error(&e),
    }
}

/// `DELETE /api/v1/tasks/{id}`
pub async fn delete_task(
    State(s): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match s.scheduler.delete(&id).await {
        Ok(()) => Json(DeleteResponse { id, removed: true }).into_response(),
        Err(e) => scheduler_error(&e),
    }
}

/// `POST /api/v1/tasks/{id}/execute`: run now and return the report.
pub async fn execute_task(
    State(s): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let task = match s.scheduler.task(&id).await {
        Ok(task) => task,
        Err(e) => return scheduler_error(&e),
    };
    match s.dispatcher.run_now(task).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => ErrorCode::Internal.to_http_response(e.to_string()).into_response(),
    }
}

/// `GET /api/v1/settings`: secrets redacted.
pub async fn get_settings(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    Json(s.settings.read().await.redacted())
}

/// `PUT /api/v1/settings`
pub async fn update_settings(
    State(s): State<Arc<AppState>>,
    Json(update): Json<SettingsUpdate>,
) -> impl IntoResponse {
    match s.update_settings(update).await {
        Ok(settings) => Json(settings).into_response(),
        Err(e) => {
            tracing::warn!(err = %format!("{e:#}"), "settings update rejected");
            ErrorCode::BadRequest.to_http_response(format!("{e:#}")).into_response()
        }
    }
}
