// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::credential::BrokerError;
use crate::login::LoginError;
use crate::task::SchedulerError;

/// Error codes for the admin API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    Unauthorized,
    BadRequest,
    InvalidSchedule,
    UnknownOperation,
    TaskNotFound,
    AccountNotFound,
    NoToken,
    RefreshFailed,
    Decryption,
    InvalidState,
    NonceMismatch,
    LoginFailed,
    UpstreamError,
    Internal,
}

impl ErrorCode {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::BadRequest | Self::InvalidSchedule | Self::UnknownOperation => 400,
            Self::InvalidState | Self::NonceMismatch | Self::LoginFailed => 400,
            Self::TaskNotFound | Self::AccountNotFound => 404,
            Self::NoToken | Self::RefreshFailed | Self::Decryption => 409,
            Self::UpstreamError => 502,
            Self::Internal => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::BadRequest => "BAD_REQUEST",
            Self::InvalidSchedule => "INVALID_SCHEDULE",
            Self::UnknownOperation => "UNKNOWN_OPERATION",
            Self::TaskNotFound => "TASK_NOT_FOUND",
            Self::AccountNotFound => "ACCOUNT_NOT_FOUND",
            Self::NoToken => "NO_TOKEN",
            Self::RefreshFailed => "REFRESH_FAILED",
            Self::Decryption => "DECRYPTION_FAILED",
            Self::InvalidState => "INVALID_STATE",
            Self::NonceMismatch => "NONCE_MISMATCH",
            Self::LoginFailed => "LOGIN_FAILED",
            Self::UpstreamError => "UPSTREAM_ERROR",
            Self::Internal => "INTERNAL",
        }
    }

    pub fn to_error_body(&self, message: impl Into<String>) -> ErrorBody {
        ErrorBody { code: self.as_str().to_owned(), message: message.into() }
    }

    pub fn to_http_response(
        &self,
        message: impl Into<String>,
    ) -> (StatusCode, Json<ErrorResponse>) {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse { error: self.to_error_body(message) };
        (status, Json(body))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&SchedulerError> for ErrorCode {
    fn from(e: &SchedulerError) -> Self {
        match e {
            SchedulerError::ScheduleParse(_) => Self::InvalidSchedule,
            SchedulerError::UnknownOperation { .. } => Self::UnknownOperation,
            SchedulerError::NotFound(_) => Self::TaskNotFound,
            SchedulerError::Invalid(_) => Self::BadRequest,
        }
    }
}

impl From<&BrokerError> for ErrorCode {
    fn from(e: &BrokerError) -> Self {
        match e {
            BrokerError::NoToken(_) => Self::NoToken,
            BrokerError::RefreshFailed { .. } => Self::RefreshFailed,
            BrokerError::Decryption(_) => Self::Decryption,
            BrokerError::Exchange { .. } => Self::UpstreamError,
            BrokerError::Cipher(_) => Self::Internal,
        }
    }
}

impl From<&LoginError> for ErrorCode {
    fn from(e: &LoginError) -> Self {
        match e {
            LoginError::InvalidState => Self::InvalidState,
            LoginError::NonceMismatch => Self::NonceMismatch,
            _ => Self::LoginFailed,
        }
    }
}

/// Top-level error response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error body with machine-readable code and human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
