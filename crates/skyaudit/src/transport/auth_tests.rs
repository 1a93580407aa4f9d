// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::HeaderMap;

use super::*;

fn headers(auth: &str) -> anyhow::Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert("authorization", auth.parse().map_err(|e| anyhow::anyhow!("{e}"))?);
    Ok(headers)
}

#[test]
fn no_token_allows_all() -> anyhow::Result<()> {
    assert!(validate_bearer(&HeaderMap::new(), None).is_ok());
    Ok(())
}

#[test]
fn valid_bearer_passes() -> anyhow::Result<()> {
    assert!(validate_bearer(&headers("Bearer secret123")?, Some("secret123")).is_ok());
    Ok(())
}

#[yare::parameterized(
    wrong_token = { "Bearer wrong" },
    prefix_only = { "Bearer secret12" },
    basic_scheme = { "Basic dXNlcjpwYXNz" },
    lowercase_scheme = { "bearer secret123" },
)]
fn bad_header_rejects(auth: &str) {
    let h = headers(auth).unwrap();
    assert_eq!(validate_bearer(&h, Some("secret123")).err(), Some(ErrorCode::Unauthorized));
}

#[test]
fn missing_header_rejects() -> anyhow::Result<()> {
    assert_eq!(validate_bearer(&HeaderMap::new(), Some("secret123")).err(), Some(ErrorCode::Unauthorized));
    Ok(())
}

#[yare::parameterized(
    health = { "/api/v1/health", true },
    login = { "/auth/login", true },
    callback = { "/auth/callback", true },
    tasks = { "/api/v1/tasks", false },
    settings = { "/api/v1/settings", false },
    credentials = { "/api/v1/credentials/111111111111", false },
)]
fn open_paths(path: &str, open: bool) {
    assert_eq!(is_open(path), open);
}

#[test]
fn constant_time_eq_matches_eq() {
    assert!(constant_time_eq("abc", "abc"));
    assert!(!constant_time_eq("abc", "abd"));
    assert!(!constant_time_eq("abc", "abcd"));
    assert!(constant_time_eq("", ""));
}
