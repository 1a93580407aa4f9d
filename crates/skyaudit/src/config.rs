// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

/// Process flags for the skyaudit service.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "skyaudit", version, about = "Scheduled cloud-account audits with federated credentials")]
pub struct Config {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "SKYAUDIT_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 9090, env = "SKYAUDIT_PORT")]
    pub port: u16,

    /// Bearer token for the admin API. If unset, auth is disabled.
    #[arg(long, env = "SKYAUDIT_AUTH_TOKEN")]
    pub auth_token: Option<String>,

    /// Path to the JSON settings file.
    #[arg(long, default_value = "skyaudit.json", env = "SKYAUDIT_CONFIG")]
    pub config: PathBuf,

    /// Scheduler clock tick in milliseconds.
    #[arg(long, default_value_t = 1000, env = "SKYAUDIT_TICK_MS")]
    pub tick_ms: u64,

    /// Lifetime of an unanswered login redirect, in seconds.
    #[arg(long, default_value_t = 300, env = "SKYAUDIT_LOGIN_TTL_SECS")]
    pub login_ttl_secs: u64,

    /// Log filter directive (e.g. `info`, `skyaudit=debug`).
    #[arg(long, default_value = "info", env = "SKYAUDIT_LOG_LEVEL")]
    pub log_level: String,

    /// Log output format: `text` or `json`.
    #[arg(long, default_value = "text", env = "SKYAUDIT_LOG_FORMAT")]
    pub log_format: String,
}

impl Config {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn login_ttl(&self) -> Duration {
        Duration::from_secs(self.login_ttl_secs)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 9090,
            auth_token: None,
            config: PathBuf::from("skyaudit.json"),
            tick_ms: 1000,
            login_ttl_secs: 300,
            log_level: "info".to_owned(),
            log_format: "text".to_owned(),
        }
    }
}
