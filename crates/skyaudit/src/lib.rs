// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Skyaudit: scheduled cloud-account audits run with short-lived credentials
//! minted from single sign-on logins.

pub mod audit;
pub mod config;
pub mod credential;
pub mod error;
pub mod login;
pub mod notify;
pub mod settings;
pub mod state;
pub mod task;
pub mod transport;

#[cfg(test)]
mod test_support;

use std::sync::{Arc, Once};
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::audit::{ApiTarget, OperationRegistry};
use crate::config::Config;
use crate::credential::federation::StsExchange;
use crate::credential::oidc::OidcClient;
use crate::state::{AppState, Services};
use crate::transport::build_router;

/// Install the process-wide rustls crypto provider. Idempotent.
pub fn ensure_crypto() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Outbound HTTP client for the identity provider and chat sink.
pub fn http_client() -> anyhow::Result<reqwest::Client> {
    ensure_crypto();
    reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .context("building HTTP client")
}

/// Initialize tracing/logging from config.
///
/// Uses `try_init` so it's safe to call multiple times (e.g. from tests).
pub fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match config.log_format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}

/// Assemble the service from its settings file.
pub async fn prepare(config: Config, shutdown: CancellationToken) -> anyhow::Result<Arc<AppState>> {
    let settings = settings::load(&config.config)?;
    let http = http_client()?;

    let provider = OidcClient::discover(http.clone(), &settings.identity)
        .await
        .context("identity provider discovery")?;
    let services = Services {
        provider: Arc::new(provider),
        exchange: Arc::new(StsExchange::new(&settings.federation)),
        notifier: notify::from_settings(&http, &settings.slack),
        registry: OperationRegistry::builtin(&ApiTarget::from_settings(&settings.federation)),
    };

    let state = AppState::new(config, settings, http, services, shutdown)?;
    let created = state.load_tasks().await;
    tracing::info!(tasks = created, "configured tasks loaded");
    Ok(state)
}

/// Run the service until shutdown.
pub async fn run(config: Config, shutdown: CancellationToken) -> anyhow::Result<()> {
    let addr = config.bind_addr();
    let tick = config.tick_interval();
    let state = prepare(config, shutdown.clone()).await?;

    let clock = task::clock::spawn_clock(
        Arc::clone(&state.scheduler),
        Arc::clone(&state.dispatcher),
        tick,
        shutdown.clone(),
    );
    let sweeper = login::spawn_sweeper(Arc::clone(&state.login), login::SWEEP_INTERVAL, shutdown.clone());

    let router = build_router(state);
    let listener = TcpListener::bind(&addr).await.with_context(|| format!("binding {addr}"))?;
    tracing::info!("skyaudit listening on {addr}");
    axum::serve(listener, router).with_graceful_shutdown(shutdown.clone().cancelled_owned()).await?;

    shutdown.cancel();
    let _ = clock.await;
    let _ = sweeper.await;
    Ok(())
}
