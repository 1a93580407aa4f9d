// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interactive sign-on: issue single-use `state`/`nonce` pairs, verify the
//! provider callback, and populate the credential broker.
//!
//! A login is `INITIATED` by [`LoginFlow::begin`] and ends in
//! [`LoginFlow::complete`], which either stores the verified token set
//! (`VERIFIED`) or returns a [`LoginError`] (`REJECTED`).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use zeroize::Zeroizing;

use crate::credential::broker::CredentialBroker;
use crate::credential::pkce::{
    compute_code_challenge, generate_code_verifier, generate_nonce, generate_state,
};
use crate::credential::{epoch_secs, BrokerError, TokenSet};

/// Period of the expired-login sweep.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Login rejection.
#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("unknown, expired or already used login state")]
    InvalidState,
    #[error("ID token nonce does not match the login request")]
    NonceMismatch,
    #[error("authorization code exchange failed: {0}")]
    CodeExchange(#[source] anyhow::Error),
    #[error("ID token verification failed: {0}")]
    IdToken(#[source] anyhow::Error),
    #[error("no account identity in the ID token and none requested")]
    MissingAccount,
    #[error(transparent)]
    Broker(#[from] BrokerError),
}

impl LoginError {
    /// Fixed user-facing reason; internal detail stays in the log.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidState => "This login link is invalid or has expired. Please start again.",
            Self::NonceMismatch => "The identity provider response could not be matched to this login.",
            Self::CodeExchange(_) => "The identity provider rejected the authorization code.",
            Self::IdToken(_) => "The identity token could not be verified.",
            Self::MissingAccount => "No cloud account could be determined for this login.",
            Self::Broker(_) => "The credentials could not be stored. Please try again.",
        }
    }
}

/// In-flight login keyed by its `state` value.
struct PendingLogin {
    nonce: String,
    code_verifier: Zeroizing<String>,
    account_hint: Option<String>,
    expires_at: Instant,
}

/// Result of [`LoginFlow::begin`].
#[derive(Debug, Clone)]
pub struct LoginStart {
    pub authorization_url: String,
    pub state: String,
}

/// Result of a verified callback.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub account: String,
    pub subject: String,
}

pub struct LoginFlow {
    broker: Arc<CredentialBroker>,
    pending: Mutex<HashMap<String, PendingLogin>>,
    account_claim: RwLock<String>,
    ttl: Duration,
}

impl LoginFlow {
    pub fn new(broker: Arc<CredentialBroker>, account_claim: String, ttl: Duration) -> Self {
        Self {
            broker,
            pending: Mutex::new(HashMap::new()),
            account_claim: RwLock::new(account_claim),
            ttl,
        }
    }

    pub async fn set_account_claim(&self, claim: String) {
        *self.account_claim.write().await = claim;
    }

    /// Start a login, optionally naming the account it is for.
    pub async fn begin(&self, account_hint: Option<String>) -> LoginStart {
        let state = generate_state();
        let nonce = generate_nonce();
        let verifier = Zeroizing::new(generate_code_verifier());
        let challenge = compute_code_challenge(&verifier);

        let provider = self.broker.provider().await;
        let authorization_url = provider.authorization_url(&state, &nonce, &challenge);

        let account_hint = account_hint.filter(|a| !a.trim().is_empty());
        tracing::debug!(account = ?account_hint, "login initiated");
        self.pending.lock().await.insert(
            state.clone(),
            PendingLogin {
                nonce,
                code_verifier: verifier,
                account_hint,
                expires_at: Instant::now() + self.ttl,
            },
        );

        LoginStart { authorization_url, state }
    }

    /// Handle the provider callback.
    ///
    /// The pending entry is removed before any other step, so a `state` value
    /// never validates twice even when a later step fails.
    pub async fn complete(&self, state: &str, code: &str) -> Result<LoginOutcome, LoginError> {
        let pending = self.pending.lock().await.remove(state).ok_or(LoginError::InvalidState)?;
        if pending.expires_at <= Instant::now() {
            return Err(LoginError::InvalidState);
        }

        let provider = self.broker.provider().await;
        let resp = provider
            .exchange_code(code, &pending.code_verifier)
            .await
            .map_err(LoginError::CodeExchange)?;
        let raw = resp
            .id_token
            .as_deref()
            .ok_or_else(|| LoginError::IdToken(anyhow::anyhow!("token response has no id_token")))?;
        let claims = provider.verify_id_token(raw).await.map_err(LoginError::IdToken)?;

        if claims.nonce.as_deref() != Some(pending.nonce.as_str()) {
            return Err(LoginError::NonceMismatch);
        }

        let claim_name = self.account_claim.read().await.clone();
        let account = match (claims.claim_str(&claim_name), pending.account_hint) {
            (Some(from_token), hint) => {
                if hint.as_deref().is_some_and(|h| h != from_token) {
                    tracing::warn!(
                        account = %from_token,
                        requested = ?hint,
                        "login requested a different account than the token names"
                    );
                }
                from_token
            }
            (None, Some(hint)) => hint,
            (None, None) => return Err(LoginError::MissingAccount),
        };

        let tokens = TokenSet::from_response(&resp, epoch_secs());
        self.broker.store(&account, &tokens).await?;
        tracing::info!(account = %account, subject = %claims.sub, "login verified");
        Ok(LoginOutcome { account, subject: claims.sub })
    }

    /// Drop the pending login for `state` after the provider reported an
    /// error instead of a code. Returns whether it was pending.
    pub async fn abandon(&self, state: &str) -> bool {
        let dropped = self.pending.lock().await.remove(state).is_some();
        if dropped {
            tracing::debug!("pending login abandoned");
        }
        dropped
    }

    /// Remove expired pending logins. Returns how many were dropped.
    pub async fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut pending = self.pending.lock().await;
        let before = pending.len();
        pending.retain(|_, p| p.expires_at > now);
        before - pending.len()
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}

/// Spawn the periodic expired-login sweep.
pub fn spawn_sweeper(
    flow: Arc<LoginFlow>,
    interval: Duration,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }
            let dropped = flow.sweep_expired().await;
            if dropped > 0 {
                tracing::debug!(dropped, "swept expired logins");
            }
        }
    })
}

#[cfg(test)]
#[path = "login_tests.rs"]
mod tests;
