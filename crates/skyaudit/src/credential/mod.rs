// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential brokering: federated sign-on tokens in, per-account cloud
//! credentials out.
//!
//! The identity provider's token set for each account is held encrypted in
//! memory by the [`broker::CredentialBroker`]. Every audit run exchanges the
//! (refreshed if needed) identity token for a fresh, short-lived delegated
//! credential scoped to the target account.

pub mod broker;
pub mod cipher;
pub mod federation;
pub mod oidc;
pub mod pkce;

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::credential::oidc::TokenResponse;

/// Decrypted token set for one account.
///
/// Only ever lives for the duration of a single broker call; the cache keeps
/// the sealed form. Secret fields are wiped on drop.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Expiry as epoch seconds. Zero means the provider sent no expiry.
    #[serde(default)]
    pub expires_at: u64,
}

impl TokenSet {
    /// Build a token set from a fresh authorization-code exchange.
    pub fn from_response(resp: &TokenResponse, now: u64) -> Self {
        Self {
            access_token: resp.access_token.clone(),
            refresh_token: resp.refresh_token.clone(),
            id_token: resp.id_token.clone(),
            token_type: resp.token_type.clone(),
            expires_at: expiry_from(resp.expires_in, now),
        }
    }

    /// Apply a refresh-grant response on top of the previous token set.
    ///
    /// Providers may omit the refresh token or ID token on refresh; the
    /// previous values are carried over in that case.
    pub fn refreshed(&self, resp: &TokenResponse, now: u64) -> Self {
        Self {
            access_token: resp.access_token.clone(),
            refresh_token: resp.refresh_token.clone().or_else(|| self.refresh_token.clone()),
            id_token: resp.id_token.clone().or_else(|| self.id_token.clone()),
            token_type: resp.token_type.clone().or_else(|| self.token_type.clone()),
            expires_at: expiry_from(resp.expires_in, now),
        }
    }

    /// Whether the access token is usable at `now`. No grace period.
    pub fn is_valid_at(&self, now: u64) -> bool {
        !self.access_token.is_empty() && (self.expires_at == 0 || now < self.expires_at)
    }

    /// Token presented to the federation trust boundary.
    pub fn web_identity_token(&self) -> &str {
        self.id_token.as_deref().unwrap_or(&self.access_token)
    }
}

impl Drop for TokenSet {
    fn drop(&mut self) {
        self.access_token.zeroize();
        self.refresh_token.zeroize();
        self.id_token.zeroize();
    }
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("has_id_token", &self.id_token.is_some())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

fn expiry_from(expires_in: u64, now: u64) -> u64 {
    if expires_in == 0 {
        0
    } else {
        now.saturating_add(expires_in)
    }
}

/// Short-lived, account-scoped cloud credential minted for one audit run.
///
/// Never cached.
#[derive(Clone)]
pub struct DelegatedCredential {
    pub account_id: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: Option<SystemTime>,
}

impl Drop for DelegatedCredential {
    fn drop(&mut self) {
        self.secret_access_key.zeroize();
        self.session_token.zeroize();
    }
}

impl fmt::Debug for DelegatedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegatedCredential")
            .field("account_id", &self.account_id)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// Errors surfaced by [`broker::CredentialBroker`].
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("no token cached for account {0}; log in first")]
    NoToken(String),
    #[error("token refresh failed for account {account}: {source}")]
    RefreshFailed {
        account: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("cached token for account {0} could not be decrypted; log in again")]
    Decryption(String),
    #[error("credential exchange failed for account {account}: {source}")]
    Exchange {
        account: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("token encryption failed: {0}")]
    Cipher(#[from] cipher::CipherError),
}

/// Return current epoch seconds.
pub fn epoch_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}
