// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential broker: encrypted per-account token cache and delegated
//! credential minting.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use zeroize::Zeroizing;

use crate::credential::cipher::{SealedPayload, TokenCipher};
use crate::credential::federation::CredentialExchange;
use crate::credential::oidc::IdentityProvider;
use crate::credential::{epoch_secs, BrokerError, DelegatedCredential, TokenSet};

/// Sealed token set plus the plaintext metadata needed for status listing.
struct CachedCredential {
    sealed: SealedPayload,
    expires_at: u64,
    has_refresh_token: bool,
    updated_at: u64,
}

/// One account's cache entry. The mutex is the per-account writer lock:
/// decrypt, refresh, re-seal and eviction all happen while it is held. An
/// evicted slot keeps its map entry with `None` inside.
#[derive(Default)]
struct AccountSlot {
    entry: Mutex<Option<CachedCredential>>,
}

/// Cached account as reported by [`CredentialBroker::status`].
#[derive(Debug, Clone, Serialize)]
pub struct AccountStatus {
    pub account: String,
    /// Epoch seconds; zero when the provider set no expiry.
    pub expires_at: u64,
    pub expired: bool,
    pub has_refresh_token: bool,
    pub updated_at: u64,
}

/// Holds each account's token set encrypted under a process-lifetime key and
/// mints fresh delegated credentials on demand.
pub struct CredentialBroker {
    cipher: TokenCipher,
    slots: RwLock<HashMap<String, Arc<AccountSlot>>>,
    provider: RwLock<Arc<dyn IdentityProvider>>,
    exchange: RwLock<Arc<dyn CredentialExchange>>,
}

impl CredentialBroker {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        exchange: Arc<dyn CredentialExchange>,
    ) -> Result<Self, BrokerError> {
        Ok(Self {
            cipher: TokenCipher::generate()?,
            slots: RwLock::new(HashMap::new()),
            provider: RwLock::new(provider),
            exchange: RwLock::new(exchange),
        })
    }

    /// Swap the identity provider after a settings change.
    pub async fn set_provider(&self, provider: Arc<dyn IdentityProvider>) {
        *self.provider.write().await = provider;
    }

    /// Swap the federation exchange after a settings change.
    pub async fn set_exchange(&self, exchange: Arc<dyn CredentialExchange>) {
        *self.exchange.write().await = exchange;
    }

    pub async fn provider(&self) -> Arc<dyn IdentityProvider> {
        Arc::clone(&*self.provider.read().await)
    }

    /// Encrypt `tokens` and create or overwrite the account's cache entry.
    pub async fn store(&self, account: &str, tokens: &TokenSet) -> Result<(), BrokerError> {
        let cached = self.seal(tokens)?;
        let slot = {
            let mut slots = self.slots.write().await;
            Arc::clone(slots.entry(account.to_owned()).or_default())
        };
        *slot.entry.lock().await = Some(cached);
        tracing::info!(account, expires_at = tokens.expires_at, "cached token set");
        Ok(())
    }

    /// Mint a fresh delegated credential for `account`.
    ///
    /// Refreshes an expired access token first, serialized per account so
    /// concurrent callers for the same account observe one refresh. The
    /// federation exchange runs after the account lock is released.
    pub async fn mint_delegated_credential(
        &self,
        account: &str,
    ) -> Result<DelegatedCredential, BrokerError> {
        let slot = self
            .slots
            .read()
            .await
            .get(account)
            .cloned()
            .ok_or_else(|| BrokerError::NoToken(account.to_owned()))?;

        let identity_token = {
            let mut entry = slot.entry.lock().await;
            let Some(cached) = entry.as_ref() else {
                return Err(BrokerError::NoToken(account.to_owned()));
            };

            let tokens = match self.cipher.open_tokens(&cached.sealed) {
                Ok(tokens) => tokens,
                Err(e) => {
                    // The slot stays mapped so a concurrent store lands in it.
                    tracing::warn!(account, err = %e, "evicting undecryptable cache entry");
                    *entry = None;
                    return Err(BrokerError::Decryption(account.to_owned()));
                }
            };

            let tokens = if tokens.is_valid_at(epoch_secs()) {
                tokens
            } else {
                let next = self.refresh(account, &tokens).await?;
                *entry = Some(self.seal(&next)?);
                tracing::info!(account, expires_at = next.expires_at, "refreshed token set");
                next
            };

            Zeroizing::new(tokens.web_identity_token().to_owned())
        };

        let exchange = Arc::clone(&*self.exchange.read().await);
        exchange
            .exchange(account, &identity_token)
            .await
            .map_err(|source| BrokerError::Exchange { account: account.to_owned(), source })
    }

    async fn refresh(&self, account: &str, tokens: &TokenSet) -> Result<TokenSet, BrokerError> {
        let Some(refresh_token) = tokens.refresh_token.as_deref() else {
            return Err(BrokerError::RefreshFailed {
                account: account.to_owned(),
                source: anyhow::anyhow!("access token expired and no refresh token is cached"),
            });
        };
        let provider = self.provider().await;
        let resp = provider.refresh(refresh_token).await.map_err(|source| {
            tracing::warn!(account, err = %source, "token refresh failed");
            BrokerError::RefreshFailed { account: account.to_owned(), source }
        })?;
        Ok(tokens.refreshed(&resp, epoch_secs()))
    }

    fn seal(&self, tokens: &TokenSet) -> Result<CachedCredential, BrokerError> {
        Ok(CachedCredential {
            sealed: self.cipher.seal_tokens(tokens)?,
            expires_at: tokens.expires_at,
            has_refresh_token: tokens.refresh_token.is_some(),
            updated_at: epoch_secs(),
        })
    }

    /// Cached accounts, sorted by id. No token material.
    pub async fn status(&self) -> Vec<AccountStatus> {
        let slots: Vec<(String, Arc<AccountSlot>)> = self
            .slots
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect();

        let now = epoch_secs();
        let mut out = Vec::with_capacity(slots.len());
        for (account, slot) in slots {
            if let Some(c) = slot.entry.lock().await.as_ref() {
                out.push(AccountStatus {
                    account,
                    expires_at: c.expires_at,
                    expired: c.expires_at != 0 && now >= c.expires_at,
                    has_refresh_token: c.has_refresh_token,
                    updated_at: c.updated_at,
                });
            }
        }
        out.sort_by(|a, b| a.account.cmp(&b.account));
        out
    }

    /// Evict one account's cache entry. Returns whether it existed.
    pub async fn remove(&self, account: &str) -> bool {
        let removed = self.slots.write().await.remove(account);
        match removed {
            Some(slot) => {
                let had = slot.entry.lock().await.take().is_some();
                tracing::info!(account, "removed cached token set");
                had
            }
            None => false,
        }
    }

    #[cfg(test)]
    async fn sealed_for(&self, account: &str) -> Option<SealedPayload> {
        let slot = self.slots.read().await.get(account).cloned()?;
        let entry = slot.entry.lock().await;
        entry.as_ref().map(|c| c.sealed.clone())
    }

    #[cfg(test)]
    async fn replace_sealed(&self, account: &str, sealed: SealedPayload) {
        if let Some(slot) = self.slots.read().await.get(account).cloned() {
            if let Some(c) = slot.entry.lock().await.as_mut() {
                c.sealed = sealed;
            }
        }
    }
}

#[cfg(test)]
#[path = "broker_tests.rs"]
mod tests;
