// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process fakes for the identity provider, federation exchange and
//! notification sink.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::credential::broker::CredentialBroker;
use crate::credential::federation::{CredentialExchange, ExchangeFuture};
use crate::credential::oidc::{IdClaims, IdentityProvider, ProviderFuture, TokenResponse};
use crate::credential::DelegatedCredential;
use crate::notify::{Notifier, NotifyFuture};

/// Provider that echoes the last issued nonce back in the ID token claims.
#[derive(Default)]
pub struct ScriptedProvider {
    pub last_nonce: Mutex<Option<String>>,
    pub last_verifier: Mutex<Option<String>>,
    pub nonce_override: Mutex<Option<String>>,
    pub claims: Mutex<serde_json::Map<String, serde_json::Value>>,
    pub exchanges: AtomicU32,
    pub fail_exchange: AtomicBool,
}

impl ScriptedProvider {
    pub fn with_claim(self, name: &str, value: &str) -> Self {
        self.claims.lock().unwrap().insert(name.to_owned(), value.into());
        self
    }
}

impl IdentityProvider for ScriptedProvider {
    fn authorization_url(&self, state: &str, nonce: &str, code_challenge: &str) -> String {
        *self.last_nonce.lock().unwrap() = Some(nonce.to_owned());
        format!("https://idp.test/authorize?state={state}&nonce={nonce}&code_challenge={code_challenge}")
    }

    fn exchange_code<'a>(
        &'a self,
        code: &'a str,
        code_verifier: &'a str,
    ) -> ProviderFuture<'a, TokenResponse> {
        Box::pin(async move {
            self.exchanges.fetch_add(1, Ordering::SeqCst);
            *self.last_verifier.lock().unwrap() = Some(code_verifier.to_owned());
            if self.fail_exchange.load(Ordering::SeqCst) {
                anyhow::bail!("invalid_grant");
            }
            Ok(TokenResponse {
                access_token: format!("at-{code}"),
                refresh_token: Some(format!("rt-{code}")),
                id_token: Some(format!("id-{code}")),
                expires_in: 3600,
                token_type: Some("Bearer".to_owned()),
            })
        })
    }

    fn refresh<'a>(&'a self, _refresh_token: &'a str) -> ProviderFuture<'a, TokenResponse> {
        Box::pin(async { Err::<TokenResponse, _>(anyhow::anyhow!("refresh not scripted")) })
    }

    fn verify_id_token<'a>(&'a self, _raw: &'a str) -> ProviderFuture<'a, IdClaims> {
        Box::pin(async move {
            let nonce = match self.nonce_override.lock().unwrap().clone() {
                Some(n) => Some(n),
                None => self.last_nonce.lock().unwrap().clone(),
            };
            Ok(IdClaims {
                sub: "user-1".to_owned(),
                nonce,
                email: None,
                extra: self.claims.lock().unwrap().clone(),
            })
        })
    }
}

/// Exchange that records each call and fails for chosen accounts.
#[derive(Default)]
pub struct RecordingExchange {
    pub seen: Mutex<Vec<(String, String)>>,
    pub failing: Mutex<HashSet<String>>,
}

impl RecordingExchange {
    pub fn fail_for(&self, account: &str) {
        self.failing.lock().unwrap().insert(account.to_owned());
    }
}

impl CredentialExchange for RecordingExchange {
    fn exchange<'a>(&'a self, account: &'a str, token: &'a str) -> ExchangeFuture<'a> {
        Box::pin(async move {
            self.seen.lock().unwrap().push((account.to_owned(), token.to_owned()));
            if self.failing.lock().unwrap().contains(account) {
                anyhow::bail!("AccessDenied: not authorized to assume role");
            }
            Ok(DelegatedCredential {
                account_id: account.to_owned(),
                access_key_id: format!("ASIA{account}"),
                secret_access_key: "secret".to_owned(),
                session_token: "session".to_owned(),
                expiration: None,
            })
        })
    }
}

/// Sink that keeps every posted message.
#[derive(Default)]
pub struct MemoryNotifier {
    pub posts: Mutex<Vec<(String, String)>>,
}

impl Notifier for MemoryNotifier {
    fn post<'a>(&'a self, channel: &'a str, text: &'a str) -> NotifyFuture<'a> {
        Box::pin(async move {
            self.posts.lock().unwrap().push((channel.to_owned(), text.to_owned()));
            Ok(())
        })
    }
}

/// Broker wired to the given fakes.
pub fn broker(
    provider: &Arc<ScriptedProvider>,
    exchange: &Arc<RecordingExchange>,
) -> anyhow::Result<Arc<CredentialBroker>> {
    Ok(Arc::new(CredentialBroker::new(
        Arc::clone(provider) as Arc<dyn IdentityProvider>,
        Arc::clone(exchange) as Arc<dyn CredentialExchange>,
    )?))
}
