// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OpenID Connect relying-party client: discovery, code exchange, refresh
//! and ID-token verification.

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use anyhow::Context;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::credential::pkce::{build_auth_url, AuthRequest};
use crate::settings::IdentitySettings;

/// Minimum spacing between key-set refetches triggered by an unknown `kid`.
pub const JWKS_REFETCH_INTERVAL: Duration = Duration::from_secs(60);

/// Boxed future returned by [`IdentityProvider`] methods.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send + 'a>>;

/// Standard OAuth2 / OIDC token endpoint response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

/// Subset of the provider's discovery document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
}

/// Verified ID-token claims.
#[derive(Debug, Clone, Deserialize)]
pub struct IdClaims {
    pub sub: String,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl IdClaims {
    /// Look up a claim as a string. Numeric claims are rendered in decimal.
    pub fn claim_str(&self, name: &str) -> Option<String> {
        match name {
            "sub" => return Some(self.sub.clone()),
            "email" => return self.email.clone(),
            "nonce" => return self.nonce.clone(),
            _ => {}
        }
        match self.extra.get(name)? {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Identity provider seen by the login flow and the broker.
pub trait IdentityProvider: Send + Sync {
    /// Authorization redirect binding `state`, `nonce` and the PKCE challenge.
    fn authorization_url(&self, state: &str, nonce: &str, code_challenge: &str) -> String;

    fn exchange_code<'a>(
        &'a self,
        code: &'a str,
        code_verifier: &'a str,
    ) -> ProviderFuture<'a, TokenResponse>;

    fn refresh<'a>(&'a self, refresh_token: &'a str) -> ProviderFuture<'a, TokenResponse>;

    /// Verify signature, issuer, audience and expiry of a raw ID token.
    fn verify_id_token<'a>(&'a self, raw: &'a str) -> ProviderFuture<'a, IdClaims>;
}

/// Discovered OIDC provider.
pub struct OidcClient {
    http: reqwest::Client,
    metadata: ProviderMetadata,
    client_id: String,
    client_secret: String,
    redirect_url: String,
    scope: String,
    jwks: RwLock<Option<JwkSet>>,
    last_fetch: Mutex<Option<Instant>>,
    refetch_interval: Duration,
}

impl std::fmt::Debug for OidcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcClient")
            .field("issuer", &self.metadata.issuer)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl OidcClient {
    /// Fetch `{provider_url}/.well-known/openid-configuration` and build a client.
    pub async fn discover(http: reqwest::Client, settings: &IdentitySettings) -> anyhow::Result<Self> {
        let url = format!(
            "{}/.well-known/openid-configuration",
            settings.provider_url.trim_end_matches('/')
        );
        let resp = http.get(&url).send().await.with_context(|| format!("fetching {url}"))?;
        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("discovery failed ({status}) at {url}");
        }
        let metadata: ProviderMetadata =
            resp.json().await.with_context(|| format!("parsing discovery document {url}"))?;
        tracing::info!(issuer = %metadata.issuer, "discovered identity provider");
        Ok(Self::with_metadata(http, metadata, settings))
    }

    /// Build a client from already-known endpoints.
    pub fn with_metadata(
        http: reqwest::Client,
        metadata: ProviderMetadata,
        settings: &IdentitySettings,
    ) -> Self {
        Self {
            http,
            metadata,
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            redirect_url: settings.redirect_url.clone(),
            scope: settings.scopes.join(" "),
            jwks: RwLock::new(None),
            last_fetch: Mutex::new(None),
            refetch_interval: JWKS_REFETCH_INTERVAL,
        }
    }

    /// Override the spacing between unknown-`kid` refetches.
    pub fn with_refetch_interval(mut self, interval: Duration) -> Self {
        self.refetch_interval = interval;
        self
    }

    pub fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    async fn token_request(&self, form: &[(&str, &str)], what: &str) -> anyhow::Result<TokenResponse> {
        let mut params: Vec<(&str, &str)> = form.to_vec();
        params.push(("client_id", self.client_id.as_str()));
        if !self.client_secret.is_empty() {
            params.push(("client_secret", self.client_secret.as_str()));
        }

        let resp = self
            .http
            .post(&self.metadata.token_endpoint)
            .timeout(Duration::from_secs(30))
            .form(&params)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("{what} failed ({status}): {text}");
        }

        let token: TokenResponse = resp.json().await?;
        Ok(token)
    }

    async fn fetch_jwks(&self) -> anyhow::Result<JwkSet> {
        let resp = self
            .http
            .get(&self.metadata.jwks_uri)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .context("fetching JWKS")?;
        if !resp.status().is_success() {
            anyhow::bail!("JWKS fetch failed ({})", resp.status());
        }
        Ok(resp.json().await.context("parsing JWKS")?)
    }

    /// Resolve the verification key, refetching the key set when the `kid`
    /// is not in the cached copy (provider key rotation). Refetches are at
    /// most one per `refetch_interval`.
    async fn decoding_key(&self, kid: Option<&str>) -> anyhow::Result<DecodingKey> {
        if let Some(set) = self.jwks.read().await.as_ref() {
            if let Some(jwk) = select_jwk(set, kid) {
                return Ok(DecodingKey::from_jwk(jwk)?);
            }
        }

        if !self.claim_fetch().await {
            tracing::debug!(kid = kid.unwrap_or("<none>"), "key set refetched recently, not retrying");
            anyhow::bail!("no signing key for kid {}", kid.unwrap_or("<none>"));
        }
        let fresh = self.fetch_jwks().await?;
        let key = match select_jwk(&fresh, kid) {
            Some(jwk) => DecodingKey::from_jwk(jwk)?,
            None => anyhow::bail!("no signing key for kid {}", kid.unwrap_or("<none>")),
        };
        *self.jwks.write().await = Some(fresh);
        Ok(key)
    }

    /// Record a key-set fetch unless one happened within `refetch_interval`.
    /// The first fetch is always allowed.
    async fn claim_fetch(&self) -> bool {
        let mut last = self.last_fetch.lock().await;
        let now = Instant::now();
        if last.is_some_and(|t| now.duration_since(t) < self.refetch_interval) {
            return false;
        }
        *last = Some(now);
        true
    }

    async fn verify(&self, raw: &str) -> anyhow::Result<IdClaims> {
        let header = jsonwebtoken::decode_header(raw).context("malformed ID token header")?;
        let key = self.decoding_key(header.kid.as_deref()).await?;
        decode_with_key(raw, &key, header.alg, &self.client_id, &self.metadata.issuer)
    }
}

impl IdentityProvider for OidcClient {
    fn authorization_url(&self, state: &str, nonce: &str, code_challenge: &str) -> String {
        build_auth_url(
            &self.metadata.authorization_endpoint,
            &AuthRequest {
                client_id: &self.client_id,
                redirect_uri: &self.redirect_url,
                scope: &self.scope,
                state,
                nonce,
                code_challenge,
            },
        )
    }

    fn exchange_code<'a>(
        &'a self,
        code: &'a str,
        code_verifier: &'a str,
    ) -> ProviderFuture<'a, TokenResponse> {
        Box::pin(async move {
            self.token_request(
                &[
                    ("grant_type", "authorization_code"),
                    ("code", code),
                    ("redirect_uri", self.redirect_url.as_str()),
                    ("code_verifier", code_verifier),
                ],
                "token exchange",
            )
            .await
        })
    }

    fn refresh<'a>(&'a self, refresh_token: &'a str) -> ProviderFuture<'a, TokenResponse> {
        Box::pin(async move {
            self.token_request(
                &[("grant_type", "refresh_token"), ("refresh_token", refresh_token)],
                "refresh",
            )
            .await
        })
    }

    fn verify_id_token<'a>(&'a self, raw: &'a str) -> ProviderFuture<'a, IdClaims> {
        Box::pin(self.verify(raw))
    }
}

fn select_jwk<'a>(set: &'a JwkSet, kid: Option<&str>) -> Option<&'a Jwk> {
    match kid {
        Some(kid) => set.find(kid),
        None if set.keys.len() == 1 => set.keys.first(),
        None => None,
    }
}

/// Decode and validate an ID token against a known key.
///
/// `exp`, `iss`, `aud` and `sub` are required; `iss` must equal `issuer` and
/// `aud` must contain `audience`.
pub fn decode_with_key(
    raw: &str,
    key: &DecodingKey,
    alg: Algorithm,
    audience: &str,
    issuer: &str,
) -> anyhow::Result<IdClaims> {
    let mut validation = Validation::new(alg);
    validation.set_audience(&[audience]);
    validation.set_issuer(&[issuer]);
    validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
    let data = jsonwebtoken::decode::<IdClaims>(raw, key, &validation)
        .context("ID token rejected")?;
    Ok(data.claims)
}

#[cfg(test)]
#[path = "oidc_tests.rs"]
mod tests;
