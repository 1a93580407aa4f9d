// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authorization-code + PKCE (RFC 7636) helpers and the random values bound
//! into a login redirect.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};

/// 32 random bytes, base64url without padding (43 chars).
fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate a PKCE code verifier (43-128 char URL-safe random string).
pub fn generate_code_verifier() -> String {
    random_token()
}

/// Compute code_challenge = base64url_nopad(sha256(verifier)).
pub fn compute_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Generate an anti-forgery `state` value.
pub fn generate_state() -> String {
    random_token()
}

/// Generate a replay-protection `nonce` for the ID token.
pub fn generate_nonce() -> String {
    random_token()
}

/// Parameters of an OpenID Connect authorization redirect.
#[derive(Debug, Clone, Copy)]
pub struct AuthRequest<'a> {
    pub client_id: &'a str,
    pub redirect_uri: &'a str,
    pub scope: &'a str,
    pub state: &'a str,
    pub nonce: &'a str,
    pub code_challenge: &'a str,
}

/// Build the authorization URL with state, nonce and S256 challenge.
pub fn build_auth_url(authorization_endpoint: &str, req: &AuthRequest<'_>) -> String {
    let sep = if authorization_endpoint.contains('?') { '&' } else { '?' };
    format!(
        "{authorization_endpoint}{sep}response_type=code\
         &client_id={client_id}\
         &redirect_uri={redirect_uri}\
         &scope={scope}\
         &state={state}\
         &nonce={nonce}\
         &code_challenge={code_challenge}\
         &code_challenge_method=S256",
        client_id = urlencoding(req.client_id),
        redirect_uri = urlencoding(req.redirect_uri),
        scope = urlencoding(req.scope),
        state = urlencoding(req.state),
        nonce = urlencoding(req.nonce),
        code_challenge = urlencoding(req.code_challenge),
    )
}

/// Form-style encoding for URL query parameters (spaces as `+`).
fn urlencoding(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char);
            }
            b' ' => out.push('+'),
            _ => {
                out.push('%');
                out.push(char::from(HEX[(b >> 4) as usize]));
                out.push(char::from(HEX[(b & 0xf) as usize]));
            }
        }
    }
    out
}

const HEX: &[u8; 16] = b"0123456789ABCDEF";

#[cfg(test)]
#[path = "pkce_tests.rs"]
mod tests;
