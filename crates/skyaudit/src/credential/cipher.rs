// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! AES-256-GCM sealing of cached token sets.
//!
//! The key is drawn from the system RNG once per process and never leaves
//! memory, so a restart makes every sealed payload unreadable. Each seal uses
//! a fresh 96-bit nonce stored in front of the ciphertext:
//! `nonce (12) || ciphertext || tag (16)`.

use std::fmt;

use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

use crate::credential::TokenSet;

/// Errors from sealing or opening a payload.
#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    #[error("failed to generate encryption key")]
    KeyGeneration,
    #[error("failed to seal payload")]
    Seal,
    #[error("payload is malformed or was tampered with")]
    Open,
    #[error("token set encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Ciphertext of a serialized [`TokenSet`].
#[derive(Clone, PartialEq, Eq)]
pub struct SealedPayload(Vec<u8>);

impl SealedPayload {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for SealedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SealedPayload({} bytes)", self.0.len())
    }
}

/// Process-lifetime authenticated cipher.
pub struct TokenCipher {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenCipher(AES-256-GCM)")
    }
}

impl TokenCipher {
    /// Create a cipher with a freshly generated random key.
    pub fn generate() -> Result<Self, CipherError> {
        let rng = SystemRandom::new();
        let mut key_bytes = Zeroizing::new([0u8; 32]);
        rng.fill(&mut key_bytes[..]).map_err(|_| CipherError::KeyGeneration)?;
        let unbound =
            UnboundKey::new(&AES_256_GCM, &key_bytes[..]).map_err(|_| CipherError::KeyGeneration)?;
        Ok(Self { key: LessSafeKey::new(unbound), rng })
    }

    /// Encrypt `plaintext` under a fresh nonce.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng.fill(&mut nonce_bytes).map_err(|_| CipherError::Seal)?;

        let mut body = plaintext.to_vec();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::empty(),
                &mut body,
            )
            .map_err(|_| CipherError::Seal)?;

        let mut out = Vec::with_capacity(NONCE_LEN + body.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Decrypt and authenticate a payload produced by [`seal`](Self::seal).
    pub fn open(&self, sealed: &[u8]) -> Result<Zeroizing<Vec<u8>>, CipherError> {
        if sealed.len() < NONCE_LEN + AES_256_GCM.tag_len() {
            return Err(CipherError::Open);
        }
        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes).map_err(|_| CipherError::Open)?;

        let mut buf = Zeroizing::new(ciphertext.to_vec());
        let len = self
            .key
            .open_in_place(nonce, Aad::empty(), buf.as_mut_slice())
            .map_err(|_| CipherError::Open)?
            .len();
        buf.truncate(len);
        Ok(buf)
    }

    /// Serialize and seal a token set.
    pub fn seal_tokens(&self, tokens: &TokenSet) -> Result<SealedPayload, CipherError> {
        let plaintext = Zeroizing::new(serde_json::to_vec(tokens)?);
        Ok(SealedPayload(self.seal(&plaintext)?))
    }

    /// Open and deserialize a sealed token set.
    pub fn open_tokens(&self, sealed: &SealedPayload) -> Result<TokenSet, CipherError> {
        let plaintext = self.open(&sealed.0)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }
}

#[cfg(test)]
#[path = "cipher_tests.rs"]
mod tests;
