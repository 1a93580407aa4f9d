// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use proptest::prelude::*;

use super::*;

fn sample_tokens() -> TokenSet {
    TokenSet {
        access_token: "access-abc".to_owned(),
        refresh_token: Some("refresh-def".to_owned()),
        id_token: Some("header.payload.sig".to_owned()),
        token_type: Some("Bearer".to_owned()),
        expires_at: 1_900_000_000,
    }
}

proptest! {
    #[test]
    fn seal_then_open_returns_original(payload in proptest::collection::vec(any::<u8>(), 0..4096)) {
        let cipher = TokenCipher::generate().map_err(|e| TestCaseError::fail(e.to_string()))?;
        let sealed = cipher.seal(&payload).map_err(|e| TestCaseError::fail(e.to_string()))?;
        let opened = cipher.open(&sealed).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(opened.as_slice(), payload.as_slice());
    }
}

#[yare::parameterized(
    empty     = { 0 },
    one_byte  = { 1 },
    one_block = { 16 },
    odd       = { 333 },
    large     = { 65_536 },
)]
fn round_trip_sizes(size: usize) {
    let cipher = TokenCipher::generate().expect("cipher");
    let payload: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
    let sealed = cipher.seal(&payload).expect("seal");
    assert_eq!(sealed.len(), NONCE_LEN + payload.len() + AES_256_GCM.tag_len());
    let opened = cipher.open(&sealed).expect("open");
    assert_eq!(opened.as_slice(), payload.as_slice());
}

#[test]
fn sealing_twice_uses_distinct_nonces() -> anyhow::Result<()> {
    let cipher = TokenCipher::generate()?;
    let a = cipher.seal(b"same plaintext")?;
    let b = cipher.seal(b"same plaintext")?;
    assert_ne!(a, b);
    assert_ne!(a[..NONCE_LEN], b[..NONCE_LEN]);
    Ok(())
}

#[test]
fn tampered_ciphertext_is_rejected() -> anyhow::Result<()> {
    let cipher = TokenCipher::generate()?;
    let mut sealed = cipher.seal(b"secret token material")?;
    let last = sealed.len() - 1;
    sealed[last] ^= 0x01;
    assert!(matches!(cipher.open(&sealed), Err(CipherError::Open)));
    Ok(())
}

#[test]
fn other_key_cannot_open() -> anyhow::Result<()> {
    let a = TokenCipher::generate()?;
    let b = TokenCipher::generate()?;
    let sealed = a.seal(b"payload")?;
    assert!(matches!(b.open(&sealed), Err(CipherError::Open)));
    Ok(())
}

#[test]
fn truncated_input_is_rejected() -> anyhow::Result<()> {
    let cipher = TokenCipher::generate()?;
    assert!(matches!(cipher.open(&[0u8; 8]), Err(CipherError::Open)));
    assert!(matches!(cipher.open(&[]), Err(CipherError::Open)));
    Ok(())
}

#[test]
fn token_set_round_trip() -> anyhow::Result<()> {
    let cipher = TokenCipher::generate()?;
    let sealed = cipher.seal_tokens(&sample_tokens())?;

    let raw = String::from_utf8_lossy(sealed.as_bytes()).into_owned();
    assert!(!raw.contains("access-abc"));
    assert!(!raw.contains("refresh-def"));

    let opened = cipher.open_tokens(&sealed)?;
    assert_eq!(opened.access_token, "access-abc");
    assert_eq!(opened.refresh_token.as_deref(), Some("refresh-def"));
    assert_eq!(opened.id_token.as_deref(), Some("header.payload.sig"));
    assert_eq!(opened.expires_at, 1_900_000_000);
    Ok(())
}

#[test]
fn sealed_payload_debug_hides_bytes() -> anyhow::Result<()> {
    let cipher = TokenCipher::generate()?;
    let sealed = cipher.seal_tokens(&sample_tokens())?;
    let dbg = format!("{sealed:?}");
    assert!(dbg.starts_with("SealedPayload("));
    assert!(dbg.ends_with("bytes)"));
    Ok(())
}
