// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWE compact serialization (direct key agreement, AES-GCM).
//!
//! Only `alg=dir` with `enc=A128GCM` or `enc=A256GCM` is supported. The
//! plaintext is expected to be a nested JWS.

use base64ct::{Base64UrlUnpadded, Encoding};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_128_GCM, AES_256_GCM};
use serde::Deserialize;

use super::AuthError;

/// Number of dot-separated segments in a compact JWE.
pub const JWE_SEGMENTS: usize = 5;

#[derive(Debug, Deserialize)]
struct JweHeader {
    alg: String,
    enc: String,
}

/// Decrypt a compact JWE with a base64url-encoded content encryption key.
pub fn decrypt(token: &str, key_b64: &str) -> Result<String, AuthError> {
    let segments: Vec<&str> = token.split('.').collect();
    let [protected, encrypted_key, iv, ciphertext, tag] = segments.as_slice() else {
        return Err(AuthError::MalformedToken(format!(
            "expected {JWE_SEGMENTS} JWE segments, found {}",
            segments.len()
        )));
    };

    let header: JweHeader = serde_json::from_slice(&decode_segment(protected, "header")?)
        .map_err(|e| AuthError::MalformedToken(format!("invalid JWE header: {e}")))?;
    let iv = decode_segment(iv, "iv")?;
    let mut in_out = decode_segment(ciphertext, "ciphertext")?;
    in_out.extend_from_slice(&decode_segment(tag, "tag")?);

    if header.alg != "dir" {
        return Err(AuthError::DecryptionFailed(format!(
            "unsupported key management algorithm {}",
            header.alg
        )));
    }
    if !encrypted_key.is_empty() {
        return Err(AuthError::MalformedToken(
            "encrypted key must be empty for direct encryption".to_string(),
        ));
    }

    let algorithm = match header.enc.as_str() {
        "A128GCM" => &AES_128_GCM,
        "A256GCM" => &AES_256_GCM,
        other => {
            return Err(AuthError::DecryptionFailed(format!(
                "unsupported content encryption {other}"
            )))
        }
    };

    let key = Base64UrlUnpadded::decode_vec(key_b64.trim_end_matches('='))
        .map_err(|_| AuthError::Configuration("JWE decryption key is not base64url".to_string()))?;
    let key = UnboundKey::new(algorithm, &key).map_err(|_| {
        AuthError::DecryptionFailed(format!("key length does not match {}", header.enc))
    })?;
    let nonce = Nonce::try_assume_unique_for_key(&iv)
        .map_err(|_| AuthError::MalformedToken("JWE iv must be 96 bits".to_string()))?;

    let plaintext = LessSafeKey::new(key)
        .open_in_place(nonce, Aad::from(protected.as_bytes()), &mut in_out)
        .map_err(|_| AuthError::DecryptionFailed("authentication tag mismatch".to_string()))?;

    String::from_utf8(plaintext.to_vec())
        .map_err(|_| AuthError::MalformedToken("JWE payload is not UTF-8".to_string()))
}

fn decode_segment(segment: &str, name: &str) -> Result<Vec<u8>, AuthError> {
    Base64UrlUnpadded::decode_vec(segment)
        .map_err(|_| AuthError::MalformedToken(format!("JWE {name} is not base64url")))
}
