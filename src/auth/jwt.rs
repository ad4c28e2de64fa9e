// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWS verification for `local-jwt` validation and `application/jwt`
//! endpoint responses.
//!
//! Only the signature is checked here. Time and issuer claims are left to
//! the claims validator so every validation method applies the same policy.

use std::str::FromStr;

use jsonwebtoken::{dangerous::insecure_decode, decode, decode_header, errors::ErrorKind, Algorithm, DecodingKey, Validation};

use super::jwks::JwksManager;
use super::{AuthError, Claims, ClientConfig};

/// Number of dot-separated segments in a compact JWS.
pub const JWS_SEGMENTS: usize = 3;

pub fn segment_count(token: &str) -> usize {
    token.split('.').count()
}

/// Issuer of a structurally valid JWS, without verifying it.
///
/// Used only to pick a client. Opaque tokens, JWE and tokens without a
/// non-empty string `iss` give `None`.
pub fn peek_issuer(token: &str) -> Option<String> {
    if segment_count(token) != JWS_SEGMENTS {
        return None;
    }
    let data = insecure_decode::<Claims>(token).ok()?;
    data.claims
        .get("iss")
        .and_then(|v| v.as_str())
        .filter(|iss| !iss.is_empty())
        .map(str::to_string)
}

/// Verify the signature of a compact JWS and return its claims.
pub async fn verify(token: &str, config: &ClientConfig, jwks: &JwksManager) -> Result<Claims, AuthError> {
    if segment_count(token) != JWS_SEGMENTS {
        return Err(AuthError::MalformedToken(format!(
            "expected {JWS_SEGMENTS} JWS segments, found {}",
            segment_count(token)
        )));
    }

    let expected = Algorithm::from_str(&config.signature_algorithm).map_err(|_| {
        AuthError::Configuration(format!(
            "unsupported signature algorithm {}",
            config.signature_algorithm
        ))
    })?;
    let header = decode_header(token).map_err(map_jwt_error)?;
    if header.alg != expected {
        tracing::debug!(
            client_id = %config.id,
            expected = ?expected,
            actual = ?header.alg,
            "JWS algorithm not accepted"
        );
        return Err(AuthError::InvalidSignature);
    }

    let key = decoding_key(expected, header.kid.as_deref(), config, jwks).await?;

    let mut validation = Validation::new(expected);
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;

    decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(map_jwt_error)
}

async fn decoding_key(
    algorithm: Algorithm,
    kid: Option<&str>,
    config: &ClientConfig,
    jwks: &JwksManager,
) -> Result<DecodingKey, AuthError> {
    if matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
        let secret = config
            .shared_key
            .as_deref()
            .or(config.client_secret.as_deref())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthError::Configuration("no shared key for HMAC signed tokens".to_string()))?;
        return Ok(DecodingKey::from_secret(secret.as_bytes()));
    }

    let url = config
        .jwk_endpoint_url
        .as_deref()
        .ok_or_else(|| AuthError::Configuration("jwkEndpointUrl is not configured".to_string()))?;
    jwks.get_decoding_key(url, kid, config).await
}

fn map_jwt_error(e: jsonwebtoken::errors::Error) -> AuthError {
    match e.kind() {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => AuthError::InvalidSignature,
        _ => AuthError::MalformedToken(e.to_string()),
    }
}
