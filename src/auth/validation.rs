// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access token validation strategies.
//!
//! | Method | Source of claims |
//! |--------|------------------|
//! | `userinfo` | userinfo endpoint response |
//! | `introspect` | introspection endpoint response |
//! | `local-jwt` | the token itself (JWS, or JWE wrapping a JWS) |
//!
//! Endpoint responses may be `application/json` or `application/jwt`. A
//! response without a content type is read as JSON. Anything else fails.

use std::sync::Arc;

use serde_json::Value;

use super::claims::{now_epoch_secs, validate_claims};
use super::introspection::{introspect, require_active_flag};
use super::jwks::JwksManager;
use super::transport::{HttpTransport, TransportResponse};
use super::userinfo::fetch_userinfo;
use super::{jwe, jwt, AuthError, Claims, ClientConfig, ValidationMethod};

const JSON_CONTENT_TYPE: &str = "application/json";
const JWT_CONTENT_TYPE: &str = "application/jwt";

/// Validates access tokens with the method configured per client.
#[derive(Clone)]
pub struct TokenValidator {
    transport: Arc<dyn HttpTransport>,
    jwks: JwksManager,
}

impl TokenValidator {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            jwks: JwksManager::new(transport.clone()),
            transport,
        }
    }

    /// Replace the JWKS manager (custom cache TTL).
    pub fn with_jwks(mut self, jwks: JwksManager) -> Self {
        self.jwks = jwks;
        self
    }

    /// Validate `token` and return its checked claims.
    pub async fn validate(&self, token: &str, config: &ClientConfig) -> Result<Claims, AuthError> {
        let claims = match config.validation_method {
            ValidationMethod::Userinfo => {
                let response = fetch_userinfo(self.transport.as_ref(), token, config).await?;
                let claims = self.claims_from_response(response, config).await?;
                // Userinfo documents carry no token lifetime.
                let relaxed = ClientConfig {
                    require_exp_claim: false,
                    require_iat_claim: false,
                    ..config.clone()
                };
                validate_claims(&claims, &relaxed, now_epoch_secs()).map_err(AuthError::ClaimsInvalid)?;
                return Ok(claims);
            }
            ValidationMethod::Introspect => {
                let response = introspect(self.transport.as_ref(), token, config).await?;
                let claims = self.claims_from_response(response, config).await?;
                require_active_flag(&claims)?;
                claims
            }
            ValidationMethod::LocalJwt => self.decode_local(token, config).await?,
        };

        validate_claims(&claims, config, now_epoch_secs()).map_err(AuthError::ClaimsInvalid)?;
        Ok(claims)
    }

    /// Decrypt (JWE) and verify (JWS) a compact token.
    pub async fn decode_local(&self, token: &str, config: &ClientConfig) -> Result<Claims, AuthError> {
        if jwt::segment_count(token) == jwe::JWE_SEGMENTS {
            let key = config
                .jwe_decryption_key
                .as_deref()
                .ok_or_else(|| AuthError::Configuration("jweDecryptionKey is not configured".to_string()))?;
            let inner = jwe::decrypt(token, key)?;
            return jwt::verify(inner.trim(), config, &self.jwks).await;
        }
        jwt::verify(token, config, &self.jwks).await
    }

    async fn claims_from_response(
        &self,
        response: TransportResponse,
        config: &ClientConfig,
    ) -> Result<Claims, AuthError> {
        match response.content_type().as_deref() {
            Some(JSON_CONTENT_TYPE) | None => parse_json_object(&response.body),
            Some(JWT_CONTENT_TYPE) => self.decode_local(response.body.trim(), config).await,
            Some(other) => Err(AuthError::ValidationEndpointError(format!(
                "unexpected response content type {other}"
            ))),
        }
    }
}

fn parse_json_object(body: &str) -> Result<Claims, AuthError> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(claims)) => Ok(claims),
        Ok(_) => Err(AuthError::ValidationEndpointError(
            "response body is not a JSON object".to_string(),
        )),
        Err(e) => Err(AuthError::ValidationEndpointError(format!("invalid JSON response: {e}"))),
    }
}
