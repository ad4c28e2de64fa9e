// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWKS (JSON Web Key Set) fetching and caching.
//!
//! ## Security
//!
//! - Fetches honour the client's `httpsRequired` and host-name verification
//!   settings
//! - Key sets are cached per endpoint URL with a configurable TTL
//! - A stale key set is used when a refresh fails
//! - Keys marked `"use": "enc"` are never used for signature verification

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet, PublicKeyUse};
use jsonwebtoken::DecodingKey;
use tokio::sync::RwLock;

use super::transport::{HttpTransport, OutboundRequest};
use super::{AuthError, ClientConfig};

/// Default JWKS cache TTL (5 minutes).
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// JWKS cache entry.
struct CacheEntry {
    jwks: JwkSet,
    fetched_at: Instant,
}

/// JWKS manager with caching.
#[derive(Clone)]
pub struct JwksManager {
    transport: Arc<dyn HttpTransport>,
    /// Cache TTL
    cache_ttl: Duration,
    /// Cached key sets by endpoint URL
    cache: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl JwksManager {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            cache_ttl: DEFAULT_CACHE_TTL,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create with custom cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Fetch JWKS (with caching).
    async fn get_jwks(&self, url: &str, config: &ClientConfig) -> Result<JwkSet, AuthError> {
        let stale = {
            let cache = self.cache.read().await;
            match cache.get(url) {
                Some(entry) if entry.fetched_at.elapsed() < self.cache_ttl => {
                    return Ok(entry.jwks.clone());
                }
                Some(entry) => Some(entry.jwks.clone()),
                None => None,
            }
        };

        match self.refresh(url, config).await {
            Ok(jwks) => Ok(jwks),
            Err(e) => match stale {
                Some(jwks) => {
                    tracing::warn!(jwks_url = %url, error = %e, "JWKS refresh failed, using stale keys");
                    Ok(jwks)
                }
                None => Err(e),
            },
        }
    }

    /// Fetch JWKS from the endpoint.
    async fn fetch_jwks(&self, url: &str, config: &ClientConfig) -> Result<JwkSet, AuthError> {
        let request = OutboundRequest::get(url, config.https_required)?
            .with_header("Accept", "application/json")
            .with_host_name_verification(config.host_name_verification_enabled);
        let response = self.transport.execute(request).await?;

        if !response.status.is_success() {
            return Err(AuthError::ValidationEndpointError(format!(
                "HTTP {} from JWKS endpoint",
                response.status
            )));
        }

        serde_json::from_str(&response.body)
            .map_err(|e| AuthError::ValidationEndpointError(format!("invalid JWKS document: {e}")))
    }

    /// Get a decoding key for the given key ID, or any usable key without one.
    ///
    /// An unknown `kid` triggers one refresh in case the provider rotated
    /// its keys since the set was cached.
    pub async fn get_decoding_key(
        &self,
        url: &str,
        kid: Option<&str>,
        config: &ClientConfig,
    ) -> Result<DecodingKey, AuthError> {
        let jwks = self.get_jwks(url, config).await?;

        let Some(kid) = kid else {
            return signing_keys(&jwks)
                .find_map(|jwk| jwk_to_decoding_key(jwk).ok())
                .ok_or(AuthError::InvalidSignature);
        };

        if let Some(jwk) = find_key(&jwks, kid) {
            return jwk_to_decoding_key(jwk);
        }

        tracing::debug!(jwks_url = %url, kid, "Key ID not in cached JWKS, refreshing");
        let jwks = self.refresh(url, config).await?;
        find_key(&jwks, kid)
            .ok_or(AuthError::InvalidSignature)
            .and_then(jwk_to_decoding_key)
    }

    /// Force refresh the JWKS cache for `url`.
    pub async fn refresh(&self, url: &str, config: &ClientConfig) -> Result<JwkSet, AuthError> {
        let jwks = self.fetch_jwks(url, config).await?;
        let mut cache = self.cache.write().await;
        cache.insert(
            url.to_string(),
            CacheEntry {
                jwks: jwks.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(jwks)
    }

    /// Check if JWKS for `url` is currently cached and valid.
    pub async fn is_cached(&self, url: &str) -> bool {
        let cache = self.cache.read().await;
        cache
            .get(url)
            .map(|entry| entry.fetched_at.elapsed() < self.cache_ttl)
            .unwrap_or(false)
    }
}

fn signing_keys(jwks: &JwkSet) -> impl Iterator<Item = &Jwk> {
    jwks.keys
        .iter()
        .filter(|k| !matches!(k.common.public_key_use, Some(PublicKeyUse::Encryption)))
}

fn find_key<'a>(jwks: &'a JwkSet, kid: &str) -> Option<&'a Jwk> {
    signing_keys(jwks).find(|k| k.common.key_id.as_deref() == Some(kid))
}

/// Convert a JWK to a DecodingKey.
fn jwk_to_decoding_key(jwk: &Jwk) -> Result<DecodingKey, AuthError> {
    let key = match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => DecodingKey::from_rsa_components(&rsa.n, &rsa.e),
        AlgorithmParameters::EllipticCurve(ec) => DecodingKey::from_ec_components(&ec.x, &ec.y),
        _ => DecodingKey::from_jwk(jwk),
    };
    key.map_err(|e| AuthError::ValidationEndpointError(format!("unusable key in JWKS: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::transport::testing::ScriptedTransport;

    const JWKS_URL: &str = "https://op.example.com/jwks";

    // RFC 7517 appendix A.1 RSA public key.
    const JWKS: &str = r#"{"keys":[
        {"kty":"RSA","kid":"enc-key","use":"enc",
         "n":"0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw",
         "e":"AQAB"},
        {"kty":"RSA","kid":"sig-key","use":"sig",
         "n":"0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw",
         "e":"AQAB"}
    ]}"#;

    fn manager(transport: ScriptedTransport) -> (JwksManager, Arc<ScriptedTransport>) {
        let transport = Arc::new(transport);
        (JwksManager::new(transport.clone()), transport)
    }

    #[tokio::test]
    async fn caches_key_sets_per_url() {
        let (jwks, transport) =
            manager(ScriptedTransport::new().respond(JWKS_URL, 200, Some("application/json"), JWKS));
        let config = ClientConfig::new("rp");

        assert!(!jwks.is_cached(JWKS_URL).await);
        assert!(jwks.get_decoding_key(JWKS_URL, Some("sig-key"), &config).await.is_ok());
        assert!(jwks.get_decoding_key(JWKS_URL, None, &config).await.is_ok());
        assert!(jwks.is_cached(JWKS_URL).await);
        assert_eq!(transport.calls(JWKS_URL), 1);
    }

    #[tokio::test]
    async fn encryption_keys_are_not_used_for_signatures() {
        let (jwks, _) =
            manager(ScriptedTransport::new().respond(JWKS_URL, 200, Some("application/json"), JWKS));
        let result = jwks
            .get_decoding_key(JWKS_URL, Some("enc-key"), &ClientConfig::new("rp"))
            .await;
        assert!(matches!(result, Err(AuthError::InvalidSignature)));
    }

    #[tokio::test]
    async fn unknown_kid_refreshes_once() {
        let (jwks, transport) =
            manager(ScriptedTransport::new().respond(JWKS_URL, 200, Some("application/json"), JWKS));
        let result = jwks
            .get_decoding_key(JWKS_URL, Some("rotated"), &ClientConfig::new("rp"))
            .await;
        assert!(matches!(result, Err(AuthError::InvalidSignature)));
        assert_eq!(transport.calls(JWKS_URL), 2);
    }

    #[tokio::test]
    async fn fetch_failure_is_an_endpoint_error() {
        let (jwks, _) = manager(ScriptedTransport::new().respond(JWKS_URL, 500, None, ""));
        let result = jwks.get_decoding_key(JWKS_URL, None, &ClientConfig::new("rp")).await;
        assert!(matches!(result, Err(AuthError::ValidationEndpointError(_))));
    }

    #[tokio::test]
    async fn stale_keys_survive_a_failed_refresh() {
        let transport = Arc::new(ScriptedTransport::new().respond(JWKS_URL, 200, Some("application/json"), JWKS));
        let jwks = JwksManager::new(transport.clone()).with_cache_ttl(Duration::ZERO);
        let config = ClientConfig::new("rp");
        assert!(jwks.get_decoding_key(JWKS_URL, Some("sig-key"), &config).await.is_ok());

        let failing = JwksManager {
            transport: Arc::new(ScriptedTransport::new().respond(JWKS_URL, 503, None, "")),
            ..jwks.clone()
        };
        assert!(failing.get_decoding_key(JWKS_URL, Some("sig-key"), &config).await.is_ok());
    }

    #[tokio::test]
    async fn plain_http_endpoint_is_refused_when_https_required() {
        let (jwks, transport) = manager(ScriptedTransport::new());
        let result = jwks
            .get_decoding_key("http://op.example.com/jwks", None, &ClientConfig::new("rp"))
            .await;
        assert!(matches!(result, Err(AuthError::ValidationEndpointError(_))));
        assert!(transport.requests().is_empty());
    }
}
