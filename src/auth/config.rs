// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-client OIDC relying-party configuration.
//!
//! A `ClientConfig` is an immutable snapshot. The authenticator only ever
//! reads it; replacing a configuration means publishing a new snapshot in
//! the [`ClientRegistry`](super::registry::ClientRegistry).

use serde::Deserialize;

/// Default clock skew tolerance (5 minutes).
pub const DEFAULT_CLOCK_SKEW_SECS: u64 = 300;

/// Default lifetime of a cached validation result (5 minutes).
pub const DEFAULT_CACHE_TIMEOUT_SECS: u64 = 300;

/// How an access token is validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ValidationMethod {
    /// GET the userinfo endpoint with the token as bearer credential
    Userinfo,
    /// POST the token to the introspection (validation) endpoint
    #[default]
    Introspect,
    /// Decode and verify the token locally as JWS or JWE
    LocalJwt,
}

impl std::fmt::Display for ValidationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationMethod::Userinfo => write!(f, "userinfo"),
            ValidationMethod::Introspect => write!(f, "introspect"),
            ValidationMethod::LocalJwt => write!(f, "local-jwt"),
        }
    }
}

/// Inbound token propagation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InboundPropagation {
    #[default]
    None,
    Supported,
    Required,
}

impl InboundPropagation {
    /// Whether the client takes part in issuer-based selection.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, InboundPropagation::None)
    }
}

/// How client credentials are sent to the introspection endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
    /// HTTP Basic authentication header
    ClientSecretBasic,
    /// `client_id` / `client_secret` form fields
    #[default]
    ClientSecretPost,
}

/// Configuration for a single OIDC client.
///
/// Field names on the wire follow the established attribute names
/// (`validationMethod`, `issuerIdentifier`, `clockSkew`, ...).
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    /// Unique client configuration ID (part of the cache key)
    pub id: String,
    pub validation_method: ValidationMethod,
    pub issuer_identifier: Option<String>,
    /// Clock skew tolerance in seconds
    #[serde(rename = "clockSkew")]
    pub clock_skew_secs: u64,
    #[serde(rename = "requireExpClaimForIntrospection")]
    pub require_exp_claim: bool,
    #[serde(rename = "requireIatClaimForIntrospection")]
    pub require_iat_claim: bool,
    #[serde(rename = "accessTokenCacheEnabled")]
    pub cache_enabled: bool,
    /// Seconds a cached result may be served, regardless of `exp`
    #[serde(rename = "accessTokenCacheTimeout")]
    pub cache_timeout_secs: u64,
    /// Custom header carrying the raw token (no `Bearer ` prefix)
    pub header_name: Option<String>,
    pub https_required: bool,
    pub host_name_verification_enabled: bool,
    pub auth_filter_ref: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub token_endpoint_auth_method: ClientAuthMethod,
    pub token_endpoint_url: Option<String>,
    pub validation_endpoint_url: Option<String>,
    #[serde(rename = "userInfoEndpointUrl")]
    pub userinfo_endpoint_url: Option<String>,
    pub jwk_endpoint_url: Option<String>,
    /// HMAC secret for `HS*` signed tokens
    pub shared_key: Option<String>,
    /// Expected JWS algorithm (`RS256`, `HS256`, ...)
    pub signature_algorithm: String,
    /// Base64url-encoded content encryption key for `dir` JWE tokens
    pub jwe_decryption_key: Option<String>,
    pub inbound_propagation: InboundPropagation,
    pub disable_iss_checking: bool,
    pub introspection_token_type_hint: Option<String>,
    /// Claim used as the authenticated user name
    pub user_identifier: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            validation_method: ValidationMethod::default(),
            issuer_identifier: None,
            clock_skew_secs: DEFAULT_CLOCK_SKEW_SECS,
            require_exp_claim: true,
            require_iat_claim: true,
            cache_enabled: true,
            cache_timeout_secs: DEFAULT_CACHE_TIMEOUT_SECS,
            header_name: None,
            https_required: true,
            host_name_verification_enabled: false,
            auth_filter_ref: None,
            client_id: None,
            client_secret: None,
            token_endpoint_auth_method: ClientAuthMethod::default(),
            token_endpoint_url: None,
            validation_endpoint_url: None,
            userinfo_endpoint_url: None,
            jwk_endpoint_url: None,
            shared_key: None,
            signature_algorithm: "RS256".to_string(),
            jwe_decryption_key: None,
            inbound_propagation: InboundPropagation::default(),
            disable_iss_checking: false,
            introspection_token_type_hint: None,
            user_identifier: None,
        }
    }
}

// Secrets stay out of logs.
impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("id", &self.id)
            .field("validation_method", &self.validation_method)
            .field("issuer_identifier", &self.issuer_identifier)
            .field("clock_skew_secs", &self.clock_skew_secs)
            .field("cache_enabled", &self.cache_enabled)
            .field("header_name", &self.header_name)
            .field("auth_filter_ref", &self.auth_filter_ref)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("shared_key", &self.shared_key.as_ref().map(|_| "[REDACTED]"))
            .field(
                "jwe_decryption_key",
                &self.jwe_decryption_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("inbound_propagation", &self.inbound_propagation)
            .field("disable_iss_checking", &self.disable_iss_checking)
            .finish_non_exhaustive()
    }
}

impl ClientConfig {
    /// Create a configuration with defaults for the given ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Clock skew in seconds, clamped to the signed range used for epoch math.
    pub fn clock_skew(&self) -> i64 {
        i64::try_from(self.clock_skew_secs).unwrap_or(i64::MAX)
    }

    /// Whether the `iss` claim has to be checked for this client.
    pub fn issuer_checking_enabled(&self) -> bool {
        !self.disable_iss_checking
    }

    /// The configured issuer, or one derived from the token endpoint.
    ///
    /// The derived issuer is the token endpoint with its last path segment
    /// removed. A slash that belongs to `//` is never treated as a segment
    /// separator, so `http://localhost` stays as is.
    pub fn effective_issuer(&self) -> Option<String> {
        if let Some(issuer) = self.issuer_identifier.as_deref().filter(|i| !i.is_empty()) {
            return Some(issuer.to_string());
        }
        let endpoint = self.token_endpoint_url.as_deref()?;
        Some(derive_issuer_from_endpoint(endpoint))
    }
}

fn derive_issuer_from_endpoint(endpoint: &str) -> String {
    match endpoint.rfind('/') {
        Some(idx) if idx > 0 && endpoint.as_bytes()[idx - 1] == b'/' => endpoint.to_string(),
        Some(idx) => endpoint[..idx].to_string(),
        None => endpoint.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_token_endpoint(endpoint: Option<&str>) -> ClientConfig {
        ClientConfig {
            token_endpoint_url: endpoint.map(str::to_string),
            ..ClientConfig::new("rp")
        }
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = ClientConfig::new("rp");
        assert_eq!(config.clock_skew_secs, 300);
        assert!(config.require_exp_claim);
        assert!(config.require_iat_claim);
        assert!(config.cache_enabled);
        assert!(config.https_required);
        assert!(!config.host_name_verification_enabled);
        assert_eq!(config.inbound_propagation, InboundPropagation::None);
        assert_eq!(config.validation_method, ValidationMethod::Introspect);
    }

    #[test]
    fn deserializes_camel_case_attributes() {
        let json = r#"{
            "id": "rp1",
            "validationMethod": "local-jwt",
            "issuerIdentifier": "https://op.example.com",
            "clockSkew": 30,
            "requireIatClaimForIntrospection": false,
            "accessTokenCacheEnabled": false,
            "userInfoEndpointUrl": "https://op.example.com/userinfo",
            "inboundPropagation": "required",
            "tokenEndpointAuthMethod": "client_secret_basic",
            "disableIssChecking": true
        }"#;
        let config: ClientConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.id, "rp1");
        assert_eq!(config.validation_method, ValidationMethod::LocalJwt);
        assert_eq!(config.clock_skew_secs, 30);
        assert!(config.require_exp_claim);
        assert!(!config.require_iat_claim);
        assert!(!config.cache_enabled);
        assert_eq!(
            config.userinfo_endpoint_url.as_deref(),
            Some("https://op.example.com/userinfo")
        );
        assert_eq!(config.inbound_propagation, InboundPropagation::Required);
        assert_eq!(config.token_endpoint_auth_method, ClientAuthMethod::ClientSecretBasic);
        assert!(!config.issuer_checking_enabled());
    }

    #[test]
    fn unknown_validation_method_is_rejected() {
        let err = serde_json::from_str::<ClientConfig>(r#"{"id":"rp","validationMethod":"bogus"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = ClientConfig {
            client_secret: Some("hunter2".into()),
            shared_key: Some("also-secret".into()),
            ..ClientConfig::new("rp")
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("also-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn configured_issuer_wins() {
        let config = ClientConfig {
            issuer_identifier: Some("https://op.example.com/oidc".into()),
            ..with_token_endpoint(Some("https://other/oidc/token"))
        };
        assert_eq!(config.effective_issuer().as_deref(), Some("https://op.example.com/oidc"));
    }

    #[test]
    fn issuer_derivation_from_token_endpoint() {
        let cases = [
            (None, None),
            (Some(""), Some("")),
            (Some("some simple string"), Some("some simple string")),
            (Some("/"), Some("")),
            (Some("/after"), Some("")),
            (Some("before/middle/after"), Some("before/middle")),
            (Some("before/middle/after/"), Some("before/middle/after")),
            (Some("http://"), Some("http://")),
            (Some("http://localhost"), Some("http://localhost")),
            (
                Some("https://localhost:8011/oidc/endpoint/OP/token"),
                Some("https://localhost:8011/oidc/endpoint/OP"),
            ),
        ];
        for (endpoint, expected) in cases {
            assert_eq!(
                with_token_endpoint(endpoint).effective_issuer().as_deref(),
                expected,
                "endpoint {endpoint:?}"
            );
        }
    }
}
