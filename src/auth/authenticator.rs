// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access token authentication entry point.
//!
//! Flow for one request:
//!
//! 1. Select the client ([`ProviderSelector`])
//! 2. Extract the token ([`extract_access_token`])
//! 3. Serve a still-valid cached result if there is one
//! 4. Otherwise validate with the client's method and cache the result
//! 5. Return a result with a freshly built subject
//!
//! `authenticate` always returns a result; failures are carried in its
//! status and error.

use std::sync::Arc;

use serde_json::Value;

use super::cache::ResultCache;
use super::registry::ClientRegistry;
use super::selector::ProviderSelector;
use super::subject::{Credential, Subject, SubjectBuilder};
use super::token::{extract_access_token, token_fingerprint};
use super::validation::TokenValidator;
use super::{AuthError, AuthenticationResult, ClaimViolation, Claims, ClientConfig, InboundRequest};

/// Claims tried, in order, when no user identifier claim is configured.
const DEFAULT_USER_CLAIMS: [&str; 2] = ["sub", "username"];

/// Authenticates requests carrying OIDC access tokens.
#[derive(Clone)]
pub struct AccessTokenAuthenticator {
    registry: Arc<ClientRegistry>,
    cache: Arc<ResultCache>,
    validator: TokenValidator,
}

impl AccessTokenAuthenticator {
    pub fn new(registry: Arc<ClientRegistry>, cache: Arc<ResultCache>, validator: TokenValidator) -> Self {
        Self {
            registry,
            cache,
            validator,
        }
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    /// Authenticate a request, selecting the client from the request.
    pub async fn authenticate(&self, request: &InboundRequest) -> AuthenticationResult {
        self.authenticate_as(request, None).await
    }

    /// Authenticate a request for a client the caller already resolved.
    ///
    /// The ID is treated as the strongest selection hint.
    pub async fn authenticate_as(&self, request: &InboundRequest, client_id: Option<&str>) -> AuthenticationResult {
        let snapshot = self.registry.snapshot();
        let selection = match ProviderSelector::new(&snapshot).select(request, client_id) {
            Ok(selection) => selection,
            Err(e) => return failed(e, None),
        };
        let Some(client) = selection.client else {
            return failed(AuthError::NoClientResolved, None);
        };

        self.authenticate_with_client(request, &client).await
    }

    /// Authenticate a request against a specific client.
    pub async fn authenticate_with_client(&self, request: &InboundRequest, config: &ClientConfig) -> AuthenticationResult {
        let token = match extract_access_token(request, config) {
            Ok(token) => token,
            Err(e) => return failed(e, Some(config)),
        };

        if let Some(cached) = self.get_cached_token_authentication_result(&token, config) {
            tracing::debug!(
                client_id = %config.id,
                token = %token_fingerprint(&token),
                correlation_id = cached.correlation_id.as_deref().unwrap_or_default(),
                "Serving cached token validation result"
            );
            return cached;
        }

        let claims = match self.validator.validate(&token, config).await {
            Ok(claims) => claims,
            Err(e) => return failed(e, Some(config)),
        };
        let user_name = match user_name(&claims, config) {
            Ok(user_name) => user_name,
            Err(e) => return failed(e, Some(config)),
        };

        let mut result = AuthenticationResult::success(user_name.clone(), claims.clone(), &config.id);
        result.subject = Subject {
            principals: vec![user_name.clone()],
            credentials: vec![
                Credential::oidc_token(token.clone(), Some(claims)),
                Credential::CustomProperties(result.custom_properties.clone()),
            ],
        };
        result.correlation_id = self.cache.put(&token, config, &result);

        tracing::info!(
            client_id = %config.id,
            user = %user_name,
            token = %token_fingerprint(&token),
            correlation_id = result.correlation_id.as_deref().unwrap_or_default(),
            "Access token validated"
        );
        result
    }

    /// Whether a client can be resolved without evaluating auth filters.
    pub fn can_resolve_without_auth_filter(&self, request: &InboundRequest) -> bool {
        let snapshot = self.registry.snapshot();
        ProviderSelector::new(&snapshot)
            .select_without_auth_filter(request, None)
            .map(|selection| selection.client.is_some())
            .unwrap_or(false)
    }

    /// Cache an already computed result, keeping any prior correlation ID.
    pub fn cache_token_authentication_result(
        &self,
        token: &str,
        config: &ClientConfig,
        result: &AuthenticationResult,
    ) -> Option<String> {
        self.cache.recache(token, config, result)
    }

    /// Still-valid cached result with a freshly built subject.
    pub fn get_cached_token_authentication_result(
        &self,
        token: &str,
        config: &ClientConfig,
    ) -> Option<AuthenticationResult> {
        let cached = self.cache.get(token, config)?;
        let mut subject = SubjectBuilder::rebuild(&cached.subject);
        subject.principals.extend(cached.user_name.clone());
        Some(cached.with_subject(subject))
    }
}

fn failed(error: AuthError, config: Option<&ClientConfig>) -> AuthenticationResult {
    let client_id = config.map(|c| c.id.as_str()).unwrap_or_default();
    match &error {
        AuthError::NoToken => tracing::debug!(client_id, "No access token in request"),
        AuthError::Configuration(_) | AuthError::UnsupportedValidationMethod(_) => {
            tracing::error!(client_id, error = %error, error_code = error.error_code(), "Access token authentication misconfigured")
        }
        _ => tracing::warn!(client_id, error = %error, error_code = error.error_code(), "Access token rejected"),
    }
    AuthenticationResult::failure(error)
}

/// User name from the configured identifier claim, or `sub` then `username`.
fn user_name(claims: &Claims, config: &ClientConfig) -> Result<String, AuthError> {
    let configured = config.user_identifier.as_deref().filter(|c| !c.is_empty());
    let candidates: Vec<&str> = match configured {
        Some(claim) => vec![claim],
        None => DEFAULT_USER_CLAIMS.to_vec(),
    };

    candidates
        .into_iter()
        .find_map(|claim| match claims.get(claim) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
        .ok_or(AuthError::ClaimsInvalid(ClaimViolation::MissingUserIdentifier))
}
