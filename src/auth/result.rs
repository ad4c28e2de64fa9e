// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Outcome of an authentication attempt.

use axum::http::StatusCode;
use serde_json::{Map, Value};

use super::{claims::normalize_epoch, AuthError, Claims, Subject};

/// Custom property holding the validated claim set.
pub const TOKEN_INFO_PROPERTY: &str = "tokenInfo";
/// Custom property holding the token issuer.
pub const ISSUER_PROPERTY: &str = "iss";
/// Custom property holding the ID of the client that validated the token.
pub const CLIENT_CONFIG_ID_PROPERTY: &str = "clientConfigId";

/// Authentication status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    Success,
    Failure,
    /// Token was present but rejected
    SendUnauthenticated,
    /// No token; the caller should challenge for one
    Challenge,
}

/// Result of authenticating one request.
#[derive(Debug, Clone)]
pub struct AuthenticationResult {
    pub status: AuthStatus,
    pub http_status: StatusCode,
    pub user_name: Option<String>,
    pub custom_properties: Map<String, Value>,
    pub redirect_url: Option<String>,
    pub subject: Subject,
    /// Stable across cache hits for the same token
    pub correlation_id: Option<String>,
    pub error: Option<AuthError>,
}

impl AuthenticationResult {
    /// A successful result carrying the validated claims.
    pub fn success(user_name: impl Into<String>, claims: Claims, client_id: &str) -> Self {
        let mut custom_properties = Map::new();
        if let Some(iss) = claims.get("iss").cloned() {
            custom_properties.insert(ISSUER_PROPERTY.to_string(), iss);
        }
        custom_properties.insert(
            CLIENT_CONFIG_ID_PROPERTY.to_string(),
            Value::String(client_id.to_string()),
        );
        custom_properties.insert(TOKEN_INFO_PROPERTY.to_string(), Value::Object(claims));

        Self {
            status: AuthStatus::Success,
            http_status: StatusCode::OK,
            user_name: Some(user_name.into()),
            custom_properties,
            redirect_url: None,
            subject: Subject::default(),
            correlation_id: None,
            error: None,
        }
    }

    /// A failed result for the given error.
    pub fn failure(error: AuthError) -> Self {
        let (status, http_status) = error.outcome();
        Self {
            status,
            http_status,
            user_name: None,
            custom_properties: Map::new(),
            redirect_url: None,
            subject: Subject::default(),
            correlation_id: None,
            error: Some(error),
        }
    }

    /// Attach the subject built for this result.
    pub fn with_subject(mut self, subject: Subject) -> Self {
        self.subject = subject;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == AuthStatus::Success
    }

    /// Validated claims, if any.
    pub fn token_info(&self) -> Option<&Claims> {
        self.custom_properties
            .get(TOKEN_INFO_PROPERTY)
            .and_then(Value::as_object)
    }

    /// The `exp` claim of the validated token.
    pub fn token_exp(&self) -> Option<i64> {
        self.token_info()?.get("exp").and_then(normalize_epoch)
    }
}
