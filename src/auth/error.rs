// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.
//!
//! Every variant is recovered into an [`AuthenticationResult`] by the
//! authenticator; nothing here is meant to escape to the HTTP layer as an
//! unhandled failure.
//!
//! [`AuthenticationResult`]: super::result::AuthenticationResult

use axum::{
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::result::AuthStatus;

/// Which claims check rejected a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimViolation {
    /// Introspection reported `active: false`
    Inactive,
    /// `exp` is required but missing
    MissingExp,
    /// `exp` is in the past
    Expired,
    /// `iat` is required but missing
    MissingIat,
    /// `iat` is beyond the clock skew window
    IssuedInFuture,
    /// `iss` does not match the configured issuer
    IssuerMismatch {
        expected: String,
        actual: Option<String>,
    },
    /// `nbf` is in the future
    NotYetValid,
    /// No claim could be used as the user name
    MissingUserIdentifier,
}

impl std::fmt::Display for ClaimViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClaimViolation::Inactive => write!(f, "token is not active"),
            ClaimViolation::MissingExp => write!(f, "required exp claim is missing"),
            ClaimViolation::Expired => write!(f, "token has expired"),
            ClaimViolation::MissingIat => write!(f, "required iat claim is missing"),
            ClaimViolation::IssuedInFuture => write!(f, "token was issued in the future"),
            ClaimViolation::IssuerMismatch { expected, actual } => write!(
                f,
                "issuer {} does not match expected issuer {expected}",
                actual.as_deref().unwrap_or("<missing>")
            ),
            ClaimViolation::NotYetValid => write!(f, "token is not yet valid"),
            ClaimViolation::MissingUserIdentifier => {
                write!(f, "no user identifier claim found in token")
            }
        }
    }
}

/// Authentication error type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No bearer token in the request
    #[error("No access token found in request")]
    NoToken,
    /// Non-2xx response, connectivity or TLS failure
    #[error("Validation endpoint error: {0}")]
    ValidationEndpointError(String),
    /// JWT/JWE is structurally invalid
    #[error("Token is malformed: {0}")]
    MalformedToken(String),
    /// JWE key or content decryption failure
    #[error("Token decryption failed: {0}")]
    DecryptionFailed(String),
    /// JWS signature did not verify
    #[error("Token signature is invalid")]
    InvalidSignature,
    /// Claims rejected by the validator
    #[error("Token claims are invalid: {0}")]
    ClaimsInvalid(ClaimViolation),
    /// More than one client matched with no tiebreak
    #[error("Ambiguous OIDC client selection: {0}")]
    AmbiguousProvider(String),
    /// No configured client handles this request
    #[error("No OIDC client could be resolved for the request")]
    NoClientResolved,
    /// Validation method not usable with this configuration
    ///
    /// File-loaded configurations never reach this: serde rejects unknown
    /// `validationMethod` values when the clients file is parsed.
    #[error("Unsupported validation method: {0}")]
    UnsupportedValidationMethod(String),
    /// Client configuration is incomplete
    #[error("Invalid client configuration: {0}")]
    Configuration(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::NoToken => "no_token",
            AuthError::ValidationEndpointError(_) => "validation_endpoint_error",
            AuthError::MalformedToken(_) => "malformed_token",
            AuthError::DecryptionFailed(_) => "decryption_failed",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::ClaimsInvalid(violation) => match violation {
                ClaimViolation::Inactive => "token_inactive",
                ClaimViolation::MissingExp => "missing_exp",
                ClaimViolation::Expired => "token_expired",
                ClaimViolation::MissingIat => "missing_iat",
                ClaimViolation::IssuedInFuture => "iat_in_future",
                ClaimViolation::IssuerMismatch { .. } => "invalid_issuer",
                ClaimViolation::NotYetValid => "token_not_yet_valid",
                ClaimViolation::MissingUserIdentifier => "missing_user_identifier",
            },
            AuthError::AmbiguousProvider(_) => "ambiguous_provider",
            AuthError::NoClientResolved => "no_client_resolved",
            AuthError::UnsupportedValidationMethod(_) => "unsupported_validation_method",
            AuthError::Configuration(_) => "configuration_error",
        }
    }

    /// Authentication status and HTTP status code this error maps to.
    pub fn outcome(&self) -> (AuthStatus, StatusCode) {
        match self {
            AuthError::NoToken => (AuthStatus::Challenge, StatusCode::UNAUTHORIZED),
            AuthError::MalformedToken(_)
            | AuthError::DecryptionFailed(_)
            | AuthError::InvalidSignature
            | AuthError::ClaimsInvalid(_) => {
                (AuthStatus::SendUnauthenticated, StatusCode::UNAUTHORIZED)
            }
            AuthError::ValidationEndpointError(_)
            | AuthError::AmbiguousProvider(_)
            | AuthError::NoClientResolved => (AuthStatus::Failure, StatusCode::UNAUTHORIZED),
            AuthError::UnsupportedValidationMethod(_) | AuthError::Configuration(_) => {
                (AuthStatus::Failure, StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.outcome().1
    }

    /// `WWW-Authenticate` challenge for 401 responses (RFC 6750).
    fn challenge(&self) -> Option<String> {
        match self.outcome() {
            (_, status) if status != StatusCode::UNAUTHORIZED => None,
            (AuthStatus::Challenge, _) => Some("Bearer".to_string()),
            (AuthStatus::SendUnauthenticated, _) => Some(format!(
                "Bearer error=\"invalid_token\", error_description=\"{}\"",
                self.error_code()
            )),
            _ => Some("Bearer error=\"invalid_request\"".to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let challenge = self.challenge();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        let mut response = (status, body).into_response();
        if let Some(value) = challenge.and_then(|c| HeaderValue::from_str(&c).ok()) {
            response.headers_mut().insert(WWW_AUTHENTICATE, value);
        }
        response
    }
}
