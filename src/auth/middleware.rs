// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication middleware for Axum.
//!
//! ```rust,ignore
//! let app = Router::new()
//!     .route("/whoami", get(whoami))
//!     .layer(axum::middleware::from_fn_with_state(
//!         authenticator.clone(),
//!         access_token_middleware,
//!     ));
//!
//! async fn whoami(Authenticated(principal): Authenticated) -> String {
//!     principal.user_name
//! }
//! ```
//!
//! Form-encoded POST bodies are buffered (up to [`MAX_FORM_BODY_BYTES`]) so
//! the `access_token` form parameter can be read, then handed on unchanged.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use super::authenticator::AccessTokenAuthenticator;
use super::{AuthError, AuthenticationResult, Claims, InboundRequest};

/// Largest form body buffered for token lookup.
pub const MAX_FORM_BODY_BYTES: usize = 64 * 1024;

/// The authenticated caller, stored in request extensions.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedPrincipal {
    pub user_name: String,
    pub client_config_id: Option<String>,
    pub correlation_id: Option<String>,
    pub claims: Claims,
}

impl AuthenticatedPrincipal {
    fn from_result(result: &AuthenticationResult) -> Option<Self> {
        Some(Self {
            user_name: result.user_name.clone()?,
            client_config_id: result
                .custom_properties
                .get(super::result::CLIENT_CONFIG_ID_PROPERTY)
                .and_then(|v| v.as_str())
                .map(str::to_string),
            correlation_id: result.correlation_id.clone(),
            claims: result.token_info().cloned().unwrap_or_default(),
        })
    }
}

/// Authenticate every request with an OIDC access token.
pub async fn access_token_middleware(
    State(authenticator): State<Arc<AccessTokenAuthenticator>>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    let mut inbound = InboundRequest::from_parts(&parts);

    let body = if inbound.is_form_post() {
        match to_bytes(body, MAX_FORM_BODY_BYTES).await {
            Ok(bytes) => {
                inbound = inbound.with_form_body(&bytes);
                Body::from(bytes)
            }
            Err(_) => return StatusCode::PAYLOAD_TOO_LARGE.into_response(),
        }
    } else {
        body
    };

    let result = authenticator.authenticate(&inbound).await;
    let principal = match (result.is_success(), AuthenticatedPrincipal::from_result(&result)) {
        (true, Some(principal)) => principal,
        _ => {
            return result
                .error
                .unwrap_or(AuthError::NoClientResolved)
                .into_response()
        }
    };

    let mut request = Request::from_parts(parts, body);
    request.extensions_mut().insert(principal);
    next.run(request).await
}

/// Extractor for the principal set by [`access_token_middleware`].
pub struct Authenticated(pub AuthenticatedPrincipal);

impl<S: Send + Sync> FromRequestParts<S> for Authenticated {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedPrincipal>()
            .cloned()
            .map(Authenticated)
            .ok_or(AuthError::NoToken)
    }
}
