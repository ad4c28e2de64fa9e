// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! OAuth 2.0 token introspection (RFC 7662).

use axum::http::{header::WWW_AUTHENTICATE, StatusCode};
use serde_json::Value;

use super::token::token_fingerprint;
use super::transport::{HttpTransport, OutboundRequest, TransportResponse};
use super::{AuthError, Claims, ClientAuthMethod, ClientConfig};

const ERROR_DESCRIPTION: &str = "error_description=";

/// POST the token to the client's validation endpoint.
///
/// Returns the raw 200 response; decoding the body is left to the caller
/// since providers may answer with JSON or a signed JWT.
pub async fn introspect(
    transport: &dyn HttpTransport,
    token: &str,
    config: &ClientConfig,
) -> Result<TransportResponse, AuthError> {
    let endpoint = config
        .validation_endpoint_url
        .as_deref()
        .ok_or_else(|| AuthError::Configuration("validationEndpointUrl is not configured".to_string()))?;

    let mut request = OutboundRequest::post(endpoint, config.https_required)?
        .with_header("Accept", "application/json")
        .with_host_name_verification(config.host_name_verification_enabled)
        .with_form_field("token", token);
    if let Some(hint) = config.introspection_token_type_hint.as_deref().filter(|h| !h.is_empty()) {
        request = request.with_form_field("token_type_hint", hint);
    }
    if let Some(client_id) = config.client_id.as_deref() {
        let secret = config.client_secret.as_deref().unwrap_or_default();
        request = match config.token_endpoint_auth_method {
            ClientAuthMethod::ClientSecretBasic => request.with_basic_auth(client_id, secret),
            ClientAuthMethod::ClientSecretPost => request
                .with_form_field("client_id", client_id)
                .with_form_field("client_secret", secret),
        };
    }

    tracing::debug!(
        client_id = %config.id,
        token = %token_fingerprint(token),
        endpoint,
        "Introspecting access token"
    );

    let response = transport.execute(request).await?;
    match response.status {
        StatusCode::OK => Ok(response),
        status @ (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
            let description = extract_error_description(response.header(WWW_AUTHENTICATE.as_str()));
            Err(AuthError::ValidationEndpointError(format!(
                "introspection endpoint returned {status}: {}",
                description.unwrap_or_default()
            )))
        }
        status => Err(AuthError::ValidationEndpointError(format!(
            "introspection endpoint returned {status}"
        ))),
    }
}

/// An introspection response must say whether the token is active.
pub fn require_active_flag(claims: &Claims) -> Result<(), AuthError> {
    match claims.get("active") {
        Some(Value::Bool(_)) => Ok(()),
        _ => Err(AuthError::ValidationEndpointError(
            "introspection response has no boolean active member".to_string(),
        )),
    }
}

/// Pull the `error_description` value out of a `WWW-Authenticate` header.
///
/// This is a loose scan rather than an RFC 7235 parser. The key must be at
/// the start of the value or follow a non-alphanumeric character, and the
/// value runs to the end of the header. One pair of enclosing double quotes
/// is removed. Without a match the header is returned as is.
pub fn extract_error_description(header: Option<&str>) -> Option<String> {
    let header = header?;

    let mut from = 0;
    while let Some(offset) = header[from..].find(ERROR_DESCRIPTION) {
        let start = from + offset;
        let preceded_ok = header[..start]
            .chars()
            .next_back()
            .map(|c| !c.is_ascii_alphanumeric())
            .unwrap_or(true);
        if preceded_ok {
            let value = &header[start + ERROR_DESCRIPTION.len()..];
            let unquoted = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            return Some(unquoted.to_string());
        }
        from = start + ERROR_DESCRIPTION.len();
    }

    Some(header.to_string())
}
