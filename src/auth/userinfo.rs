// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! OpenID Connect userinfo requests.

use axum::http::{header::WWW_AUTHENTICATE, StatusCode};

use super::introspection::extract_error_description;
use super::token::token_fingerprint;
use super::transport::{HttpTransport, OutboundRequest, TransportResponse};
use super::{AuthError, ClientConfig};

/// GET the userinfo endpoint with the access token as bearer credential.
pub async fn fetch_userinfo(
    transport: &dyn HttpTransport,
    token: &str,
    config: &ClientConfig,
) -> Result<TransportResponse, AuthError> {
    let endpoint = config
        .userinfo_endpoint_url
        .as_deref()
        .ok_or_else(|| AuthError::Configuration("userInfoEndpointUrl is not configured".to_string()))?;

    let request = OutboundRequest::get(endpoint, config.https_required)?
        .with_header("Accept", "application/json")
        .with_host_name_verification(config.host_name_verification_enabled)
        .with_bearer(token);

    tracing::debug!(
        client_id = %config.id,
        token = %token_fingerprint(token),
        endpoint,
        "Requesting userinfo"
    );

    let response = transport.execute(request).await?;
    if response.status == StatusCode::OK {
        return Ok(response);
    }

    let detail = extract_error_description(response.header(WWW_AUTHENTICATE.as_str()))
        .map(|d| format!(": {d}"))
        .unwrap_or_default();
    Err(AuthError::ValidationEndpointError(format!(
        "userinfo endpoint returned {}{detail}",
        response.status
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::transport::testing::ScriptedTransport;

    const ENDPOINT: &str = "https://op.example.com/userinfo";

    fn config() -> ClientConfig {
        ClientConfig {
            userinfo_endpoint_url: Some(ENDPOINT.into()),
            ..ClientConfig::new("rp")
        }
    }

    #[tokio::test]
    async fn sends_token_as_bearer() {
        let transport = ScriptedTransport::new().respond(ENDPOINT, 200, Some("application/json"), r#"{"sub":"alice"}"#);
        let response = fetch_userinfo(&transport, "tok", &config()).await.unwrap();

        assert_eq!(response.body, r#"{"sub":"alice"}"#);
        assert_eq!(transport.requests()[0].bearer.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn non_200_is_endpoint_error() {
        let transport = ScriptedTransport::new().respond(ENDPOINT, 401, None, "");
        let err = fetch_userinfo(&transport, "tok", &config()).await.unwrap_err();
        assert!(matches!(err, AuthError::ValidationEndpointError(_)));
    }

    #[tokio::test]
    async fn plain_http_is_refused_before_sending() {
        let transport = ScriptedTransport::new();
        let config = ClientConfig {
            userinfo_endpoint_url: Some("http://op.example.com/userinfo".into()),
            ..config()
        };
        let err = fetch_userinfo(&transport, "tok", &config).await.unwrap_err();
        assert!(matches!(err, AuthError::ValidationEndpointError(_)));
        assert!(transport.requests().is_empty());
    }
}
