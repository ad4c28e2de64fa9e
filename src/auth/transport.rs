// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Outbound HTTP used by the remote validation clients.
//!
//! The validators only see the [`HttpTransport`] trait, so they can be
//! driven by a scripted transport in tests and by reqwest in production.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::{header::CONTENT_TYPE, HeaderMap, Method, StatusCode};
use url::Url;

use super::AuthError;

/// Default timeout for calls to the OpenID provider.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport-level failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("invalid endpoint URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("HTTPS is required but endpoint {0} does not use https")]
    InsecureEndpoint(String),
    #[error("request to {0} timed out")]
    Timeout(String),
    #[error("request failed: {0}")]
    Request(String),
}

impl From<TransportError> for AuthError {
    fn from(e: TransportError) -> Self {
        AuthError::ValidationEndpointError(e.to_string())
    }
}

/// A request to the OpenID provider.
#[derive(Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
    pub basic_auth: Option<(String, String)>,
    pub bearer: Option<String>,
    pub verify_host_name: bool,
}

// Tokens and client secrets stay out of logs.
impl std::fmt::Debug for OutboundRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let form: Vec<&str> = self.form.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("OutboundRequest")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("form_fields", &form)
            .field("basic_auth", &self.basic_auth.as_ref().map(|(user, _)| user))
            .field("bearer", &self.bearer.as_ref().map(|_| "[REDACTED]"))
            .field("verify_host_name", &self.verify_host_name)
            .finish()
    }
}

impl OutboundRequest {
    /// Build a request for `endpoint`.
    ///
    /// Fails before anything is sent if the URL does not parse, or if
    /// `https_required` is set and the scheme is not `https`.
    pub fn new(method: Method, endpoint: &str, https_required: bool) -> Result<Self, TransportError> {
        let url = Url::parse(endpoint).map_err(|e| TransportError::InvalidUrl {
            url: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        if https_required && url.scheme() != "https" {
            return Err(TransportError::InsecureEndpoint(endpoint.to_string()));
        }
        Ok(Self {
            method,
            url,
            headers: Vec::new(),
            form: Vec::new(),
            basic_auth: None,
            bearer: None,
            verify_host_name: true,
        })
    }

    pub fn get(endpoint: &str, https_required: bool) -> Result<Self, TransportError> {
        Self::new(Method::GET, endpoint, https_required)
    }

    pub fn post(endpoint: &str, https_required: bool) -> Result<Self, TransportError> {
        Self::new(Method::POST, endpoint, https_required)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_form_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((name.into(), value.into()));
        self
    }

    pub fn with_basic_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth = Some((user.into(), password.into()));
        self
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    pub fn with_host_name_verification(mut self, enabled: bool) -> Self {
        self.verify_host_name = enabled;
        self
    }

    /// Value of a form field, if present.
    pub fn form_field(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A response from the OpenID provider.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TransportResponse {
    /// Lower-cased media type without parameters.
    pub fn content_type(&self) -> Option<String> {
        let value = self.headers.get(CONTENT_TYPE)?.to_str().ok()?;
        let media_type = value.split(';').next().unwrap_or_default().trim();
        Some(media_type.to_ascii_lowercase())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// HTTP client capability.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError>;
}

/// reqwest-backed transport.
///
/// Holds one client that verifies host names and one that does not, so the
/// per-client `hostNameVerificationEnabled` flag can be honoured per request.
#[derive(Clone)]
pub struct ReqwestTransport {
    strict: reqwest::Client,
    lenient: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let build = |verify: bool| {
            reqwest::Client::builder()
                .timeout(timeout)
                .danger_accept_invalid_hostnames(!verify)
                .build()
                .map_err(|e| TransportError::Request(format!("failed to create HTTP client: {e}")))
        };
        Ok(Self {
            strict: build(true)?,
            lenient: build(false)?,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError> {
        let client = if request.verify_host_name {
            &self.strict
        } else {
            &self.lenient
        };

        let url = request.url.to_string();
        let mut builder = client.request(request.method, request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some((user, password)) = &request.basic_auth {
            builder = builder.basic_auth(user, Some(password));
        }
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if !request.form.is_empty() {
            builder = builder.form(&request.form);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(url.clone())
            } else {
                TransportError::Request(e.to_string())
            }
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}
