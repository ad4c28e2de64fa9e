// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Read-only view of an inbound HTTP request.

use axum::http::{header::CONTENT_TYPE, request::Parts, HeaderMap, Method, Uri};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// The parts of an inbound request the authenticator looks at.
///
/// Form parameters are only present when the HTTP layer has already
/// buffered a form-encoded body.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    form: Vec<(String, String)>,
}

impl InboundRequest {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        Self {
            method,
            uri,
            headers,
            form: Vec::new(),
        }
    }

    /// Build from axum request parts.
    pub fn from_parts(parts: &Parts) -> Self {
        Self::new(parts.method.clone(), parts.uri.clone(), parts.headers.clone())
    }

    /// Attach a form-encoded body.
    pub fn with_form_body(mut self, body: &[u8]) -> Self {
        self.form = url::form_urlencoded::parse(body).into_owned().collect();
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header, if it is valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// All UTF-8 values of a header.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    /// All values of a query string parameter.
    pub fn query_params(&self, name: &str) -> Vec<String> {
        self.uri
            .query()
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .filter(|(k, _)| k == name)
                    .map(|(_, v)| v.into_owned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All values of a form body parameter.
    pub fn form_params(&self, name: &str) -> Vec<&str> {
        self.form
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// POST with an `application/x-www-form-urlencoded` body.
    pub fn is_form_post(&self) -> bool {
        self.method == Method::POST
            && self
                .header(CONTENT_TYPE.as_str())
                .map(|ct| ct.to_ascii_lowercase().starts_with(FORM_CONTENT_TYPE))
                .unwrap_or(false)
    }

    /// Host the request was addressed to.
    pub fn host(&self) -> Option<&str> {
        self.uri.host().or_else(|| self.header("host"))
    }
}
