// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication filters.
//!
//! A client that references a filter (`authFilterRef`) only handles requests
//! the filter accepts. Filters are loaded from the clients file:
//!
//! ```json
//! {
//!   "id": "mobileApi",
//!   "conditions": [
//!     { "type": "request-url", "match": "contains", "value": "/api/mobile" },
//!     { "type": "header", "name": "X-Channel", "match": "equals", "value": "mobile" }
//!   ]
//! }
//! ```
//!
//! Every condition has to hold for the filter to accept a request.

use serde::Deserialize;

use super::InboundRequest;

/// Decides whether a request belongs to the clients that reference it.
pub trait AuthFilter: Send + Sync {
    fn id(&self) -> &str;

    fn is_accepted(&self, request: &InboundRequest) -> bool;
}

/// What part of the request a condition looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConditionKind {
    /// Request URI (path and query, or absolute form)
    RequestUrl,
    Host,
    /// A named request header
    Header,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchType {
    Contains,
    Equals,
    NotContain,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub kind: ConditionKind,
    /// Header name for `header` conditions
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "match")]
    pub match_type: MatchType,
    pub value: String,
}

impl Condition {
    fn holds(&self, request: &InboundRequest) -> bool {
        let actual = match self.kind {
            ConditionKind::RequestUrl => Some(request.uri().to_string()),
            ConditionKind::Host => request.host().map(str::to_string),
            ConditionKind::Header => self
                .name
                .as_deref()
                .and_then(|name| request.header(name))
                .map(str::to_string),
        };

        match (self.match_type, actual) {
            (MatchType::Contains, Some(actual)) => actual.contains(&self.value),
            (MatchType::Equals, Some(actual)) => actual == self.value,
            (MatchType::NotContain, Some(actual)) => !actual.contains(&self.value),
            (MatchType::NotContain, None) => true,
            (_, None) => false,
        }
    }
}

/// Filter built from declarative conditions.
#[derive(Debug, Clone, Deserialize)]
pub struct ConditionFilter {
    pub id: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl AuthFilter for ConditionFilter {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_accepted(&self, request: &InboundRequest) -> bool {
        self.conditions.iter().all(|c| c.holds(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn request(uri: &str, headers: &[(&str, &str)]) -> InboundRequest {
        let mut builder = Request::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (parts, _) = builder.body(()).unwrap().into_parts();
        InboundRequest::from_parts(&parts)
    }

    fn filter(json: &str) -> ConditionFilter {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn request_url_contains() {
        let f = filter(r#"{"id":"f","conditions":[{"type":"request-url","match":"contains","value":"/api/mobile"}]}"#);
        assert!(f.is_accepted(&request("/api/mobile/items?x=1", &[])));
        assert!(!f.is_accepted(&request("/api/web/items", &[])));
    }

    #[test]
    fn all_conditions_must_hold() {
        let f = filter(
            r#"{"id":"f","conditions":[
                {"type":"host","match":"equals","value":"api.example.com"},
                {"type":"header","name":"X-Channel","match":"equals","value":"mobile"}
            ]}"#,
        );
        assert!(f.is_accepted(&request("/", &[("Host", "api.example.com"), ("X-Channel", "mobile")])));
        assert!(!f.is_accepted(&request("/", &[("Host", "api.example.com")])));
    }

    #[test]
    fn not_contain_accepts_missing_header() {
        let f = filter(r#"{"id":"f","conditions":[{"type":"header","name":"X-Debug","match":"not-contain","value":"on"}]}"#);
        assert!(f.is_accepted(&request("/", &[])));
        assert!(!f.is_accepted(&request("/", &[("X-Debug", "on")])));
    }

    #[test]
    fn no_conditions_accepts_everything() {
        assert!(filter(r#"{"id":"f"}"#).is_accepted(&request("/", &[])));
    }
}
