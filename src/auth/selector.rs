// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Picks the OIDC client that handles a request.
//!
//! Steps, first decisive one wins:
//!
//! 1. Explicit hint: a caller-resolved ID, the `X-OIDC-Client` header or the
//!    `oidc_client` query/form parameter
//! 2. Auth filters referenced by clients
//! 3. Issuer of the bearer token, for clients with inbound propagation and
//!    issuer checking enabled
//! 4. The only configured client
//!
//! Ambiguity never picks arbitrarily except between auth filters, where
//! configured order decides and a warning is recorded.

use std::collections::HashMap;
use std::sync::Arc;

use super::jwt::peek_issuer;
use super::registry::RegistrySnapshot;
use super::token::extract_access_token;
use super::{AuthError, ClientConfig, InboundRequest};

/// Header naming the client to use.
pub const CLIENT_HINT_HEADER: &str = "X-OIDC-Client";

/// Query or form parameter naming the client to use.
pub const CLIENT_HINT_PARAM: &str = "oidc_client";

/// Which step selected the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionSource {
    Hint,
    AuthFilter,
    Issuer,
    SingleClient,
}

/// Non-fatal findings while selecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionWarning {
    /// Several auth filters accepted the request; the first was used
    AmbiguousAuthFilter { matched: Vec<String> },
    /// Several clients share the token's issuer; none was used
    AmbiguousIssuer { issuer: String, matched: Vec<String> },
    /// A hint named a client that is not configured
    UnknownClientHint(String),
}

/// Outcome of client selection.
#[derive(Debug, Default)]
pub struct Selection {
    pub client: Option<Arc<ClientConfig>>,
    pub source: Option<SelectionSource>,
    pub warnings: Vec<SelectionWarning>,
}

impl Selection {
    fn found(mut self, client: Arc<ClientConfig>, source: SelectionSource) -> Self {
        self.client = Some(client);
        self.source = Some(source);
        self
    }

    fn warn(&mut self, warning: SelectionWarning) {
        tracing::warn!(?warning, "OIDC client selection");
        self.warnings.push(warning);
    }
}

/// Client selection over one registry snapshot.
pub struct ProviderSelector<'a> {
    snapshot: &'a RegistrySnapshot,
}

impl<'a> ProviderSelector<'a> {
    pub fn new(snapshot: &'a RegistrySnapshot) -> Self {
        Self { snapshot }
    }

    /// Run all selection steps.
    pub fn select(&self, request: &InboundRequest, preselected: Option<&str>) -> Result<Selection, AuthError> {
        self.run(request, preselected, true)
    }

    /// Run every step except auth filter evaluation.
    pub fn select_without_auth_filter(
        &self,
        request: &InboundRequest,
        preselected: Option<&str>,
    ) -> Result<Selection, AuthError> {
        self.run(request, preselected, false)
    }

    fn run(
        &self,
        request: &InboundRequest,
        preselected: Option<&str>,
        use_filters: bool,
    ) -> Result<Selection, AuthError> {
        let mut selection = Selection::default();

        if let Some(client) = self.from_hints(request, preselected, &mut selection)? {
            return Ok(selection.found(client, SelectionSource::Hint));
        }

        if use_filters {
            if let Some(client) = self.from_auth_filters(request, &mut selection) {
                return Ok(selection.found(client, SelectionSource::AuthFilter));
            }
        }

        if let Some(client) = self.from_issuer(request, &mut selection) {
            return Ok(selection.found(client, SelectionSource::Issuer));
        }

        if let [only] = self.snapshot.clients() {
            if !use_filters || self.filter_allows(only, request) {
                return Ok(selection.found(only.clone(), SelectionSource::SingleClient));
            }
        }

        Ok(selection)
    }

    fn from_hints(
        &self,
        request: &InboundRequest,
        preselected: Option<&str>,
        selection: &mut Selection,
    ) -> Result<Option<Arc<ClientConfig>>, AuthError> {
        let mut hints: Vec<String> = preselected.map(str::to_string).into_iter().collect();
        hints.extend(request.header_values(CLIENT_HINT_HEADER).into_iter().map(str::to_string));
        hints.extend(request.query_params(CLIENT_HINT_PARAM));
        hints.extend(request.form_params(CLIENT_HINT_PARAM).into_iter().map(str::to_string));

        let mut chosen: Vec<&Arc<ClientConfig>> = Vec::new();
        for hint in hints.iter().map(|h| h.trim()).filter(|h| !h.is_empty()) {
            match self.snapshot.client(hint) {
                Some(client) if !chosen.iter().any(|c| c.id == client.id) => chosen.push(client),
                Some(_) => {}
                None => selection.warn(SelectionWarning::UnknownClientHint(hint.to_string())),
            }
        }

        match chosen.as_slice() {
            [] => Ok(None),
            [client] => Ok(Some((*client).clone())),
            many => Err(AuthError::AmbiguousProvider(format!(
                "conflicting client hints: {}",
                many.iter().map(|c| c.id.as_str()).collect::<Vec<_>>().join(", ")
            ))),
        }
    }

    fn from_auth_filters(&self, request: &InboundRequest, selection: &mut Selection) -> Option<Arc<ClientConfig>> {
        let matched: Vec<&Arc<ClientConfig>> = self
            .snapshot
            .clients()
            .iter()
            .filter(|c| c.auth_filter_ref.is_some() && self.filter_allows(c, request))
            .collect();

        let first = (*matched.first()?).clone();
        if matched.len() > 1 {
            selection.warn(SelectionWarning::AmbiguousAuthFilter {
                matched: matched.iter().map(|c| c.id.clone()).collect(),
            });
        }
        Some(first)
    }

    /// A client without a filter reference allows everything; a reference
    /// to an unknown filter allows nothing.
    fn filter_allows(&self, client: &ClientConfig, request: &InboundRequest) -> bool {
        let Some(filter_id) = client.auth_filter_ref.as_deref() else {
            return true;
        };
        match self.snapshot.filter(filter_id) {
            Some(filter) => filter.is_accepted(request),
            None => {
                tracing::warn!(client_id = %client.id, filter_id, "Auth filter is not configured");
                false
            }
        }
    }

    fn from_issuer(&self, request: &InboundRequest, selection: &mut Selection) -> Option<Arc<ClientConfig>> {
        let mut issuers: HashMap<String, Option<String>> = HashMap::new();
        let mut matched: Vec<&Arc<ClientConfig>> = Vec::new();
        let mut token_issuer = None;

        for client in self.snapshot.clients() {
            if !client.inbound_propagation.is_enabled() || !client.issuer_checking_enabled() {
                continue;
            }
            let Ok(token) = extract_access_token(request, client) else {
                continue;
            };
            let issuer = issuers
                .entry(token.clone())
                .or_insert_with(|| peek_issuer(&token))
                .clone();
            let Some(issuer) = issuer else {
                continue;
            };
            if client.effective_issuer().as_deref() == Some(issuer.as_str()) {
                matched.push(client);
                token_issuer = Some(issuer);
            }
        }

        match matched.as_slice() {
            [client] => Some((*client).clone()),
            [] => None,
            many => {
                selection.warn(SelectionWarning::AmbiguousIssuer {
                    issuer: token_issuer.unwrap_or_default(),
                    matched: many.iter().map(|c| c.id.clone()).collect(),
                });
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::config::InboundPropagation;
    use crate::auth::filter::{AuthFilter, ConditionFilter};
    use crate::auth::jwt::testing::unverified;
    use crate::auth::registry::ClientRegistry;
    use axum::http::Request;
    use serde_json::json;

    fn request(uri: &str, headers: &[(&str, &str)]) -> InboundRequest {
        let mut builder = Request::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (parts, _) = builder.body(()).unwrap().into_parts();
        InboundRequest::from_parts(&parts)
    }

    fn bearer_request(token: &str) -> InboundRequest {
        let value = format!("Bearer {token}");
        request("/", &[("Authorization", value.as_str())])
    }

    fn propagating(id: &str, issuer: &str) -> ClientConfig {
        ClientConfig {
            inbound_propagation: InboundPropagation::Supported,
            issuer_identifier: Some(issuer.into()),
            ..ClientConfig::new(id)
        }
    }

    fn filtered(id: &str, filter: &str) -> ClientConfig {
        ClientConfig {
            auth_filter_ref: Some(filter.into()),
            ..ClientConfig::new(id)
        }
    }

    fn url_filter(id: &str, fragment: &str) -> Arc<dyn AuthFilter> {
        Arc::new(
            serde_json::from_value::<ConditionFilter>(json!({
                "id": id,
                "conditions": [{"type": "request-url", "match": "contains", "value": fragment}]
            }))
            .unwrap(),
        )
    }

    fn selected(selection: &Selection) -> Option<&str> {
        selection.client.as_ref().map(|c| c.id.as_str())
    }

    #[test]
    fn hint_header_selects_client() {
        let registry = ClientRegistry::new(vec![ClientConfig::new("a"), ClientConfig::new("b")], Vec::new());
        let snapshot = registry.snapshot();
        let selection = ProviderSelector::new(&snapshot)
            .select(&request("/", &[(CLIENT_HINT_HEADER, "b")]), None)
            .unwrap();
        assert_eq!(selected(&selection), Some("b"));
        assert_eq!(selection.source, Some(SelectionSource::Hint));
    }

    #[test]
    fn conflicting_hints_are_ambiguous() {
        let registry = ClientRegistry::new(vec![ClientConfig::new("a"), ClientConfig::new("b")], Vec::new());
        let snapshot = registry.snapshot();
        let result = ProviderSelector::new(&snapshot).select(&request("/?oidc_client=a", &[(CLIENT_HINT_HEADER, "b")]), None);
        assert!(matches!(result, Err(AuthError::AmbiguousProvider(_))));
    }

    #[test]
    fn unknown_hint_falls_through_with_warning() {
        let registry = ClientRegistry::new(vec![ClientConfig::new("a")], Vec::new());
        let snapshot = registry.snapshot();
        let selection = ProviderSelector::new(&snapshot)
            .select(&request("/?oidc_client=zzz", &[]), None)
            .unwrap();
        assert_eq!(selected(&selection), Some("a"));
        assert_eq!(selection.source, Some(SelectionSource::SingleClient));
        assert_eq!(selection.warnings, vec![SelectionWarning::UnknownClientHint("zzz".into())]);
    }

    #[test]
    fn single_auth_filter_match_selects() {
        let registry = ClientRegistry::new(
            vec![filtered("mobile", "f-mobile"), filtered("web", "f-web")],
            vec![url_filter("f-mobile", "/mobile"), url_filter("f-web", "/web")],
        );
        let snapshot = registry.snapshot();
        let selection = ProviderSelector::new(&snapshot).select(&request("/web/x", &[]), None).unwrap();
        assert_eq!(selected(&selection), Some("web"));
        assert!(selection.warnings.is_empty());
    }

    #[test]
    fn ambiguous_auth_filters_pick_first_and_warn() {
        let registry = ClientRegistry::new(
            vec![filtered("first", "f1"), filtered("second", "f2")],
            vec![url_filter("f1", "/api"), url_filter("f2", "/api")],
        );
        let snapshot = registry.snapshot();
        let selection = ProviderSelector::new(&snapshot).select(&request("/api/x", &[]), None).unwrap();
        assert_eq!(selected(&selection), Some("first"));
        assert_eq!(
            selection.warnings,
            vec![SelectionWarning::AmbiguousAuthFilter {
                matched: vec!["first".into(), "second".into()]
            }]
        );
    }

    #[test]
    fn single_client_is_not_used_when_its_filter_rejects() {
        let registry = ClientRegistry::new(vec![filtered("only", "f")], vec![url_filter("f", "/api")]);
        let snapshot = registry.snapshot();
        let selector = ProviderSelector::new(&snapshot);

        assert!(selector.select(&request("/other", &[]), None).unwrap().client.is_none());
        let relaxed = selector.select_without_auth_filter(&request("/other", &[]), None).unwrap();
        assert_eq!(selected(&relaxed), Some("only"));
    }

    #[test]
    fn issuer_selects_among_distinct_issuers() {
        let registry = ClientRegistry::new(
            vec![propagating("a", "https://op-a"), propagating("b", "https://op-b")],
            Vec::new(),
        );
        let snapshot = registry.snapshot();
        let token = unverified(&json!({"iss": "https://op-b", "sub": "x"}));
        let selection = ProviderSelector::new(&snapshot)
            .select(&bearer_request(&token), None)
            .unwrap();
        assert_eq!(selected(&selection), Some("b"));
        assert_eq!(selection.source, Some(SelectionSource::Issuer));
    }

    #[test]
    fn opaque_token_selects_nothing_by_issuer() {
        let registry = ClientRegistry::new(
            vec![propagating("a", "https://op-a"), propagating("b", "https://op-b")],
            Vec::new(),
        );
        let snapshot = registry.snapshot();
        let selection = ProviderSelector::new(&snapshot)
            .select(&request("/", &[("Authorization", "Bearer opaque-value")]), None)
            .unwrap();
        assert!(selection.client.is_none());
    }

    #[test]
    fn shared_issuer_selects_nothing() {
        let registry = ClientRegistry::new(
            vec![propagating("a", "https://op"), propagating("b", "https://op")],
            Vec::new(),
        );
        let snapshot = registry.snapshot();
        let token = unverified(&json!({"iss": "https://op"}));
        let selection = ProviderSelector::new(&snapshot)
            .select(&bearer_request(&token), None)
            .unwrap();
        assert!(selection.client.is_none());
        assert!(matches!(selection.warnings[0], SelectionWarning::AmbiguousIssuer { .. }));
    }

    #[test]
    fn issuer_selection_skips_non_propagating_clients() {
        let registry = ClientRegistry::new(
            vec![
                ClientConfig {
                    issuer_identifier: Some("https://op-a".into()),
                    ..ClientConfig::new("a")
                },
                propagating("b", "https://op-b"),
            ],
            Vec::new(),
        );
        let snapshot = registry.snapshot();
        let token = unverified(&json!({"iss": "https://op-a"}));
        let selection = ProviderSelector::new(&snapshot)
            .select(&bearer_request(&token), None)
            .unwrap();
        assert!(selection.client.is_none());
    }

    #[test]
    fn derived_issuer_is_used_for_selection() {
        let derived = ClientConfig {
            inbound_propagation: InboundPropagation::Required,
            token_endpoint_url: Some("https://op-c/oidc/token".into()),
            ..ClientConfig::new("c")
        };
        let registry = ClientRegistry::new(vec![derived, propagating("a", "https://op-a")], Vec::new());
        let snapshot = registry.snapshot();
        let token = unverified(&json!({"iss": "https://op-c/oidc"}));
        let selection = ProviderSelector::new(&snapshot)
            .select(&bearer_request(&token), None)
            .unwrap();
        assert_eq!(selected(&selection), Some("c"));
    }
}
