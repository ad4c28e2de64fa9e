// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authenticated subjects.
//!
//! A cached [`AuthenticationResult`](super::AuthenticationResult) is shared
//! between requests, so every caller gets its own subject rebuilt from the
//! cached one. Principals are never copied; they are re-established by the
//! caller after a successful authentication.

use serde_json::{Map, Value};
use uuid::Uuid;

use super::Claims;

/// A credential attached to a subject.
#[derive(Debug, Clone, PartialEq)]
pub enum Credential {
    /// A validated access token with its claims
    OidcToken {
        credential_id: Uuid,
        access_token: String,
        claims: Option<Claims>,
    },
    /// Arbitrary properties, typically the result's custom properties
    CustomProperties(Map<String, Value>),
}

impl Credential {
    /// Token credential with a fresh credential ID.
    pub fn oidc_token(access_token: impl Into<String>, claims: Option<Claims>) -> Self {
        Credential::OidcToken {
            credential_id: Uuid::new_v4(),
            access_token: access_token.into(),
            claims,
        }
    }
}

/// Principals and credentials of an authenticated caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Subject {
    pub principals: Vec<String>,
    pub credentials: Vec<Credential>,
}

impl Subject {
    /// The first access token credential, if any.
    pub fn access_token(&self) -> Option<&str> {
        self.credentials.iter().find_map(|c| match c {
            Credential::OidcToken { access_token, .. } => Some(access_token.as_str()),
            _ => None,
        })
    }
}

/// Rebuilds per-request subjects from cached ones.
pub struct SubjectBuilder;

impl SubjectBuilder {
    /// Copy the credentials of `subject` into a new one.
    ///
    /// Token credentials without claims are dropped and every copied token
    /// gets a new credential ID.
    pub fn rebuild(subject: &Subject) -> Subject {
        let credentials = subject
            .credentials
            .iter()
            .filter_map(|credential| match credential {
                Credential::OidcToken {
                    access_token,
                    claims: Some(claims),
                    ..
                } => Some(Credential::oidc_token(access_token.clone(), Some(claims.clone()))),
                Credential::OidcToken { claims: None, .. } => None,
                Credential::CustomProperties(map) => Some(Credential::CustomProperties(map.clone())),
            })
            .collect();

        Subject {
            principals: Vec::new(),
            credentials,
        }
    }
}
