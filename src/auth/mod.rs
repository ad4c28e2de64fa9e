// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Access Token Authentication
//!
//! OpenID Connect relying-party authentication of bearer access tokens.
//!
//! ## Auth Flow
//!
//! 1. A request arrives with `Authorization: Bearer <token>` (or a custom
//!    header, segmented headers, or an `access_token` form field)
//! 2. The selector picks the configured OIDC client for the request:
//!    - explicit hint (`X-OIDC-Client`, `oidc_client`)
//!    - auth filters
//!    - token issuer
//!    - the only configured client
//! 3. The token is validated with the client's method:
//!    - `userinfo`: GET the userinfo endpoint
//!    - `introspect`: POST to the introspection endpoint
//!    - `local-jwt`: verify the JWS (or decrypt the JWE) locally
//! 4. Claims are checked (`active`, `exp`, `iat`, `iss`, `nbf`)
//! 5. The result is cached per `(token, client)` until the token expires
//!
//! ## Security
//!
//! - Tokens are never logged; logs carry a short SHA-256 fingerprint
//! - Endpoint URLs must be `https` unless `httpsRequired` is off
//! - Clock skew tolerance defaults to 300 seconds

pub mod authenticator;
pub mod cache;
pub mod claims;
pub mod config;
pub mod error;
pub mod filter;
pub mod introspection;
pub mod jwe;
pub mod jwks;
pub mod jwt;
pub mod middleware;
pub mod registry;
pub mod request;
pub mod result;
pub mod selector;
pub mod subject;
pub mod token;
pub mod transport;
pub mod userinfo;
pub mod validation;

pub use authenticator::AccessTokenAuthenticator;
pub use cache::ResultCache;
pub use claims::Claims;
pub use config::{ClientAuthMethod, ClientConfig, InboundPropagation, ValidationMethod};
pub use error::{AuthError, ClaimViolation};
pub use filter::{AuthFilter, ConditionFilter};
pub use middleware::{access_token_middleware, Authenticated, AuthenticatedPrincipal};
pub use registry::ClientRegistry;
pub use request::InboundRequest;
pub use result::{AuthStatus, AuthenticationResult};
pub use selector::{ProviderSelector, Selection, SelectionWarning};
pub use subject::{Credential, Subject, SubjectBuilder};
pub use token::extract_access_token;
pub use transport::{HttpTransport, ReqwestTransport};
pub use validation::TokenValidator;
