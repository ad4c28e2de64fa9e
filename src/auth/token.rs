// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Locating the access token in an inbound request.
//!
//! Lookup order:
//!
//! 1. The configured custom header, read verbatim
//! 2. `Authorization: Bearer <token>`
//! 3. Segmented headers (`<name>-segments` + `<name>-1 .. <name>-N`) for
//!    tokens too long for a single header
//! 4. The `access_token` form parameter of a form-encoded POST

use axum::http::header::AUTHORIZATION;
use sha2::{Digest, Sha256};

use super::{AuthError, ClientConfig, InboundRequest};

/// Suffix of the header carrying the number of token segments.
pub const SEGMENTS_SUFFIX: &str = "-segments";

/// Form parameter carrying the token in a POST body.
pub const ACCESS_TOKEN_PARAM: &str = "access_token";

const BEARER_PREFIX: &str = "bearer ";

/// Extract the raw access token for `config` from the request.
pub fn extract_access_token(
    request: &InboundRequest,
    config: &ClientConfig,
) -> Result<String, AuthError> {
    if let Some(header_name) = config.header_name.as_deref().filter(|h| !h.is_empty()) {
        let token = request
            .header(header_name)
            .map(str::to_string)
            .or_else(|| combine_segments(request, header_name));
        return non_empty(token);
    }

    if let Some(value) = request.header(AUTHORIZATION.as_str()) {
        return non_empty(strip_bearer(value).map(str::to_string));
    }

    if let Some(combined) = combine_segments(request, "Authorization") {
        return non_empty(strip_bearer(&combined).map(str::to_string));
    }

    if request.is_form_post() {
        let token = request
            .form_params(ACCESS_TOKEN_PARAM)
            .first()
            .map(|t| t.to_string());
        return non_empty(token);
    }

    Err(AuthError::NoToken)
}

/// Strip a case-insensitive `Bearer ` prefix.
///
/// Returns `None` for any other authorization scheme.
fn strip_bearer(value: &str) -> Option<&str> {
    let value = value.trim_start();
    if value.len() >= BEARER_PREFIX.len()
        && value.is_char_boundary(BEARER_PREFIX.len())
        && value[..BEARER_PREFIX.len()].eq_ignore_ascii_case(BEARER_PREFIX)
    {
        Some(&value[BEARER_PREFIX.len()..])
    } else {
        None
    }
}

/// Concatenate `<base>-1 .. <base>-N` where N comes from `<base>-segments`.
fn combine_segments(request: &InboundRequest, base: &str) -> Option<String> {
    let count: usize = request
        .header(&format!("{base}{SEGMENTS_SUFFIX}"))?
        .trim()
        .parse()
        .ok()?;
    if count == 0 {
        return None;
    }

    let mut combined = String::new();
    for i in 1..=count {
        combined.push_str(request.header(&format!("{base}-{i}"))?);
    }
    Some(combined)
}

fn non_empty(token: Option<String>) -> Result<String, AuthError> {
    match token.map(|t| t.trim().to_string()) {
        Some(t) if !t.is_empty() => Ok(t),
        _ => Err(AuthError::NoToken),
    }
}

/// Short SHA-256 fingerprint of a token, safe to log.
pub fn token_fingerprint(token: &str) -> String {
    Sha256::digest(token.as_bytes())
        .iter()
        .take(6)
        .map(|b| format!("{b:02x}"))
        .collect()
}
