// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Claim set validation.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. `active` (introspection responses)
//! 2. `exp`
//! 3. `iat`
//! 4. `iss`
//! 5. `nbf`

use serde_json::{Map, Value};

use super::{error::ClaimViolation, ClientConfig};

/// A decoded claim set, as returned by any validation strategy.
pub type Claims = Map<String, Value>;

/// Validate a claim set against a client policy.
pub fn validate(claims: &Claims, config: &ClientConfig) -> bool {
    validate_claims(claims, config, now_epoch_secs()).is_ok()
}

/// Validate a claim set at the given time, reporting which check failed.
pub fn validate_claims(
    claims: &Claims,
    config: &ClientConfig,
    now: i64,
) -> Result<(), ClaimViolation> {
    if claims.get("active").and_then(Value::as_bool) == Some(false) {
        return Err(ClaimViolation::Inactive);
    }

    match numeric_claim(claims, "exp") {
        None if config.require_exp_claim => return Err(ClaimViolation::MissingExp),
        Some(exp) if now > exp => return Err(ClaimViolation::Expired),
        _ => {}
    }

    let skew = config.clock_skew();
    match numeric_claim(claims, "iat") {
        None if config.require_iat_claim => return Err(ClaimViolation::MissingIat),
        Some(iat) if iat > now.saturating_add(skew) => return Err(ClaimViolation::IssuedInFuture),
        _ => {}
    }

    if config.issuer_checking_enabled() {
        if let Some(expected) = config.issuer_identifier.as_deref().filter(|i| !i.is_empty()) {
            let actual = claims.get("iss").and_then(Value::as_str);
            if actual != Some(expected) {
                return Err(ClaimViolation::IssuerMismatch {
                    expected: expected.to_string(),
                    actual: actual.map(str::to_string),
                });
            }
        }
    }

    if let Some(nbf) = numeric_claim(claims, "nbf") {
        if now < nbf {
            return Err(ClaimViolation::NotYetValid);
        }
    }

    Ok(())
}

/// Read a time claim as epoch seconds.
///
/// Accepts integers, integral floats, numeric strings and single-element
/// arrays of any of those.
pub fn numeric_claim(claims: &Claims, name: &str) -> Option<i64> {
    claims.get(name).and_then(normalize_epoch)
}

pub(crate) fn normalize_epoch(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().and_then(|u| i64::try_from(u).ok()))
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Array(items) if items.len() == 1 => normalize_epoch(&items[0]),
        _ => None,
    }
}

/// Current time in epoch seconds.
pub fn now_epoch_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW: i64 = 1_700_000_000;

    fn claims(value: Value) -> Claims {
        value.as_object().cloned().unwrap()
    }

    fn config() -> ClientConfig {
        ClientConfig {
            issuer_identifier: Some("https://op.example.com".into()),
            clock_skew_secs: 60,
            ..ClientConfig::new("rp")
        }
    }

    fn valid() -> Claims {
        claims(json!({
            "active": true,
            "exp": NOW + 3600,
            "iat": NOW - 10,
            "iss": "https://op.example.com",
            "sub": "alice"
        }))
    }

    #[test]
    fn accepts_valid_claims() {
        assert_eq!(validate_claims(&valid(), &config(), NOW), Ok(()));
    }

    #[test]
    fn rejects_tokens_expired_by_one_second() {
        let mut c = valid();
        c.insert("exp".into(), json!(NOW - 1));
        assert_eq!(validate_claims(&c, &config(), NOW), Err(ClaimViolation::Expired));

        // Skew does not extend exp.
        let lenient = ClientConfig {
            clock_skew_secs: 3600,
            ..config()
        };
        assert_eq!(validate_claims(&c, &lenient, NOW), Err(ClaimViolation::Expired));
    }

    #[test]
    fn inactive_wins_over_everything_else() {
        let mut c = valid();
        c.insert("active".into(), json!(false));
        c.insert("exp".into(), json!(NOW - 100));
        assert_eq!(validate_claims(&c, &config(), NOW), Err(ClaimViolation::Inactive));
    }

    #[test]
    fn missing_exp_only_fails_when_required() {
        let mut c = valid();
        c.remove("exp");
        assert_eq!(validate_claims(&c, &config(), NOW), Err(ClaimViolation::MissingExp));

        let relaxed = ClientConfig {
            require_exp_claim: false,
            ..config()
        };
        assert_eq!(validate_claims(&c, &relaxed, NOW), Ok(()));
    }

    #[test]
    fn iat_in_future_beyond_skew_is_rejected() {
        let mut c = valid();
        c.insert("iat".into(), json!(NOW + 61));
        assert_eq!(
            validate_claims(&c, &config(), NOW),
            Err(ClaimViolation::IssuedInFuture)
        );

        c.insert("iat".into(), json!(NOW + 60));
        assert_eq!(validate_claims(&c, &config(), NOW), Ok(()));
    }

    #[test]
    fn huge_clock_skew_saturates() {
        let mut c = valid();
        c.insert("iat".into(), json!(NOW + 1_000_000));
        let lenient = ClientConfig {
            clock_skew_secs: u64::MAX,
            ..config()
        };
        assert_eq!(validate_claims(&c, &lenient, NOW), Ok(()));
    }

    #[test]
    fn missing_iat_only_fails_when_required() {
        let mut c = valid();
        c.remove("iat");
        assert_eq!(validate_claims(&c, &config(), NOW), Err(ClaimViolation::MissingIat));

        let relaxed = ClientConfig {
            require_iat_claim: false,
            ..config()
        };
        assert_eq!(validate_claims(&c, &relaxed, NOW), Ok(()));
    }

    #[test]
    fn issuer_must_match_exactly() {
        let mut c = valid();
        c.insert("iss".into(), json!("https://op.example.com/"));
        assert!(matches!(
            validate_claims(&c, &config(), NOW),
            Err(ClaimViolation::IssuerMismatch { .. })
        ));

        c.remove("iss");
        assert!(matches!(
            validate_claims(&c, &config(), NOW),
            Err(ClaimViolation::IssuerMismatch { actual: None, .. })
        ));
    }

    #[test]
    fn issuer_checking_can_be_disabled() {
        let mut c = valid();
        c.insert("iss".into(), json!("https://someone-else"));
        let config = ClientConfig {
            disable_iss_checking: true,
            ..config()
        };
        assert_eq!(validate_claims(&c, &config, NOW), Ok(()));
    }

    #[test]
    fn unconfigured_issuer_is_not_checked() {
        let mut c = valid();
        c.insert("iss".into(), json!("https://anyone"));
        let config = ClientConfig {
            issuer_identifier: None,
            ..config()
        };
        assert_eq!(validate_claims(&c, &config, NOW), Ok(()));
    }

    #[test]
    fn nbf_in_future_is_rejected() {
        let mut c = valid();
        c.insert("nbf".into(), json!(NOW + 5));
        assert_eq!(validate_claims(&c, &config(), NOW), Err(ClaimViolation::NotYetValid));
    }

    #[test]
    fn time_claims_are_normalized() {
        let c = claims(json!({
            "a": 12,
            "b": [34],
            "c": 56.0,
            "d": "78",
            "e": [1, 2],
            "f": 1.5,
            "g": true
        }));
        assert_eq!(numeric_claim(&c, "a"), Some(12));
        assert_eq!(numeric_claim(&c, "b"), Some(34));
        assert_eq!(numeric_claim(&c, "c"), Some(56));
        assert_eq!(numeric_claim(&c, "d"), Some(78));
        assert_eq!(numeric_claim(&c, "e"), None);
        assert_eq!(numeric_claim(&c, "f"), None);
        assert_eq!(numeric_claim(&c, "g"), None);
        assert_eq!(numeric_claim(&c, "missing"), None);
    }

    #[test]
    fn array_valued_exp_is_checked() {
        let mut c = valid();
        c.insert("exp".into(), json!([NOW - 1]));
        assert_eq!(validate_claims(&c, &config(), NOW), Err(ClaimViolation::Expired));
    }

    #[test]
    fn boolean_form_uses_wall_clock() {
        let now = now_epoch_secs();
        let c = claims(json!({
            "exp": now + 600,
            "iat": now,
            "iss": "https://op.example.com"
        }));
        assert!(validate(&c, &config()));
    }
}
