//! Unverified access-token decoding.
//!
//! The signature is never checked here; the API verifies tokens on every
//! request. Claims read by this module only drive which view is shown.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::{Map, Value};

use crate::{error::DecodeError, session::is_absent};

/// Tokens longer than this are rejected before any decoding.
pub const MAX_TOKEN_BYTES: usize = 8192;

/// Locations a role claim has been issued under, tried in order.
const ROLE_CLAIM_PATHS: &[&[&str]] = &[&["role"], &["user_role"], &["profile", "role"]];

#[derive(Debug, Clone, PartialEq)]
pub struct Claims(Map<String, Value>);

impl Claims {
    pub fn lookup(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.0.get(*first)?, |value, key| value.get(*key))
    }

    /// Raw role claim, skipping empty and sentinel values.
    pub fn role_claim(&self) -> Option<&str> {
        ROLE_CLAIM_PATHS
            .iter()
            .filter_map(|path| self.lookup(path).and_then(Value::as_str))
            .find(|role| !is_absent(role))
    }

    /// `exp` in epoch seconds.
    pub fn exp(&self) -> Option<i64> {
        let exp = self.0.get("exp")?;
        exp.as_i64().or_else(|| exp.as_f64().map(|secs| secs as i64))
    }

    /// A token without `exp` never expires client-side.
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.exp().is_some_and(|exp| exp <= now)
    }
}

pub fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn decode(token: &str) -> Result<Claims, DecodeError> {
    if token.len() > MAX_TOKEN_BYTES {
        return Err(DecodeError::TooLarge(token.len()));
    }
    let segments: Vec<&str> = token.split('.').collect();
    let [_, payload, _] = segments.as_slice() else {
        return Err(DecodeError::SegmentCount(segments.len()));
    };

    // Accept the standard alphabet and padding too, not only base64url.
    let normalized: String = payload
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();

    let bytes = URL_SAFE_NO_PAD.decode(normalized)?;
    match serde_json::from_slice::<Value>(&bytes)? {
        Value::Object(map) => Ok(Claims(map)),
        _ => Err(DecodeError::NotAnObject),
    }
}

/// Undecodable tokens count as expired.
pub fn is_token_expired(token: &str) -> bool {
    match decode(token) {
        Ok(claims) => claims.is_expired_at(now_unix()),
        Err(err) => {
            tracing::debug!(error = %err, "treating undecodable token as expired");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use base64::{
        Engine,
        engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    };
    use serde_json::json;

    use super::{MAX_TOKEN_BYTES, decode, is_token_expired, now_unix};
    use crate::error::DecodeError;

    fn unsigned(payload: serde_json::Value) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(payload.to_string())
        )
    }

    #[test]
    fn rejects_wrong_segment_counts() {
        for token in ["", "abc", "a.b", "a.b.c.d", "...."] {
            assert!(matches!(decode(token), Err(DecodeError::SegmentCount(_))), "{token}");
        }
    }

    #[test]
    fn rejects_oversized_tokens() {
        let padding = "a".repeat(MAX_TOKEN_BYTES);
        let token = unsigned(json!({"role": "farmer", "padding": padding}));
        assert!(matches!(decode(&token), Err(DecodeError::TooLarge(len)) if len == token.len()));
        assert!(is_token_expired(&token));
    }

    #[test]
    fn rejects_bad_payloads() {
        assert!(matches!(decode("h.!!!.s"), Err(DecodeError::Base64(_))));

        let not_json = format!("h.{}.s", URL_SAFE_NO_PAD.encode("not json"));
        assert!(matches!(decode(&not_json), Err(DecodeError::Json(_))));

        let array = format!("h.{}.s", URL_SAFE_NO_PAD.encode("[1,2]"));
        assert!(matches!(decode(&array), Err(DecodeError::NotAnObject)));
    }

    #[test]
    fn accepts_standard_alphabet_with_padding() {
        let payload = json!({"role": "Farmer", "note": "??>>"}).to_string();
        let token = format!("h.{}.s", STANDARD.encode(payload));
        let claims = decode(&token).unwrap();
        assert_eq!(claims.role_claim(), Some("Farmer"));
    }

    #[test]
    fn expired_tokens_still_decode() {
        let token = unsigned(json!({"role": "investor", "exp": 1}));
        let claims = decode(&token).unwrap();
        assert_eq!(claims.exp(), Some(1));
        assert!(claims.is_expired_at(now_unix()));
        assert!(is_token_expired(&token));
    }

    #[test]
    fn role_claim_follows_extraction_order() {
        let claims = decode(&unsigned(json!({
            "user_role": "Investor",
            "profile": {"role": "Farmer"}
        })))
        .unwrap();
        assert_eq!(claims.role_claim(), Some("Investor"));

        let nested = decode(&unsigned(json!({
            "role": "undefined",
            "profile": {"role": "Farmer"}
        })))
        .unwrap();
        assert_eq!(nested.role_claim(), Some("Farmer"));

        let none = decode(&unsigned(json!({"role": "", "user_role": null}))).unwrap();
        assert_eq!(none.role_claim(), None);
    }

    #[test]
    fn missing_exp_is_not_expired() {
        let token = unsigned(json!({"role": "farmer"}));
        assert!(!decode(&token).unwrap().is_expired_at(now_unix()));
        assert!(!is_token_expired(&token));
        assert!(is_token_expired("garbage"));
    }
}
