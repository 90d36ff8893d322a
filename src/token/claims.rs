//! Typed token claims and compact-form decoding.
//!
//! Only the payload segment is inspected. The signature is verified by the
//! issuing service and the backend, never here.

use base64ct::{Base64Url, Base64UrlUnpadded, Encoding};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Claims {
    /// Subject identifier. Numeric subjects are kept in their decimal form.
    #[serde(
        default,
        alias = "subject",
        deserialize_with = "subject_from_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub sub: Option<String>,
    /// Issued-at, seconds since the epoch.
    #[serde(default, alias = "issuedAt", skip_serializing_if = "Option::is_none")]
    pub iat: Option<f64>,
    /// Expiry, seconds since the epoch. Required.
    #[serde(alias = "expiresAt")]
    pub exp: f64,
}

impl Claims {
    #[must_use]
    pub fn new(sub: impl Into<String>, iat: u64, exp: u64) -> Self {
        Self {
            sub: Some(sub.into()),
            iat: Some(iat as f64),
            exp: exp as f64,
        }
    }

    /// Expiry in milliseconds since the epoch.
    #[must_use]
    pub fn expires_at_millis(&self) -> f64 {
        self.exp * 1000.0
    }
}

fn subject_from_scalar<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(subject)) => Some(subject),
        Some(serde_json::Value::Number(subject)) => Some(subject.to_string()),
        _ => None,
    })
}

/// Decode the payload segment of a compact `header.payload.signature` token.
///
/// # Errors
/// Returns `Error::MalformedToken` for a wrong segment count, bad base64url,
/// a non-JSON payload, or a missing/non-numeric `exp`.
pub fn decode_claims(token: &str) -> Result<Claims> {
    let mut segments = token.trim().split('.');
    let (Some(header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(Error::MalformedToken);
    };
    if header.is_empty() || payload.is_empty() {
        return Err(Error::MalformedToken);
    }

    let bytes = Base64UrlUnpadded::decode_vec(payload)
        .or_else(|_| Base64Url::decode_vec(payload))
        .map_err(|_| Error::MalformedToken)?;

    let claims: Claims = serde_json::from_slice(&bytes).map_err(|_| Error::MalformedToken)?;
    if !claims.exp.is_finite() {
        return Err(Error::MalformedToken);
    }
    Ok(claims)
}

/// Build an unsigned compact token carrying `payload`.
///
/// Fixtures and local tooling use this; the signature segment is a placeholder.
#[must_use]
pub fn encode_unsigned(payload: &serde_json::Value) -> String {
    let header = Base64UrlUnpadded::encode_string(br#"{"alg":"none","typ":"JWT"}"#);
    let body = Base64UrlUnpadded::encode_string(payload.to_string().as_bytes());
    format!("{header}.{body}.unsigned")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_claims_reads_standard_fields() {
        let token = encode_unsigned(&json!({ "sub": 42, "iat": 100, "exp": 200 }));
        let claims = decode_claims(&token).ok();
        assert_eq!(claims, Some(Claims::new("42", 100, 200)));
    }

    #[test]
    fn decode_claims_accepts_long_field_names() {
        let token = encode_unsigned(&json!({ "subject": "u-1", "expiresAt": 10 }));
        let claims = decode_claims(&token).ok();
        assert_eq!(claims.and_then(|c| c.sub), Some("u-1".to_string()));
    }

    #[test]
    fn decode_claims_rejects_wrong_segment_count() {
        assert_eq!(decode_claims(""), Err(Error::MalformedToken));
        assert_eq!(decode_claims("abc"), Err(Error::MalformedToken));
        assert_eq!(decode_claims("a.b"), Err(Error::MalformedToken));
        assert_eq!(decode_claims("a.b.c.d"), Err(Error::MalformedToken));
    }

    #[test]
    fn decode_claims_rejects_bad_payloads() {
        let not_json = format!("h.{}.s", Base64UrlUnpadded::encode_string(b"not json"));
        assert_eq!(decode_claims(&not_json), Err(Error::MalformedToken));

        let missing_exp = encode_unsigned(&json!({ "sub": "x" }));
        assert_eq!(decode_claims(&missing_exp), Err(Error::MalformedToken));

        let string_exp = encode_unsigned(&json!({ "exp": "soon" }));
        assert_eq!(decode_claims(&string_exp), Err(Error::MalformedToken));

        assert_eq!(decode_claims("h.%%%%.s"), Err(Error::MalformedToken));
    }
}
