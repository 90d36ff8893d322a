//! Bearer token validation.
//!
//! `validate` is a pure function of the token and the injected clock: it never
//! fails, every parse problem maps to `Validity::Invalid`. A token is valid only
//! while `now + skew_buffer < exp`, so a request in flight close to the deadline
//! is already treated as expired.

mod claims;
mod clock;

pub use claims::{Claims, decode_claims, encode_unsigned};
pub use clock::{Clock, FixedClock, SystemClock};

use std::sync::Arc;
use std::time::Duration;

use crate::error::Error;

/// Safety margin subtracted from every token deadline.
pub const DEFAULT_SKEW_BUFFER: Duration = Duration::from_secs(5 * 60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvalidReason {
    Absent,
    Malformed,
    Expired,
}

impl InvalidReason {
    /// The error kind behind this reason; an absent token is not an error.
    #[must_use]
    pub fn as_error(self) -> Option<Error> {
        match self {
            Self::Absent => None,
            Self::Malformed => Some(Error::MalformedToken),
            Self::Expired => Some(Error::Expired),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Validity {
    Valid(Claims),
    Invalid(InvalidReason),
}

impl Validity {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    #[must_use]
    pub fn claims(&self) -> Option<&Claims> {
        match self {
            Self::Valid(claims) => Some(claims),
            Self::Invalid(_) => None,
        }
    }
}

/// Validate `token` against `now_millis` with the given buffer.
#[must_use]
pub fn validate_at(token: &str, now_millis: u64, skew_buffer: Duration) -> Validity {
    let claims = match decode_claims(token) {
        Ok(claims) => claims,
        Err(_) => return Validity::Invalid(InvalidReason::Malformed),
    };

    let deadline = now_millis as f64 + skew_buffer.as_millis() as f64;
    if deadline < claims.expires_at_millis() {
        Validity::Valid(claims)
    } else {
        Validity::Invalid(InvalidReason::Expired)
    }
}

#[derive(Clone)]
pub struct TokenValidator {
    clock: Arc<dyn Clock>,
    skew_buffer: Duration,
}

impl TokenValidator {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, skew_buffer: Duration) -> Self {
        Self { clock, skew_buffer }
    }

    #[must_use]
    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock), DEFAULT_SKEW_BUFFER)
    }

    #[must_use]
    pub fn skew_buffer(&self) -> Duration {
        self.skew_buffer
    }

    #[must_use]
    pub fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }

    #[must_use]
    pub fn validate(&self, token: &str) -> Validity {
        validate_at(token, self.clock.now_millis(), self.skew_buffer)
    }

    /// Absent or blank tokens are `Invalid(Absent)`.
    #[must_use]
    pub fn validate_optional(&self, token: Option<&str>) -> Validity {
        match token.map(str::trim) {
            Some(token) if !token.is_empty() => self.validate(token),
            _ => Validity::Invalid(InvalidReason::Absent),
        }
    }

    #[must_use]
    pub fn is_valid(&self, token: Option<&str>) -> bool {
        self.validate_optional(token).is_valid()
    }
}

impl std::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidator")
            .field("skew_buffer", &self.skew_buffer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW_SECS: u64 = 1_700_000_000;

    fn validator() -> TokenValidator {
        TokenValidator::new(Arc::new(FixedClock::at_secs(NOW_SECS)), DEFAULT_SKEW_BUFFER)
    }

    fn token_expiring_at(exp: u64) -> String {
        encode_unsigned(&json!({ "sub": "7", "iat": NOW_SECS - 60, "exp": exp }))
    }

    #[test]
    fn token_beyond_buffer_is_valid() {
        let token = token_expiring_at(NOW_SECS + 301);
        assert!(validator().validate(&token).is_valid());
    }

    #[test]
    fn token_exactly_at_buffer_is_invalid() {
        let token = token_expiring_at(NOW_SECS + 300);
        assert_eq!(
            validator().validate(&token),
            Validity::Invalid(InvalidReason::Expired)
        );
    }

    #[test]
    fn token_inside_buffer_is_invalid() {
        let token = token_expiring_at(NOW_SECS + 120);
        assert!(!validator().validate(&token).is_valid());
    }

    #[test]
    fn fractional_expiry_is_honoured() {
        let token = encode_unsigned(&json!({ "exp": NOW_SECS as f64 + 300.5 }));
        assert!(validator().validate(&token).is_valid());
    }

    #[test]
    fn validate_is_deterministic_for_same_inputs() {
        let inputs = [
            token_expiring_at(NOW_SECS + 3600),
            token_expiring_at(NOW_SECS),
            "garbage".to_string(),
            String::new(),
        ];
        for token in &inputs {
            let first = validate_at(token, NOW_SECS * 1000, DEFAULT_SKEW_BUFFER);
            let second = validate_at(token, NOW_SECS * 1000, DEFAULT_SKEW_BUFFER);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn malformed_tokens_are_invalid() {
        assert_eq!(
            validator().validate("not.a.token"),
            Validity::Invalid(InvalidReason::Malformed)
        );
    }

    #[test]
    fn absent_tokens_are_invalid() {
        assert_eq!(
            validator().validate_optional(None),
            Validity::Invalid(InvalidReason::Absent)
        );
        assert!(!validator().is_valid(Some("   ")));
    }

    #[test]
    fn validity_tracks_the_clock() {
        let clock = Arc::new(FixedClock::at_secs(NOW_SECS));
        let validator = TokenValidator::new(clock.clone(), DEFAULT_SKEW_BUFFER);
        let token = token_expiring_at(NOW_SECS + 600);
        assert!(validator.validate(&token).is_valid());
        clock.advance(Duration::from_secs(300));
        assert!(!validator.validate(&token).is_valid());
    }

    #[test]
    fn invalid_reason_maps_to_error_kind() {
        assert_eq!(InvalidReason::Absent.as_error(), None);
        assert_eq!(InvalidReason::Expired.as_error(), Some(Error::Expired));
    }
}
