//! Expiry policy over decoded token claims.
//!
//! Every check fails closed: a token whose claims cannot be decoded, or
//! that carries no numeric `exp`, is treated as expired.

use chrono::{DateTime, Utc};

use crate::jwt::decode_claims;

/// Seconds before the nominal `exp` at which a token is already treated as
/// expired, absorbing clock drift between device and issuer.
pub const SKEW_BUFFER_SECS: i64 = 30;

/// Seconds before `exp` at which a token counts as expiring soon.
pub const SOON_HORIZON_SECS: i64 = 300;

/// Current time as whole seconds since the Unix epoch (floored).
#[must_use]
pub fn now_epoch_secs() -> i64 {
    Utc::now().timestamp_millis().div_euclid(1000)
}

/// Whether the token is expired, or undecodable, right now.
#[must_use]
pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, now_epoch_secs())
}

/// Whether the token is expired at `now` epoch seconds.
#[must_use]
pub fn is_expired_at(token: &str, now: i64) -> bool {
    within_margin(token, now, SKEW_BUFFER_SECS)
}

/// Whether the token expires within the next five minutes, or is undecodable.
#[must_use]
pub fn is_expiring_soon(token: &str) -> bool {
    is_expiring_soon_at(token, now_epoch_secs())
}

/// Whether the token expires within [`SOON_HORIZON_SECS`] of `now`.
#[must_use]
pub fn is_expiring_soon_at(token: &str, now: i64) -> bool {
    within_margin(token, now, SOON_HORIZON_SECS)
}

/// The `exp` claim as an absolute instant.
#[must_use]
pub fn expiration_instant(token: &str) -> Option<DateTime<Utc>> {
    let exp = decode_claims(token)?.exp()?;
    DateTime::from_timestamp(exp, 0)
}

fn within_margin(token: &str, now: i64, margin: i64) -> bool {
    match decode_claims(token).and_then(|claims| claims.exp()) {
        Some(exp) => now >= exp.saturating_sub(margin),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::tests::{token_expiring_at, token_with_claims};

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn skew_buffer_boundary() {
        let token = token_expiring_at(NOW + 31);
        assert!(!is_expired_at(&token, NOW));
        let token = token_expiring_at(NOW + 30);
        assert!(is_expired_at(&token, NOW));
        let token = token_expiring_at(NOW - 1);
        assert!(is_expired_at(&token, NOW));
    }

    #[test]
    fn soon_horizon_boundary() {
        let token = token_expiring_at(NOW + 301);
        assert!(!is_expiring_soon_at(&token, NOW));
        assert!(!is_expired_at(&token, NOW));

        let token = token_expiring_at(NOW + 300);
        assert!(is_expiring_soon_at(&token, NOW));
        assert!(!is_expired_at(&token, NOW));
    }

    #[test]
    fn fails_closed_on_malformed_input() {
        let missing_exp = token_with_claims(r#"{"iat":1700000000}"#);
        let string_exp = token_with_claims(r#"{"exp":"tomorrow"}"#);
        for token in [
            "",
            "not-a-jwt",
            "a.b",
            "h.@@@.s",
            "h.bm90IGpzb24.s",
            missing_exp.as_str(),
            string_exp.as_str(),
        ] {
            assert!(is_expired(token), "{token:?} should be expired");
            assert!(is_expiring_soon(token), "{token:?} should be expiring soon");
            assert!(expiration_instant(token).is_none());
        }
    }

    #[test]
    fn concrete_tokens_against_wall_clock() {
        let future = "eyJhbGciOiJIUzI1NiJ9.eyJleHAiOjk5OTk5OTk5OTl9.sig";
        assert!(!is_expired(future));
        assert!(!is_expiring_soon(future));

        let ancient = "eyJhbGciOiJIUzI1NiJ9.eyJleHAiOjF9.sig";
        assert!(is_expired(ancient));
        assert!(is_expiring_soon(ancient));
    }

    #[test]
    fn expiration_instant_matches_exp() {
        let instant = expiration_instant(&token_expiring_at(NOW)).expect("instant");
        assert_eq!(instant.timestamp(), NOW);
    }

    #[test]
    fn extreme_exp_does_not_overflow() {
        let token = token_with_claims(&format!(r#"{{"exp":{}}}"#, i64::MIN));
        assert!(is_expired_at(&token, NOW));
    }
}
