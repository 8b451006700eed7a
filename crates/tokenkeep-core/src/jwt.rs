//! Compact JWT payload decoding.
//!
//! Only the claims segment is read. Signatures are never checked: the token
//! issuer is trusted and verification happens server-side.

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde_json::{Map, Value};

use crate::error::TokenError;

/// URL-safe alphabet for unpadded segments.
const BASE64URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::RequireNone),
);

/// URL-safe alphabet for segments carrying `=`; the padding must be canonical.
const BASE64URL_PADDED: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::RequireCanonical),
);

/// Decoded JWT payload.
///
/// Arbitrary claims are kept as raw JSON; `exp`, `iat` and `sub` have typed
/// accessors.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Claims(Map<String, Value>);

impl Claims {
    /// Expiry as whole seconds since the Unix epoch.
    ///
    /// Returns `None` when the claim is missing or not a number. Fractional
    /// values are floored.
    #[must_use]
    pub fn exp(&self) -> Option<i64> {
        self.numeric("exp")
    }

    /// Issued-at as whole seconds since the Unix epoch. Informational only.
    #[must_use]
    pub fn iat(&self) -> Option<i64> {
        self.numeric("iat")
    }

    /// Subject claim, if it is a string.
    #[must_use]
    pub fn sub(&self) -> Option<&str> {
        self.0.get("sub").and_then(Value::as_str)
    }

    /// Raw access to any claim.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// All claims as a JSON object.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    fn numeric(&self, key: &str) -> Option<i64> {
        let value = self.0.get(key)?;
        value
            .as_i64()
            .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f.floor() as i64))
    }
}

impl From<Map<String, Value>> for Claims {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Decode the claims of a compact JWT.
///
/// Returns `None` for anything that is not three dot-separated segments
/// with a base64url JSON object in the middle. Never panics.
#[must_use]
pub fn decode_claims(token: &str) -> Option<Claims> {
    decode_claims_strict(token).ok()
}

/// Decode the claims of a compact JWT, reporting why decoding failed.
///
/// # Errors
///
/// Returns [`TokenError::Invalid`] describing the first structural problem.
pub fn decode_claims_strict(token: &str) -> Result<Claims, TokenError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(TokenError::Invalid(format!(
            "expected 3 segments, found {}",
            parts.len()
        )));
    }

    let segment = parts[1];
    let engine = if segment.contains('=') {
        &BASE64URL_PADDED
    } else {
        &BASE64URL
    };
    let payload = engine
        .decode(segment)
        .map_err(|e| TokenError::Invalid(format!("base64 decode: {e}")))?;

    let value: Value = serde_json::from_slice(&payload)
        .map_err(|e| TokenError::Invalid(format!("parsing claims: {e}")))?;

    match value {
        Value::Object(map) => Ok(Claims(map)),
        other => Err(TokenError::Invalid(format!(
            "claims must be a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use base64::Engine as _;
    use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};

    /// Build an unsigned token around the given claims JSON.
    pub(crate) fn token_with_claims(claims: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.as_bytes());
        format!("{header}.{payload}.sig")
    }

    /// Build a token expiring at `exp` epoch seconds.
    pub(crate) fn token_expiring_at(exp: i64) -> String {
        token_with_claims(&format!(r#"{{"exp":{exp},"iat":1700000000}}"#))
    }

    #[test]
    fn decodes_far_future_token() {
        let claims = decode_claims("eyJhbGciOiJIUzI1NiJ9.eyJleHAiOjk5OTk5OTk5OTl9.sig")
            .expect("claims");
        assert_eq!(claims.exp(), Some(9_999_999_999));
        assert_eq!(claims.iat(), None);
    }

    #[test]
    fn rejects_wrong_segment_count() {
        assert!(decode_claims("onlyone").is_none());
        assert!(decode_claims("a.b").is_none());
        assert!(decode_claims("a.b.c.d").is_none());
        let err = decode_claims_strict("a.b").unwrap_err();
        assert!(err.to_string().contains("expected 3 segments, found 2"));
    }

    #[test]
    fn rejects_bad_base64() {
        assert!(decode_claims("h.!!!!.s").is_none());
        // standard alphabet characters are not valid base64url
        assert!(decode_claims("h.eyJ+ZXhwIjoxfQ.s").is_none());
    }

    #[test]
    fn accepts_padded_payload() {
        // {"exp":12} is 10 bytes, so the payload ends in `==`
        let padded = format!("h.{}.s", URL_SAFE.encode(br#"{"exp":12}"#));
        assert!(padded.ends_with("==.s"));
        assert_eq!(decode_claims(&padded).and_then(|c| c.exp()), Some(12));
    }

    #[test]
    fn rejects_incorrect_padding() {
        let bare = URL_SAFE_NO_PAD.encode(br#"{"exp":12}"#);
        assert_eq!(decode_claims(&format!("h.{bare}.s")).and_then(|c| c.exp()), Some(12));

        assert!(decode_claims(&format!("h.{bare}=.s")).is_none());
        assert!(decode_claims(&format!("h.{bare}===.s")).is_none());
        let err = decode_claims_strict(&format!("h.{bare}=.s")).unwrap_err();
        assert!(err.to_string().contains("base64 decode"));
    }

    #[test]
    fn rejects_padding_on_wrong_length_segment() {
        // {"exp":1} is 9 bytes and needs no padding at all
        let bare = URL_SAFE_NO_PAD.encode(br#"{"exp":1}"#);
        assert_eq!(bare.len() % 4, 0);
        assert!(decode_claims(&format!("h.{bare}==.s")).is_none());
        assert!(decode_claims(&format!("h.{bare}=.s")).is_none());
    }

    #[test]
    fn rejects_non_json_and_non_object_payloads() {
        let not_json = format!("h.{}.s", URL_SAFE_NO_PAD.encode(b"not json"));
        assert!(decode_claims(&not_json).is_none());

        let array = token_with_claims("[1,2,3]");
        let err = decode_claims_strict(&array).unwrap_err();
        assert!(err.to_string().contains("array"));
    }

    #[test]
    fn typed_accessors() {
        let token =
            token_with_claims(r#"{"exp":1700000300.9,"iat":"soon","sub":"user-42","role":"admin"}"#);
        let claims = decode_claims(&token).expect("claims");
        assert_eq!(claims.exp(), Some(1_700_000_300));
        assert_eq!(claims.iat(), None);
        assert_eq!(claims.sub(), Some("user-42"));
        assert_eq!(claims.get("role"), Some(&Value::String("admin".to_string())));
        assert_eq!(claims.as_map().len(), 4);
    }
}
