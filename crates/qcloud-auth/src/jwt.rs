//! Unverified JWT inspection.
//!
//! Only the `exp` claim is read, to learn when an access token expires when
//! the identity provider does not send `expires_in`. Signatures are not
//! checked; the token is trusted because it came straight from the provider.

use chrono::{DateTime, Utc};
use jsonwebtoken::dangerous::insecure_decode;
use serde::Deserialize;

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: Option<f64>,
}

/// Read the `exp` claim of a compact-serialized JWT.
///
/// Returns `None` if the token is not a JWT or carries no expiry.
pub fn expiry_from_jwt(token: &str) -> Option<DateTime<Utc>> {
    let exp = insecure_decode::<ExpiryClaim>(token).ok()?.claims.exp?;
    if !exp.is_finite() {
        return None;
    }
    DateTime::from_timestamp(exp.trunc() as i64, 0)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::{Value, json};

    /// Sign `claims` with a throwaway key.
    pub(crate) fn token_with(claims: Value) -> String {
        encode(&Header::default(), &claims, &EncodingKey::from_secret(b"test-key")).unwrap()
    }

    #[test]
    fn test_reads_exp_claim() {
        let token = token_with(json!({"sub": "u1", "exp": 1_700_000_000}));
        let expiry = expiry_from_jwt(&token).unwrap();
        assert_eq!(expiry.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_missing_exp() {
        let token = token_with(json!({"sub": "u1"}));
        assert!(expiry_from_jwt(&token).is_none());
    }

    #[test]
    fn test_out_of_range_exp() {
        let token = token_with(json!({"exp": 1e300}));
        assert!(expiry_from_jwt(&token).is_none());
    }

    #[test]
    fn test_opaque_token() {
        assert!(expiry_from_jwt("not-a-jwt").is_none());
        assert!(expiry_from_jwt("a.b").is_none());
        assert!(expiry_from_jwt("a.!!!.c").is_none());
    }
}
