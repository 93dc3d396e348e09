//! Bearer token verification.
//!
//! # Responsibilities
//! - Parse the `Authorization: Bearer <token>` header
//! - Verify HMAC-signed JWTs against the configured secret
//! - Extract identity claims for the rest of the request
//!
//! # Design Decisions
//! - Pure and synchronous: no I/O, no retries
//! - `exp` is enforced when present, with no leeway
//! - Claims can only be produced here

use std::collections::HashSet;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};
use thiserror::Error;

const BEARER_PREFIX: &str = "Bearer ";

/// Reasons a request fails authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Access denied. Token missing.")]
    MissingToken,

    #[error("Access denied. Invalid token format.")]
    MalformedToken,

    #[error("Invalid or expired token.")]
    InvalidToken,
}

/// Identity extracted from a verified token.
#[derive(Debug, Clone, PartialEq)]
pub struct Claims {
    subject: Option<String>,
    role: Option<String>,
    expiry: Option<u64>,
    raw: Map<String, Value>,
}

impl Claims {
    fn from_payload(raw: Map<String, Value>) -> Self {
        let subject = ["sub", "id", "userId"]
            .iter()
            .find_map(|key| raw.get(*key))
            .and_then(|value| match value {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });
        let role = raw.get("role").and_then(Value::as_str).map(str::to_string);
        let expiry = raw.get("exp").and_then(Value::as_u64);

        Self { subject, role, expiry, raw }
    }

    /// User identifier (`sub`, else `id`, else `userId`).
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    /// Expiry as seconds since the Unix epoch.
    pub fn expiry(&self) -> Option<u64> {
        self.expiry
    }

    /// The full decoded payload.
    pub fn raw(&self) -> &Map<String, Value> {
        &self.raw
    }
}

/// Verifies bearer tokens against a fixed secret.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    /// Build a verifier for tokens signed with `secret`.
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.required_spec_claims = HashSet::new();
        validation.leeway = 0;
        validation.validate_aud = false;

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify an `Authorization` header value.
    pub fn verify(&self, authorization: Option<&str>) -> Result<Claims, AuthError> {
        let header = authorization.ok_or(AuthError::MissingToken)?;

        let token = header
            .strip_prefix(BEARER_PREFIX)
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MalformedToken)?;

        let data = decode::<Map<String, Value>>(token, &self.key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "Token rejected");
            AuthError::InvalidToken
        })?;

        Ok(Claims::from_payload(data.claims))
    }
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use std::time::{SystemTime, UNIX_EPOCH};

    const SECRET: &str = "test-secret";

    fn now() -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
    }

    fn sign(payload: Value, secret: &str) -> String {
        encode(&Header::default(), &payload, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn missing_header() {
        let verifier = TokenVerifier::new(SECRET);
        assert_eq!(verifier.verify(None), Err(AuthError::MissingToken));
    }

    #[test]
    fn malformed_header() {
        let verifier = TokenVerifier::new(SECRET);
        assert_eq!(verifier.verify(Some("Invalid-format")), Err(AuthError::MalformedToken));
        assert_eq!(verifier.verify(Some("Basic dXNlcjpwYXNz")), Err(AuthError::MalformedToken));
        assert_eq!(verifier.verify(Some("Bearer ")), Err(AuthError::MalformedToken));
        assert_eq!(verifier.verify(Some("Bearer    ")), Err(AuthError::MalformedToken));
    }

    #[test]
    fn invalid_token() {
        let verifier = TokenVerifier::new(SECRET);
        assert_eq!(verifier.verify(Some("Bearer invalid-token")), Err(AuthError::InvalidToken));

        let foreign = sign(json!({ "id": 1 }), "other-secret");
        assert_eq!(verifier.verify(Some(&format!("Bearer {}", foreign))), Err(AuthError::InvalidToken));
    }

    #[test]
    fn tampered_token() {
        let verifier = TokenVerifier::new(SECRET);
        let token = sign(json!({ "id": 1, "role": "user" }), SECRET);
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = sign(json!({ "id": 1, "role": "admin" }), "attacker");
        let forged_payload = forged.split('.').nth(1).unwrap();
        parts[1] = forged_payload;
        let tampered = parts.join(".");

        assert_eq!(verifier.verify(Some(&format!("Bearer {}", tampered))), Err(AuthError::InvalidToken));
    }

    #[test]
    fn expired_token() {
        let verifier = TokenVerifier::new(SECRET);
        let token = sign(json!({ "id": 1, "exp": now() - 60 }), SECRET);
        assert_eq!(verifier.verify(Some(&format!("Bearer {}", token))), Err(AuthError::InvalidToken));
    }

    #[test]
    fn valid_token_yields_claims() {
        let verifier = TokenVerifier::new(SECRET);
        let exp = now() + 3600;
        let token = sign(json!({ "id": 1, "email": "test@example.com", "role": "admin", "exp": exp }), SECRET);

        let claims = verifier.verify(Some(&format!("Bearer {}", token))).unwrap();
        assert_eq!(claims.subject(), Some("1"));
        assert_eq!(claims.role(), Some("admin"));
        assert_eq!(claims.expiry(), Some(exp));
        assert_eq!(claims.raw().get("email"), Some(&json!("test@example.com")));
    }

    #[test]
    fn token_without_exp_is_accepted() {
        let verifier = TokenVerifier::new(SECRET);
        let token = sign(json!({ "userId": 123 }), SECRET);

        let claims = verifier.verify(Some(&format!("Bearer {}", token))).unwrap();
        assert_eq!(claims.subject(), Some("123"));
        assert_eq!(claims.role(), None);
        assert_eq!(claims.expiry(), None);
    }

    #[test]
    fn sub_takes_precedence() {
        let verifier = TokenVerifier::new(SECRET);
        let token = sign(json!({ "sub": "user-7", "id": 1 }), SECRET);
        let claims = verifier.verify(Some(&format!("Bearer {}", token))).unwrap();
        assert_eq!(claims.subject(), Some("user-7"));
    }

    #[test]
    fn messages_are_distinct() {
        let messages: HashSet<String> = [AuthError::MissingToken, AuthError::MalformedToken, AuthError::InvalidToken]
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(messages.len(), 3);
    }
}
