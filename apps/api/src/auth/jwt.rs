use std::str::FromStr;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Unsupported JWT algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

/// Claims carried by every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies HMAC-signed access tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    algorithm: Algorithm,
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, algorithm: &str, ttl_minutes: i64) -> Result<Self, JwtError> {
        let algorithm = Algorithm::from_str(algorithm)
            .ok()
            .filter(|a| matches!(a, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512))
            .ok_or_else(|| JwtError::UnsupportedAlgorithm(algorithm.to_string()))?;

        Ok(Self {
            algorithm,
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::minutes(ttl_minutes),
        })
    }

    pub fn issue(&self, user_id: Uuid, email: &str) -> Result<String, JwtError> {
        self.issue_with_ttl(user_id, email, self.ttl)
    }

    pub fn issue_with_ttl(
        &self,
        user_id: Uuid,
        email: &str,
        ttl: Duration,
    ) -> Result<String, JwtError> {
        let now = Utc::now();
        let claims = Claims {
            user_id: user_id.to_string(),
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        Ok(encode(&Header::new(self.algorithm), &claims, &self.encoding)?)
    }

    /// Decodes and validates signature and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        let validation = Validation::new(self.algorithm);
        Ok(decode::<Claims>(token, &self.decoding, &validation)?.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new("test-secret", "HS256", 60).unwrap()
    }

    #[test]
    fn test_issue_and_verify() {
        let user_id = Uuid::new_v4();
        let token = issuer().issue(user_id, "a@example.com").unwrap();
        let claims = issuer().verify(&token).unwrap();
        assert_eq!(claims.user_id, user_id.to_string());
        assert_eq!(claims.email, "a@example.com");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = issuer()
            .issue_with_ttl(Uuid::new_v4(), "a@example.com", Duration::minutes(-10))
            .unwrap();
        assert!(issuer().verify(&token).is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = issuer().issue(Uuid::new_v4(), "a@example.com").unwrap();
        let other = TokenIssuer::new("another-secret", "HS256", 60).unwrap();
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(issuer().verify("not.a.jwt").is_err());
    }

    #[test]
    fn test_asymmetric_algorithm_refused() {
        assert!(matches!(
            TokenIssuer::new("secret", "RS256", 60),
            Err(JwtError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_hs512_round_trip() {
        let issuer = TokenIssuer::new("secret", "HS512", 5).unwrap();
        let token = issuer.issue(Uuid::new_v4(), "b@example.com").unwrap();
        assert_eq!(issuer.verify(&token).unwrap().email, "b@example.com");
    }
}
