use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;

use courier_types::api::Claims;

#[derive(Debug, Error)]
pub enum TokenError {
    /// Malformed, tampered, or expired token.
    #[error("invalid token")]
    Invalid,
    #[error("token signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Issues and verifies stateless HS256 identity tokens.
///
/// The signing key comes from config at startup and is immutable afterwards.
/// There is no server-side session table and no revocation; logout is
/// client-side token discard. Tokens expire after `ttl`.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: chrono::Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_days: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
            ttl: chrono::Duration::days(ttl_days),
        }
    }

    /// Sign a token asserting `username` as the caller's identity.
    pub fn issue(&self, username: &str) -> Result<String, TokenError> {
        let claims = Claims {
            sub: username.to_string(),
            exp: (Utc::now() + self.ttl).timestamp() as usize,
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Verify a token and extract its claims. Any signature, format, or
    /// expiry problem collapses into `TokenError::Invalid`; callers learn
    /// nothing about why a token was rejected.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| TokenError::Invalid)
    }
}
