//! Session tokens
//!
//! HS256 JWTs whose subject is the user id. Tokens expire after the
//! configured TTL (30 minutes by default).

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Token errors
#[derive(Debug, Error)]
pub enum TokenError {
    /// Signature valid but `exp` has passed
    #[error("Token expired")]
    Expired,

    /// Bad signature, malformed token or wrong algorithm
    #[error("Token decode error: {0}")]
    Invalid(String),

    /// Signing failed
    #[error("Token encode error: {0}")]
    Encode(String),
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id; optional so tokens without a subject can be rejected explicitly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
}

/// Issues and verifies session tokens
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
            ttl,
        }
    }

    /// Token lifetime in seconds
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    /// Issue a token for a user
    pub fn issue(&self, user_id: &Uuid) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: Some(user_id.to_string()),
            exp: (now + self.ttl).timestamp(),
            iat: now.timestamp(),
        };
        self.sign(&claims)
    }

    /// Sign arbitrary claims
    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| TokenError::Encode(e.to_string()))
    }

    /// Verify signature and expiry
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            })
    }
}
