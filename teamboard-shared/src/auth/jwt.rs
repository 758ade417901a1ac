/// Access tokens
///
/// HS256 JWTs whose subject is the user id. The `ver` claim records the
/// user's token version at issue time; the server bumps the stored version on
/// login and logout, so a token is only honored while `ver` still matches.
///
/// ```
/// use chrono::Duration;
/// use teamboard_shared::auth::jwt::{Claims, TokenKeys};
///
/// let keys = TokenKeys::from_secret("test-secret-key-at-least-32-bytes-long");
/// let token = keys.sign(&Claims::new(42, 3, Duration::hours(24))).unwrap();
///
/// let claims = keys.verify(&token).unwrap();
/// assert_eq!(claims.user_id().unwrap(), 42);
/// assert_eq!(claims.ver, 3);
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

pub const ISSUER: &str = "teamboard";

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("could not sign token: {0}")]
    Sign(String),

    #[error("token has expired")]
    Expired,

    #[error("token was not issued by {ISSUER}")]
    WrongIssuer,

    #[error("token subject is not a user id: {0}")]
    BadSubject(String),

    /// Bad signature, malformed token, not yet valid, ...
    #[error("invalid token: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id in decimal
    pub sub: String,
    pub iss: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,

    /// Token version of the user when the token was issued
    pub ver: i32,
}

impl Claims {
    pub fn new(user_id: i64, token_version: i32, ttl: Duration) -> Self {
        let now = Utc::now().timestamp();

        Self {
            sub: user_id.to_string(),
            iss: ISSUER.to_string(),
            iat: now,
            nbf: now,
            exp: now + ttl.num_seconds(),
            ver: token_version,
        }
    }

    pub fn user_id(&self) -> Result<i64, JwtError> {
        self.sub
            .parse()
            .map_err(|_| JwtError::BadSubject(self.sub.clone()))
    }
}

/// Signing and verification keys derived once from the shared secret
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenKeys {
    pub fn from_secret(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.validate_nbf = true;
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, JwtError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| JwtError::Sign(e.to_string()))
    }

    /// Checks signature, issuer, expiry and not-before
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::Expired,
                ErrorKind::InvalidIssuer => JwtError::WrongIssuer,
                _ => JwtError::Invalid(e.to_string()),
            })
    }
}
