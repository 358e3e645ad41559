//! Password hashing and bearer-token issuance for the chat service.
//!
//! Passwords are hashed with Argon2id. Session tokens are HS256 JWTs whose
//! `sub` claim carries the username.

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;

use forum_types::api::Claims;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("token encoding failed: {0}")]
    Encode(#[from] jsonwebtoken::errors::Error),
}

#[derive(Clone)]
pub struct Authenticator {
    jwt_secret: String,
    token_ttl: chrono::Duration,
}

impl Authenticator {
    pub fn new(jwt_secret: impl Into<String>, token_ttl: chrono::Duration) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            token_ttl,
        }
    }

    pub fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::Hash(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// Check a candidate password against a stored hash. A mismatch and a
    /// corrupt hash both come back as `InvalidCredentials`.
    pub fn verify_password(&self, password: &str, password_hash: &str) -> Result<(), AuthError> {
        let parsed = PasswordHash::new(password_hash).map_err(|_| AuthError::InvalidCredentials)?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| AuthError::InvalidCredentials)
    }

    /// Issue a bearer token for `username`, expiring after the configured TTL.
    pub fn issue_token(&self, username: &str) -> Result<String, AuthError> {
        let claims = Claims {
            sub: username.to_string(),
            exp: (chrono::Utc::now() + self.token_ttl).timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )?;

        Ok(token)
    }

    /// Decode and validate a bearer token. Malformed tokens, bad signatures
    /// and expired tokens all map to `InvalidToken`.
    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| AuthError::InvalidToken)?;

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticator() -> Authenticator {
        Authenticator::new("test-secret", chrono::Duration::minutes(30))
    }

    #[test]
    fn password_hash_round_trip() {
        let auth = authenticator();
        let hash = auth.hash_password("correct horse battery").unwrap();
        assert!(auth.verify_password("correct horse battery", &hash).is_ok());
        assert!(matches!(
            auth.verify_password("wrong password", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn token_round_trip_carries_username() {
        let auth = authenticator();
        let token = auth.issue_token("alice").unwrap();
        let claims = auth.verify_token(&token).unwrap();
        assert_eq!(claims.sub, "alice");
    }

    #[test]
    fn tampered_token_is_rejected() {
        let auth = authenticator();
        let token = auth.issue_token("alice").unwrap();
        let mut tampered = token.clone();
        tampered.pop();
        assert!(matches!(auth.verify_token(&tampered), Err(AuthError::InvalidToken)));
        assert!(matches!(auth.verify_token("not-a-jwt"), Err(AuthError::InvalidToken)));

        // Valid shape, wrong signing key.
        let other = Authenticator::new("other-secret", chrono::Duration::minutes(30));
        assert!(matches!(other.verify_token(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn expired_token_is_rejected() {
        // Past the default 60s validation leeway.
        let auth = Authenticator::new("test-secret", chrono::Duration::minutes(-5));
        let token = auth.issue_token("alice").unwrap();
        assert!(matches!(auth.verify_token(&token), Err(AuthError::InvalidToken)));
    }
}
