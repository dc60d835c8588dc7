//! Authentication: password hashing, bearer tokens, session registry

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

use super::types::current_timestamp;

type HmacSha256 = Hmac<Sha256>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("authentication token is missing")]
    MissingCredential,
    #[error("invalid authentication token")]
    InvalidCredential,
    #[error("authentication token expired")]
    ExpiredCredential,
    #[error("password hashing failed")]
    HashingFailed,
}

/// Hash a password using Argon2id. Salt is generated here and embedded
/// in the PHC string.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|_| AuthError::HashingFailed)
}

/// Verify a password by recomputation against the stored hash.
pub fn verify_password(password: &str, password_hash: &str) -> Result<(), AuthError> {
    let parsed = PasswordHash::new(password_hash).map_err(|_| AuthError::InvalidCredential)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AuthError::InvalidCredential)
}

/// Claims embedded in a bearer token
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Claims {
    pub user_id: String,
    pub email: String,
    pub iat: u64,
    pub exp: u64,
}

/// Issues and validates HMAC-SHA256 signed bearer tokens. Validation is
/// stateless: the account store is never consulted here.
pub struct TokenSigner {
    secret: Vec<u8>,
    ttl_ms: u64,
}

impl TokenSigner {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            ttl_ms: ttl_secs * 1000,
        }
    }

    /// Wire form: `hex(payload_json).hex(hmac)`
    pub fn issue(&self, user_id: &str, email: &str) -> Result<String, AuthError> {
        let now = current_timestamp();
        let claims = Claims {
            user_id: user_id.to_string(),
            email: email.to_string(),
            iat: now,
            exp: now + self.ttl_ms,
        };
        let payload = serde_json::to_vec(&claims).map_err(|_| AuthError::InvalidCredential)?;
        let sig = self.sign(&payload)?;
        Ok(format!("{}.{}", hex::encode(&payload), hex::encode(sig)))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_at(token, current_timestamp())
    }

    fn verify_at(&self, token: &str, now: u64) -> Result<Claims, AuthError> {
        let (payload_hex, sig_hex) = token
            .split_once('.')
            .ok_or(AuthError::InvalidCredential)?;
        let payload = hex::decode(payload_hex).map_err(|_| AuthError::InvalidCredential)?;
        let sig = hex::decode(sig_hex).map_err(|_| AuthError::InvalidCredential)?;

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| AuthError::InvalidCredential)?;
        mac.update(&payload);
        mac.verify_slice(&sig)
            .map_err(|_| AuthError::InvalidCredential)?;

        let claims: Claims =
            serde_json::from_slice(&payload).map_err(|_| AuthError::InvalidCredential)?;
        if now > claims.exp {
            return Err(AuthError::ExpiredCredential);
        }
        Ok(claims)
    }

    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, AuthError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| AuthError::InvalidCredential)?;
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

struct Session {
    user_id: String,
    expires_at: u64,
}

/// Server-side session map, keyed by opaque session id. Consulted only
/// by logout; expired entries are swept lazily on the next create.
pub struct SessionRegistry {
    ttl_ms: u64,
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionRegistry {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl_ms: ttl_secs * 1000,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn create(&self, user_id: &str) -> String {
        let now = current_timestamp();
        let id = Uuid::new_v4().to_string();
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.retain(|_, s| s.expires_at > now);
            sessions.insert(
                id.clone(),
                Session {
                    user_id: user_id.to_string(),
                    expires_at: now + self.ttl_ms,
                },
            );
        }
        id
    }

    pub fn remove_for_user(&self, user_id: &str) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.retain(|_, s| s.user_id != user_id);
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hashing() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(verify_password("correct horse battery", &hash).is_ok());
        assert!(verify_password("wrong password", &hash).is_err());
    }

    #[test]
    fn test_token_roundtrip() {
        let signer = TokenSigner::new("test-secret", 3600);
        let token = signer.issue("user-1", "a@b.c").unwrap();
        let claims = signer.verify(&token).unwrap();
        assert_eq!(claims.user_id, "user-1");
        assert_eq!(claims.email, "a@b.c");
    }

    #[test]
    fn test_tampered_token_rejected() {
        let signer = TokenSigner::new("test-secret", 3600);
        let token = signer.issue("user-1", "a@b.c").unwrap();

        let mut forged = token.clone();
        forged.replace_range(0..2, "ff");
        assert_eq!(signer.verify(&forged), Err(AuthError::InvalidCredential));

        assert_eq!(
            signer.verify("not-a-token"),
            Err(AuthError::InvalidCredential)
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let signer = TokenSigner::new("secret-a", 3600);
        let other = TokenSigner::new("secret-b", 3600);
        let token = signer.issue("user-1", "a@b.c").unwrap();
        assert_eq!(other.verify(&token), Err(AuthError::InvalidCredential));
    }

    #[test]
    fn test_expired_token_distinguished() {
        let signer = TokenSigner::new("test-secret", 1);
        let token = signer.issue("user-1", "a@b.c").unwrap();
        let far_future = current_timestamp() + 10_000;
        assert_eq!(
            signer.verify_at(&token, far_future),
            Err(AuthError::ExpiredCredential)
        );
    }

    #[test]
    fn test_session_registry() {
        let registry = SessionRegistry::new(3600);
        registry.create("user-1");
        registry.create("user-1");
        registry.create("user-2");
        assert_eq!(registry.len(), 3);

        registry.remove_for_user("user-1");
        assert_eq!(registry.len(), 1);
    }
}
