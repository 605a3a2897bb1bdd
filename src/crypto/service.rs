use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use base64::{engine::general_purpose, Engine as _};
use ring::{
    hmac,
    rand::{SecureRandom, SystemRandom},
};

use crate::core::error::{AppError, AppResult};

/// Password hashing and session-token material, keyed by the app secret.
pub struct CryptoService {
    token_key: hmac::Key,
    rng: SystemRandom,
}

impl CryptoService {
    pub fn new(secret_key: &str) -> Self {
        Self {
            token_key: hmac::Key::new(hmac::HMAC_SHA256, secret_key.as_bytes()),
            rng: SystemRandom::new(),
        }
    }

    /// Hash a password using Argon2
    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

        Ok(password_hash.to_string())
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Random bearer token handed to the client once.
    pub fn generate_token(&self) -> AppResult<String> {
        let mut token_bytes = [0u8; 32];
        self.rng
            .fill(&mut token_bytes)
            .map_err(|_| AppError::Internal("Failed to generate token".to_string()))?;

        Ok(general_purpose::URL_SAFE_NO_PAD.encode(token_bytes))
    }

    /// Digest stored in place of the token; only the secret holder can recompute it.
    pub fn token_digest(&self, token: &str) -> String {
        let tag = hmac::sign(&self.token_key, token.as_bytes());
        general_purpose::URL_SAFE_NO_PAD.encode(tag.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip() {
        let crypto = CryptoService::new("secret");
        let hash = crypto.hash_password("hunter2").unwrap();

        assert!(crypto.verify_password("hunter2", &hash).unwrap());
        assert!(!crypto.verify_password("hunter3", &hash).unwrap());
    }

    #[test]
    fn token_digest_depends_on_secret() {
        let a = CryptoService::new("one");
        let b = CryptoService::new("two");
        let token = a.generate_token().unwrap();

        assert_eq!(a.token_digest(&token), a.token_digest(&token));
        assert_ne!(a.token_digest(&token), b.token_digest(&token));
        assert_ne!(token, a.generate_token().unwrap());
    }
}
