//! Credential hashing.
//!
//! Passwords are hashed with Argon2id on the blocking pool. High-entropy
//! secrets (session secrets, API client secrets, invitation tokens) only need
//! a SHA-256 digest.

use argon2::password_hash::{rand_core::OsRng as HashRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

use crate::errors::{LarderError, Result};

pub fn password_hasher() -> Result<Argon2<'static>> {
    // Argon2id tuned for interactive logins.
    const MEMORY_COST_KIB: u32 = 768;
    const ITERATIONS: u32 = 1;
    const PARALLELISM: u32 = 1;
    let params = Params::new(MEMORY_COST_KIB, ITERATIONS, PARALLELISM, Some(32))
        .map_err(|err| LarderError::internal(format!("Invalid Argon2 parameters: {}", err)))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

fn hash_password_blocking(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut HashRng);
    let hash = password_hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| LarderError::internal(format!("Failed to hash password: {}", err)))?;
    Ok(hash.to_string())
}

fn verify_password_blocking(stored: &str, candidate: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored)
        .map_err(|err| LarderError::internal(format!("Invalid password hash: {}", err)))?;
    Ok(password_hasher()?.verify_password(candidate.as_bytes(), &parsed).is_ok())
}

pub async fn hash_password(password: &str) -> Result<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash_password_blocking(&password))
        .await
        .map_err(|err| LarderError::internal(format!("Password hashing task failed: {}", err)))?
}

pub async fn verify_password(stored: &str, candidate: &str) -> Result<bool> {
    let stored = stored.to_string();
    let candidate = candidate.to_string();
    tokio::task::spawn_blocking(move || verify_password_blocking(&stored, &candidate))
        .await
        .map_err(|err| LarderError::internal(format!("Password verification task failed: {}", err)))?
}

/// URL-safe random secret of `bytes` bytes of entropy.
pub fn generate_secret(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

/// Hex SHA-256 digest.
pub fn digest_hex(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

/// Raw SHA-256 digest.
pub fn digest(value: &[u8]) -> [u8; 32] {
    Sha256::digest(value).into()
}

/// Length-independent comparison of two secrets.
pub fn constant_time_eq(left: &str, right: &str) -> bool {
    let left = digest(left.as_bytes());
    let right = digest(right.as_bytes());
    left.iter().zip(right.iter()).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn password_round_trip() {
        let hash = hash_password("p0!aB").await.unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password(&hash, "p0!aB").await.unwrap());
        assert!(!verify_password(&hash, "Ba!0p").await.unwrap());
    }

    #[test]
    fn secrets_are_random_and_url_safe() {
        let first = generate_secret(32);
        let second = generate_secret(32);
        assert_ne!(first, second);
        assert_eq!(first.len(), 43);
        assert!(first.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn digests_and_comparison() {
        assert_eq!(digest_hex("abc").len(), 64);
        assert!(constant_time_eq("token", "token"));
        assert!(!constant_time_eq("token", "tokens"));
    }
}
