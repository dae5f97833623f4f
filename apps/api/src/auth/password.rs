use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};

use super::AuthError;
use crate::errors::AppError;

/// Hashes a password into an Argon2id PHC string with a random salt.
pub fn hash_password(plain: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Returns `Ok(false)` on mismatch and an error only for malformed hashes.
pub fn verify_password(plain: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|e| AuthError::Hashing(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Runs `hash_password` on the blocking pool; Argon2 is deliberately slow.
pub async fn hash_password_async(plain: String) -> Result<String, AppError> {
    let hashed = tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .map_err(|e| AppError::Internal(e.into()))??;
    Ok(hashed)
}

pub async fn verify_password_async(plain: String, hash: String) -> Result<bool, AppError> {
    let ok = tokio::task::spawn_blocking(move || verify_password(&plain, &hash))
        .await
        .map_err(|e| AppError::Internal(e.into()))??;
    Ok(ok)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify() {
        let hash = hash_password("hunter22!").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter22!", &hash).unwrap());
        assert!(!verify_password("hunter23!", &hash).unwrap());
    }

    #[test]
    fn test_salts_differ() {
        let a = hash_password("same password").unwrap();
        let b = hash_password("same password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash_is_error() {
        assert!(verify_password("x", "not-a-phc-string").is_err());
    }

    #[tokio::test]
    async fn test_async_wrappers() {
        let hash = hash_password_async("async secret".into()).await.unwrap();
        assert!(verify_password_async("async secret".into(), hash).await.unwrap());
    }
}
