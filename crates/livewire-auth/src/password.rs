//! Password hashing.
//!
//! bcrypt is deliberately slow, so both operations run on the blocking
//! pool instead of stalling a runtime worker.

use crate::AuthError;

/// bcrypt tuning.
#[derive(Debug, Clone, Copy)]
pub struct PasswordConfig {
    /// Work factor. Default: [`bcrypt::DEFAULT_COST`].
    pub cost: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            cost: bcrypt::DEFAULT_COST,
        }
    }
}

/// Hashes `password` with the given bcrypt cost.
///
/// # Errors
/// [`AuthError::Hashing`] if bcrypt rejects the input or the blocking task
/// fails.
pub async fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))?
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Checks `password` against a stored bcrypt hash.
///
/// A mismatch is `Ok(false)`. A hash that cannot be parsed is an error.
pub async fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let password = password.to_owned();
    let hash = hash.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))?
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimum cost bcrypt accepts; keeps the tests fast.
    const TEST_COST: u32 = 4;

    #[tokio::test]
    async fn test_hash_then_verify_matches() {
        let hash = hash_password("hunter22", TEST_COST).await.unwrap();

        assert_ne!(hash, "hunter22");
        assert!(verify_password("hunter22", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_verify_wrong_password_is_false() {
        let hash = hash_password("hunter22", TEST_COST).await.unwrap();

        assert!(!verify_password("hunter23", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_hash_is_salted() {
        let a = hash_password("same", TEST_COST).await.unwrap();
        let b = hash_password("same", TEST_COST).await.unwrap();

        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_verify_garbage_hash_is_error() {
        let result = verify_password("pw", "not-a-bcrypt-hash").await;

        assert!(matches!(result, Err(AuthError::Hashing(_))));
    }

    #[tokio::test]
    async fn test_hash_invalid_cost_is_error() {
        let result = hash_password("pw", 1).await;

        assert!(matches!(result, Err(AuthError::Hashing(_))));
    }
}
