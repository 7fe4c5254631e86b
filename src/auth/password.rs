//! Password hashing with Argon2id.

use crate::error::{EshtarekError, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        PasswordHash, PasswordHasher as Argon2Hasher, PasswordVerifier, SaltString,
        rand_core::OsRng,
    },
};

/// Argon2id cost parameters.
#[derive(Clone, Debug)]
pub struct PasswordConfig {
    /// Memory cost in KiB (default: 19456 = 19MB)
    pub memory_cost: u32,
    /// Time cost / iterations (default: 2)
    pub time_cost: u32,
    /// Parallelism (default: 1)
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        // OWASP recommended minimum for Argon2id
        Self {
            memory_cost: 19 * 1024,
            time_cost: 2,
            parallelism: 1,
        }
    }
}

impl PasswordConfig {
    /// Cheap parameters for tests and local development. Never use in production.
    pub fn fast() -> Self {
        Self {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }
}

/// Hashes and verifies passwords.
#[derive(Clone, Default)]
pub struct PasswordHasher {
    config: PasswordConfig,
}

impl PasswordHasher {
    pub fn new(config: PasswordConfig) -> Self {
        Self { config }
    }

    /// Hash a password, returning the PHC string (algorithm, params, salt and hash).
    pub fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = self.build_argon2()?;

        argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| EshtarekError::internal(format!("Password hashing failed: {}", e)))
    }

    /// Verify a password against a stored PHC hash.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| EshtarekError::internal(format!("Invalid password hash format: {}", e)))?;

        // params come from the PHC string
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    fn build_argon2(&self) -> Result<Argon2<'static>> {
        let params = Params::new(
            self.config.memory_cost,
            self.config.time_cost,
            self.config.parallelism,
            None,
        )
        .map_err(|e| EshtarekError::internal(format!("Invalid Argon2 params: {}", e)))?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hasher = PasswordHasher::new(PasswordConfig::fast());
        let hash = hasher.hash("s3cret!").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("s3cret!", &hash).unwrap());
        assert!(!hasher.verify("wrong", &hash).unwrap());
    }

    #[test]
    fn test_salts_differ() {
        let hasher = PasswordHasher::new(PasswordConfig::fast());
        assert_ne!(hasher.hash("same").unwrap(), hasher.hash("same").unwrap());
    }

    #[test]
    fn test_garbage_hash_is_an_error() {
        let hasher = PasswordHasher::new(PasswordConfig::fast());
        assert!(hasher.verify("x", "not-a-phc-string").is_err());
    }
}
