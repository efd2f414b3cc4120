//! Credential placeholders for imported users.
//!
//! Directory-authenticated users never log in with a local password, but the
//! local tables require one. Each created user gets a long random secret that
//! is hashed immediately and never shown.

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;

pub mod argon2_hasher;
pub mod bcrypt_hasher;

pub use argon2_hasher::Argon2idHasher;
pub use bcrypt_hasher::BcryptHasher;

/// Length of the random secret behind a placeholder
const PLACEHOLDER_LENGTH: usize = 40;

/// Password hashing algorithm types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordAlgorithm {
    Bcrypt,
    /// Argon2id, OWASP recommended
    #[default]
    Argon2id,
}

impl std::fmt::Display for PasswordAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bcrypt => write!(f, "bcrypt"),
            Self::Argon2id => write!(f, "Argon2id"),
        }
    }
}

/// Abstract trait for password hashing algorithms
pub trait PasswordHasher: Send + Sync {
    fn hash_password(&self, password: &str) -> AppResult<String>;

    fn algorithm(&self) -> PasswordAlgorithm;
}

/// Produces hashed random credentials for newly created users
pub struct CredentialGenerator {
    hasher: Box<dyn PasswordHasher>,
}

impl CredentialGenerator {
    pub fn new(algorithm: PasswordAlgorithm, bcrypt_cost: Option<u32>) -> AppResult<Self> {
        let hasher: Box<dyn PasswordHasher> = match algorithm {
            PasswordAlgorithm::Argon2id => Box::new(Argon2idHasher::new()?),
            PasswordAlgorithm::Bcrypt => match bcrypt_cost {
                Some(cost) => Box::new(BcryptHasher::with_cost(cost)?),
                None => Box::new(BcryptHasher::new()),
            },
        };
        Ok(Self { hasher })
    }

    pub fn algorithm(&self) -> PasswordAlgorithm {
        self.hasher.algorithm()
    }

    /// A freshly generated random secret, hashed
    pub fn generate_placeholder(&self) -> AppResult<String> {
        self.hasher
            .hash_password(&random_secret(PLACEHOLDER_LENGTH))
    }
}

impl std::fmt::Debug for CredentialGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialGenerator")
            .field("algorithm", &self.hasher.algorithm())
            .finish()
    }
}

fn random_secret(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}
