//! Salted password hashing (bcrypt).
//!
//! Hashing is deliberately slow; async callers should run it on a blocking
//! thread.

use thiserror::Error;

/// A bcrypt hash string (`$2b$<cost>$<salt+digest>`).
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Wrap a hash loaded from storage. No verification is performed.
    pub fn from_stored(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("PasswordHash(<redacted>)")
    }
}

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(#[source] bcrypt::BcryptError),

    #[error("stored password hash is unreadable: {0}")]
    CorruptHash(#[source] bcrypt::BcryptError),
}

/// bcrypt hasher with a fixed work factor.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    pub fn hash(&self, password: &str) -> Result<PasswordHash, PasswordError> {
        bcrypt::hash(password, self.cost)
            .map(PasswordHash)
            .map_err(PasswordError::Hash)
    }

    /// `Ok(false)` on mismatch; `Err` only when the stored hash cannot be parsed.
    pub fn verify(&self, password: &str, hash: &PasswordHash) -> Result<bool, PasswordError> {
        bcrypt::verify(password, hash.as_str()).map_err(PasswordError::CorruptHash)
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}
