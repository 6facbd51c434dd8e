//! The hash/verify contract shared by every algorithm.
//! `hash` always returns lowercase hex for both digest and salt, so stored
//! credentials look the same no matter which algorithm produced them.

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, warn};

use super::adapters;
use super::algorithm::HashingAlgorithm;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("unsupported hashing algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("password must not be empty")]
    EmptyPassword,
    #[error("{algorithm} needs a salt of at least {minimum} bytes, got {actual}")]
    SaltTooShort {
        algorithm: HashingAlgorithm,
        minimum: usize,
        actual: usize,
    },
    #[error("invalid salt: {0}")]
    InvalidSalt(String),
    #[error("random source failed: {0}")]
    RandomSource(String),
    #[error("{algorithm} hashing failed: {reason}")]
    Primitive {
        algorithm: HashingAlgorithm,
        reason: String,
    },
}

impl HashError {
    /// `true` for an algorithm selector outside the supported set; every other
    /// variant is a failure of the hashing itself.
    pub fn is_unsupported_algorithm(&self) -> bool {
        matches!(self, HashError::UnsupportedAlgorithm(_))
    }
}

/// A stored, verifiable secret: which algorithm ran, and its hex digest and salt.
/// Credentials are never edited in place; a password change builds a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub algorithm: HashingAlgorithm,
    pub digest: String,
    pub salt: String,
}

impl Credential {
    /// Hashes `password` under a freshly generated salt.
    pub fn create(password: &str, algorithm: HashingAlgorithm) -> Result<Self, HashError> {
        let (digest, salt) = hash(password, None, algorithm)?;
        Ok(Self {
            algorithm,
            digest,
            salt,
        })
    }

    /// Rebuilds a credential from its three stored text columns.
    pub fn from_columns(algorithm: &str, digest: &str, salt: &str) -> Result<Self, HashError> {
        Ok(Self {
            algorithm: HashingAlgorithm::from_name(algorithm)?,
            digest: digest.to_string(),
            salt: salt.to_string(),
        })
    }

    /// Raw salt bytes, decoded from the stored hex.
    pub fn salt_bytes(&self) -> Result<Vec<u8>, HashError> {
        hex::decode(&self.salt)
            .map_err(|e| HashError::InvalidSalt(format!("salt is not hex: {e}")))
    }

    /// Shorthand for [`verify`].
    pub fn matches(&self, attempted_password: &str) -> bool {
        verify(self, attempted_password)
    }
}

/// Hashes `password` with `algorithm` and returns `(digest_hex, salt_hex)`.
///
/// A supplied salt is used verbatim. Without one, bcrypt generates its own
/// encoded salt and every other algorithm gets 16 random bytes.
pub fn hash(
    password: &str,
    salt: Option<&[u8]>,
    algorithm: HashingAlgorithm,
) -> Result<(String, String), HashError> {
    if password.is_empty() {
        return Err(HashError::EmptyPassword);
    }

    let salt = match salt {
        Some(salt) => salt.to_vec(),
        None => adapters::generate_salt(algorithm)?,
    };

    debug!(algorithm = %algorithm, salt_len = salt.len(), "dispatching password hash");
    let digest = adapters::adapter_for(algorithm)(password.as_bytes(), &salt)?;
    if digest.is_empty() {
        return Err(HashError::Primitive {
            algorithm,
            reason: "no digest produced".to_string(),
        });
    }

    Ok((hex::encode(digest.as_slice()), hex::encode(&salt)))
}

/// Re-derives the digest for `attempted_password` using the credential's own
/// algorithm and salt, then compares in constant time.
/// Any failure along the way is reported as a mismatch.
pub fn verify(stored: &Credential, attempted_password: &str) -> bool {
    let salt = match stored.salt_bytes() {
        Ok(salt) => salt,
        Err(err) => {
            warn!(
                algorithm = %stored.algorithm,
                error = %err,
                "stored credential has an unreadable salt"
            );
            return false;
        }
    };

    match hash(attempted_password, Some(&salt), stored.algorithm) {
        Ok((digest, _)) => digest.as_bytes().ct_eq(stored.digest.as_bytes()).into(),
        Err(err) => {
            warn!(
                algorithm = %stored.algorithm,
                error = %err,
                "could not re-derive digest during verification"
            );
            false
        }
    }
}
