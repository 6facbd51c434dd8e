//! The closed set of supported hashing algorithms.
//! Identifiers are stable: they are used for menu selection and every stored
//! credential is tagged with the algorithm's persisted name.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::passwords::HashError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HashingAlgorithm {
    Md5,
    Sha512,
    Pbkdf2,
    Argon2,
    Bcrypt,
    Scrypt,
}

impl HashingAlgorithm {
    /// Every algorithm in menu order.
    pub const ALL: [HashingAlgorithm; 6] = [
        HashingAlgorithm::Md5,
        HashingAlgorithm::Sha512,
        HashingAlgorithm::Pbkdf2,
        HashingAlgorithm::Argon2,
        HashingAlgorithm::Bcrypt,
        HashingAlgorithm::Scrypt,
    ];

    /// Menu identifier, 1-indexed.
    pub fn id(self) -> u8 {
        match self {
            HashingAlgorithm::Md5 => 1,
            HashingAlgorithm::Sha512 => 2,
            HashingAlgorithm::Pbkdf2 => 3,
            HashingAlgorithm::Argon2 => 4,
            HashingAlgorithm::Bcrypt => 5,
            HashingAlgorithm::Scrypt => 6,
        }
    }

    /// Looks up an algorithm by menu identifier. Anything outside 1..=6 is
    /// rejected before any hashing can happen.
    pub fn from_id(id: u8) -> Result<Self, HashError> {
        Self::ALL
            .into_iter()
            .find(|algorithm| algorithm.id() == id)
            .ok_or_else(|| HashError::UnsupportedAlgorithm(format!("id {id}")))
    }

    /// Name written alongside every stored credential.
    pub fn name(self) -> &'static str {
        match self {
            HashingAlgorithm::Md5 => "MD5",
            HashingAlgorithm::Sha512 => "SHA512",
            HashingAlgorithm::Pbkdf2 => "PBKDF2",
            HashingAlgorithm::Argon2 => "ARGON2",
            HashingAlgorithm::Bcrypt => "BCRYPT",
            HashingAlgorithm::Scrypt => "SCRYPT",
        }
    }

    /// Parses a persisted name, ignoring ASCII case.
    pub fn from_name(name: &str) -> Result<Self, HashError> {
        let trimmed = name.trim();
        Self::ALL
            .into_iter()
            .find(|algorithm| algorithm.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| HashError::UnsupportedAlgorithm(trimmed.to_string()))
    }

    /// Accepts either a menu identifier or a persisted name.
    pub fn from_selector(selector: &str) -> Result<Self, HashError> {
        let trimmed = selector.trim();
        if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return trimmed
                .parse::<u8>()
                .map_err(|_| HashError::UnsupportedAlgorithm(format!("id {trimmed}")))
                .and_then(Self::from_id);
        }
        Self::from_name(trimmed)
    }

    /// Human-facing label used in the selection menu.
    pub fn label(self) -> &'static str {
        match self {
            HashingAlgorithm::Md5 => "MD5",
            HashingAlgorithm::Sha512 => "SHA-512",
            HashingAlgorithm::Pbkdf2 => "PBKDF2",
            HashingAlgorithm::Argon2 => "Argon2",
            HashingAlgorithm::Bcrypt => "bcrypt",
            HashingAlgorithm::Scrypt => "scrypt",
        }
    }

    /// The numbered selection menu, one entry per line.
    pub fn menu() -> String {
        Self::ALL
            .iter()
            .map(|algorithm| format!("{}. {}", algorithm.id(), algorithm.label()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for HashingAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashingAlgorithm {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl TryFrom<u8> for HashingAlgorithm {
    type Error = HashError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Self::from_id(id)
    }
}

impl TryFrom<String> for HashingAlgorithm {
    type Error = HashError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Self::from_name(&name)
    }
}

impl From<HashingAlgorithm> for String {
    fn from(algorithm: HashingAlgorithm) -> Self {
        algorithm.name().to_string()
    }
}
