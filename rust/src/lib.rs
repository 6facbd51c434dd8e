//! Credential hashing and verification for a username/password store.
//! A single hashing core covers six algorithms with very different salt and
//! output conventions, so the store only ever deals in hex strings.

pub mod auth;
pub mod config;
pub mod crypto;
pub mod store;

pub use crypto::algorithm::HashingAlgorithm;
pub use crypto::passwords::{hash, verify, Credential, HashError};
