//! Central cryptography module for credential hashing. The algorithm table,
//! the per-algorithm adapters, and the hash/verify contract each live in their
//! own submodule so the dispatch stays easy to audit.

pub mod adapters;
pub mod algorithm;
pub mod passwords;
