//! User rows and the stores that persist them.
//! A row carries only the username and its credential; plaintext passwords
//! exist only for the duration of a single hash or verify call.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::crypto::passwords::{Credential, HashError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user `{0}` already exists")]
    DuplicateUser(String),
    #[error("user `{0}` does not exist")]
    UnknownUser(String),
    #[error("store file unreadable: {0}")]
    Io(String),
    #[error("store file parse failed: {0}")]
    Parse(String),
    #[error("stored row for `{username}` is invalid: {source}")]
    InvalidRow {
        username: String,
        #[source]
        source: HashError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
    pub credential: Credential,
}

impl User {
    pub fn new(username: impl Into<String>, credential: Credential) -> Self {
        Self {
            username: username.into(),
            credential,
        }
    }
}

/// Lookup and mutation of user rows, keyed by username.
pub trait CredentialStore {
    fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Adds a new row; fails with [`StoreError::DuplicateUser`] if the name is taken.
    fn insert(&mut self, user: User) -> Result<(), StoreError>;

    /// Replaces an existing row; fails with [`StoreError::UnknownUser`] otherwise.
    fn update(&mut self, user: User) -> Result<(), StoreError>;

    /// Removes a row, returning whether it existed.
    fn delete(&mut self, username: &str) -> Result<bool, StoreError>;
}

/// In-process store, mostly useful for tests and one-shot tooling.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: BTreeMap<String, Credential>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl CredentialStore for MemoryStore {
    fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .get(username)
            .map(|credential| User::new(username, credential.clone())))
    }

    fn insert(&mut self, user: User) -> Result<(), StoreError> {
        if self.users.contains_key(&user.username) {
            return Err(StoreError::DuplicateUser(user.username));
        }
        self.users.insert(user.username, user.credential);
        Ok(())
    }

    fn update(&mut self, user: User) -> Result<(), StoreError> {
        match self.users.get_mut(&user.username) {
            Some(credential) => {
                *credential = user.credential;
                Ok(())
            }
            None => Err(StoreError::UnknownUser(user.username)),
        }
    }

    fn delete(&mut self, username: &str) -> Result<bool, StoreError> {
        Ok(self.users.remove(username).is_some())
    }
}

/// On-disk row layout: three plain text columns next to the username.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserRow {
    username: String,
    hashing_algorithm: String,
    hashed_password: String,
    salt: String,
}

impl UserRow {
    fn from_user(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            hashing_algorithm: user.credential.algorithm.name().to_string(),
            hashed_password: user.credential.digest.clone(),
            salt: user.credential.salt.clone(),
        }
    }

    fn into_user(self) -> Result<User, StoreError> {
        let credential =
            Credential::from_columns(&self.hashing_algorithm, &self.hashed_password, &self.salt)
                .map_err(|source| StoreError::InvalidRow {
                    username: self.username.clone(),
                    source,
                })?;
        Ok(User::new(self.username, credential))
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct UserTable {
    users: Vec<UserRow>,
}

/// JSON file holding a single user table. Opening a missing file starts an
/// empty table; each mutation rewrites the whole file via a temp file and rename.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    rows: BTreeMap<String, UserRow>,
}

impl JsonFileStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            debug!(path = %path.display(), "credential store missing, starting empty table");
            return Ok(Self {
                path,
                rows: BTreeMap::new(),
            });
        }

        let raw_json = fs::read_to_string(&path).map_err(|e| StoreError::Io(format!("{e}")))?;
        let table: UserTable =
            serde_json::from_str(&raw_json).map_err(|e| StoreError::Parse(format!("{e}")))?;

        let mut rows = BTreeMap::new();
        for row in table.users {
            if rows.contains_key(&row.username) {
                return Err(StoreError::Parse(format!(
                    "duplicate row for `{}`",
                    row.username
                )));
            }
            rows.insert(row.username.clone(), row);
        }
        debug!(path = %path.display(), users = rows.len(), "credential store loaded");
        Ok(Self { path, rows })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), StoreError> {
        let table = UserTable {
            users: self.rows.values().cloned().collect(),
        };
        let json =
            serde_json::to_vec_pretty(&table).map_err(|e| StoreError::Parse(format!("{e}")))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::Io(format!("{e}")))?;
        }
        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);
        fs::write(&tmp_path, json).map_err(|e| StoreError::Io(format!("{e}")))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Io(format!("{e}")))?;
        Ok(())
    }
}

impl CredentialStore for JsonFileStore {
    fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.rows
            .get(username)
            .cloned()
            .map(UserRow::into_user)
            .transpose()
    }

    fn insert(&mut self, user: User) -> Result<(), StoreError> {
        if self.rows.contains_key(&user.username) {
            return Err(StoreError::DuplicateUser(user.username));
        }
        self.rows.insert(user.username.clone(), UserRow::from_user(&user));
        self.persist()
    }

    fn update(&mut self, user: User) -> Result<(), StoreError> {
        match self.rows.get_mut(&user.username) {
            Some(row) => *row = UserRow::from_user(&user),
            None => return Err(StoreError::UnknownUser(user.username)),
        }
        self.persist()
    }

    fn delete(&mut self, username: &str) -> Result<bool, StoreError> {
        if self.rows.remove(username).is_none() {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::algorithm::HashingAlgorithm;
    use tempfile::tempdir;

    fn sample_user(name: &str) -> User {
        User::new(
            name,
            Credential {
                algorithm: HashingAlgorithm::Sha512,
                digest: "aa".repeat(64),
                salt: "bb".repeat(16),
            },
        )
    }

    #[test]
    fn memory_store_enforces_row_rules() {
        let mut store = MemoryStore::new();
        store.insert(sample_user("alice")).unwrap();
        assert!(matches!(store.insert(sample_user("alice")), Err(StoreError::DuplicateUser(_))));
        assert!(matches!(store.update(sample_user("bob")), Err(StoreError::UnknownUser(_))));
        assert_eq!(store.find_by_username("alice").unwrap(), Some(sample_user("alice")));
        assert!(store.delete("alice").unwrap());
        assert!(!store.delete("alice").unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn json_store_survives_reopen() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("users.json");

        let mut store = JsonFileStore::open(&path).expect("missing file opens empty");
        assert!(store.find_by_username("alice").unwrap().is_none());
        store.insert(sample_user("alice")).unwrap();

        let mut updated = sample_user("alice");
        updated.credential.algorithm = HashingAlgorithm::Md5;
        store.update(updated.clone()).unwrap();

        let reopened = JsonFileStore::open(&path).expect("store reopens");
        assert_eq!(reopened.find_by_username("alice").unwrap(), Some(updated));
    }

    #[test]
    fn json_rows_use_plain_text_columns() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("users.json");
        let mut store = JsonFileStore::open(&path).unwrap();
        store.insert(sample_user("alice")).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let row = &raw["users"][0];
        assert_eq!(row["username"], "alice");
        assert_eq!(row["hashing_algorithm"], "SHA512");
        assert_eq!(row["salt"], "bb".repeat(16));
        assert!(row.get("password").is_none());
    }

    #[test]
    fn rejects_rows_with_unknown_algorithms() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("users.json");
        fs::write(
            &path,
            r#"{"users":[{"username":"mallory","hashing_algorithm":"ROT13",
                "hashed_password":"00","salt":"00"}]}"#,
        )
        .unwrap();

        let store = JsonFileStore::open(&path).unwrap();
        let err = store.find_by_username("mallory").unwrap_err();
        assert!(matches!(err, StoreError::InvalidRow { .. }));
    }
}
