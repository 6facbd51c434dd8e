//! Registration, login and password changes on top of a [`CredentialStore`].
//! Verification always runs the algorithm recorded on the stored credential;
//! it never tries the other algorithms.

use thiserror::Error;
use tracing::{info, warn};

use crate::crypto::algorithm::HashingAlgorithm;
use crate::crypto::passwords::{self, Credential, HashError};
use crate::store::{CredentialStore, StoreError, User};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("username must not be empty")]
    EmptyUsername,
    #[error("username `{0}` is already taken")]
    UsernameTaken(String),
    #[error("incorrect username or password")]
    InvalidCredentials,
    #[error(transparent)]
    Hash(#[from] HashError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Success,
    Failure,
}

impl LoginOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, LoginOutcome::Success)
    }

    /// The only text a user ever sees for a login attempt.
    pub fn message(self) -> &'static str {
        match self {
            LoginOutcome::Success => "login successful",
            LoginOutcome::Failure => "incorrect password",
        }
    }
}

pub struct Authenticator<S> {
    store: S,
    dummy_algorithm: HashingAlgorithm,
}

impl<S: CredentialStore> Authenticator<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            dummy_algorithm: HashingAlgorithm::Argon2,
        }
    }

    /// Sets the algorithm for the throwaway hash run when a login names no
    /// usable user. It should match what most stored records use, so a miss
    /// costs about as much as a wrong password.
    pub fn with_dummy_algorithm(mut self, algorithm: HashingAlgorithm) -> Self {
        self.dummy_algorithm = algorithm;
        self
    }

    pub fn dummy_algorithm(&self) -> HashingAlgorithm {
        self.dummy_algorithm
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Creates a user with a freshly salted credential.
    pub fn register(
        &mut self,
        username: &str,
        password: &str,
        algorithm: HashingAlgorithm,
    ) -> Result<User, AuthError> {
        let username = normalize_username(username)?;
        if self.store.find_by_username(username)?.is_some() {
            return Err(AuthError::UsernameTaken(username.to_string()));
        }

        let user = User::new(username, Credential::create(password, algorithm)?);
        self.store.insert(user.clone()).map_err(|err| match err {
            StoreError::DuplicateUser(name) => AuthError::UsernameTaken(name),
            other => AuthError::Store(other),
        })?;
        info!(username, algorithm = %algorithm, "registered user");
        Ok(user)
    }

    /// Checks a login attempt. Unknown users, wrong passwords, corrupt rows and
    /// store failures all come back as [`LoginOutcome::Failure`].
    pub fn login(&self, username: &str, password: &str) -> LoginOutcome {
        let stored = match self.store.find_by_username(username.trim()) {
            Ok(Some(user)) => user,
            Ok(None) => {
                burn_dummy_hash(password, self.dummy_algorithm);
                return LoginOutcome::Failure;
            }
            Err(err) => {
                warn!(error = %err, "credential lookup failed during login");
                burn_dummy_hash(password, self.dummy_algorithm);
                return LoginOutcome::Failure;
            }
        };

        if passwords::verify(&stored.credential, password) {
            LoginOutcome::Success
        } else {
            LoginOutcome::Failure
        }
    }

    /// Replaces the user's password, hashing it with `algorithm`.
    pub fn change_password(
        &mut self,
        username: &str,
        new_password: &str,
        algorithm: HashingAlgorithm,
    ) -> Result<User, AuthError> {
        let username = normalize_username(username)?;
        let user = User::new(username, Credential::create(new_password, algorithm)?);
        self.store.update(user.clone())?;
        info!(username, algorithm = %algorithm, "password changed");
        Ok(user)
    }

    /// Re-hashes the current password under a different algorithm. The current
    /// password must verify against the stored credential first.
    pub fn rehash(
        &mut self,
        username: &str,
        current_password: &str,
        algorithm: HashingAlgorithm,
    ) -> Result<User, AuthError> {
        if !self.login(username, current_password).is_success() {
            return Err(AuthError::InvalidCredentials);
        }
        self.change_password(username, current_password, algorithm)
    }

    /// Drops a user row, returning whether it existed.
    pub fn remove(&mut self, username: &str) -> Result<bool, AuthError> {
        Ok(self.store.delete(username.trim())?)
    }
}

fn normalize_username(username: &str) -> Result<&str, AuthError> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        return Err(AuthError::EmptyUsername);
    }
    Ok(trimmed)
}

fn burn_dummy_hash(password: &str, algorithm: HashingAlgorithm) {
    if !password.is_empty() {
        let _ = passwords::hash(password, None, algorithm);
    }
}
