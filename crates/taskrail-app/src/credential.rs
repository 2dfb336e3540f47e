//! Durable storage for the session credential.
//!
//! The token lives in a single fixed-name file under the client data
//! directory and is mirrored in memory, so [`CredentialStore::get`] never
//! touches the filesystem. The store holds no opinion about the token's
//! validity against the backend; that is the session manager's job.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use thiserror::Error;

/// Fixed file name the credential is persisted under.
pub const CREDENTIAL_FILE: &str = "credential";

/// Failures while reading or writing the credential file.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The credential file could not be read at startup.
    #[error("failed to read credential file {path}: {source}")]
    Read {
        /// Path that failed.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// The credential file could not be written.
    #[error("failed to persist credential to {path}: {source}")]
    Write {
        /// Path that failed.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// The credential file could not be removed.
    #[error("failed to clear credential at {path}: {source}")]
    Clear {
        /// Path that failed.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
}

/// File-backed store for the current bearer token.
pub struct CredentialStore {
    path: PathBuf,
    cached: RwLock<Option<String>>,
}

impl CredentialStore {
    /// Open the store rooted at `dir`, loading any persisted token.
    ///
    /// # Errors
    /// Returns [`CredentialError::Read`] when an existing file cannot be read.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, CredentialError> {
        let path = dir.as_ref().join(CREDENTIAL_FILE);
        let cached = match fs::read_to_string(&path) {
            Ok(contents) => {
                let token = contents.trim();
                (!token.is_empty()).then(|| token.to_owned())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(source) => {
                return Err(CredentialError::Read {
                    path: path.clone(),
                    source,
                });
            }
        };
        Ok(Self {
            path,
            cached: RwLock::new(cached),
        })
    }

    /// The current token, if any. Never blocks on IO.
    #[must_use]
    pub fn get(&self) -> Option<String> {
        self.cached
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Returns true iff a token is stored, regardless of backend validity.
    #[must_use]
    pub fn has(&self) -> bool {
        self.get().is_some()
    }

    /// Overwrite and persist the token.
    ///
    /// # Errors
    /// Returns [`CredentialError::Write`] when the file cannot be written.
    pub fn set(&self, token: &str) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| CredentialError::Write {
                path: self.path.clone(),
                source,
            })?;
        }
        fs::write(&self.path, token).map_err(|source| CredentialError::Write {
            path: self.path.clone(),
            source,
        })?;
        *self
            .cached
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(token.to_owned());
        Ok(())
    }

    /// Remove the token; subsequent [`get`](Self::get) returns `None`.
    ///
    /// # Errors
    /// Returns [`CredentialError::Clear`] when the file cannot be removed.
    pub fn clear(&self) -> Result<(), CredentialError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(CredentialError::Clear {
                    path: self.path.clone(),
                    source,
                });
            }
        }
        *self
            .cached
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = None;
        Ok(())
    }
}

impl taskrail_api::TokenSource for CredentialStore {
    fn token(&self) -> Option<String> {
        self.get()
    }
}
