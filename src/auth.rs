//! Basic-auth credential store.
//!
//! Reads the pushgateway web config format (`basic_auth_users: {name: bcrypt}`)
//! into an immutable directory shared by every request.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Failed to read auth file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse auth file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Default, Deserialize)]
struct AuthFile {
    #[serde(default)]
    basic_auth_users: HashMap<String, String>,
}

/// Username → bcrypt hash lookup.
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    users: HashMap<String, String>,
}

impl UserDirectory {
    pub fn from_hashes<I, K, V>(users: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            users: users
                .into_iter()
                .map(|(name, hash)| (name.into(), hash.into()))
                .collect(),
        }
    }

    pub fn parse(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let file: AuthFile = serde_yaml::from_str(content)?;
        Ok(Self {
            users: file.basic_auth_users,
        })
    }

    pub fn load(path: &Path) -> Result<Self, AuthError> {
        let content = std::fs::read_to_string(path).map_err(|source| AuthError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let directory = Self::parse(&content).map_err(|source| AuthError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if directory.is_empty() {
            tracing::warn!(path = %path.display(), "Auth file lists no users, every request will be rejected");
        }
        tracing::info!(path = %path.display(), users = directory.len(), "Loaded basic auth users");
        Ok(directory)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Whether `password` matches the stored hash for `username`.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        let Some(hash) = self.users.get(username) else {
            return false;
        };
        match bcrypt::verify(password, hash) {
            Ok(valid) => valid,
            Err(e) => {
                tracing::warn!(user = username, error = %e, "Stored password hash is not valid bcrypt");
                false
            }
        }
    }
}
