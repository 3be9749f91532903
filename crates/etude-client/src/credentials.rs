//! Where the bearer token lives between requests.
//!
//! [`ApiClient`](crate::ApiClient) only ever reads through
//! [`CredentialProvider`]; writing happens through [`TokenStore`], usually from
//! the sign-in helpers in [`session`](crate::session).

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::warn;

pub trait CredentialProvider: Send + Sync {
    /// Current bearer token, if one has been saved.
    fn token(&self) -> Option<String>;
}

pub trait TokenStore: CredentialProvider {
    fn save(&self, token: &str) -> std::io::Result<()>;
    fn clear(&self) -> std::io::Result<()>;
}

/// Token slot that lives for the duration of the process.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }
}

impl CredentialProvider for MemoryTokenStore {
    fn token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl TokenStore for MemoryTokenStore {
    fn save(&self, token: &str) -> std::io::Result<()> {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> std::io::Result<()> {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

/// Token slot persisted in a single file, so a session survives restarts.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialProvider for FileTokenStore {
    fn token(&self) -> Option<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => {
                let token = raw.trim();
                (!token.is_empty()).then(|| token.to_string())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!("Cannot read token file {}: {}", self.path.display(), e);
                None
            }
        }
    }
}

impl TokenStore for FileTokenStore {
    fn save(&self, token: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, token)
    }

    fn clear(&self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.token(), None);

        store.save("abc").unwrap();
        assert_eq!(store.token().as_deref(), Some("abc"));

        store.clear().unwrap();
        assert_eq!(store.token(), None);
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("token");

        let store = FileTokenStore::new(&path);
        assert_eq!(store.token(), None);
        store.save("persisted").unwrap();

        let reopened = FileTokenStore::new(&path);
        assert_eq!(reopened.token().as_deref(), Some("persisted"));

        reopened.clear().unwrap();
        assert_eq!(store.token(), None);
        // Clearing twice is fine
        reopened.clear().unwrap();
    }

    #[test]
    fn test_blank_token_file_means_no_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        std::fs::write(&path, "\n").unwrap();

        assert_eq!(FileTokenStore::new(path).token(), None);
    }
}
