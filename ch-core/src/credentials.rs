//! Bearer-token storage and the credential-provider seam.
//!
//! The hub attaches a bearer token to every connection attempt, including
//! each automatic reconnection. The token is therefore exposed through a
//! provider trait that is consulted fresh on every attempt rather than a
//! value captured once: a token refreshed elsewhere in the application is
//! picked up on the next reconnect without restarting the client.

use std::path::PathBuf;

use tracing::debug;

use crate::constants;
use crate::error::HubResult;
use crate::platform::Platform;

/// Source of the current bearer token for hub authentication.
///
/// Implementations must return the token as it is *now*; callers re-query
/// on every connection attempt. `None` means no credential is available,
/// which fails `connect()` with an authentication error.
pub trait TokenProvider: Send + Sync {
    /// The current access token, if any.
    fn access_token(&self) -> Option<String>;
}

/// File-backed token store under the platform data directory.
///
/// Reads the token file on every `access_token()` call. Whitespace is
/// trimmed; an empty or missing file yields `None`.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Create a store at the default token path.
    pub fn open_default() -> HubResult<Self> {
        let path = Platform::data_dir()?.join(constants::TOKEN_FILE_NAME);
        Ok(Self { path })
    }

    /// Create a store at a specific path.
    pub fn at_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Persist a new token, creating parent directories as needed.
    pub fn save(&self, token: &str) -> HubResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, token.trim())?;
        debug!("token saved to {}", self.path.display());
        Ok(())
    }

    /// Remove the stored token. Missing file is not an error.
    pub fn clear(&self) -> HubResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Path of the underlying token file.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl TokenProvider for TokenStore {
    fn access_token(&self) -> Option<String> {
        let contents = std::fs::read_to_string(&self.path).ok()?;
        let token = contents.trim();
        if token.is_empty() {
            None
        } else {
            Some(token.to_string())
        }
    }
}

/// Fixed in-memory token, for tests and one-shot CLI invocations.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: Option<String>,
}

impl StaticTokenProvider {
    /// Provider that always yields the given token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    /// Provider that never yields a token.
    pub fn empty() -> Self {
        Self { token: None }
    }
}

impl TokenProvider for StaticTokenProvider {
    fn access_token(&self) -> Option<String> {
        self.token.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::at_path(dir.path().join("auth_token"));

        assert!(store.access_token().is_none());

        store.save("  abc.def.ghi \n").unwrap();
        assert_eq!(store.access_token().as_deref(), Some("abc.def.ghi"));

        store.clear().unwrap();
        assert!(store.access_token().is_none());
        // Clearing again is a no-op.
        store.clear().unwrap();
    }

    #[test]
    fn test_store_rereads_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::at_path(dir.path().join("auth_token"));

        store.save("first").unwrap();
        assert_eq!(store.access_token().as_deref(), Some("first"));

        // A refresh written by another component is visible immediately.
        store.save("second").unwrap();
        assert_eq!(store.access_token().as_deref(), Some("second"));
    }

    #[test]
    fn test_empty_file_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::at_path(dir.path().join("auth_token"));
        store.save("   ").unwrap();
        assert!(store.access_token().is_none());
    }

    #[test]
    fn test_static_provider() {
        assert_eq!(
            StaticTokenProvider::new("tok").access_token().as_deref(),
            Some("tok")
        );
        assert!(StaticTokenProvider::empty().access_token().is_none());
    }
}
