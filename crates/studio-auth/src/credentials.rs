//! Credential storage for the session's access and refresh tokens
//!
//! The store is the sole holder of token values. The session client reads it
//! before every call and never caches what it read beyond that call; only
//! the refresh exchange, login and logout write to it.
//!
//! Two implementations ship with the crate: `MemoryCredentialStore` for
//! embedding and tests, and `FileCredentialStore`, which persists one session
//! as JSON using atomic temp-file + rename writes.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use common::Secret;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::envelope::TokenPair;
use crate::error::{Error, Result};

/// Boxed future returned by `CredentialStore` methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Snapshot of the stored tokens. Either half may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<Secret<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<Secret<String>>,
}

impl Credentials {
    pub fn is_empty(&self) -> bool {
        self.access.is_none() && self.refresh.is_none()
    }
}

impl From<TokenPair> for Credentials {
    fn from(pair: TokenPair) -> Self {
        Self {
            access: Some(pair.access_token),
            refresh: Some(pair.refresh_token),
        }
    }
}

/// Where the session's tokens live.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn CredentialStore>`).
pub trait CredentialStore: Send + Sync {
    /// Current tokens. Never fails: an unreadable store reads as empty.
    fn get(&self) -> StoreFuture<'_, Credentials>;

    /// Replace both tokens.
    fn set(&self, tokens: TokenPair) -> StoreFuture<'_, Result<()>>;

    /// Drop both tokens. After this returns, `get` yields empty credentials
    /// even if persisting the change failed.
    fn clear(&self) -> StoreFuture<'_, Result<()>>;
}

/// Process-local store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryCredentialStore {
    state: Mutex<Credentials>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a token pair.
    pub fn with_tokens(tokens: TokenPair) -> Self {
        Self {
            state: Mutex::new(tokens.into()),
        }
    }

    /// Store pre-seeded with arbitrary (possibly partial) credentials.
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            state: Mutex::new(credentials),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> StoreFuture<'_, Credentials> {
        Box::pin(async move { self.state.lock().await.clone() })
    }

    fn set(&self, tokens: TokenPair) -> StoreFuture<'_, Result<()>> {
        Box::pin(async move {
            *self.state.lock().await = tokens.into();
            Ok(())
        })
    }

    fn clear(&self) -> StoreFuture<'_, Result<()>> {
        Box::pin(async move {
            *self.state.lock().await = Credentials::default();
            Ok(())
        })
    }
}

/// File-backed store holding a single session.
///
/// The Mutex serializes all writes. Reads acquire the lock briefly to clone
/// the in-memory state; disk is only read once, at load.
pub struct FileCredentialStore {
    path: PathBuf,
    state: Mutex<Credentials>,
}

impl FileCredentialStore {
    /// Load the session from the given file path.
    ///
    /// A missing file is a cold start with no tokens; it is created on the
    /// first write, not here.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading credential file: {e}")))?;
            let credentials: Credentials = serde_json::from_str(&contents)
                .map_err(|e| Error::CredentialParse(format!("parsing credential file: {e}")))?;
            info!(
                path = %path.display(),
                has_access = credentials.access.is_some(),
                has_refresh = credentials.refresh.is_some(),
                "loaded session credentials"
            );
            credentials
        } else {
            info!(path = %path.display(), "credential file not found, starting signed out");
            Credentials::default()
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> StoreFuture<'_, Credentials> {
        Box::pin(async move { self.state.lock().await.clone() })
    }

    fn set(&self, tokens: TokenPair) -> StoreFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            *state = tokens.into();
            debug!("stored rotated session tokens");
            write_atomic(&self.path, &state).await
        })
    }

    fn clear(&self) -> StoreFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            *state = Credentials::default();
            debug!("cleared session tokens");
            write_atomic(&self.path, &state).await
        })
    }
}

/// Write credentials to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. Sets file permissions to 0600 (owner read/write only) since
/// the file contains session tokens.
async fn write_atomic(path: &Path, data: &Credentials) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::CredentialParse(format!("serializing credentials: {e}")))?;

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let tmp_path = dir.join(format!(".session.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp credential file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting credential file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp credential file: {e}")))?;

    debug!(path = %path.display(), "persisted credentials");
    Ok(())
}
