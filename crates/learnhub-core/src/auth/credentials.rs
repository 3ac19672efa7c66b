//! Durable storage for the single session token.
//!
//! Every backend holds at most one raw token string. Writes replace the
//! whole value; absence of a value means "logged out".

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{Context, Result};
use keyring::Entry;
use tracing::debug;

/// Keychain service name for stored tokens
pub const SERVICE_NAME: &str = "learnhub";

/// Token file name in the cache directory
const TOKEN_FILE: &str = "token";

pub trait CredentialStore: Send + Sync {
    /// Read the stored token, `None` when nothing is stored.
    fn load(&self) -> Result<Option<String>>;

    /// Replace the stored token.
    fn save(&self, token: &str) -> Result<()>;

    /// Remove the stored token. Succeeds when nothing is stored.
    fn clear(&self) -> Result<()>;
}

/// Token kept in the OS keychain.
pub struct KeyringCredentialStore {
    account: String,
}

impl KeyringCredentialStore {
    /// `account` scopes the token, normally the API host so that two servers
    /// never share a token.
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &self.account).context("Failed to create keyring entry")
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn load(&self) -> Result<Option<String>> {
        match self.entry()?.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve token from keychain"),
        }
    }

    fn save(&self, token: &str) -> Result<()> {
        self.entry()?
            .set_password(token)
            .context("Failed to store token in keychain")
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete token from keychain"),
        }
    }
}

/// Token kept in a plain file, for systems without a keychain.
pub struct FileCredentialStore {
    cache_dir: PathBuf,
}

impl FileCredentialStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    fn token_path(&self) -> PathBuf {
        self.cache_dir.join(TOKEN_FILE)
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<String>> {
        let path = self.token_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read token file")?;
        let token = contents.trim();
        if token.is_empty() {
            Ok(None)
        } else {
            Ok(Some(token.to_string()))
        }
    }

    fn save(&self, token: &str) -> Result<()> {
        std::fs::create_dir_all(&self.cache_dir).context("Failed to create cache directory")?;
        // Write-then-rename so a reader never sees a half-written token
        let path = self.token_path();
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, token).context("Failed to write token file")?;
        std::fs::rename(&tmp, &path).context("Failed to replace token file")?;
        debug!(path = %path.display(), "Token saved");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let path = self.token_path();
        if path.exists() {
            std::fs::remove_file(&path).context("Failed to remove token file")?;
        }
        Ok(())
    }
}

/// Process-lifetime token storage. Counts writes so callers can observe
/// how many times a session was persisted or torn down.
#[derive(Default)]
pub struct MemoryCredentialStore {
    token: Mutex<Option<String>>,
    saves: AtomicUsize,
    clears: AtomicUsize,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
            ..Self::default()
        }
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    fn cell(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.token.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.cell().clone())
    }

    fn save(&self, token: &str) -> Result<()> {
        *self.cell() = Some(token.to_string());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.cell() = None;
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_roundtrip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("learnhub"));

        assert_eq!(store.load().unwrap(), None);

        store.save("tok123").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("tok123"));

        store.save("tok456").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("tok456"));
        assert!(!dir.path().join("learnhub").join("token.tmp").exists());

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        // Clearing twice is fine
        store.clear().unwrap();
    }

    #[test]
    fn test_file_store_ignores_blank_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(TOKEN_FILE), "  \n").unwrap();
        let store = FileCredentialStore::new(dir.path().to_path_buf());
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_memory_store_counts_writes() {
        let store = MemoryCredentialStore::with_token("abc");
        assert_eq!(store.load().unwrap().as_deref(), Some("abc"));

        store.save("def").unwrap();
        store.clear().unwrap();
        store.clear().unwrap();

        assert_eq!(store.load().unwrap(), None);
        assert_eq!(store.saves(), 1);
        assert_eq!(store.clears(), 2);
    }
}
