use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use keyring::Entry;

/// Keychain service name for the session token slot
const SERVICE_NAME: &str = "recipebox";

/// Keychain account key holding the bearer token
const TOKEN_KEY: &str = "session-token";

/// A single durable slot for the current bearer token.
///
/// A missing entry is not an error: `load` returns `Ok(None)` and `delete`
/// succeeds without doing anything.
pub trait TokenStorage: Send + Sync {
    fn load(&self) -> Result<Option<String>>;
    fn store(&self, token: &str) -> Result<()>;
    fn delete(&self) -> Result<()>;
}

/// Token slot in the OS keychain.
#[derive(Debug, Clone)]
pub struct KeyringStorage {
    service: String,
    key: String,
}

impl KeyringStorage {
    pub fn new() -> Self {
        Self::with_key(SERVICE_NAME, TOKEN_KEY)
    }

    /// Use a different keychain entry, e.g. one per profile.
    pub fn with_key(service: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            key: key.into(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service, &self.key).context("Failed to create keyring entry")
    }
}

impl Default for KeyringStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStorage for KeyringStorage {
    fn load(&self) -> Result<Option<String>> {
        match self.entry()?.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve token from keychain"),
        }
    }

    fn store(&self, token: &str) -> Result<()> {
        self.entry()?
            .set_password(token)
            .context("Failed to store token in keychain")
    }

    fn delete(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete token from keychain"),
        }
    }
}

/// In-process token slot. Clones share the same slot, so a test can keep a
/// handle and inspect what the session store persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a token already persisted, as after a previous run.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(token.into()))),
        }
    }

    /// Current slot contents.
    pub fn peek(&self) -> Option<String> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<String>>> {
        self.slot
            .lock()
            .map_err(|_| anyhow::anyhow!("Memory token slot is poisoned"))
    }
}

impl TokenStorage for MemoryStorage {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.lock()?.clone())
    }

    fn store(&self, token: &str) -> Result<()> {
        *self.lock()? = Some(token.to_string());
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        *self.lock()? = None;
        Ok(())
    }
}
