//! Durable credential storage.
//!
//! `CredentialStore` is the only writer of persisted session fields. It sits
//! on top of a pluggable [`SecretStore`] backend: the OS keychain by default,
//! a JSON file for platforms without one, or memory for tests.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use keyring::Entry;
use tracing::{debug, warn};

use super::error::StorageError;
use super::session::Session;

/// Keychain service name
pub const SERVICE_NAME: &str = "livefeed";

/// One persisted field of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialField {
    AccessToken,
    RefreshToken,
    SessionId,
    /// User id of a linked social account
    SocialUserId,
}

impl CredentialField {
    /// Every field owned by a session. Cleared together, never partially.
    pub const ALL: [CredentialField; 4] = [
        CredentialField::AccessToken,
        CredentialField::RefreshToken,
        CredentialField::SessionId,
        CredentialField::SocialUserId,
    ];

    pub fn key(self) -> &'static str {
        match self {
            CredentialField::AccessToken => "accessToken",
            CredentialField::RefreshToken => "refreshToken",
            CredentialField::SessionId => "sessionId",
            CredentialField::SocialUserId => "socialUserId",
        }
    }
}

/// Blocking key/value backend. Removing an absent key is not an error.
pub trait SecretStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn save(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// OS keychain backend, one keychain entry per field
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StorageError> {
        Entry::new(&self.service, key)
            .map_err(|e| StorageError::new(format!("Failed to create keyring entry: {}", e)))
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new(SERVICE_NAME)
    }
}

impl SecretStore for KeyringStore {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StorageError::new(format!(
                "Failed to retrieve {} from keychain: {}",
                key, e
            ))),
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entry(key)?
            .set_password(value)
            .map_err(|e| StorageError::new(format!("Failed to store {} in keychain: {}", key, e)))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StorageError::new(format!(
                "Failed to delete {} from keychain: {}",
                key, e
            ))),
        }
    }
}

/// JSON file backend for hosts without a usable keychain
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write of the file
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>, StorageError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)
            .map_err(|e| StorageError::new(format!("Failed to read credentials file: {}", e)))?;
        serde_json::from_str(&contents)
            .map_err(|e| StorageError::new(format!("Failed to parse credentials file: {}", e)))
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::new(format!("Failed to create credentials dir: {}", e)))?;
        }
        let contents = serde_json::to_string_pretty(map)
            .map_err(|e| StorageError::new(e.to_string()))?;
        std::fs::write(&self.path, contents)
            .map_err(|e| StorageError::new(format!("Failed to write credentials file: {}", e)))
    }

    fn locked(&self) -> Result<std::sync::MutexGuard<'_, ()>, StorageError> {
        self.lock
            .lock()
            .map_err(|_| StorageError::new("Credentials file lock poisoned"))
    }
}

impl SecretStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.locked()?;
        Ok(self.read_map()?.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.locked()?;
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.locked()?;
        let mut map = self.read_map()?;
        if map.remove(key).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

/// In-process backend; nothing survives a restart
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StorageError> {
        self.entries
            .lock()
            .map_err(|_| StorageError::new("Memory store lock poisoned"))
    }
}

impl SecretStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries()?.remove(key);
        Ok(())
    }
}

/// Session fields as read from storage at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredCredentials {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub session_id: Option<String>,
}

/// Async facade over a [`SecretStore`].
/// Clone is cheap; clones share the backend and the access lock.
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn SecretStore>,
    guard: Arc<tokio::sync::Mutex<()>>,
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn SecretStore>) -> Self {
        Self {
            backend,
            guard: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn keyring() -> Self {
        Self::new(Arc::new(KeyringStore::default()))
    }

    pub fn file(path: PathBuf) -> Self {
        Self::new(Arc::new(FileStore::new(path)))
    }

    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Run a blocking backend operation off the async executor
    async fn run<T, F>(&self, op: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn SecretStore) -> Result<T, StorageError> + Send + 'static,
    {
        let _guard = self.guard.lock().await;
        let backend = Arc::clone(&self.backend);
        tokio::task::spawn_blocking(move || op(backend.as_ref()))
            .await
            .map_err(|e| StorageError::new(format!("Credential task failed: {}", e)))?
    }

    pub async fn get(&self, field: CredentialField) -> Result<Option<String>, StorageError> {
        self.run(move |b| b.load(field.key())).await
    }

    pub async fn set(&self, field: CredentialField, value: &str) -> Result<(), StorageError> {
        let value = value.to_string();
        self.run(move |b| b.save(field.key(), &value)).await?;
        debug!(field = field.key(), "Credential stored");
        Ok(())
    }

    /// Write `value` only if `still_current` holds once the store is locked.
    /// Returns whether the write happened.
    pub(crate) async fn set_if<C>(
        &self,
        field: CredentialField,
        value: &str,
        still_current: C,
    ) -> Result<bool, StorageError>
    where
        C: FnOnce() -> bool + Send + 'static,
    {
        let value = value.to_string();
        let written = self
            .run(move |b| {
                if !still_current() {
                    return Ok(false);
                }
                b.save(field.key(), &value)?;
                Ok(true)
            })
            .await?;
        if written {
            debug!(field = field.key(), "Credential stored");
        }
        Ok(written)
    }

    /// Remove every session field, but only if `still_current` holds once
    /// the store is locked. Returns whether anything was cleared.
    pub(crate) async fn clear_session_if<C>(&self, still_current: C) -> Result<bool, StorageError>
    where
        C: FnOnce() -> bool + Send + 'static,
    {
        self.run(move |b| {
            if !still_current() {
                return Ok(false);
            }
            let mut first_err = None;
            for field in CredentialField::ALL {
                if let Err(e) = b.remove(field.key()) {
                    warn!(field = field.key(), error = %e, "Failed to clear credential");
                    first_err.get_or_insert(e);
                }
            }
            first_err.map_or(Ok(true), Err)
        })
        .await
    }

    /// Remove the given fields. Absent fields are skipped. Every field is
    /// attempted even if an earlier one fails; the first error is returned.
    pub async fn clear(&self, fields: &[CredentialField]) -> Result<(), StorageError> {
        let fields = fields.to_vec();
        self.run(move |b| {
            let mut first_err = None;
            for field in fields {
                if let Err(e) = b.remove(field.key()) {
                    warn!(field = field.key(), error = %e, "Failed to clear credential");
                    first_err.get_or_insert(e);
                }
            }
            first_err.map_or(Ok(()), Err)
        })
        .await
    }

    /// Remove every session field
    pub async fn clear_session(&self) -> Result<(), StorageError> {
        self.clear(&CredentialField::ALL).await?;
        debug!("Session credentials cleared");
        Ok(())
    }

    /// Persist a complete session. A session without an id removes any
    /// previously stored id so no stale value survives.
    pub async fn store_session(&self, session: &Session) -> Result<(), StorageError> {
        let session = session.clone();
        let has_session_id = session.session_id.is_some();
        self.run(move |b| {
            b.save(CredentialField::AccessToken.key(), &session.access_token)?;
            b.save(CredentialField::RefreshToken.key(), &session.refresh_token)?;
            match session.session_id {
                Some(ref id) => b.save(CredentialField::SessionId.key(), id),
                None => b.remove(CredentialField::SessionId.key()),
            }
        })
        .await?;
        debug!(has_session_id, "Session stored");
        Ok(())
    }

    /// Read all session fields
    pub async fn snapshot(&self) -> Result<StoredCredentials, StorageError> {
        self.run(|b| {
            Ok(StoredCredentials {
                access_token: b.load(CredentialField::AccessToken.key())?,
                refresh_token: b.load(CredentialField::RefreshToken.key())?,
                session_id: b.load(CredentialField::SessionId.key())?,
            })
        })
        .await
    }
}
