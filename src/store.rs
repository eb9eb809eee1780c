use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::types::{TokenSet, UserProfile};

const TOKENS_KEY: &str = "board.session.tokens";
const PROFILE_KEY: &str = "board.session.profile";

pub type StorageError = Box<dyn std::error::Error + Send + Sync>;

/// Tab-scoped key/value persistence backing the [`CredentialStore`].
///
/// Each call must be atomic at single-key granularity. Implementations
/// can wrap browser session storage, a keyring entry, or [`MemoryStorage`].
///
/// # Example
///
/// ```rust,ignore
/// impl Storage for WebSessionStorage {
///     fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
///         Ok(self.inner.get_item(key).map_err(js_err)?)
///     }
///     fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
///         self.inner.set_item(key, value).map_err(js_err)
///     }
///     fn remove(&self, key: &str) -> Result<(), StorageError> {
///         self.inner.remove_item(key).map_err(js_err)
///     }
/// }
/// ```
pub trait Storage: Send + Sync + 'static {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// In-process storage that lives as long as the process (one "tab").
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

#[derive(Debug, thiserror::Error)]
#[error("storage quota exceeded: {needed} bytes needed, {quota} allowed")]
pub struct QuotaExceeded {
    pub needed: usize,
    pub quota: usize,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the total size of keys plus values, like a browser storage quota.
    #[must_use]
    pub fn with_quota(mut self, bytes: usize) -> Self {
        self.quota_bytes = Some(bytes);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write();
        if let Some(quota) = self.quota_bytes {
            let others: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > quota {
                return Err(Box::new(QuotaExceeded { needed, quota }));
            }
        }
        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// Persistence for the current [`TokenSet`] and [`UserProfile`].
///
/// A dumb layer: it never looks inside the tokens. Faults are logged and
/// reported as `false` / `None`, so a corrupt entry reads exactly like a
/// missing one.
#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn Storage>,
}

impl CredentialStore {
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Store backed by a fresh [`MemoryStorage`].
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Persist `tokens`, replacing any previous set.
    pub fn save_tokens(&self, tokens: &TokenSet) -> bool {
        self.write(TOKENS_KEY, tokens)
    }

    /// Persist `profile`. Independent of [`save_tokens`](Self::save_tokens).
    pub fn save_profile(&self, profile: &UserProfile) -> bool {
        self.write(PROFILE_KEY, profile)
    }

    #[must_use]
    pub fn load_tokens(&self) -> Option<TokenSet> {
        self.read(TOKENS_KEY)
    }

    #[must_use]
    pub fn load_profile(&self) -> Option<UserProfile> {
        self.read(PROFILE_KEY)
    }

    /// Remove tokens and profile. Safe to call on an empty store.
    pub fn clear(&self) {
        for key in [TOKENS_KEY, PROFILE_KEY] {
            if let Err(e) = self.storage.remove(key) {
                tracing::warn!(key, error = %e, "Failed to remove session entry");
            }
        }
        tracing::debug!("Session entries cleared");
    }

    fn write<T: Serialize>(&self, key: &'static str, value: &T) -> bool {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to serialize session entry");
                return false;
            }
        };
        match self.storage.set(key, &json) {
            Ok(()) => {
                tracing::debug!(key, "Session entry saved");
                true
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to save session entry");
                false
            }
        }
    }

    fn read<T: DeserializeOwned>(&self, key: &'static str) -> Option<T> {
        let raw = match self.storage.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!(key, "Session entry not found");
                return None;
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to read session entry");
                return None;
            }
        };
        serde_json::from_str(&raw)
            .map_err(|e| tracing::warn!(key, error = %e, "Discarding unparseable session entry"))
            .ok()
    }
}
