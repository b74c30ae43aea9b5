use std::{
    collections::HashMap,
    fs, io,
    path::PathBuf,
    sync::{Arc, Mutex, RwLock},
};

use crate::{error::StoreError, logging::redact};

/// The keys the web client has always written to local storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    AccessToken,
    RefreshToken,
    Role,
}

impl StorageKey {
    pub const ALL: [StorageKey; 3] = [
        StorageKey::AccessToken,
        StorageKey::RefreshToken,
        StorageKey::Role,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::AccessToken => "ACCESS_TOKEN",
            StorageKey::RefreshToken => "REFRESH_TOKEN",
            StorageKey::Role => "role",
        }
    }
}

/// Empty, `"undefined"` and `"null"` were written by older clients in place
/// of a missing value.
pub fn is_absent(value: &str) -> bool {
    matches!(value.trim(), "" | "undefined" | "null")
}

pub trait StorageBackend: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn write(&self, entries: &[(&str, &str)]) -> Result<(), StoreError>;
    fn remove(&self, keys: &[&str]) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            entries: RwLock::new(entries),
        }
    }

    pub fn snapshot(&self) -> HashMap<String, String> {
        self.entries
            .read()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

impl StorageBackend for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, entries: &[(&str, &str)]) -> Result<(), StoreError> {
        let mut map = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        for (key, value) in entries {
            map.insert((*key).to_string(), (*value).to_string());
        }
        Ok(())
    }

    fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        let mut map = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        for key in keys {
            map.remove(*key);
        }
        Ok(())
    }
}

/// A JSON object of string values on disk.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<HashMap<String, String>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(HashMap::new());
        }
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Format {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let body = serde_json::to_vec_pretty(entries).map_err(|source| StoreError::Format {
            path: self.path.clone(),
            source,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)
    }

    // A file that no longer parses is replaced rather than blocking every write.
    fn update(&self, apply: impl FnOnce(&mut HashMap<String, String>)) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut entries = match self.load() {
            Err(StoreError::Format { path, source }) => {
                tracing::warn!(path = %path.display(), error = %source, "discarding unreadable session file");
                HashMap::new()
            }
            loaded => loaded?,
        };
        apply(&mut entries);
        self.save(&entries)
    }
}

impl StorageBackend for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(self.load()?.remove(key))
    }

    fn write(&self, entries: &[(&str, &str)]) -> Result<(), StoreError> {
        self.update(|map| {
            for (key, value) in entries {
                map.insert((*key).to_string(), (*value).to_string());
            }
        })
    }

    fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        self.update(|map| {
            for key in keys {
                map.remove(*key);
            }
        })
    }
}

/// What is currently persisted for this client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub role: Option<String>,
}

impl Session {
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.role.is_none()
    }
}

/// Session tokens and cached role over an injected backend.
///
/// Backend failures are logged and swallowed: an unreadable key is absent and
/// a failed write leaves the previous value in place.
#[derive(Clone)]
pub struct TokenStore {
    backend: Arc<dyn StorageBackend>,
}

impl TokenStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileStorage::new(path)))
    }

    pub fn get(&self, key: StorageKey) -> Option<String> {
        match self.backend.read(key.as_str()) {
            Ok(Some(value)) if !is_absent(&value) => Some(value),
            Ok(_) => None,
            Err(err) => {
                tracing::error!(key = key.as_str(), error = %err, "failed to read session storage");
                None
            }
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.get(StorageKey::AccessToken)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.get(StorageKey::RefreshToken)
    }

    pub fn role(&self) -> Option<String> {
        self.get(StorageKey::Role)
    }

    /// Persists a whole session. Unlike the single-key writes, a failure is
    /// returned to the caller.
    pub fn set(&self, access: &str, refresh: &str, role: &str) -> Result<(), StoreError> {
        let entries = [
            (StorageKey::AccessToken.as_str(), access),
            (StorageKey::RefreshToken.as_str(), refresh),
            (StorageKey::Role.as_str(), role),
        ];
        match self.backend.write(&entries) {
            Ok(()) => {
                tracing::debug!(access = %redact(access), role, "stored session tokens");
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to store session tokens");
                Err(err)
            }
        }
    }

    pub fn put(&self, key: StorageKey, value: &str) {
        if let Err(err) = self.backend.write(&[(key.as_str(), value)]) {
            tracing::error!(key = key.as_str(), error = %err, "failed to write session storage");
        }
    }

    pub fn clear(&self) {
        let keys = StorageKey::ALL.map(|key| key.as_str());
        match self.backend.remove(&keys) {
            Ok(()) => tracing::debug!("cleared session storage"),
            Err(err) => tracing::error!(error = %err, "failed to clear session storage"),
        }
    }

    pub fn snapshot(&self) -> Session {
        Session {
            access_token: self.access_token(),
            refresh_token: self.refresh_token(),
            role: self.role(),
        }
    }
}
