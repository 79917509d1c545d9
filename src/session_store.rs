use crate::models::UserProfile;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;

pub const PROFILE_KEY: &str = "mindforge_user_session";
pub const TOKEN_KEY: &str = "mindforge_auth_token";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("storage error: {0}")]
    Storage(#[from] io::Error),
    #[error("profile could not be serialized: {0}")]
    Encode(#[from] serde_json::Error),
}

/// String key/value persistence, shaped like browser local storage.
pub trait KeyValueStore {
    fn get_item(&self, key: &str) -> io::Result<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> io::Result<()>;
    fn remove_item(&self, key: &str) -> io::Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.items
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "memory store poisoned"))
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> io::Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> io::Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// One file per key under `dir`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl KeyValueStore for FileStore {
    fn get_item(&self, key: &str) -> io::Result<Option<String>> {
        match std::fs::read_to_string(self.path(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> io::Result<()> {
        std::fs::write(self.path(key), value)
    }

    fn remove_item(&self, key: &str) -> io::Result<()> {
        match std::fs::remove_file(self.path(key)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// Where the signed-in user is remembered between runs.
pub trait SessionRepository {
    /// The stored profile, or `None` when either entry is missing or the
    /// profile does not parse. Tokens are not checked for expiry.
    fn load(&self) -> Option<UserProfile>;
    fn token(&self) -> Option<String>;
    fn save(&self, user: &UserProfile, token: &str) -> Result<(), SessionError>;
    fn clear(&self) -> Result<(), SessionError>;
}

/// Session kept as two independent entries of a [`KeyValueStore`].
#[derive(Debug, Default)]
pub struct LocalSession<S> {
    store: S,
}

impl<S: KeyValueStore> LocalSession<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get_item(key) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error=%e, key, "session read failed");
                None
            }
        }
    }
}

impl<S: KeyValueStore> SessionRepository for LocalSession<S> {
    fn load(&self) -> Option<UserProfile> {
        let raw = self.read(PROFILE_KEY)?;
        self.read(TOKEN_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!(error=%e, "stored profile is not valid JSON");
                None
            }
        }
    }

    fn token(&self) -> Option<String> {
        self.read(TOKEN_KEY)
    }

    fn save(&self, user: &UserProfile, token: &str) -> Result<(), SessionError> {
        let json = serde_json::to_string(user)?;
        self.store.set_item(PROFILE_KEY, &json)?;
        self.store.set_item(TOKEN_KEY, token)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        self.store.remove_item(PROFILE_KEY)?;
        self.store.remove_item(TOKEN_KEY)?;
        Ok(())
    }
}
