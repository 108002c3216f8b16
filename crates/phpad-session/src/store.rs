//! Local persisted state: files, cursor, theme, and the remote credential.

#![allow(missing_docs)]

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::error::SessionError;
use crate::session::{Session, SourceFile};

pub const FILES_KEY: &str = "phpad-files";
pub const CURRENT_INDEX_KEY: &str = "phpad-current-file-index";
pub const THEME_KEY: &str = "theme";
pub const TOKEN_KEY: &str = "github_token";
pub const IDENTITY_KEY: &str = "github_user";

/// Key/value persistence backend (the browser shell backs this with
/// localStorage; native hosts and tests use the implementations below).
pub trait StateStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError>;
    fn set(&self, key: &str, value: &str) -> Result<(), SessionError>;
    fn remove(&self, key: &str) -> Result<(), SessionError>;
}

/// One file per key under a root directory.
#[derive(Debug, Clone)]
pub struct DirStateStore {
    root: PathBuf,
}

impl DirStateStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl StateStore for DirStateStore {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path)
            .map(Some)
            .map_err(|err| SessionError::StateStore(SmolStr::new(format!("read {path:?}: {err}"))))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        fs::create_dir_all(&self.root).map_err(|err| {
            SessionError::StateStore(SmolStr::new(format!("create {:?}: {err}", self.root)))
        })?;
        let path = self.path_for(key);
        fs::write(&path, value)
            .map_err(|err| SessionError::StateStore(SmolStr::new(format!("write {path:?}: {err}"))))
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(&path).map_err(|err| {
                SessionError::StateStore(SmolStr::new(format!("remove {path:?}: {err}")))
            })?;
        }
        Ok(())
    }
}

/// In-memory store for tests and the wasm shell bridge.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    entries: Mutex<FxHashMap<String, String>>,
}

impl StateStore for MemoryStateStore {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Persisted UI theme preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    #[must_use]
    pub fn parse(text: &str) -> Self {
        if text.trim().eq_ignore_ascii_case("dark") {
            Self::Dark
        } else {
            Self::Light
        }
    }
}

/// Locally persisted remote credential blob.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
    pub token: String,
    pub timestamp: u64,
}

impl std::fmt::Debug for StoredCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredCredential")
            .field("token", &"<redacted>")
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

/// Session-level persistence over a [`StateStore`], with schema validation
/// on every read and fallback to defaults on mismatch.
pub struct SessionStore {
    store: Box<dyn StateStore>,
}

impl SessionStore {
    #[must_use]
    pub fn new(store: Box<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Persist the full session (files and cursor). Called after every edit
    /// and file-list structural change.
    pub fn save_session(&self, session: &Session) -> Result<(), SessionError> {
        let json = serde_json::to_string(session.files()).map_err(|err| {
            SessionError::StateStore(SmolStr::new(format!("serialize files: {err}")))
        })?;
        self.store.set(FILES_KEY, &json)?;
        self.store
            .set(CURRENT_INDEX_KEY, &session.current_index().to_string())
    }

    /// Load the persisted session, or `None` when nothing valid is stored.
    #[must_use]
    pub fn load_session(&self) -> Option<Session> {
        let json = match self.store.get(FILES_KEY) {
            Ok(Some(json)) => json,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(%err, "failed to read persisted files");
                return None;
            }
        };
        let files: Vec<SourceFile> = match serde_json::from_str(&json) {
            Ok(files) => files,
            Err(err) => {
                tracing::warn!(%err, "invalid persisted file data, using defaults");
                return None;
            }
        };
        if files.is_empty() {
            return None;
        }
        let index = self
            .store
            .get(CURRENT_INDEX_KEY)
            .ok()
            .flatten()
            .and_then(|text| text.trim().parse::<usize>().ok())
            .unwrap_or(0);
        match Session::restore(files, index) {
            Ok(session) => Some(session),
            Err(err) => {
                tracing::warn!(%err, "persisted session violates invariants, using defaults");
                None
            }
        }
    }

    pub fn clear_session(&self) -> Result<(), SessionError> {
        self.store.remove(FILES_KEY)?;
        self.store.remove(CURRENT_INDEX_KEY)
    }

    #[must_use]
    pub fn theme(&self) -> Theme {
        self.store
            .get(THEME_KEY)
            .ok()
            .flatten()
            .map(|text| Theme::parse(&text))
            .unwrap_or_default()
    }

    pub fn set_theme(&self, theme: Theme) -> Result<(), SessionError> {
        self.store.set(THEME_KEY, theme.as_str())
    }

    /// Persist a validated credential, stamped with the current time.
    pub fn store_credential(&self, token: &str) -> Result<(), SessionError> {
        let blob = StoredCredential {
            token: token.to_string(),
            timestamp: unix_millis(),
        };
        let json = serde_json::to_string(&blob).map_err(|err| {
            SessionError::StateStore(SmolStr::new(format!("serialize credential: {err}")))
        })?;
        self.store.set(TOKEN_KEY, &json)
    }

    #[must_use]
    pub fn credential(&self) -> Option<StoredCredential> {
        let json = self.store.get(TOKEN_KEY).ok().flatten()?;
        match serde_json::from_str(&json) {
            Ok(blob) => Some(blob),
            Err(err) => {
                tracing::warn!(%err, "invalid stored credential blob");
                None
            }
        }
    }

    /// Drop the credential and the cached identity (logout).
    pub fn clear_credential(&self) -> Result<(), SessionError> {
        self.store.remove(TOKEN_KEY)?;
        self.store.remove(IDENTITY_KEY)
    }

    /// Cached identity JSON as returned by the snippet host.
    #[must_use]
    pub fn cached_identity(&self) -> Option<String> {
        self.store.get(IDENTITY_KEY).ok().flatten()
    }

    pub fn store_identity(&self, identity_json: &str) -> Result<(), SessionError> {
        self.store.set(IDENTITY_KEY, identity_json)
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
