use chrono::{DateTime, Utc};
use log::{error, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

use crate::constants::SESSION_STORAGE_KEY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// Logged-in user as persisted on the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSession {
    pub role: Role,
    pub email: String,
    #[serde(rename = "loginTime")]
    pub login_time: DateTime<Utc>,
}

impl UserSession {
    pub fn new(role: Role, email: impl Into<String>) -> Self {
        Self {
            role,
            email: email.into(),
            login_time: Utc::now(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// String key-value storage, in the manner of browser local storage
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError>;
    fn set(&mut self, key: &str, value: String) -> Result<(), SessionError>;
    fn remove(&mut self, key: &str) -> Result<(), SessionError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), SessionError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), SessionError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Store kept as one JSON object of string values in a file
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location: ~/.config/attendance_checkin/storage.json
    pub fn default_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home)
            .join(".config")
            .join("attendance_checkin")
            .join("storage.json")
    }

    fn read_all(&self) -> Result<Map<String, Value>, SessionError> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write_all(&self, entries: &Map<String, Value>) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(entries)?)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        // Non-string entries come back as raw JSON so callers see them as corrupt
        Ok(self.read_all()?.get(key).map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }))
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), SessionError> {
        // An unreadable file is replaced rather than blocking the write
        let mut entries = self.read_all().unwrap_or_default();
        entries.insert(key.to_string(), Value::String(value));
        self.write_all(&entries)
    }

    fn remove(&mut self, key: &str) -> Result<(), SessionError> {
        match self.read_all() {
            Ok(mut entries) => {
                if entries.remove(key).is_some() {
                    self.write_all(&entries)?;
                }
                Ok(())
            }
            // Nothing readable to keep
            Err(SessionError::Json(_)) => self.write_all(&Map::new()),
            Err(e) => Err(e),
        }
    }
}

/// Load/save/clear of the single login session entry.
///
/// Absent means logged out. An entry that does not parse is treated as
/// absent and removed.
pub struct SessionRepository<S> {
    store: S,
}

impl<S: KeyValueStore> SessionRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn load(&mut self) -> Option<UserSession> {
        let raw = match self.store.get(SESSION_STORAGE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                error!("Failed to get user session: {}", e);
                self.clear();
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!("Discarding unreadable user session: {}", e);
                self.clear();
                None
            }
        }
    }

    pub fn save(&mut self, session: &UserSession) -> Result<(), SessionError> {
        let raw = serde_json::to_string(session)?;
        self.store.set(SESSION_STORAGE_KEY, raw)
    }

    pub fn clear(&mut self) {
        if let Err(e) = self.store.remove(SESSION_STORAGE_KEY) {
            error!("Failed to clear user session: {}", e);
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}
