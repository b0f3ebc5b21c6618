//! Durable storage of the backend session identifier.
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use client_logging::{client_info, client_warn, short_id};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::persist::{write_atomic, PersistError};

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("session identifier must not be empty")]
    Empty,
    #[error("failed to encode identity: {0}")]
    Encode(String),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Key-value slot holding the session identifier. There is no clear operation.
pub trait IdentityStore: Send {
    fn get(&self) -> Option<String>;
    fn set(&mut self, session_id: &str) -> Result<(), IdentityError>;
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PersistedIdentity {
    session_id: Option<String>,
}

/// Identity kept in a small RON file.
#[derive(Debug, Clone)]
pub struct FileIdentityStore {
    path: PathBuf,
    cached: Option<String>,
}

impl FileIdentityStore {
    /// Opens the store at `path`. A missing or unreadable file means no identity.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cached = load_identity(&path);
        Self { path, cached }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IdentityStore for FileIdentityStore {
    fn get(&self) -> Option<String> {
        self.cached.clone()
    }

    fn set(&mut self, session_id: &str) -> Result<(), IdentityError> {
        let session_id = validate(session_id)?;
        if self.cached.as_deref() == Some(session_id) {
            return Ok(());
        }
        let state = PersistedIdentity {
            session_id: Some(session_id.to_string()),
        };
        let content = ron::ser::to_string_pretty(&state, ron::ser::PrettyConfig::new())
            .map_err(|err| IdentityError::Encode(err.to_string()))?;
        write_atomic(&self.path, &content)?;
        client_info!("stored session {} in {:?}", short_id(session_id), self.path);
        self.cached = Some(session_id.to_string());
        Ok(())
    }
}

fn load_identity(path: &Path) -> Option<String> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
        Err(err) => {
            client_warn!("failed to read identity from {:?}: {}", path, err);
            return None;
        }
    };
    match ron::from_str::<PersistedIdentity>(&content) {
        Ok(state) => state.session_id.filter(|id| !id.trim().is_empty()),
        Err(err) => {
            client_warn!("failed to parse identity from {:?}: {}", path, err);
            None
        }
    }
}

/// In-memory store; clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryIdentityStore {
    value: Arc<Mutex<Option<String>>>,
}

impl MemoryIdentityStore {
    pub fn with_value(session_id: impl Into<String>) -> Self {
        Self {
            value: Arc::new(Mutex::new(Some(session_id.into()))),
        }
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn get(&self) -> Option<String> {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&mut self, session_id: &str) -> Result<(), IdentityError> {
        let session_id = validate(session_id)?;
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(session_id.to_string());
        Ok(())
    }
}

fn validate(session_id: &str) -> Result<&str, IdentityError> {
    let trimmed = session_id.trim();
    if trimmed.is_empty() {
        Err(IdentityError::Empty)
    } else {
        Ok(trimmed)
    }
}
