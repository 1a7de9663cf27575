//! Keyed agent state.
//!
//! An [`AgentState`] maps string keys to opaque structured blobs. Two
//! backends ship: [`InMemoryState`] for the common in-process case, and
//! [`FileState`], which serializes each value to its own JSON file under a
//! data directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

/// Errors produced by state backends.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Filesystem access failed.
    #[error("state io failed: {0}")]
    Io(#[from] std::io::Error),
    /// Value (de)serialization failed.
    #[error("state serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// A string-keyed store of opaque structured values.
#[async_trait]
pub trait AgentState: Send + Sync {
    /// Look up a value.
    async fn get(&self, key: &str) -> Result<Option<Value>, StateError>;

    /// Store a value, replacing any previous one.
    async fn put(&self, key: &str, value: Value) -> Result<(), StateError>;
}

/// In-process state backed by a mutex-guarded map.
#[derive(Debug, Default)]
pub struct InMemoryState {
    values: Mutex<HashMap<String, Value>>,
}

impl InMemoryState {
    /// Create an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentState for InMemoryState {
    async fn get(&self, key: &str) -> Result<Option<Value>, StateError> {
        let values = self.values.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Value) -> Result<(), StateError> {
        let mut values = self.values.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        values.insert(key.to_string(), value);
        Ok(())
    }
}

/// File-backed state: one pretty-printed JSON file per key under `dir`.
///
/// Key characters unsafe in filenames (`/`, `\`, `:`) are replaced with `_`.
#[derive(Debug)]
pub struct FileState {
    dir: PathBuf,
}

impl FileState {
    /// Create a file state rooted at `dir`, creating the directory if
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Io`] when the directory cannot be created.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, StateError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_key(key)))
    }
}

fn sanitize_key(key: &str) -> String {
    key.replace(['/', '\\', ':'], "_")
}

#[async_trait]
impl AgentState for FileState {
    async fn get(&self, key: &str) -> Result<Option<Value>, StateError> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn put(&self, key: &str, value: Value) -> Result<(), StateError> {
        let path = self.path_for(key);
        let contents = serde_json::to_string_pretty(&value)?;
        tokio::fs::write(&path, contents).await?;
        Ok(())
    }
}
