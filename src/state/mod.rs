//! Durable instance-state key-value store
//!
//! Holds the small amount of state that must outlive a single request, such
//! as the cached bearer token and its expiry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::errors::StateError;

pub const STORED_ACCESS_TOKEN: &str = "storedAccessToken";
pub const STORED_EXPIRY_TIME: &str = "storedExpiryTime";

pub type StateResult<T> = Result<T, StateError>;

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> StateResult<Option<Value>>;
    async fn set(&self, key: &str, value: Value) -> StateResult<()>;
}

/// Process-local store, lost on restart
#[derive(Clone, Default)]
pub struct MemoryStateStore {
    values: Arc<RwLock<HashMap<String, Value>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, key: &str) -> StateResult<Option<Value>> {
        let values = self.values.read().await;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> StateResult<()> {
        let mut values = self.values.write().await;
        values.insert(key.to_string(), value);
        Ok(())
    }
}

/// Store backed by one JSON object file.
///
/// The file is read on first access and rewritten in full on every `set`,
/// through a temporary file renamed over the original.
pub struct FileStateStore {
    path: PathBuf,
    values: Mutex<Option<Map<String, Value>>>,
}

impl FileStateStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            values: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StateError {
        StateError::Io {
            path: self.path.clone(),
            source,
        }
    }

    async fn load(&self) -> StateResult<Map<String, Value>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Map::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("State file {:?} does not exist yet", self.path);
                Ok(Map::new())
            }
            Err(e) => Err(self.io_error(e)),
        }
    }

    async fn persist(&self, values: &Map<String, Value>) -> StateResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let serialized = serde_json::to_vec_pretty(values)?;
        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, &serialized)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| self.io_error(e))
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get(&self, key: &str) -> StateResult<Option<Value>> {
        let mut values = self.values.lock().await;
        if values.is_none() {
            *values = Some(self.load().await?);
        }
        Ok(values.as_ref().and_then(|map| map.get(key).cloned()))
    }

    async fn set(&self, key: &str, value: Value) -> StateResult<()> {
        let mut values = self.values.lock().await;
        let mut updated = match values.as_ref() {
            Some(map) => map.clone(),
            None => self.load().await?,
        };
        updated.insert(key.to_string(), value);

        // Memory only moves forward once the file does
        self.persist(&updated).await?;
        *values = Some(updated);
        Ok(())
    }
}
