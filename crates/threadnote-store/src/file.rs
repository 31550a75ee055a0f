//! JSON-document store on local disk.
//!
//! The whole key space lives in one JSON object. Every mutation rewrites the
//! document to a sibling temp file and renames it over the original, so a
//! crash mid-write leaves the previous document intact.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, MutexGuard};

use crate::kv::KvStore;
use crate::StoreError;

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    document: Mutex<Map<String, Value>>,
}

impl FileStore {
    /// Opens the document at `path`, starting empty if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file exists but cannot be read, or
    /// [`StoreError::Corrupt`] if it is not a JSON object.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let document = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Map::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "state file absent, starting empty");
                Map::new()
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        Ok(Self {
            path,
            document: Mutex::new(document),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `next` to disk, then makes it the live document. The caller
    /// holds the lock throughout, so mutations reach disk in the order they
    /// were applied, and a failed write leaves the live document untouched.
    async fn commit(
        &self,
        document: &mut MutexGuard<'_, Map<String, Value>>,
        next: Map<String, Value>,
    ) -> Result<(), StoreError> {
        self.persist(&next).await?;
        **document = next;
        Ok(())
    }

    async fn persist(&self, document: &Map<String, Value>) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let payload = serde_json::to_vec_pretty(document).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, payload).await.map_err(io_err)?;
        if let Err(source) = tokio::fs::rename(&temp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(io_err(source));
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.document.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut document = self.document.lock().await;
        let mut next = document.clone();
        next.insert(key.to_owned(), value);
        self.commit(&mut document, next).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut document = self.document.lock().await;
        if !document.contains_key(key) {
            return Ok(());
        }
        let mut next = document.clone();
        next.remove(key);
        self.commit(&mut document, next).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut document = self.document.lock().await;
        self.commit(&mut document, Map::new()).await
    }
}
