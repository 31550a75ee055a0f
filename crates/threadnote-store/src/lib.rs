//! Persistence for threadnote.
//!
//! Everything durable (mappings, seen ids, credentials, cached follower
//! counts) goes through the [`KvStore`] abstraction. [`MemoryStore`] backs
//! tests and dry runs; [`FileStore`] keeps a single JSON document on disk.

use std::path::PathBuf;

use thiserror::Error;
use threadnote_core::SyncError;

pub mod file;
pub mod kv;
pub mod mapping;
pub mod memory;

pub use file::FileStore;
pub use kv::{load_json, save_json, KvStore};
pub use mapping::{MappingStore, StoreLimits, DEFAULT_MAPPING_CAP, DEFAULT_SEEN_CAP};
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state file I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("state file {path} is not a JSON object: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("stored value for '{key}' has an unexpected shape: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Io { .. } => SyncError::FatalConfig(err.to_string()),
            StoreError::Corrupt { .. } | StoreError::Decode { .. } => {
                SyncError::ValidationFailure(err.to_string())
            }
        }
    }
}
