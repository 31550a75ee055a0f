//! The key-value persistence surface.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::StoreError;

/// Minimal durable key-value store over JSON values.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;

    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    async fn clear(&self) -> Result<(), StoreError>;
}

/// Reads `key` and decodes it as `T`. A missing key is `Ok(None)`.
///
/// # Errors
///
/// Returns [`StoreError::Decode`] if the stored value does not fit `T`, or
/// whatever the backing store returns.
pub async fn load_json<T: DeserializeOwned>(
    kv: &dyn KvStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match kv.get(key).await? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|source| StoreError::Decode {
                key: key.to_owned(),
                source,
            }),
        None => Ok(None),
    }
}

/// Encodes `value` and writes it under `key`.
///
/// # Errors
///
/// Returns [`StoreError::Decode`] if `value` cannot be represented as JSON,
/// or whatever the backing store returns.
pub async fn save_json<T: Serialize + ?Sized + Sync>(
    kv: &dyn KvStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let value = serde_json::to_value(value).map_err(|source| StoreError::Decode {
        key: key.to_owned(),
        source,
    })?;
    kv.set(key, value).await
}
