use std::sync::{Arc, PoisonError, RwLock};

/// A bearer credential shared between an API client and whatever rotates it.
///
/// Clones share the same slot, so a refresh made by the token manager is seen
/// by the next request the client sends.
#[derive(Clone, Default)]
pub struct SharedCredential {
    inner: Arc<RwLock<String>>,
}

impl SharedCredential {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(value.into())),
        }
    }

    #[must_use]
    pub fn get(&self) -> String {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace(&self, value: impl Into<String>) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = value.into();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

impl std::fmt::Debug for SharedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedCredential([redacted])")
    }
}
