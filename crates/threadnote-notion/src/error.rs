use thiserror::Error;
use threadnote_core::SyncError;

#[derive(Debug, Error)]
pub enum NotionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Notion error object: `{"object": "error", "status", "code", "message"}`.
    #[error("Notion API error (HTTP {status}, {code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid base URL '{0}'")]
    InvalidBaseUrl(String),
}

impl From<NotionError> for SyncError {
    fn from(err: NotionError) -> Self {
        let message = err.to_string();
        match err {
            NotionError::Http(_) => SyncError::NetworkFailure(message),
            NotionError::Api { status, code, .. } => match (status, code.as_str()) {
                (401 | 403, _) | (_, "unauthorized" | "restricted_resource") => {
                    SyncError::AuthFailure(message)
                }
                (429, _) | (_, "rate_limited") => SyncError::RateLimited(message),
                (404, _) | (_, "object_not_found") => SyncError::NotFound(message),
                // Conflicts are transient write races on Notion's side.
                (409, _) | (_, "conflict_error") => SyncError::NetworkFailure(message),
                (s, _) if s >= 500 => SyncError::NetworkFailure(message),
                _ => SyncError::ValidationFailure(message),
            },
            NotionError::Deserialize { .. } | NotionError::InvalidBaseUrl(_) => {
                SyncError::ValidationFailure(message)
            }
        }
    }
}
