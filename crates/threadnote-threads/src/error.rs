use thiserror::Error;
use threadnote_core::SyncError;

/// Errors returned by the Threads Graph API client.
#[derive(Debug, Error)]
pub enum ThreadsError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-2xx status and a Graph error envelope.
    #[error("Threads API error (HTTP {status}, code {code:?}): {message}")]
    Api {
        status: u16,
        code: Option<i64>,
        message: String,
    },

    #[error("rate limited by Threads API (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid base URL '{0}'")]
    InvalidBaseUrl(String),

    #[error("THREADS_APP_SECRET is required to exchange a short-lived credential")]
    MissingAppSecret,
}

/// Graph error codes that mean the access token is unusable.
const OAUTH_CODES: [i64; 2] = [190, 102];
/// Graph error codes for application or user throttling.
const THROTTLE_CODES: [i64; 4] = [4, 17, 32, 613];

impl ThreadsError {
    /// `true` when the API rejected the request itself (as opposed to a
    /// transport failure or throttling).
    #[must_use]
    pub fn is_api_rejection(&self) -> bool {
        matches!(self, ThreadsError::Api { .. })
    }
}

impl From<ThreadsError> for SyncError {
    fn from(err: ThreadsError) -> Self {
        let message = err.to_string();
        match err {
            ThreadsError::Http(_) => SyncError::NetworkFailure(message),
            ThreadsError::RateLimited { .. } => SyncError::RateLimited(message),
            ThreadsError::Api { status, code, .. } => {
                if code.is_some_and(|c| OAUTH_CODES.contains(&c)) || status == 401 || status == 403
                {
                    SyncError::AuthFailure(message)
                } else if status == 429 || code.is_some_and(|c| THROTTLE_CODES.contains(&c)) {
                    SyncError::RateLimited(message)
                } else if status == 404 {
                    SyncError::NotFound(message)
                } else if status >= 500 {
                    SyncError::NetworkFailure(message)
                } else {
                    SyncError::ValidationFailure(message)
                }
            }
            ThreadsError::Deserialize { .. } | ThreadsError::InvalidBaseUrl(_) => {
                SyncError::ValidationFailure(message)
            }
            ThreadsError::MissingAppSecret => SyncError::FatalConfig(message),
        }
    }
}
