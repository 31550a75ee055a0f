use thiserror::Error;

/// Uniform error kinds shared by both API clients and the sync engine.
///
/// Client crates convert their own transport errors into one of these so the
/// orchestrator can make retry and skip decisions without knowing which API
/// produced the failure. The type is `Clone` because a single run result may
/// be handed to several single-flight waiters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// Transport-level failure (connect, timeout, 5xx). Retryable.
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// Invalid or expired credential. Needs re-authentication.
    #[error("authentication failure: {0}")]
    AuthFailure(String),

    /// HTTP 429 or an equivalent quota signal. Retryable after backoff.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The requested resource does not exist. Callers treat this as a skip.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed destination schema, field mapping, or rejected payload.
    #[error("validation failure: {0}")]
    ValidationFailure(String),

    /// Required configuration is missing. Raised before any network call.
    #[error("fatal configuration error: {0}")]
    FatalConfig(String),
}

/// Discriminant of [`SyncError`], used in run summaries and log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NetworkFailure,
    AuthFailure,
    RateLimited,
    NotFound,
    ValidationFailure,
    FatalConfig,
}

impl SyncError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::NetworkFailure(_) => ErrorKind::NetworkFailure,
            SyncError::AuthFailure(_) => ErrorKind::AuthFailure,
            SyncError::RateLimited(_) => ErrorKind::RateLimited,
            SyncError::NotFound(_) => ErrorKind::NotFound,
            SyncError::ValidationFailure(_) => ErrorKind::ValidationFailure,
            SyncError::FatalConfig(_) => ErrorKind::FatalConfig,
        }
    }

    /// Returns `true` for transient failures worth retrying after a delay.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::NetworkFailure(_) | SyncError::RateLimited(_)
        )
    }

    /// The bare message without the kind prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            SyncError::NetworkFailure(m)
            | SyncError::AuthFailure(m)
            | SyncError::RateLimited(m)
            | SyncError::NotFound(m)
            | SyncError::ValidationFailure(m)
            | SyncError::FatalConfig(m) => m,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::NetworkFailure => "network_failure",
            ErrorKind::AuthFailure => "auth_failure",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::NotFound => "not_found",
            ErrorKind::ValidationFailure => "validation_failure",
            ErrorKind::FatalConfig => "fatal_config",
        };
        write!(f, "{s}")
    }
}

/// Errors raised while loading environment or account configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read accounts file {path}: {source}")]
    AccountsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse accounts file: {0}")]
    AccountsFileParse(#[from] serde_yaml::Error),

    #[error("accounts validation error: {0}")]
    Validation(String),
}

impl From<ConfigError> for SyncError {
    fn from(err: ConfigError) -> Self {
        SyncError::FatalConfig(err.to_string())
    }
}
