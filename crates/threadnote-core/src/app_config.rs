use std::path::PathBuf;

#[derive(Clone)]
pub struct AppConfig {
    pub accounts_path: PathBuf,
    pub state_path: PathBuf,
    pub log_level: String,
    /// Default destination credential for accounts that do not carry their own.
    pub notion_token: Option<String>,
    /// Needed only for short-to-long credential exchange.
    pub threads_app_secret: Option<String>,
    pub request_timeout_secs: u64,
    pub threads_min_interval_ms: u64,
    pub notion_min_interval_ms: u64,
    pub recent_limit: u32,
    pub inter_item_delay_ms: u64,
    pub write_max_attempts: u32,
    pub write_backoff_base_ms: u64,
    pub refresh_window_days: u32,
    pub schedule: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("accounts_path", &self.accounts_path)
            .field("state_path", &self.state_path)
            .field("log_level", &self.log_level)
            .field(
                "notion_token",
                &self.notion_token.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "threads_app_secret",
                &self.threads_app_secret.as_ref().map(|_| "[redacted]"),
            )
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("threads_min_interval_ms", &self.threads_min_interval_ms)
            .field("notion_min_interval_ms", &self.notion_min_interval_ms)
            .field("recent_limit", &self.recent_limit)
            .field("inter_item_delay_ms", &self.inter_item_delay_ms)
            .field("write_max_attempts", &self.write_max_attempts)
            .field("write_backoff_base_ms", &self.write_backoff_base_ms)
            .field("refresh_window_days", &self.refresh_window_days)
            .field("schedule", &self.schedule)
            .finish()
    }
}
