use crate::app_config::AppConfig;
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if values are present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// # Errors
///
/// Returns `ConfigError` if values are present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Core parsing/validation logic, decoupled from the process environment so
/// it can be tested with a plain `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> { lookup(var).ok().filter(|v| !v.is_empty()) };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let accounts_path = PathBuf::from(or_default(
        "THREADNOTE_ACCOUNTS_PATH",
        "./config/accounts.yaml",
    ));
    let state_path = PathBuf::from(or_default("THREADNOTE_STATE_PATH", "./data/state.json"));
    let log_level = or_default("THREADNOTE_LOG_LEVEL", "info");
    let notion_token = optional("NOTION_TOKEN");
    let threads_app_secret = optional("THREADS_APP_SECRET");

    let request_timeout_secs = parse_u64("THREADNOTE_REQUEST_TIMEOUT_SECS", "30")?;
    let threads_min_interval_ms = parse_u64("THREADNOTE_THREADS_MIN_INTERVAL_MS", "200")?;
    let notion_min_interval_ms = parse_u64("THREADNOTE_NOTION_MIN_INTERVAL_MS", "334")?;
    let recent_limit = parse_u32("THREADNOTE_RECENT_LIMIT", "25")?;
    let inter_item_delay_ms = parse_u64("THREADNOTE_INTER_ITEM_DELAY_MS", "300")?;
    let write_max_attempts = parse_u32("THREADNOTE_WRITE_MAX_ATTEMPTS", "3")?;
    let write_backoff_base_ms = parse_u64("THREADNOTE_WRITE_BACKOFF_BASE_MS", "1000")?;
    let refresh_window_days = parse_u32("THREADNOTE_REFRESH_WINDOW_DAYS", "14")?;
    let schedule = or_default("THREADNOTE_SCHEDULE", "0 0 * * * *");

    if write_max_attempts == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "THREADNOTE_WRITE_MAX_ATTEMPTS".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    if recent_limit == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "THREADNOTE_RECENT_LIMIT".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    Ok(AppConfig {
        accounts_path,
        state_path,
        log_level,
        notion_token,
        threads_app_secret,
        request_timeout_secs,
        threads_min_interval_ms,
        notion_min_interval_ms,
        recent_limit,
        inter_item_delay_ms,
        write_max_attempts,
        write_backoff_base_ms,
        refresh_window_days,
        schedule,
    })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
