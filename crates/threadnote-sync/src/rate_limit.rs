//! Minimum-interval request scheduling per external API.
//!
//! Each API gets a lane holding the time of its last granted slot. Callers
//! queue on the lane's lock (tokio's mutex grants in arrival order), sleep
//! out whatever remains of the interval, and stamp the grant time before
//! the lock is released. A slow downstream call therefore never delays the
//! next grant past its interval, and never lets two grants bunch up after it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use threadnote_core::Clock;
use tokio::sync::Mutex;

/// Which external API a request is bound for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiKey {
    Source,
    Destination,
}

/// Default spacing for the Threads Graph API.
pub const DEFAULT_SOURCE_INTERVAL: Duration = Duration::from_millis(200);
/// Default spacing for Notion (three requests per second).
pub const DEFAULT_DESTINATION_INTERVAL: Duration = Duration::from_millis(334);

#[derive(Debug)]
struct Lane {
    min_interval: Duration,
    last_grant: Mutex<Option<DateTime<Utc>>>,
}

pub struct RateLimiter {
    clock: Arc<dyn Clock>,
    lanes: HashMap<ApiKey, Lane>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("lanes", &self.lanes)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// A limiter with no lanes; unconfigured keys are never delayed.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            lanes: HashMap::new(),
        }
    }

    /// Limiter with the default intervals for both APIs.
    #[must_use]
    pub fn with_defaults(clock: Arc<dyn Clock>) -> Self {
        Self::new(clock)
            .with_interval(ApiKey::Source, DEFAULT_SOURCE_INTERVAL)
            .with_interval(ApiKey::Destination, DEFAULT_DESTINATION_INTERVAL)
    }

    #[must_use]
    pub fn with_interval(mut self, key: ApiKey, min_interval: Duration) -> Self {
        self.lanes.insert(
            key,
            Lane {
                min_interval,
                last_grant: Mutex::new(None),
            },
        );
        self
    }

    #[must_use]
    pub fn min_interval(&self, key: ApiKey) -> Duration {
        self.lanes
            .get(&key)
            .map_or(Duration::ZERO, |lane| lane.min_interval)
    }

    /// Resolves once a request to `key` may be sent.
    pub async fn schedule(&self, key: ApiKey) {
        let Some(lane) = self.lanes.get(&key) else {
            return;
        };
        let mut last_grant = lane.last_grant.lock().await;
        if let Some(previous) = *last_grant {
            // A clock that moved backwards reads as zero elapsed.
            let elapsed = (self.clock.now() - previous)
                .to_std()
                .unwrap_or(Duration::ZERO);
            if elapsed < lane.min_interval {
                let wait = lane.min_interval - elapsed;
                tracing::trace!(?key, wait_ms = wait.as_millis(), "rate limiter delaying request");
                self.clock.sleep(wait).await;
            }
        }
        *last_grant = Some(self.clock.now());
    }
}
