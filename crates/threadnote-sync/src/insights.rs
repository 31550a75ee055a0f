//! Time-windowed metric aggregation with a follower-count cache.
//!
//! Sums come from the identity mapping store; only the follower count needs
//! the network. It is cached per account for [`FOLLOWER_TTL`] and persisted,
//! and a failed fetch falls back to the last known value. Concurrent
//! aggregations for the same account and window share one computation.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use threadnote_core::{Clock, Metrics, SourceApi};
use threadnote_store::{load_json, save_json, KvStore, MappingStore};

use crate::single_flight::KeyedFlight;

pub const FOLLOWER_TTL: Duration = Duration::from_secs(60 * 60);

/// Aggregation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Window {
    Days(u32),
    AllTime,
}

impl Window {
    #[must_use]
    pub fn days(self) -> Option<u32> {
        match self {
            Window::Days(n) => Some(n),
            Window::AllTime => None,
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Window::Days(n) => write!(f, "{n}d"),
            Window::AllTime => f.write_str("all"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsightsReport {
    pub account_id: String,
    pub window: Window,
    /// `None` for [`Window::AllTime`].
    pub window_days: Option<u32>,
    pub metrics: Metrics,
    pub post_count: u64,
    pub followers_count: Option<u64>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct CachedFollowers {
    count: u64,
    fetched_at: DateTime<Utc>,
}

/// Sums metrics over the mappings created inside `window`. Mappings that
/// were never measured count as zero.
#[must_use]
pub fn sum_window(store: &MappingStore, window: Window, now: DateTime<Utc>) -> (Metrics, u64) {
    let mappings = match window {
        Window::Days(n) => store.query_by_window(now - TimeDelta::days(i64::from(n))),
        Window::AllTime => store.all(),
    };
    let metrics = mappings
        .iter()
        .map(|m| m.metrics.unwrap_or_default())
        .fold(Metrics::default(), Metrics::saturating_add);
    (metrics, u64::try_from(mappings.len()).unwrap_or(u64::MAX))
}

pub struct InsightsCache {
    clock: Arc<dyn Clock>,
    kv: Arc<dyn KvStore>,
    ttl: Duration,
    followers: Mutex<HashMap<String, CachedFollowers>>,
    inflight: KeyedFlight<(String, Window), InsightsReport>,
}

impl fmt::Debug for InsightsCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InsightsCache")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl InsightsCache {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, kv: Arc<dyn KvStore>) -> Self {
        Self::with_ttl(clock, kv, FOLLOWER_TTL)
    }

    #[must_use]
    pub fn with_ttl(clock: Arc<dyn Clock>, kv: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self {
            clock,
            kv,
            ttl,
            followers: Mutex::new(HashMap::new()),
            inflight: KeyedFlight::new(),
        }
    }

    /// Aggregates `window` for the store's account. Callers overlapping on
    /// the same account and window share one computation.
    pub async fn aggregate(
        self: &Arc<Self>,
        store: Arc<MappingStore>,
        source: Arc<dyn SourceApi>,
        window: Window,
    ) -> InsightsReport {
        let key = (store.account_id().to_owned(), window);
        let this = Arc::clone(self);
        let flight = self.inflight.join(key, move || async move {
            let (metrics, post_count) = sum_window(&store, window, this.clock.now());
            let followers_count = this
                .followers_count(store.account_id(), source.as_ref())
                .await;
            InsightsReport {
                account_id: store.account_id().to_owned(),
                window,
                window_days: window.days(),
                metrics,
                post_count,
                followers_count,
                generated_at: this.clock.now(),
            }
        });
        flight.await
    }

    /// Follower count for `account_id`, fresh within the TTL, otherwise
    /// fetched. A failed fetch returns the last known value.
    pub async fn followers_count(&self, account_id: &str, source: &dyn SourceApi) -> Option<u64> {
        let now = self.clock.now();
        let cached = self.cached_followers(account_id).await;
        if let Some(hit) = cached.filter(|c| self.is_fresh(c, now)) {
            return Some(hit.count);
        }

        match source.get_account_metrics(None).await {
            Ok(account) => match account.followers_count {
                Some(count) => {
                    let entry = CachedFollowers {
                        count,
                        fetched_at: self.clock.now(),
                    };
                    self.remember(account_id, entry).await;
                    Some(count)
                }
                None => cached.map(|c| c.count),
            },
            Err(e) => {
                tracing::warn!(
                    account = %account_id,
                    error = %e,
                    stale = ?cached.map(|c| c.count),
                    "follower count fetch failed, using last known value"
                );
                cached.map(|c| c.count)
            }
        }
    }

    fn is_fresh(&self, cached: &CachedFollowers, now: DateTime<Utc>) -> bool {
        (now - cached.fetched_at)
            .to_std()
            .is_ok_and(|age| age < self.ttl)
    }

    async fn cached_followers(&self, account_id: &str) -> Option<CachedFollowers> {
        let in_memory = self
            .followers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(account_id)
            .copied();
        if in_memory.is_some() {
            return in_memory;
        }

        match load_json::<CachedFollowers>(self.kv.as_ref(), &followers_key(account_id)).await {
            Ok(Some(persisted)) => {
                self.followers
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(account_id.to_owned(), persisted);
                Some(persisted)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(account = %account_id, error = %e, "ignoring unreadable follower cache");
                None
            }
        }
    }

    async fn remember(&self, account_id: &str, entry: CachedFollowers) {
        self.followers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(account_id.to_owned(), entry);
        if let Err(e) = save_json(self.kv.as_ref(), &followers_key(account_id), &entry).await {
            tracing::warn!(account = %account_id, error = %e, "failed to persist follower count");
        }
    }
}

fn followers_key(account_id: &str) -> String {
    format!("followers:{account_id}")
}
