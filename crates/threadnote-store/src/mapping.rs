//! The identity mapping store: which source items were already attempted,
//! and which destination page represents each synced item.
//!
//! State is held in memory for O(1) duplicate checks and written through to
//! the [`KvStore`] under per-account keys after every mutation. Both
//! collections are bounded and evict their oldest entries first.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use threadnote_core::{Mapping, Metrics};

use crate::kv::{load_json, save_json, KvStore};
use crate::StoreError;

pub const DEFAULT_SEEN_CAP: usize = 500;
pub const DEFAULT_MAPPING_CAP: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreLimits {
    pub seen_cap: usize,
    pub mapping_cap: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            seen_cap: DEFAULT_SEEN_CAP,
            mapping_cap: DEFAULT_MAPPING_CAP,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    seen: HashSet<String>,
    seen_order: VecDeque<String>,
    mappings: HashMap<String, Mapping>,
    mapping_order: VecDeque<String>,
}

impl State {
    fn ordered_mappings(&self) -> Vec<Mapping> {
        self.mapping_order
            .iter()
            .filter_map(|id| self.mappings.get(id).cloned())
            .collect()
    }

    fn seen_snapshot(&self) -> Vec<String> {
        self.seen_order.iter().cloned().collect()
    }
}

pub struct MappingStore {
    kv: Arc<dyn KvStore>,
    account_id: String,
    limits: StoreLimits,
    state: Mutex<State>,
}

impl std::fmt::Debug for MappingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingStore")
            .field("account_id", &self.account_id)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl MappingStore {
    /// Loads the store for `account_id` with default limits.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the persisted collections cannot be read.
    pub async fn load(kv: Arc<dyn KvStore>, account_id: &str) -> Result<Self, StoreError> {
        Self::load_with_limits(kv, account_id, StoreLimits::default()).await
    }

    /// # Errors
    ///
    /// Returns [`StoreError`] if the persisted collections cannot be read.
    pub async fn load_with_limits(
        kv: Arc<dyn KvStore>,
        account_id: &str,
        limits: StoreLimits,
    ) -> Result<Self, StoreError> {
        let seen: Vec<String> = load_json(kv.as_ref(), &seen_key(account_id))
            .await?
            .unwrap_or_default();
        let mappings: Vec<Mapping> = load_json(kv.as_ref(), &mappings_key(account_id))
            .await?
            .unwrap_or_default();

        let mut state = State::default();
        for id in seen {
            if state.seen.insert(id.clone()) {
                state.seen_order.push_back(id);
            }
        }
        for mapping in mappings {
            let id = mapping.external_id.clone();
            if state.mappings.insert(id.clone(), mapping).is_none() {
                state.mapping_order.push_back(id);
            }
        }
        evict_seen(&mut state, limits.seen_cap);
        evict_mappings(&mut state, limits.mapping_cap);

        tracing::debug!(
            account = %account_id,
            seen = state.seen_order.len(),
            mappings = state.mapping_order.len(),
            "loaded identity mapping store"
        );

        Ok(Self {
            kv,
            account_id: account_id.to_owned(),
            limits,
            state: Mutex::new(state),
        })
    }

    #[must_use]
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `true` if `external_id` is in the seen-id set.
    #[must_use]
    pub fn is_synced(&self, external_id: &str) -> bool {
        self.lock().seen.contains(external_id)
    }

    /// `true` if the item is in the seen-id set or has a mapping.
    #[must_use]
    pub fn is_known(&self, external_id: &str) -> bool {
        let state = self.lock();
        state.seen.contains(external_id) || state.mappings.contains_key(external_id)
    }

    /// Adds `external_id` to the seen-id set, evicting the oldest entries
    /// past the cap. Re-recording a known id keeps its original position.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the set cannot be persisted.
    pub async fn record_synced(&self, external_id: &str) -> Result<(), StoreError> {
        let snapshot = {
            let mut state = self.lock();
            if !state.seen.insert(external_id.to_owned()) {
                return Ok(());
            }
            state.seen_order.push_back(external_id.to_owned());
            evict_seen(&mut state, self.limits.seen_cap);
            state.seen_snapshot()
        };
        save_json(self.kv.as_ref(), &seen_key(&self.account_id), &snapshot).await
    }

    /// Inserts or replaces the mapping keyed by its external id. A replaced
    /// mapping keeps its insertion position.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the mappings cannot be persisted.
    pub async fn upsert_mapping(&self, mapping: Mapping) -> Result<(), StoreError> {
        let snapshot = {
            let mut state = self.lock();
            let id = mapping.external_id.clone();
            if state.mappings.insert(id.clone(), mapping).is_none() {
                state.mapping_order.push_back(id);
                evict_mappings(&mut state, self.limits.mapping_cap);
            }
            state.ordered_mappings()
        };
        self.save_mappings(&snapshot).await
    }

    /// Replaces the metrics of an existing mapping. Unknown ids are ignored;
    /// the return value says whether anything changed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the mappings cannot be persisted.
    pub async fn update_metrics(
        &self,
        external_id: &str,
        metrics: Metrics,
        measured_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let snapshot = {
            let mut state = self.lock();
            let Some(mapping) = state.mappings.get_mut(external_id) else {
                return Ok(false);
            };
            mapping.metrics = Some(metrics);
            mapping.metrics_updated_at = Some(measured_at);
            state.ordered_mappings()
        };
        self.save_mappings(&snapshot).await?;
        Ok(true)
    }

    /// Mappings whose item was created at or after `since`, in insertion
    /// order.
    #[must_use]
    pub fn query_by_window(&self, since: DateTime<Utc>) -> Vec<Mapping> {
        self.lock()
            .ordered_mappings()
            .into_iter()
            .filter(|m| m.item_created_at >= since)
            .collect()
    }

    #[must_use]
    pub fn get(&self, external_id: &str) -> Option<Mapping> {
        self.lock().mappings.get(external_id).cloned()
    }

    #[must_use]
    pub fn all(&self) -> Vec<Mapping> {
        self.lock().ordered_mappings()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().mappings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().mappings.is_empty()
    }

    /// Newest `item_created_at` across all mappings.
    #[must_use]
    pub fn latest_created_at(&self) -> Option<DateTime<Utc>> {
        self.lock()
            .mappings
            .values()
            .map(|m| m.item_created_at)
            .max()
    }

    /// Drops both collections for this account, in memory and on disk.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the keys cannot be removed.
    pub async fn clear(&self) -> Result<(), StoreError> {
        *self.lock() = State::default();
        self.kv.remove(&seen_key(&self.account_id)).await?;
        self.kv.remove(&mappings_key(&self.account_id)).await?;
        tracing::info!(account = %self.account_id, "cleared identity mapping store");
        Ok(())
    }

    async fn save_mappings(&self, snapshot: &[Mapping]) -> Result<(), StoreError> {
        save_json(self.kv.as_ref(), &mappings_key(&self.account_id), snapshot).await
    }
}

fn seen_key(account_id: &str) -> String {
    format!("seen:{account_id}")
}

fn mappings_key(account_id: &str) -> String {
    format!("mappings:{account_id}")
}

fn evict_seen(state: &mut State, cap: usize) {
    while state.seen_order.len() > cap {
        if let Some(oldest) = state.seen_order.pop_front() {
            state.seen.remove(&oldest);
        }
    }
}

fn evict_mappings(state: &mut State, cap: usize) {
    while state.mapping_order.len() > cap {
        if let Some(oldest) = state.mapping_order.pop_front() {
            tracing::debug!(external_id = %oldest, "evicting oldest mapping");
            state.mappings.remove(&oldest);
        }
    }
}

#[cfg(test)]
#[path = "mapping_test.rs"]
mod tests;
