//! The per-account sync orchestrator.
//!
//! Every entry point runs the same machine:
//! `Idle → VerifyingIdentity → Listing → (CheckingDuplicate → FetchingMetrics
//! → Upserting → Recording)* → AggregatingResult → Idle`, differing only in
//! where items come from and what happens after the loop. All entry points
//! share one [`SingleFlight`] guard, so a caller arriving mid-run receives
//! that run's result instead of starting another. Engines built with
//! [`SyncEngine::with_flight`] share the guard across accounts, which keeps
//! the whole process to one run at a time.

mod item;
mod refresh;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use futures::StreamExt;
use threadnote_core::{
    Account, AppConfig, Clock, ContentItem, DestinationApi, FieldMapping, ItemError, ListQuery,
    SourceApi, SyncError, SyncResult,
};
use threadnote_store::MappingStore;
use tokio::sync::watch;

use crate::insights::InsightsCache;
use crate::paginate::{walk, PageLimits};
use crate::retry::RetryPolicy;
use crate::schema::SchemaCache;
use crate::single_flight::SingleFlight;
use crate::token::TokenManager;

pub use item::ItemOutcome;
use item::Pacer;

/// The Threads listing endpoint returns at most this many items per page.
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    VerifyingIdentity,
    Listing,
    CheckingDuplicate,
    FetchingMetrics,
    Upserting,
    Recording,
    AggregatingResult,
}

/// Which entry point started a run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunKind {
    Incremental,
    Manual,
    Backfill { since: Option<DateTime<Utc>> },
    PeriodicRefresh,
    Single(Box<ContentItem>),
}

impl RunKind {
    fn label(&self) -> &'static str {
        match self {
            RunKind::Incremental => "incremental",
            RunKind::Manual => "manual",
            RunKind::Backfill { .. } => "backfill",
            RunKind::PeriodicRefresh => "periodic_refresh",
            RunKind::Single(_) => "single",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    /// Items listed by an incremental run.
    pub recent_limit: u32,
    pub inter_item_delay: Duration,
    pub write_retry: RetryPolicy,
    /// Metric refresh window for manual runs.
    pub manual_refresh_days: u32,
    /// Recent-item window for periodic refresh runs.
    pub periodic_refresh_days: u32,
    pub backfill_limits: PageLimits,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            recent_limit: 25,
            inter_item_delay: Duration::from_millis(300),
            write_retry: RetryPolicy::default(),
            manual_refresh_days: 14,
            periodic_refresh_days: 7,
            backfill_limits: PageLimits::backfill(),
        }
    }
}

impl SyncSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            recent_limit: config.recent_limit,
            inter_item_delay: Duration::from_millis(config.inter_item_delay_ms),
            write_retry: RetryPolicy {
                max_attempts: config.write_max_attempts,
                base_delay: Duration::from_millis(config.write_backoff_base_ms),
            },
            manual_refresh_days: config.refresh_window_days,
            ..Self::default()
        }
    }
}

/// What a run knows once setup succeeded.
struct RunContext {
    handle: String,
    mapping: FieldMapping,
}

pub struct SyncEngine {
    account: Account,
    source: Arc<dyn SourceApi>,
    destination: Arc<dyn DestinationApi>,
    store: Arc<MappingStore>,
    schemas: Arc<SchemaCache>,
    insights: Arc<InsightsCache>,
    tokens: Option<Arc<TokenManager>>,
    clock: Arc<dyn Clock>,
    settings: SyncSettings,
    flight: Arc<SingleFlight<SyncResult>>,
    phase: watch::Sender<SyncPhase>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("account", &self.account.id)
            .field("phase", &*self.phase.borrow())
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    /// Builds an engine for one account. `source` and `destination` should
    /// already be rate limited.
    #[must_use]
    pub fn new(
        account: Account,
        source: Arc<dyn SourceApi>,
        destination: Arc<dyn DestinationApi>,
        store: Arc<MappingStore>,
        insights: Arc<InsightsCache>,
        clock: Arc<dyn Clock>,
        settings: SyncSettings,
    ) -> Self {
        let (phase, _) = watch::channel(SyncPhase::Idle);
        Self {
            account,
            source,
            destination,
            store,
            schemas: Arc::new(SchemaCache::new()),
            insights,
            tokens: None,
            clock,
            settings,
            flight: Arc::new(SingleFlight::new()),
            phase,
        }
    }

    #[must_use]
    pub fn with_schema_cache(mut self, schemas: Arc<SchemaCache>) -> Self {
        self.schemas = schemas;
        self
    }

    /// Replaces the engine's own run guard with one shared by other engines.
    /// A run started on any of them is joined by callers of all of them.
    #[must_use]
    pub fn with_flight(mut self, flight: Arc<SingleFlight<SyncResult>>) -> Self {
        self.flight = flight;
        self
    }

    #[must_use]
    pub fn with_token_manager(mut self, tokens: Arc<TokenManager>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    #[must_use]
    pub fn account(&self) -> &Account {
        &self.account
    }

    #[must_use]
    pub fn store(&self) -> &Arc<MappingStore> {
        &self.store
    }

    #[must_use]
    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    /// Watches phase transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.flight.is_running()
    }

    /// Lists the most recent items and syncs the new ones.
    pub async fn run_incremental(self: &Arc<Self>) -> SyncResult {
        self.run_exclusive(RunKind::Incremental).await
    }

    /// Refreshes metrics for recent mappings, then syncs items newer than
    /// the newest one already mapped.
    pub async fn run_manual(self: &Arc<Self>) -> SyncResult {
        self.run_exclusive(RunKind::Manual).await
    }

    /// Walks the account history from `since` (or the beginning).
    pub async fn run_backfill(self: &Arc<Self>, since: Option<DateTime<Utc>>) -> SyncResult {
        self.run_exclusive(RunKind::Backfill { since }).await
    }

    /// Re-measures unmeasured mappings and those from the last seven days.
    pub async fn run_periodic_refresh(self: &Arc<Self>) -> SyncResult {
        self.run_exclusive(RunKind::PeriodicRefresh).await
    }

    /// Runs the per-item pipeline for one externally supplied item.
    pub async fn run_single(self: &Arc<Self>, item: ContentItem) -> SyncResult {
        self.run_exclusive(RunKind::Single(Box::new(item))).await
    }

    async fn run_exclusive(self: &Arc<Self>, kind: RunKind) -> SyncResult {
        let this = Arc::clone(self);
        self.flight
            .run_exclusive(move || async move { this.execute(kind).await })
            .await
    }

    fn recent_limit(&self) -> usize {
        usize::try_from(self.settings.recent_limit).unwrap_or(usize::MAX)
    }

    fn set_phase(&self, phase: SyncPhase) {
        self.phase.send_replace(phase);
    }

    async fn execute(&self, kind: RunKind) -> SyncResult {
        let account_id = self.account.id.clone();
        let label = kind.label();
        tracing::info!(account = %account_id, run = label, "sync run starting");

        // Captured before any work so items recorded during this run do not
        // move the bound.
        let newest_known = self.store.latest_created_at();

        let ctx = match self.prepare().await {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::error!(account = %account_id, run = label, error = %e, "sync run aborted");
                self.set_phase(SyncPhase::Idle);
                return SyncResult::failed(&account_id, &e);
            }
        };

        let mut result = SyncResult::new(&account_id);
        match kind {
            RunKind::Incremental => {
                let query = ListQuery {
                    limit: Some(self.settings.recent_limit.clamp(1, MAX_PAGE_SIZE)),
                    ..ListQuery::default()
                };
                let limits = PageLimits::items(self.recent_limit());
                self.list_and_sync(&ctx, query, limits, None, &mut result)
                    .await;
            }
            RunKind::Manual => {
                let since = self.clock.now()
                    - TimeDelta::days(i64::from(self.settings.manual_refresh_days));
                let candidates = self.store.query_by_window(since);
                self.refresh_all(&ctx, candidates, &mut result).await;

                let query = ListQuery {
                    since: newest_known,
                    limit: Some(self.settings.recent_limit.clamp(1, MAX_PAGE_SIZE)),
                    ..ListQuery::default()
                };
                // With nothing mapped yet there is no bound; behave like an
                // incremental run.
                let limits = if newest_known.is_some() {
                    self.settings.backfill_limits
                } else {
                    PageLimits::items(self.recent_limit())
                };
                self.list_and_sync(&ctx, query, limits, newest_known, &mut result)
                    .await;
            }
            RunKind::Backfill { since } => {
                let query = ListQuery {
                    since,
                    limit: Some(MAX_PAGE_SIZE),
                    ..ListQuery::default()
                };
                self.list_and_sync(&ctx, query, self.settings.backfill_limits, None, &mut result)
                    .await;
            }
            RunKind::PeriodicRefresh => {
                let candidates = self.periodic_candidates();
                self.refresh_all(&ctx, candidates, &mut result).await;
            }
            RunKind::Single(item) => {
                let mut pacer = Pacer::new(Duration::ZERO);
                self.sync_item(&ctx, &item, None, &mut pacer)
                    .await
                    .tally(&mut result);
            }
        }

        self.set_phase(SyncPhase::AggregatingResult);
        result.followers_count = self
            .insights
            .followers_count(&self.account.id, self.source.as_ref())
            .await;
        self.set_phase(SyncPhase::Idle);

        tracing::info!(
            account = %account_id,
            run = label,
            synced = result.synced_count,
            skipped = result.skipped_count,
            updated = result.updated_count,
            errors = result.errors.len(),
            "sync run finished"
        );
        result
    }

    /// Credential freshness, identity verification, and field mapping.
    /// Any failure here aborts the run.
    async fn prepare(&self) -> Result<RunContext, SyncError> {
        self.set_phase(SyncPhase::VerifyingIdentity);

        if self.account.destination_collection_id.trim().is_empty() {
            return Err(SyncError::FatalConfig(format!(
                "account {} has no destination collection",
                self.account.id
            )));
        }

        if let Some(tokens) = &self.tokens {
            // A failed refresh is already reported by the manager; the
            // identity check below decides whether the run can go on.
            if let Err(e) = tokens.ensure_fresh().await {
                tracing::warn!(account = %self.account.id, error = %e, "credential refresh failed before run");
            }
        }

        let identity = self.source.verify_identity().await?;
        tracing::debug!(account = %self.account.id, handle = %identity.username, "identity verified");

        let mapping = self
            .schemas
            .resolve(
                self.destination.as_ref(),
                &self.account.destination_collection_id,
                self.account.field_mapping.as_ref(),
            )
            .await?;

        Ok(RunContext {
            handle: identity.username,
            mapping,
        })
    }

    /// Streams the listing through the paginator and syncs each item in
    /// listing order. A listing failure ends the run with a run-level error;
    /// items already handled keep their counts.
    async fn list_and_sync(
        &self,
        ctx: &RunContext,
        base: ListQuery,
        limits: PageLimits,
        newer_than: Option<DateTime<Utc>>,
        result: &mut SyncResult,
    ) {
        self.set_phase(SyncPhase::Listing);
        let source = Arc::clone(&self.source);
        let fetch = move |cursor: Option<String>| {
            let source = Arc::clone(&source);
            let query = ListQuery {
                cursor,
                ..base.clone()
            };
            async move { source.list_items(&query).await }
        };
        let batches = walk(
            fetch,
            None,
            limits,
            Arc::clone(&self.clock),
            |item: &ContentItem| !item.is_derivative(),
        );
        futures::pin_mut!(batches);

        let mut pacer = Pacer::new(self.settings.inter_item_delay);
        while let Some(batch) = batches.next().await {
            let items = match batch {
                Ok(items) => items,
                Err(e) => {
                    tracing::error!(account = %self.account.id, error = %e, "listing failed, ending run");
                    result.errors.push(ItemError::fatal(&e));
                    return;
                }
            };
            for item in &items {
                self.sync_item(ctx, item, newer_than, &mut pacer)
                    .await
                    .tally(result);
            }
            self.set_phase(SyncPhase::Listing);
        }
    }
}
