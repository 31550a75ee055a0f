//! The per-item pipeline: duplicate check, metrics fetch, destination
//! upsert, and recording.

use std::time::Duration;

use chrono::{DateTime, Utc};
use threadnote_core::{
    Clock, ContentItem, ItemError, Mapping, Metrics, PageFilter, PageQuery, PropertyValue, Role,
    SyncError, SyncResult,
};

use super::{RunContext, SyncEngine, SyncPhase};
use crate::properties::{item_properties, metric_properties, title_for};
use crate::retry::retry_with_backoff;

/// How one item (or one refreshed mapping) ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// A new destination page was created.
    Synced,
    /// An existing page was re-linked or had its metrics refreshed.
    Updated,
    Skipped,
    Failed(ItemError),
}

impl ItemOutcome {
    pub(crate) fn tally(self, result: &mut SyncResult) {
        match self {
            ItemOutcome::Synced => result.synced_count += 1,
            ItemOutcome::Updated => result.updated_count += 1,
            ItemOutcome::Skipped => result.skipped_count += 1,
            ItemOutcome::Failed(error) => result.errors.push(error),
        }
    }
}

/// Spaces out consecutive items that reach the network. The first item is
/// never delayed.
pub(crate) struct Pacer {
    delay: Duration,
    started: bool,
}

impl Pacer {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            delay,
            started: false,
        }
    }

    pub(crate) async fn wait(&mut self, clock: &dyn Clock) {
        if self.started && !self.delay.is_zero() {
            clock.sleep(self.delay).await;
        }
        self.started = true;
    }
}

impl SyncEngine {
    pub(super) async fn sync_item(
        &self,
        ctx: &RunContext,
        item: &ContentItem,
        newer_than: Option<DateTime<Utc>>,
        pacer: &mut Pacer,
    ) -> ItemOutcome {
        self.set_phase(SyncPhase::CheckingDuplicate);

        if item.is_derivative() {
            return ItemOutcome::Skipped;
        }
        if !item.username.eq_ignore_ascii_case(&ctx.handle) {
            tracing::debug!(
                external_id = %item.id,
                author = %item.username,
                handle = %ctx.handle,
                "skipping item by another author"
            );
            return ItemOutcome::Skipped;
        }
        if newer_than.is_some_and(|bound| item.created_at <= bound) {
            return ItemOutcome::Skipped;
        }
        if self.store.is_known(&item.id) {
            return ItemOutcome::Skipped;
        }

        pacer.wait(self.clock.as_ref()).await;
        match self.sync_new_item(ctx, item).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(
                    account = %self.account.id,
                    external_id = %item.id,
                    error = %e,
                    "item failed"
                );
                ItemOutcome::Failed(ItemError::for_item(&item.id, &e))
            }
        }
    }

    async fn sync_new_item(
        &self,
        ctx: &RunContext,
        item: &ContentItem,
    ) -> Result<ItemOutcome, SyncError> {
        let existing_page = self.find_existing_page(ctx, item).await;

        self.set_phase(SyncPhase::FetchingMetrics);
        let metrics = match self.source.get_item_metrics(&item.id).await {
            Ok(metrics) => metrics,
            Err(SyncError::NotFound(msg)) => {
                tracing::info!(external_id = %item.id, reason = %msg, "item has no metrics, skipping");
                return Ok(ItemOutcome::Skipped);
            }
            Err(e) => return Err(e),
        };

        self.set_phase(SyncPhase::Upserting);
        let (page_id, outcome) = match existing_page {
            Some(page_id) => {
                self.write_metrics(&page_id, &metrics, ctx).await?;
                tracing::info!(external_id = %item.id, page_id = %page_id, "re-linked existing page");
                (page_id, ItemOutcome::Updated)
            }
            None => {
                let page_id = self.create_page(ctx, item, &metrics).await?;
                tracing::info!(external_id = %item.id, page_id = %page_id, "created page");
                (page_id, ItemOutcome::Synced)
            }
        };

        self.set_phase(SyncPhase::Recording);
        self.store
            .upsert_mapping(Mapping {
                external_id: item.id.clone(),
                page_id,
                source_url: item.permalink.clone(),
                item_created_at: item.created_at,
                title: title_for(item),
                metrics: Some(metrics),
                metrics_updated_at: Some(self.clock.now()),
            })
            .await?;
        self.store.record_synced(&item.id).await?;
        Ok(outcome)
    }

    /// Looks the item up in the destination by url, or by external id when
    /// no url field is mapped. Lookup failures are logged and treated as
    /// "not found" so the item is still created.
    async fn find_existing_page(&self, ctx: &RunContext, item: &ContentItem) -> Option<String> {
        let filter = if let Some(field) = ctx.mapping.get(Role::Url) {
            PageFilter {
                field: field.to_owned(),
                equals: PropertyValue::Url(item.permalink.clone()),
            }
        } else if let Some(field) = ctx.mapping.get(Role::ExternalId) {
            PageFilter {
                field: field.to_owned(),
                equals: PropertyValue::RichText(item.id.clone()),
            }
        } else {
            return None;
        };

        let query = PageQuery {
            filter: Some(filter),
            page_size: Some(1),
            ..PageQuery::default()
        };
        match self
            .destination
            .query_pages(&self.account.destination_collection_id, &query)
            .await
        {
            Ok(page) => page.items.into_iter().next().map(|p| p.id),
            Err(e) => {
                tracing::warn!(
                    external_id = %item.id,
                    error = %e,
                    "destination lookup failed, creating a new page"
                );
                None
            }
        }
    }

    async fn create_page(
        &self,
        ctx: &RunContext,
        item: &ContentItem,
        metrics: &Metrics,
    ) -> Result<String, SyncError> {
        let properties = item_properties(item, Some(metrics), &ctx.mapping);
        let content = (!item.text.trim().is_empty()).then_some(item.text.as_str());
        let collection_id = self.account.destination_collection_id.as_str();
        retry_with_backoff(
            self.clock.as_ref(),
            self.settings.write_retry,
            "create_page",
            || self.destination.create_page(collection_id, &properties, content),
        )
        .await
    }

    pub(super) async fn write_metrics(
        &self,
        page_id: &str,
        metrics: &Metrics,
        ctx: &RunContext,
    ) -> Result<(), SyncError> {
        let properties = metric_properties(metrics, &ctx.mapping);
        if properties.is_empty() {
            return Ok(());
        }
        retry_with_backoff(
            self.clock.as_ref(),
            self.settings.write_retry,
            "update_page_properties",
            || self.destination.update_page_properties(page_id, &properties),
        )
        .await
    }
}
