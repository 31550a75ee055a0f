//! Metric refresh for pages that already exist.

use std::collections::HashSet;

use chrono::TimeDelta;
use threadnote_core::{ItemError, Mapping, SyncError, SyncResult};

use super::item::{ItemOutcome, Pacer};
use super::{RunContext, SyncEngine, SyncPhase};

impl SyncEngine {
    /// Mappings never measured, plus those created in the periodic window,
    /// without duplicates and in store order.
    pub(super) fn periodic_candidates(&self) -> Vec<Mapping> {
        let since =
            self.clock.now() - TimeDelta::days(i64::from(self.settings.periodic_refresh_days));
        let mut seen = HashSet::new();
        self.store
            .all()
            .into_iter()
            .filter(|m| m.metrics.is_none())
            .chain(self.store.query_by_window(since))
            .filter(|m| seen.insert(m.external_id.clone()))
            .collect()
    }

    pub(super) async fn refresh_all(
        &self,
        ctx: &RunContext,
        candidates: Vec<Mapping>,
        result: &mut SyncResult,
    ) {
        tracing::info!(account = %self.account.id, candidates = candidates.len(), "refreshing metrics");
        let mut pacer = Pacer::new(self.settings.inter_item_delay);
        for mapping in candidates {
            pacer.wait(self.clock.as_ref()).await;
            self.refresh_mapping(ctx, &mapping).await.tally(result);
        }
    }

    async fn refresh_mapping(&self, ctx: &RunContext, mapping: &Mapping) -> ItemOutcome {
        self.set_phase(SyncPhase::FetchingMetrics);
        let metrics = match self.source.get_item_metrics(&mapping.external_id).await {
            Ok(metrics) => metrics,
            Err(SyncError::NotFound(_)) => return ItemOutcome::Skipped,
            Err(e) => return self.refresh_failed(mapping, &e),
        };

        self.set_phase(SyncPhase::Upserting);
        match self.write_metrics(&mapping.page_id, &metrics, ctx).await {
            Ok(()) => {}
            Err(SyncError::NotFound(_)) => {
                tracing::info!(
                    external_id = %mapping.external_id,
                    page_id = %mapping.page_id,
                    "destination page is gone, skipping refresh"
                );
                return ItemOutcome::Skipped;
            }
            Err(e) => return self.refresh_failed(mapping, &e),
        }

        self.set_phase(SyncPhase::Recording);
        match self
            .store
            .update_metrics(&mapping.external_id, metrics, self.clock.now())
            .await
        {
            Ok(_) => ItemOutcome::Updated,
            Err(e) => self.refresh_failed(mapping, &e.into()),
        }
    }

    fn refresh_failed(&self, mapping: &Mapping, err: &SyncError) -> ItemOutcome {
        tracing::warn!(
            account = %self.account.id,
            external_id = %mapping.external_id,
            error = %err,
            "metric refresh failed"
        );
        ItemOutcome::Failed(ItemError::for_item(&mapping.external_id, err))
    }
}
