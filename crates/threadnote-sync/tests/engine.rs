mod support;

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use threadnote_core::{
    Clock, ErrorKind, Identity, ManualClock, Mapping, MediaType, PropertyValue, SyncError,
};
use threadnote_store::{KvStore, MappingStore, MemoryStore};
use threadnote_sync::{
    InsightsCache, RateLimitedDestination, RateLimitedSource, RateLimiter, SingleFlight,
    SyncEngine, SyncPhase,
};
use tokio::sync::Notify;

use support::{
    account, harness, harness_sharing, harness_with, item, metrics, settings, t0, url_property,
    Calls, StubDestination, StubSource, HANDLE,
};

fn mapping(id: &str, page_id: &str, minutes_ago: i64, measured: bool) -> Mapping {
    let item = item(id, minutes_ago);
    Mapping {
        external_id: id.to_owned(),
        page_id: page_id.to_owned(),
        source_url: item.permalink,
        item_created_at: item.created_at,
        title: format!("post {id}"),
        metrics: measured.then(|| metrics(1)),
        metrics_updated_at: measured.then(t0),
    }
}

#[tokio::test]
async fn incremental_run_creates_pages_and_is_idempotent() {
    let h = harness(StubSource::with_items(vec![
        item("A", 10),
        item("B", 20),
        item("C", 30),
    ]))
    .await;

    let first = h.engine.run_incremental().await;
    assert_eq!(first.synced_count, 3);
    assert!(first.is_success());
    assert_eq!(first.followers_count, Some(150));
    assert_eq!(h.destination.page_count(), 3);
    assert_eq!(h.store.len(), 3);

    let second = h.engine.run_incremental().await;
    assert_eq!(second.synced_count, 0);
    assert_eq!(second.skipped_count, 3);
    assert_eq!(h.destination.page_count(), 3);
    assert_eq!(Calls::get(&h.destination.create_calls), 3);
}

#[tokio::test]
async fn created_page_carries_mapped_properties_and_body() {
    let h = harness(StubSource::with_items(vec![item("A", 10)])).await;
    h.engine.run_incremental().await;

    let page = h.destination.page("page-1").unwrap();
    assert_eq!(
        page.properties.get("Name"),
        Some(&PropertyValue::Title("post A".to_owned()))
    );
    assert_eq!(
        page.properties.get("Post ID"),
        Some(&PropertyValue::RichText("A".to_owned()))
    );
    assert_eq!(page.properties.get("Views"), Some(&PropertyValue::Number(100)));
    assert_eq!(page.content.as_deref(), Some("post A\n\nsecond paragraph"));

    let stored = h.store.get("A").unwrap();
    assert_eq!(stored.page_id, "page-1");
    assert_eq!(stored.metrics, Some(metrics(100)));
    assert_eq!(stored.metrics_updated_at, Some(t0()));
}

#[tokio::test]
async fn known_items_are_skipped() {
    let h = harness(StubSource::with_items(vec![
        item("A", 10),
        item("B", 20),
        item("C", 30),
    ]))
    .await;
    h.store.record_synced("A").await.unwrap();
    h.store.record_synced("B").await.unwrap();

    let result = h.engine.run_incremental().await;
    assert_eq!(result.synced_count, 1);
    assert_eq!(result.skipped_count, 2);
    assert_eq!(Calls::get(&h.source.calls.item_metrics), 1);
}

#[tokio::test]
async fn metrics_failure_is_recorded_and_run_continues() {
    let source = StubSource::with_items(vec![item("A", 10), item("B", 20), item("C", 30)]);
    source.set_metrics("B", Err(SyncError::NetworkFailure("timeout".into())));
    let h = harness(source).await;

    let result = h.engine.run_incremental().await;
    assert_eq!(result.synced_count, 2);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].external_id.as_deref(), Some("B"));
    assert_eq!(result.errors[0].kind, ErrorKind::NetworkFailure);
    assert!(!result.is_fatal());
    assert!(!h.store.is_known("B"));
}

#[tokio::test]
async fn item_without_metrics_is_skipped() {
    let source = StubSource::with_items(vec![item("A", 10)]);
    source.set_metrics("A", Err(SyncError::NotFound("deleted".into())));
    let h = harness(source).await;

    let result = h.engine.run_incremental().await;
    assert_eq!(result.skipped_count, 1);
    assert!(result.is_success());
    assert_eq!(h.destination.page_count(), 0);
}

#[tokio::test]
async fn other_authors_are_skipped_case_insensitively() {
    let mut foreign = item("X", 5);
    foreign.username = "someone_else".to_owned();
    let mut shouting = item("Y", 6);
    shouting.username = HANDLE.to_uppercase();
    let h = harness(StubSource::with_items(vec![foreign, shouting])).await;

    let result = h.engine.run_incremental().await;
    assert_eq!(result.synced_count, 1);
    assert_eq!(result.skipped_count, 1);
    assert!(h.store.is_known("Y"));
    assert!(!h.store.is_known("X"));
}

#[tokio::test]
async fn derivative_items_never_reach_the_pipeline() {
    let mut repost = item("R", 5);
    repost.media_type = MediaType::RepostFacade;
    let mut quote = item("Q", 6);
    quote.is_quote_post = true;
    let h = harness(StubSource::with_items(vec![repost, quote, item("A", 7)])).await;

    let result = h.engine.run_incremental().await;
    assert_eq!(result.synced_count, 1);
    assert_eq!(result.skipped_count, 0);
    assert_eq!(Calls::get(&h.source.calls.item_metrics), 1);
}

#[tokio::test]
async fn existing_page_is_relinked_instead_of_duplicated() {
    let h = harness(StubSource::with_items(vec![item("A", 10)])).await;
    h.destination
        .seed_page("existing-1", [url_property("A")].into_iter().collect());

    let result = h.engine.run_incremental().await;
    assert_eq!(result.updated_count, 1);
    assert_eq!(result.synced_count, 0);
    assert_eq!(h.destination.page_count(), 1);
    assert_eq!(h.store.get("A").unwrap().page_id, "existing-1");
    assert_eq!(
        h.destination.page("existing-1").unwrap().properties.get("Views"),
        Some(&PropertyValue::Number(100))
    );
}

#[tokio::test]
async fn identity_failure_aborts_before_listing() {
    let source = StubSource::with_items(vec![item("A", 10)]);
    source.set_identity(Err(SyncError::AuthFailure("expired".into())));
    let h = harness(source).await;

    let result = h.engine.run_incremental().await;
    assert!(result.is_fatal());
    assert_eq!(result.errors[0].kind, ErrorKind::AuthFailure);
    assert_eq!(result.synced_count, 0);
    assert_eq!(Calls::get(&h.source.calls.list), 0);
    assert_eq!(h.engine.phase(), SyncPhase::Idle);
}

#[tokio::test]
async fn missing_collection_is_fatal_config() {
    let mut acct = account();
    acct.destination_collection_id = "  ".to_owned();
    let h = harness_with(StubSource::default(), acct, settings()).await;

    let result = h.engine.run_incremental().await;
    assert_eq!(result.errors[0].kind, ErrorKind::FatalConfig);
    assert_eq!(Calls::get(&h.source.calls.verify), 0);
}

#[tokio::test]
async fn schema_without_title_is_validation_failure() {
    let h = harness(StubSource::with_items(vec![item("A", 10)])).await;
    h.destination
        .schema
        .lock()
        .unwrap()
        .fields
        .retain(|f| f.name != "Name");

    let result = h.engine.run_incremental().await;
    assert!(result.is_fatal());
    assert_eq!(result.errors[0].kind, ErrorKind::ValidationFailure);
    assert_eq!(Calls::get(&h.source.calls.list), 0);
}

#[tokio::test]
async fn transient_create_failure_is_retried() {
    let h = harness(StubSource::with_items(vec![item("A", 10)])).await;
    h.destination
        .create_failures
        .lock()
        .unwrap()
        .push_back(SyncError::NetworkFailure("502".into()));

    let result = h.engine.run_incremental().await;
    assert_eq!(result.synced_count, 1);
    assert_eq!(Calls::get(&h.destination.create_calls), 2);
    let sleeps = h.clock.sleeps();
    assert_eq!(sleeps.len(), 1);
    assert!(sleeps[0] >= Duration::from_millis(7) && sleeps[0] <= Duration::from_millis(12));
}

#[tokio::test]
async fn rejected_create_is_not_retried() {
    let h = harness(StubSource::with_items(vec![item("A", 10)])).await;
    h.destination
        .create_failures
        .lock()
        .unwrap()
        .push_back(SyncError::ValidationFailure("bad property".into()));

    let result = h.engine.run_incremental().await;
    assert_eq!(result.synced_count, 0);
    assert_eq!(result.errors[0].kind, ErrorKind::ValidationFailure);
    assert_eq!(Calls::get(&h.destination.create_calls), 1);
    assert!(!h.store.is_known("A"));
}

#[tokio::test]
async fn consecutive_items_are_paced() {
    let h = harness(StubSource::with_items(vec![
        item("A", 10),
        item("B", 20),
        item("C", 30),
    ]))
    .await;

    h.engine.run_incremental().await;
    assert_eq!(h.clock.sleeps(), vec![Duration::from_millis(300); 2]);
}

#[tokio::test]
async fn concurrent_manual_runs_share_one_execution() {
    let source = StubSource::with_items(vec![item("A", 10), item("B", 20)]);
    let gate = Arc::new(Notify::new());
    *source.gate.lock().unwrap() = Some(Arc::clone(&gate));
    let h = harness(source).await;

    let (first, second, ()) = tokio::join!(h.engine.run_manual(), h.engine.run_manual(), async {
        gate.notify_one();
    });

    assert_eq!(first, second);
    assert_eq!(first.synced_count, 2);
    assert_eq!(Calls::get(&h.source.calls.verify), 1);
    assert_eq!(Calls::get(&h.source.calls.list), 1);
    assert!(!h.engine.is_running());
}

#[tokio::test]
async fn engines_sharing_a_flight_never_run_concurrently() {
    let flight = Arc::new(SingleFlight::new());
    let source_a = StubSource::with_items(vec![item("A", 10)]);
    let gate = Arc::new(Notify::new());
    *source_a.gate.lock().unwrap() = Some(Arc::clone(&gate));
    let a = harness_sharing(source_a, account(), Arc::clone(&flight)).await;
    let other = threadnote_core::Account {
        id: "acct-b".to_owned(),
        ..account()
    };
    let b = harness_sharing(StubSource::with_items(vec![item("B", 10)]), other, flight).await;

    let (first, second, ()) = tokio::join!(
        a.engine.run_incremental(),
        b.engine.run_periodic_refresh(),
        async {
            tokio::task::yield_now().await;
            assert!(a.engine.is_running());
            assert!(b.engine.is_running());
            gate.notify_one();
        }
    );

    assert_eq!(first, second);
    assert_eq!(second.account_id, "acct");
    assert_eq!(Calls::get(&a.source.calls.list), 1);
    assert_eq!(Calls::get(&b.source.calls.verify), 0);
    assert_eq!(Calls::get(&b.source.calls.list), 0);
    assert!(!b.engine.is_running());

    let after = b.engine.run_incremental().await;
    assert_eq!(after.account_id, "acct-b");
    assert_eq!(after.synced_count, 1);
}

#[tokio::test]
async fn phase_is_observable_while_running() {
    let source = StubSource::with_items(vec![item("A", 10)]);
    let gate = Arc::new(Notify::new());
    *source.gate.lock().unwrap() = Some(Arc::clone(&gate));
    let h = harness(source).await;
    let phases = h.engine.subscribe();

    let (result, ()) = tokio::join!(h.engine.run_incremental(), async {
        tokio::task::yield_now().await;
        assert_eq!(*phases.borrow(), SyncPhase::VerifyingIdentity);
        assert!(h.engine.is_running());
        gate.notify_one();
    });

    assert_eq!(result.synced_count, 1);
    assert_eq!(h.engine.phase(), SyncPhase::Idle);
    assert!(!h.engine.is_running());
}

#[tokio::test]
async fn manual_run_refreshes_recent_then_lists_past_newest_known() {
    let h = harness(StubSource::with_items(vec![
        item("N1", 10),
        item("N2", 30),
        item("X", 60),
        item("OLD", 90),
    ]))
    .await;
    h.destination
        .seed_page("page-x", [url_property("X")].into_iter().collect());
    h.store
        .upsert_mapping(mapping("X", "page-x", 60, true))
        .await
        .unwrap();
    h.store.record_synced("X").await.unwrap();

    let result = h.engine.run_manual().await;

    let queries = h.source.queries.lock().unwrap().clone();
    assert_eq!(queries[0].since, Some(t0() - TimeDelta::minutes(60)));
    assert_eq!(result.updated_count, 1);
    assert_eq!(result.synced_count, 2);
    assert_eq!(result.skipped_count, 1);
    assert!(!h.store.is_known("OLD"));
    assert_eq!(h.store.get("X").unwrap().metrics, Some(metrics(100)));
}

#[tokio::test]
async fn periodic_refresh_covers_unmeasured_and_recent_mappings() {
    let h = harness(StubSource::default()).await;
    for (id, page, minutes_ago, measured) in [
        ("RECENT", "p1", 2 * 24 * 60, true),
        ("UNMEASURED", "p2", 30 * 24 * 60, false),
        ("STALE", "p3", 30 * 24 * 60, true),
    ] {
        h.destination.seed_page(page, Default::default());
        h.store
            .upsert_mapping(mapping(id, page, minutes_ago, measured))
            .await
            .unwrap();
    }

    let result = h.engine.run_periodic_refresh().await;
    assert_eq!(result.updated_count, 2);
    assert_eq!(Calls::get(&h.source.calls.item_metrics), 2);
    assert_eq!(Calls::get(&h.source.calls.list), 0);
    assert_eq!(h.store.get("UNMEASURED").unwrap().metrics, Some(metrics(100)));
    assert_eq!(h.store.get("STALE").unwrap().metrics, Some(metrics(1)));
}

#[tokio::test]
async fn refresh_skips_pages_deleted_in_destination() {
    let h = harness(StubSource::default()).await;
    h.store
        .upsert_mapping(mapping("GONE", "missing-page", 60, false))
        .await
        .unwrap();

    let result = h.engine.run_periodic_refresh().await;
    assert_eq!(result.skipped_count, 1);
    assert!(result.is_success());
    assert_eq!(h.store.get("GONE").unwrap().metrics, None);
}

#[tokio::test]
async fn backfill_walks_every_page() {
    let items: Vec<_> = (0..150).map(|n| item(&format!("I{n:03}"), n)).collect();
    let h = harness(StubSource::with_items(items)).await;

    let result = h.engine.run_backfill(None).await;
    assert_eq!(result.synced_count, 150);
    assert_eq!(Calls::get(&h.source.calls.list), 2);
    let queries = h.source.queries.lock().unwrap().clone();
    assert_eq!(queries[0].limit, Some(100));
    assert_eq!(queries[1].cursor.as_deref(), Some("100"));
}

#[tokio::test]
async fn single_item_run_uses_the_same_pipeline() {
    let h = harness(StubSource::default()).await;

    let result = h.engine.run_single(item("S", 1)).await;
    assert_eq!(result.synced_count, 1);
    assert!(h.store.is_known("S"));

    let mut quote = item("Q", 1);
    quote.is_quote_post = true;
    let result = h.engine.run_single(quote).await;
    assert_eq!(result.skipped_count, 1);
    assert_eq!(Calls::get(&h.source.calls.list), 0);
}

#[tokio::test]
async fn identity_handle_drives_author_filter() {
    let source = StubSource::with_items(vec![item("A", 10)]);
    source.set_identity(Ok(Identity {
        id: "42".to_owned(),
        username: "renamed".to_owned(),
    }));
    let h = harness(source).await;

    let result = h.engine.run_incremental().await;
    assert_eq!(result.skipped_count, 1);
    assert_eq!(result.synced_count, 0);
}

#[tokio::test]
async fn rate_limited_decorators_space_requests() {
    let clock = Arc::new(ManualClock::new(t0()));
    let limiter = Arc::new(RateLimiter::with_defaults(Arc::clone(&clock) as Arc<dyn Clock>));
    let source = Arc::new(StubSource::with_items(vec![item("A", 10)]));
    let destination = Arc::new(StubDestination::default());
    let kv: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let store = Arc::new(MappingStore::load(Arc::clone(&kv), "acct").await.unwrap());
    let engine = Arc::new(SyncEngine::new(
        account(),
        Arc::new(RateLimitedSource::new(source, Arc::clone(&limiter))),
        Arc::new(RateLimitedDestination::new(destination, limiter)),
        store,
        Arc::new(InsightsCache::new(Arc::clone(&clock) as _, kv)),
        Arc::clone(&clock) as _,
        settings(),
    ));

    let result = engine.run_incremental().await;
    assert_eq!(result.synced_count, 1);
    let sleeps = clock.sleeps();
    // The listing call follows identity verification on the same lane.
    assert!(sleeps.contains(&Duration::from_millis(200)));
    assert!(sleeps.iter().all(|d| *d <= Duration::from_millis(334)));
}
