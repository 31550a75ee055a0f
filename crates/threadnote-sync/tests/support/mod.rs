//! In-memory API stubs and fixtures shared by the engine tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use threadnote_core::{
    Account, AccountMetrics, CollectionSchema, ContentItem, DestinationApi, DestinationPage,
    FieldType, Identity, ListQuery, ManualClock, MediaType, Metrics, Page, PageQuery, Properties,
    PropertyValue, SchemaField, SourceApi, SyncError, SyncResult, TimeRange, TokenGrant,
};
use threadnote_store::{KvStore, MappingStore, MemoryStore};
use threadnote_sync::{InsightsCache, RetryPolicy, SingleFlight, SyncEngine, SyncSettings};
use tokio::sync::Notify;

pub const HANDLE: &str = "writer";
pub const COLLECTION: &str = "db-1";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

/// An original text post by [`HANDLE`], created `minutes_ago` before [`t0`].
pub fn item(id: &str, minutes_ago: i64) -> ContentItem {
    ContentItem {
        id: id.to_owned(),
        text: format!("post {id}\n\nsecond paragraph"),
        created_at: t0() - TimeDelta::minutes(minutes_ago),
        permalink: format!("https://www.threads.net/@{HANDLE}/post/{id}"),
        username: HANDLE.to_owned(),
        media_type: MediaType::TextPost,
        is_quote_post: false,
    }
}

pub fn metrics(views: u64) -> Metrics {
    Metrics {
        views,
        likes: views / 10,
        ..Metrics::default()
    }
}

pub fn account() -> Account {
    Account {
        id: "acct".to_owned(),
        display_name: "Writer".to_owned(),
        source_credential: "source-token".to_owned(),
        destination_collection_id: COLLECTION.to_owned(),
        destination_credential: None,
        field_mapping: None,
    }
}

pub fn schema() -> CollectionSchema {
    let fields = [
        ("Name", FieldType::Title),
        ("Link", FieldType::Url),
        ("Posted", FieldType::Date),
        ("Views", FieldType::Number),
        ("Likes", FieldType::Number),
        ("Content", FieldType::RichText),
        ("Post ID", FieldType::RichText),
    ];
    CollectionSchema {
        collection_id: COLLECTION.to_owned(),
        fields: fields
            .into_iter()
            .map(|(name, field_type)| SchemaField {
                name: name.to_owned(),
                field_type,
            })
            .collect(),
    }
}

#[derive(Default)]
pub struct Calls {
    pub list: AtomicUsize,
    pub item_metrics: AtomicUsize,
    pub account_metrics: AtomicUsize,
    pub verify: AtomicUsize,
    pub exchange: AtomicUsize,
    pub refresh: AtomicUsize,
}

impl Calls {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// Source stub serving a fixed item list, newest first, in pages of
/// `query.limit` items.
#[derive(Default)]
pub struct StubSource {
    pub items: Mutex<Vec<ContentItem>>,
    pub metrics: Mutex<HashMap<String, Result<Metrics, SyncError>>>,
    pub followers: Mutex<VecDeque<Result<Option<u64>, SyncError>>>,
    pub identity: Mutex<Option<Result<Identity, SyncError>>>,
    pub exchange: Mutex<VecDeque<Result<TokenGrant, SyncError>>>,
    pub refresh: Mutex<VecDeque<Result<TokenGrant, SyncError>>>,
    pub queries: Mutex<Vec<ListQuery>>,
    /// When set, `verify_identity` waits for one notification first.
    pub gate: Mutex<Option<Arc<Notify>>>,
    /// When set, `get_account_metrics` waits for one notification first.
    pub account_gate: Mutex<Option<Arc<Notify>>>,
    pub calls: Calls,
}

impl StubSource {
    pub fn with_items(items: Vec<ContentItem>) -> Self {
        let stub = Self::default();
        *stub.items.lock().unwrap() = items;
        stub
    }

    pub fn set_metrics(&self, id: &str, result: Result<Metrics, SyncError>) {
        self.metrics.lock().unwrap().insert(id.to_owned(), result);
    }

    pub fn push_followers(&self, result: Result<Option<u64>, SyncError>) {
        self.followers.lock().unwrap().push_back(result);
    }

    pub fn set_identity(&self, result: Result<Identity, SyncError>) {
        *self.identity.lock().unwrap() = Some(result);
    }
}

#[async_trait]
impl SourceApi for StubSource {
    async fn list_items(&self, query: &ListQuery) -> Result<Page<ContentItem>, SyncError> {
        self.calls.list.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.clone());
        let items: Vec<ContentItem> = self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|i| query.since.is_none_or(|since| i.created_at >= since))
            .cloned()
            .collect();
        let offset: usize = query.cursor.as_deref().map_or(0, |c| c.parse().unwrap());
        let limit = query.limit.map_or(items.len(), |l| l as usize);
        let end = (offset + limit).min(items.len());
        let next_cursor = (end < items.len()).then(|| end.to_string());
        Ok(Page {
            items: items[offset..end].to_vec(),
            next_cursor,
        })
    }

    async fn get_item_metrics(&self, item_id: &str) -> Result<Metrics, SyncError> {
        self.calls.item_metrics.fetch_add(1, Ordering::SeqCst);
        self.metrics
            .lock()
            .unwrap()
            .get(item_id)
            .cloned()
            .unwrap_or_else(|| Ok(metrics(100)))
    }

    async fn get_account_metrics(
        &self,
        _range: Option<TimeRange>,
    ) -> Result<AccountMetrics, SyncError> {
        self.calls.account_metrics.fetch_add(1, Ordering::SeqCst);
        let gate = self.account_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let next = self.followers.lock().unwrap().pop_front();
        let followers_count = next.unwrap_or(Ok(Some(150)))?;
        Ok(AccountMetrics {
            metrics: Metrics::default(),
            followers_count,
        })
    }

    async fn verify_identity(&self) -> Result<Identity, SyncError> {
        self.calls.verify.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.identity.lock().unwrap().clone().unwrap_or_else(|| {
            Ok(Identity {
                id: "42".to_owned(),
                username: HANDLE.to_owned(),
            })
        })
    }

    async fn exchange_credential(&self, _short_lived: &str) -> Result<TokenGrant, SyncError> {
        self.calls.exchange.fetch_add(1, Ordering::SeqCst);
        self.exchange
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(SyncError::NetworkFailure("no exchange scripted".into())))
    }

    async fn refresh_credential(&self, _credential: &str) -> Result<TokenGrant, SyncError> {
        self.calls.refresh.fetch_add(1, Ordering::SeqCst);
        self.refresh
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(SyncError::NetworkFailure("no refresh scripted".into())))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredPage {
    pub id: String,
    pub properties: Properties,
    pub content: Option<String>,
}

/// Destination stub holding pages in memory.
pub struct StubDestination {
    pub schema: Mutex<CollectionSchema>,
    pub pages: Mutex<Vec<StoredPage>>,
    pub create_failures: Mutex<VecDeque<SyncError>>,
    pub schema_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub update_calls: AtomicUsize,
    pub query_calls: AtomicUsize,
}

impl Default for StubDestination {
    fn default() -> Self {
        Self {
            schema: Mutex::new(schema()),
            pages: Mutex::new(Vec::new()),
            create_failures: Mutex::new(VecDeque::new()),
            schema_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
            query_calls: AtomicUsize::new(0),
        }
    }
}

impl StubDestination {
    pub fn page_count(&self) -> usize {
        self.pages.lock().unwrap().len()
    }

    pub fn page(&self, id: &str) -> Option<StoredPage> {
        self.pages.lock().unwrap().iter().find(|p| p.id == id).cloned()
    }

    /// Inserts a page as if it had been created by an earlier install.
    pub fn seed_page(&self, id: &str, properties: Properties) {
        self.pages.lock().unwrap().push(StoredPage {
            id: id.to_owned(),
            properties,
            content: None,
        });
    }
}

#[async_trait]
impl DestinationApi for StubDestination {
    async fn get_collection_schema(
        &self,
        collection_id: &str,
    ) -> Result<CollectionSchema, SyncError> {
        self.schema_calls.fetch_add(1, Ordering::SeqCst);
        let schema = self.schema.lock().unwrap().clone();
        if schema.collection_id == collection_id {
            Ok(schema)
        } else {
            Err(SyncError::NotFound(format!("database {collection_id}")))
        }
    }

    async fn query_pages(
        &self,
        _collection_id: &str,
        query: &PageQuery,
    ) -> Result<Page<DestinationPage>, SyncError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        let pages = self.pages.lock().unwrap();
        let matches = pages
            .iter()
            .filter(|p| {
                query
                    .filter
                    .as_ref()
                    .is_none_or(|f| p.properties.get(&f.field) == Some(&f.equals))
            })
            .map(|p| DestinationPage {
                id: p.id.clone(),
                url: None,
            })
            .take(query.page_size.map_or(usize::MAX, |n| n as usize))
            .collect();
        Ok(Page::last(matches))
    }

    async fn create_page(
        &self,
        _collection_id: &str,
        properties: &Properties,
        content: Option<&str>,
    ) -> Result<String, SyncError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.create_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        let mut pages = self.pages.lock().unwrap();
        let id = format!("page-{}", pages.len() + 1);
        pages.push(StoredPage {
            id: id.clone(),
            properties: properties.clone(),
            content: content.map(str::to_owned),
        });
        Ok(id)
    }

    async fn update_page_properties(
        &self,
        page_id: &str,
        properties: &Properties,
    ) -> Result<(), SyncError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        let mut pages = self.pages.lock().unwrap();
        let page = pages
            .iter_mut()
            .find(|p| p.id == page_id)
            .ok_or_else(|| SyncError::NotFound(format!("page {page_id}")))?;
        page.properties.extend(properties.clone());
        Ok(())
    }
}

pub fn url_property(id: &str) -> (String, PropertyValue) {
    (
        "Link".to_owned(),
        PropertyValue::Url(format!("https://www.threads.net/@{HANDLE}/post/{id}")),
    )
}

/// Everything an engine test needs to poke at.
pub struct Harness {
    pub source: Arc<StubSource>,
    pub destination: Arc<StubDestination>,
    pub kv: Arc<MemoryStore>,
    pub store: Arc<MappingStore>,
    pub clock: Arc<ManualClock>,
    pub engine: Arc<SyncEngine>,
}

pub fn settings() -> SyncSettings {
    SyncSettings {
        recent_limit: 25,
        write_retry: RetryPolicy {
            max_attempts: 3,
            base_delay: std::time::Duration::from_millis(10),
        },
        ..SyncSettings::default()
    }
}

pub async fn harness(source: StubSource) -> Harness {
    harness_with(source, account(), settings()).await
}

pub async fn harness_with(source: StubSource, account: Account, settings: SyncSettings) -> Harness {
    build_harness(source, account, settings, None).await
}

/// A harness whose engine runs under `flight` instead of its own guard.
pub async fn harness_sharing(
    source: StubSource,
    account: Account,
    flight: Arc<SingleFlight<SyncResult>>,
) -> Harness {
    build_harness(source, account, settings(), Some(flight)).await
}

async fn build_harness(
    source: StubSource,
    account: Account,
    settings: SyncSettings,
    flight: Option<Arc<SingleFlight<SyncResult>>>,
) -> Harness {
    let source = Arc::new(source);
    let destination = Arc::new(StubDestination::default());
    let kv = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let store = Arc::new(
        MappingStore::load(Arc::clone(&kv) as Arc<dyn KvStore>, &account.id)
            .await
            .unwrap(),
    );
    let insights = Arc::new(InsightsCache::new(
        Arc::clone(&clock) as _,
        Arc::clone(&kv) as _,
    ));
    let engine = SyncEngine::new(
        account,
        Arc::clone(&source) as _,
        Arc::clone(&destination) as _,
        Arc::clone(&store),
        insights,
        Arc::clone(&clock) as _,
        settings,
    );
    let engine = Arc::new(match flight {
        Some(flight) => engine.with_flight(flight),
        None => engine,
    });
    Harness {
        source,
        destination,
        kv,
        store,
        clock,
        engine,
    }
}
