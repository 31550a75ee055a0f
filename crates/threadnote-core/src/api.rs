//! Interfaces the sync engine consumes from the two external APIs.
//!
//! Both HTTP clients implement these traits; the engine also wraps them in
//! rate-limited decorators and tests substitute in-memory stubs.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};

use crate::error::SyncError;
use crate::field_mapping::{CollectionSchema, Properties, PropertyValue};
use crate::types::{ContentItem, Metrics, Page};

/// Parameters for one call to the source listing endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub cursor: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

/// Bounds for an account insights query, supplied by the caller's clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl TimeRange {
    /// The `days` days ending at `until`.
    #[must_use]
    pub fn days_before(until: DateTime<Utc>, days: u32) -> Self {
        Self {
            since: until - TimeDelta::days(i64::from(days)),
            until,
        }
    }
}

/// Account-level counters from the source insights endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountMetrics {
    pub metrics: Metrics,
    pub followers_count: Option<u64>,
}

/// The identity behind the source credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub username: String,
}

/// A credential issued by an exchange or refresh call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub credential: String,
    pub expires_in_secs: u64,
}

#[async_trait]
pub trait SourceApi: Send + Sync {
    /// Lists the authenticated account's items, newest first.
    async fn list_items(&self, query: &ListQuery) -> Result<Page<ContentItem>, SyncError>;

    async fn get_item_metrics(&self, item_id: &str) -> Result<Metrics, SyncError>;

    /// Account totals. `range = None` asks for the platform default window.
    async fn get_account_metrics(
        &self,
        range: Option<TimeRange>,
    ) -> Result<AccountMetrics, SyncError>;

    async fn verify_identity(&self) -> Result<Identity, SyncError>;

    /// Swaps a short-lived credential for a long-lived one.
    async fn exchange_credential(&self, short_lived: &str) -> Result<TokenGrant, SyncError>;

    async fn refresh_credential(&self, credential: &str) -> Result<TokenGrant, SyncError>;
}

/// Equality filter on one destination field.
#[derive(Debug, Clone, PartialEq)]
pub struct PageFilter {
    pub field: String,
    pub equals: PropertyValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSort {
    pub field: String,
    pub ascending: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageQuery {
    pub filter: Option<PageFilter>,
    pub sort: Option<PageSort>,
    pub cursor: Option<String>,
    pub page_size: Option<u32>,
}

/// A page returned by a destination query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationPage {
    pub id: String,
    pub url: Option<String>,
}

#[async_trait]
pub trait DestinationApi: Send + Sync {
    async fn get_collection_schema(
        &self,
        collection_id: &str,
    ) -> Result<CollectionSchema, SyncError>;

    async fn query_pages(
        &self,
        collection_id: &str,
        query: &PageQuery,
    ) -> Result<Page<DestinationPage>, SyncError>;

    /// Creates a page and returns its id. `content` becomes the page body.
    async fn create_page(
        &self,
        collection_id: &str,
        properties: &Properties,
        content: Option<&str>,
    ) -> Result<String, SyncError>;

    async fn update_page_properties(
        &self,
        page_id: &str,
        properties: &Properties,
    ) -> Result<(), SyncError>;
}
