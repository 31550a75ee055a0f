//! API decorators that pass every call through the [`RateLimiter`].
//!
//! The orchestrator only ever sees these wrappers, so no request can skip
//! the limiter.

use std::sync::Arc;

use async_trait::async_trait;
use threadnote_core::{
    AccountMetrics, CollectionSchema, ContentItem, DestinationApi, DestinationPage, Identity,
    ListQuery, Metrics, Page, PageQuery, Properties, SourceApi, SyncError, TimeRange, TokenGrant,
};

use crate::rate_limit::{ApiKey, RateLimiter};

pub struct RateLimitedSource {
    inner: Arc<dyn SourceApi>,
    limiter: Arc<RateLimiter>,
}

impl RateLimitedSource {
    #[must_use]
    pub fn new(inner: Arc<dyn SourceApi>, limiter: Arc<RateLimiter>) -> Self {
        Self { inner, limiter }
    }

    async fn wait(&self) {
        self.limiter.schedule(ApiKey::Source).await;
    }
}

#[async_trait]
impl SourceApi for RateLimitedSource {
    async fn list_items(&self, query: &ListQuery) -> Result<Page<ContentItem>, SyncError> {
        self.wait().await;
        self.inner.list_items(query).await
    }

    async fn get_item_metrics(&self, item_id: &str) -> Result<Metrics, SyncError> {
        self.wait().await;
        self.inner.get_item_metrics(item_id).await
    }

    async fn get_account_metrics(
        &self,
        range: Option<TimeRange>,
    ) -> Result<AccountMetrics, SyncError> {
        self.wait().await;
        self.inner.get_account_metrics(range).await
    }

    async fn verify_identity(&self) -> Result<Identity, SyncError> {
        self.wait().await;
        self.inner.verify_identity().await
    }

    async fn exchange_credential(&self, short_lived: &str) -> Result<TokenGrant, SyncError> {
        self.wait().await;
        self.inner.exchange_credential(short_lived).await
    }

    async fn refresh_credential(&self, credential: &str) -> Result<TokenGrant, SyncError> {
        self.wait().await;
        self.inner.refresh_credential(credential).await
    }
}

pub struct RateLimitedDestination {
    inner: Arc<dyn DestinationApi>,
    limiter: Arc<RateLimiter>,
}

impl RateLimitedDestination {
    #[must_use]
    pub fn new(inner: Arc<dyn DestinationApi>, limiter: Arc<RateLimiter>) -> Self {
        Self { inner, limiter }
    }

    async fn wait(&self) {
        self.limiter.schedule(ApiKey::Destination).await;
    }
}

#[async_trait]
impl DestinationApi for RateLimitedDestination {
    async fn get_collection_schema(
        &self,
        collection_id: &str,
    ) -> Result<CollectionSchema, SyncError> {
        self.wait().await;
        self.inner.get_collection_schema(collection_id).await
    }

    async fn query_pages(
        &self,
        collection_id: &str,
        query: &PageQuery,
    ) -> Result<Page<DestinationPage>, SyncError> {
        self.wait().await;
        self.inner.query_pages(collection_id, query).await
    }

    async fn create_page(
        &self,
        collection_id: &str,
        properties: &Properties,
        content: Option<&str>,
    ) -> Result<String, SyncError> {
        self.wait().await;
        self.inner
            .create_page(collection_id, properties, content)
            .await
    }

    async fn update_page_properties(
        &self,
        page_id: &str,
        properties: &Properties,
    ) -> Result<(), SyncError> {
        self.wait().await;
        self.inner.update_page_properties(page_id, properties).await
    }
}
