//! [`SourceApi`] implementation backed by [`ThreadsClient`].

use async_trait::async_trait;
use threadnote_core::{
    AccountMetrics, ContentItem, Identity, ListQuery, Metrics, Page, SourceApi, SyncError,
    TimeRange, TokenGrant,
};

use crate::client::ThreadsClient;

#[async_trait]
impl SourceApi for ThreadsClient {
    async fn list_items(&self, query: &ListQuery) -> Result<Page<ContentItem>, SyncError> {
        Ok(self.list_posts(query).await?)
    }

    async fn get_item_metrics(&self, item_id: &str) -> Result<Metrics, SyncError> {
        Ok(self.get_post_insights(item_id).await?)
    }

    async fn get_account_metrics(
        &self,
        range: Option<TimeRange>,
    ) -> Result<AccountMetrics, SyncError> {
        Ok(self.account_insights(range).await?)
    }

    async fn verify_identity(&self) -> Result<Identity, SyncError> {
        Ok(self.me().await?)
    }

    async fn exchange_credential(&self, short_lived: &str) -> Result<TokenGrant, SyncError> {
        Ok(self.exchange_token(short_lived).await?)
    }

    async fn refresh_credential(&self, credential: &str) -> Result<TokenGrant, SyncError> {
        Ok(self.refresh_token(credential).await?)
    }
}
