//! Post listing and per-post insights endpoints.

use threadnote_core::{ContentItem, ListQuery, Metrics, Page};

use crate::client::ThreadsClient;
use crate::error::ThreadsError;
use crate::normalize::{normalize_metrics, normalize_post};
use crate::types::{InsightsResponse, ListResponse, ThreadsPost};

const POST_FIELDS: &str = "id,text,timestamp,permalink,username,media_type,is_quote_post";
const POST_METRICS: &str = "views,likes,replies,reposts,quotes,shares";
const DEFAULT_PAGE_SIZE: u32 = 25;

impl ThreadsClient {
    /// Lists the authenticated user's posts, newest first.
    ///
    /// `since`/`until` are sent as unix timestamps. The returned cursor is
    /// `Some` only when the API reports a next page.
    ///
    /// # Errors
    ///
    /// - [`ThreadsError::Api`] / [`ThreadsError::RateLimited`] on API-level failure.
    /// - [`ThreadsError::Http`] on network failure.
    /// - [`ThreadsError::Deserialize`] if the response shape is unexpected.
    pub async fn list_posts(&self, query: &ListQuery) -> Result<Page<ContentItem>, ThreadsError> {
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).to_string();
        let since = query.since.map(|t| t.timestamp().to_string());
        let until = query.until.map(|t| t.timestamp().to_string());

        let mut params = vec![("fields", POST_FIELDS), ("limit", limit.as_str())];
        if let Some(since) = since.as_deref() {
            params.push(("since", since));
        }
        if let Some(until) = until.as_deref() {
            params.push(("until", until));
        }
        if let Some(cursor) = query.cursor.as_deref() {
            params.push(("after", cursor));
        }

        let url = self.build_url("me/threads", &params)?;
        let response: ListResponse<ThreadsPost> = self.get_json(url).await?;

        let next_cursor = response.paging.and_then(|p| {
            p.next?;
            p.cursors.and_then(|c| c.after)
        });

        let items = response
            .data
            .into_iter()
            .filter_map(|post| {
                let id = post.id.clone();
                let item = normalize_post(post);
                if item.is_none() {
                    tracing::warn!(external_id = %id, "list_posts: skipping post with unparseable timestamp");
                }
                item
            })
            .collect();

        Ok(Page { items, next_cursor })
    }

    /// Fetches lifetime engagement counters for one post.
    ///
    /// # Errors
    ///
    /// - [`ThreadsError::Api`] with status 404 when the post is gone.
    /// - [`ThreadsError::Http`] on network failure.
    /// - [`ThreadsError::Deserialize`] if the response shape is unexpected.
    pub async fn get_post_insights(&self, post_id: &str) -> Result<Metrics, ThreadsError> {
        let url = self.build_url(&format!("{post_id}/insights"), &[("metric", POST_METRICS)])?;
        let response: InsightsResponse = self.get_json(url).await?;
        Ok(normalize_metrics(&response.data))
    }
}
