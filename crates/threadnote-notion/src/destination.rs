use async_trait::async_trait;
use reqwest::Method;
use threadnote_core::{
    CollectionSchema, DestinationApi, DestinationPage, Page, PageQuery, Properties, SyncError,
};

use crate::client::NotionClient;
use crate::properties::{
    decode_schema, encode_filter, encode_properties, encode_sort, paragraph_blocks,
};
use crate::types::{
    CreatePageRequest, DatabaseResponse, PageObject, Parent, QueryRequest, QueryResponse,
    UpdatePageRequest,
};

#[async_trait]
impl DestinationApi for NotionClient {
    async fn get_collection_schema(
        &self,
        collection_id: &str,
    ) -> Result<CollectionSchema, SyncError> {
        let db: DatabaseResponse = self.get_json(&format!("databases/{collection_id}")).await?;
        Ok(decode_schema(collection_id, db))
    }

    async fn query_pages(
        &self,
        collection_id: &str,
        query: &PageQuery,
    ) -> Result<Page<DestinationPage>, SyncError> {
        let body = QueryRequest {
            filter: query.filter.as_ref().map(encode_filter),
            sorts: query.sort.iter().map(encode_sort).collect(),
            start_cursor: query.cursor.clone(),
            page_size: query.page_size,
        };
        let response: QueryResponse = self
            .send_body(
                Method::POST,
                &format!("databases/{collection_id}/query"),
                &body,
            )
            .await?;
        let next_cursor = if response.has_more {
            response.next_cursor
        } else {
            None
        };
        Ok(Page {
            items: response
                .results
                .into_iter()
                .map(|p| DestinationPage { id: p.id, url: p.url })
                .collect(),
            next_cursor,
        })
    }

    async fn create_page(
        &self,
        collection_id: &str,
        properties: &Properties,
        content: Option<&str>,
    ) -> Result<String, SyncError> {
        let body = CreatePageRequest {
            parent: Parent {
                database_id: collection_id.to_owned(),
            },
            properties: encode_properties(properties),
            children: content.map(paragraph_blocks).unwrap_or_default(),
        };
        let page: PageObject = self.send_body(Method::POST, "pages", &body).await?;
        tracing::debug!(page_id = %page.id, collection_id, "created Notion page");
        Ok(page.id)
    }

    async fn update_page_properties(
        &self,
        page_id: &str,
        properties: &Properties,
    ) -> Result<(), SyncError> {
        let body = UpdatePageRequest {
            properties: encode_properties(properties),
        };
        let _: PageObject = self
            .send_body(Method::PATCH, &format!("pages/{page_id}"), &body)
            .await?;
        Ok(())
    }
}
