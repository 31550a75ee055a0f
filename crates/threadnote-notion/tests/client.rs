//! Integration tests for `NotionClient` using wiremock HTTP mocks.

use chrono::{TimeZone, Utc};
use threadnote_core::{
    DestinationApi, ErrorKind, FieldType, PageFilter, PageQuery, Properties, PropertyValue,
};
use threadnote_notion::NotionClient;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(base_url: &str) -> NotionClient {
    NotionClient::with_base_url("secret_test", 30, base_url)
        .expect("client construction should not fail")
}

#[tokio::test]
async fn schema_is_read_in_declared_order() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "object": "database",
        "id": "db-1",
        "properties": {
            "Name": { "id": "title", "type": "title", "title": {} },
            "본문": { "id": "a", "type": "rich_text", "rich_text": {} },
            "Views": { "id": "b", "type": "number", "number": {} },
            "Link": { "id": "c", "type": "url", "url": {} }
        }
    });

    Mock::given(method("GET"))
        .and(path("/databases/db-1"))
        .and(header("authorization", "Bearer secret_test"))
        .and(header("notion-version", "2022-06-28"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let schema = test_client(&server.uri())
        .get_collection_schema("db-1")
        .await
        .expect("schema should parse");

    assert_eq!(schema.collection_id, "db-1");
    assert_eq!(schema.fields.len(), 4);
    assert_eq!(schema.fields[1].name, "본문");
    assert_eq!(schema.field_type("Link"), Some(&FieldType::Url));
}

#[tokio::test]
async fn query_sends_filter_and_returns_cursor_only_when_more() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/databases/db-1/query"))
        .and(body_partial_json(serde_json::json!({
            "filter": { "property": "Link", "url": { "equals": "https://t/p/1" } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "object": "list",
            "results": [{ "object": "page", "id": "page-9", "url": "https://notion.so/page-9" }],
            "has_more": false,
            "next_cursor": "ignored"
        })))
        .mount(&server)
        .await;

    let query = PageQuery {
        filter: Some(PageFilter {
            field: "Link".to_owned(),
            equals: PropertyValue::Url("https://t/p/1".to_owned()),
        }),
        ..PageQuery::default()
    };
    let page = test_client(&server.uri())
        .query_pages("db-1", &query)
        .await
        .expect("query should succeed");

    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id, "page-9");
    assert_eq!(page.next_cursor, None);
}

#[tokio::test]
async fn create_page_posts_properties_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/pages"))
        .and(body_partial_json(serde_json::json!({
            "parent": { "database_id": "db-1" },
            "properties": {
                "Views": { "number": 120 },
                "Posted": { "date": { "start": "2025-03-01T10:00:00+00:00" } }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "object": "page",
            "id": "new-page",
            "url": "https://notion.so/new-page"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut properties = Properties::new();
    properties.insert("Name".to_owned(), PropertyValue::Title("hello".to_owned()));
    properties.insert("Views".to_owned(), PropertyValue::Number(120));
    properties.insert(
        "Posted".to_owned(),
        PropertyValue::Date(Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap()),
    );

    let id = test_client(&server.uri())
        .create_page("db-1", &properties, Some("hello\n\nworld"))
        .await
        .expect("create should succeed");
    assert_eq!(id, "new-page");
}

#[tokio::test]
async fn update_page_patches_properties() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/pages/page-9"))
        .and(body_partial_json(serde_json::json!({
            "properties": { "Likes": { "number": 7 } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "object": "page",
            "id": "page-9"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut properties = Properties::new();
    properties.insert("Likes".to_owned(), PropertyValue::Number(7));
    test_client(&server.uri())
        .update_page_properties("page-9", &properties)
        .await
        .expect("update should succeed");
}

#[tokio::test]
async fn unauthorized_maps_to_auth_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/databases/db-1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "object": "error",
            "status": 401,
            "code": "unauthorized",
            "message": "API token is invalid."
        })))
        .mount(&server)
        .await;

    let err = test_client(&server.uri())
        .get_collection_schema("db-1")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthFailure);
}

#[tokio::test]
async fn rate_limited_maps_to_retryable_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/pages"))
        .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
            "object": "error",
            "status": 429,
            "code": "rate_limited",
            "message": "slow down"
        })))
        .mount(&server)
        .await;

    let err = test_client(&server.uri())
        .create_page("db-1", &Properties::new(), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimited);
    assert!(err.is_retryable());
}
