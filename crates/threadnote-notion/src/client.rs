//! HTTP client for the Notion REST API.
//!
//! Sends the integration token as a bearer credential along with the pinned
//! `Notion-Version` header, and turns Notion error objects into
//! [`NotionError::Api`].

use std::time::Duration;

use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::NotionError;
use crate::types::ErrorObject;

const DEFAULT_BASE_URL: &str = "https://api.notion.com/v1/";
const NOTION_VERSION: &str = "2022-06-28";

/// Client for the Notion API.
///
/// Use [`NotionClient::new`] for production or [`NotionClient::with_base_url`]
/// to point at a mock server in tests.
pub struct NotionClient {
    client: Client,
    token: String,
    base_url: Url,
}

impl std::fmt::Debug for NotionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotionClient")
            .field("token", &"[redacted]")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl NotionClient {
    /// # Errors
    ///
    /// Returns [`NotionError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(token: impl Into<String>, timeout_secs: u64) -> Result<Self, NotionError> {
        Self::with_base_url(token, timeout_secs, DEFAULT_BASE_URL)
    }

    /// # Errors
    ///
    /// Returns [`NotionError::Http`] if the client cannot be constructed, or
    /// [`NotionError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        token: impl Into<String>,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, NotionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("threadnote/0.1 (content-mirror)")
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url =
            Url::parse(&normalised).map_err(|_| NotionError::InvalidBaseUrl(base_url.to_owned()))?;

        Ok(Self {
            client,
            token: token.into(),
            base_url,
        })
    }

    pub(crate) fn build_url(&self, path: &str) -> Result<Url, NotionError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|_| NotionError::InvalidBaseUrl(format!("{}{path}", self.base_url)))
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, NotionError> {
        let url = self.build_url(path)?;
        let request = self.request(Method::GET, url.clone());
        send_json(request, &url).await
    }

    pub(crate) async fn send_body<B, T>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, NotionError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.build_url(path)?;
        let request = self.request(method, url.clone()).json(body);
        send_json(request, &url).await
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
    }
}

async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    url: &Url,
) -> Result<T, NotionError> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(api_error(status, &body));
    }

    serde_json::from_str(&body).map_err(|e| NotionError::Deserialize {
        context: url.path().to_owned(),
        source: e,
    })
}

fn api_error(status: StatusCode, body: &str) -> NotionError {
    match serde_json::from_str::<ErrorObject>(body) {
        Ok(obj) if !obj.code.is_empty() => {
            tracing::debug!(status = status.as_u16(), code = %obj.code, "Notion API returned an error object");
            NotionError::Api {
                status: status.as_u16(),
                code: obj.code,
                message: obj.message,
            }
        }
        _ => NotionError::Api {
            status: status.as_u16(),
            code: String::new(),
            message: format!("HTTP {status}"),
        },
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
