//! HTTP client for the Threads Graph API.
//!
//! Wraps `reqwest` with bearer authentication, Graph error-envelope parsing,
//! and typed response deserialization. Every endpoint returns a
//! [`ThreadsError`]; the [`threadnote_core::SourceApi`] implementation maps
//! those onto the shared error kinds.

use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use threadnote_core::SharedCredential;

use crate::error::ThreadsError;
use crate::types::ErrorEnvelope;

const DEFAULT_BASE_URL: &str = "https://graph.threads.net/v1.0/";

/// Client for the Threads Graph API.
///
/// Use [`ThreadsClient::new`] for production or [`ThreadsClient::with_base_url`]
/// to point at a mock server in tests.
pub struct ThreadsClient {
    pub(crate) client: Client,
    pub(crate) credential: SharedCredential,
    pub(crate) app_secret: Option<String>,
    base_url: Url,
}

impl ThreadsClient {
    /// Creates a new client pointed at the production Graph API.
    ///
    /// # Errors
    ///
    /// Returns [`ThreadsError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        credential: SharedCredential,
        app_secret: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, ThreadsError> {
        Self::with_base_url(credential, app_secret, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Creates a new client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`ThreadsError::Http`] if the `reqwest::Client` cannot be
    /// constructed, or [`ThreadsError::InvalidBaseUrl`] if `base_url` does
    /// not parse.
    pub fn with_base_url(
        credential: SharedCredential,
        app_secret: Option<String>,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, ThreadsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("threadnote/0.1 (content-mirror)")
            .build()?;

        // Exactly one trailing slash so `Url::join` appends instead of
        // replacing the last path segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url =
            Url::parse(&normalised).map_err(|_| ThreadsError::InvalidBaseUrl(base_url.to_owned()))?;

        Ok(Self {
            client,
            credential,
            app_secret,
            base_url,
        })
    }

    /// Builds a request URL under the base path with percent-encoded query
    /// parameters.
    pub(crate) fn build_url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, ThreadsError> {
        let mut url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|_| ThreadsError::InvalidBaseUrl(format!("{}{path}", self.base_url)))?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    /// Sends an authenticated GET and decodes the body as `T`.
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ThreadsError> {
        let request = self.client.get(url.clone()).bearer_auth(self.credential.get());
        self.send_json(request, &url).await
    }

    /// Sends an unauthenticated GET (the credential travels as a query
    /// parameter on token endpoints).
    pub(crate) async fn get_json_public<T: DeserializeOwned>(
        &self,
        url: Url,
    ) -> Result<T, ThreadsError> {
        let request = self.client.get(url.clone());
        self.send_json(request, &url).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        url: &Url,
    ) -> Result<T, ThreadsError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(ThreadsError::RateLimited { retry_after_secs });
        }

        let body = response.text().await?;

        if !status.is_success() {
            return Err(api_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| ThreadsError::Deserialize {
            context: redact(url),
            source: e,
        })
    }
}

/// Builds a [`ThreadsError::Api`] from a non-2xx response, reading the Graph
/// error envelope when the body carries one.
fn api_error(status: StatusCode, body: &str) -> ThreadsError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            tracing::debug!(
                status = status.as_u16(),
                code = ?envelope.error.code,
                error_type = ?envelope.error.kind,
                "Threads API returned an error envelope"
            );
            ThreadsError::Api {
                status: status.as_u16(),
                code: envelope.error.code,
                message: envelope.error.message,
            }
        }
        Err(_) => ThreadsError::Api {
            status: status.as_u16(),
            code: None,
            message: format!("HTTP {status}"),
        },
    }
}

/// URL for error context with credential-bearing query parameters removed.
fn redact(url: &Url) -> String {
    let mut clean = url.clone();
    clean.set_query(None);
    clean.to_string()
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
