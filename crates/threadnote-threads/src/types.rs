//! Threads Graph API response types.
//!
//! Listing responses use the Graph paging envelope:
//! `{"data": [...], "paging": {"cursors": {"before", "after"}, "next": "..."}}`.
//! `next` is omitted on the last page even when `cursors.after` is present,
//! so only `next` is trusted as the "more pages" signal.
//!
//! Insights responses carry one entry per metric. Lifetime post metrics come
//! back either as `values: [{value}]` or as `total_value: {value}` depending
//! on the metric; account-level `views` is a daily time series that has to be
//! summed.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub cursors: Option<Cursors>,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Cursors {
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default)]
    pub after: Option<String>,
}

/// A post as returned by `GET /me/threads`.
#[derive(Debug, Deserialize)]
pub struct ThreadsPost {
    pub id: String,
    #[serde(default)]
    pub text: Option<String>,
    /// ISO-8601 with a `+0000` offset, e.g. `2025-03-01T09:30:00+0000`.
    pub timestamp: String,
    #[serde(default)]
    pub permalink: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub is_quote_post: bool,
}

#[derive(Debug, Deserialize)]
pub struct InsightsResponse {
    #[serde(default)]
    pub data: Vec<InsightMetric>,
}

#[derive(Debug, Deserialize)]
pub struct InsightMetric {
    pub name: String,
    #[serde(default)]
    pub values: Vec<InsightValue>,
    #[serde(default)]
    pub total_value: Option<InsightValue>,
}

#[derive(Debug, Deserialize)]
pub struct InsightValue {
    #[serde(default)]
    pub value: u64,
}

#[derive(Debug, Deserialize)]
pub struct MeResponse {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Seconds until expiry. Long-lived tokens report ~60 days.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Graph error envelope: `{"error": {"message", "type", "code"}}`.
#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: GraphError,
}

#[derive(Debug, Deserialize)]
pub struct GraphError {
    #[serde(default)]
    pub message: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub code: Option<i64>,
}
