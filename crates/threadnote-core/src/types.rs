use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, SyncError};

/// Media kind reported by the source platform for a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaType {
    TextPost,
    Image,
    Video,
    CarouselAlbum,
    Audio,
    /// A repost of someone else's post. Never mirrored.
    RepostFacade,
    #[serde(other)]
    Other,
}

/// A unit of published content on the source platform.
///
/// Immutable once fetched; engagement counters travel separately as
/// [`Metrics`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Stable, numeric-looking platform id.
    pub id: String,
    /// Post body. Empty for media-only posts.
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub permalink: String,
    /// Author handle without the leading `@`.
    pub username: String,
    pub media_type: MediaType,
    pub is_quote_post: bool,
}

impl ContentItem {
    /// `true` for posts the mirror should never contain: repost facades and
    /// quote posts.
    #[must_use]
    pub fn is_derivative(&self) -> bool {
        self.media_type == MediaType::RepostFacade || self.is_quote_post
    }
}

/// The six engagement counters tracked per item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Views,
    Likes,
    Replies,
    Reposts,
    Quotes,
    Shares,
}

impl MetricKind {
    pub const ALL: [MetricKind; 6] = [
        MetricKind::Views,
        MetricKind::Likes,
        MetricKind::Replies,
        MetricKind::Reposts,
        MetricKind::Quotes,
        MetricKind::Shares,
    ];

    /// Wire name used by the source platform's insights endpoints.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Views => "views",
            MetricKind::Likes => "likes",
            MetricKind::Replies => "replies",
            MetricKind::Reposts => "reposts",
            MetricKind::Quotes => "quotes",
            MetricKind::Shares => "shares",
        }
    }

    #[must_use]
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

/// Engagement counters at one point in time. Missing values are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metrics {
    pub views: u64,
    pub likes: u64,
    pub replies: u64,
    pub reposts: u64,
    pub quotes: u64,
    pub shares: u64,
}

impl Metrics {
    #[must_use]
    pub fn get(&self, kind: MetricKind) -> u64 {
        match kind {
            MetricKind::Views => self.views,
            MetricKind::Likes => self.likes,
            MetricKind::Replies => self.replies,
            MetricKind::Reposts => self.reposts,
            MetricKind::Quotes => self.quotes,
            MetricKind::Shares => self.shares,
        }
    }

    pub fn set(&mut self, kind: MetricKind, value: u64) {
        match kind {
            MetricKind::Views => self.views = value,
            MetricKind::Likes => self.likes = value,
            MetricKind::Replies => self.replies = value,
            MetricKind::Reposts => self.reposts = value,
            MetricKind::Quotes => self.quotes = value,
            MetricKind::Shares => self.shares = value,
        }
    }

    /// Saturating component-wise sum.
    #[must_use]
    pub fn saturating_add(self, other: Metrics) -> Metrics {
        let mut out = Metrics::default();
        for kind in MetricKind::ALL {
            out.set(kind, self.get(kind).saturating_add(other.get(kind)));
        }
        out
    }
}

/// Durable correspondence between one source item and its destination page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    pub external_id: String,
    pub page_id: String,
    pub source_url: String,
    pub item_created_at: DateTime<Utc>,
    pub title: String,
    /// `None` until the first successful metrics fetch.
    #[serde(default)]
    pub metrics: Option<Metrics>,
    #[serde(default)]
    pub metrics_updated_at: Option<DateTime<Utc>>,
}

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    #[must_use]
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_cursor: None,
        }
    }
}

/// An error captured during a run. `external_id` is `None` for run-level
/// failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    pub external_id: Option<String>,
    pub kind: ErrorKind,
    pub message: String,
}

impl ItemError {
    #[must_use]
    pub fn for_item(external_id: &str, err: &SyncError) -> Self {
        Self {
            external_id: Some(external_id.to_owned()),
            kind: err.kind(),
            message: err.message().to_owned(),
        }
    }

    #[must_use]
    pub fn fatal(err: &SyncError) -> Self {
        Self {
            external_id: None,
            kind: err.kind(),
            message: err.message().to_owned(),
        }
    }
}

/// Caller-visible outcome of one orchestrator run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub account_id: String,
    pub synced_count: u32,
    pub skipped_count: u32,
    pub updated_count: u32,
    pub errors: Vec<ItemError>,
    pub followers_count: Option<u64>,
}

impl SyncResult {
    #[must_use]
    pub fn new(account_id: &str) -> Self {
        Self {
            account_id: account_id.to_owned(),
            ..Self::default()
        }
    }

    /// A result carrying a single run-level error and no counts.
    #[must_use]
    pub fn failed(account_id: &str, err: &SyncError) -> Self {
        Self {
            account_id: account_id.to_owned(),
            errors: vec![ItemError::fatal(err)],
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// `true` when the run aborted before processing items.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.errors.iter().any(|e| e.external_id.is_none())
    }
}
