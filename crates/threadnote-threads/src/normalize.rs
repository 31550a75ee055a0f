//! Conversion of Threads API wire types into domain types.

use chrono::{DateTime, Utc};
use threadnote_core::{AccountMetrics, ContentItem, MediaType, MetricKind, Metrics};

use crate::types::{InsightMetric, ThreadsPost};

/// Parses a Graph timestamp. Accepts both `+0000` and RFC 3339 offsets.
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z")
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[must_use]
pub fn parse_media_type(s: Option<&str>) -> MediaType {
    match s {
        Some("TEXT_POST") => MediaType::TextPost,
        Some("IMAGE") => MediaType::Image,
        Some("VIDEO") => MediaType::Video,
        Some("CAROUSEL_ALBUM") => MediaType::CarouselAlbum,
        Some("AUDIO") => MediaType::Audio,
        Some("REPOST_FACADE") => MediaType::RepostFacade,
        _ => MediaType::Other,
    }
}

/// Converts a wire post into a [`ContentItem`].
///
/// Returns `None` when the timestamp cannot be parsed; such posts cannot be
/// placed in time and are dropped with a warning by the caller.
#[must_use]
pub fn normalize_post(post: ThreadsPost) -> Option<ContentItem> {
    let created_at = parse_timestamp(&post.timestamp)?;
    Some(ContentItem {
        permalink: post.permalink.unwrap_or_default(),
        username: post.username.unwrap_or_default(),
        text: post.text.unwrap_or_default(),
        media_type: parse_media_type(post.media_type.as_deref()),
        is_quote_post: post.is_quote_post,
        created_at,
        id: post.id,
    })
}

/// Reads one metric value: `total_value` when present, otherwise the sum of
/// the `values` series.
fn metric_value(metric: &InsightMetric) -> u64 {
    match &metric.total_value {
        Some(total) => total.value,
        None => metric
            .values
            .iter()
            .fold(0u64, |acc, v| acc.saturating_add(v.value)),
    }
}

/// Folds an insights payload into [`Metrics`]. Unknown names are ignored and
/// absent counters stay at zero.
#[must_use]
pub fn normalize_metrics(data: &[InsightMetric]) -> Metrics {
    let mut metrics = Metrics::default();
    for metric in data {
        if let Some(kind) = MetricKind::from_wire(&metric.name) {
            metrics.set(kind, metric_value(metric));
        }
    }
    metrics
}

#[must_use]
pub fn normalize_account_metrics(data: &[InsightMetric]) -> AccountMetrics {
    let followers_count = data
        .iter()
        .find(|m| m.name == "followers_count")
        .map(metric_value);
    AccountMetrics {
        metrics: normalize_metrics(data),
        followers_count,
    }
}
