//! Builds destination property payloads from items and metrics.
//!
//! Roles missing from the [`FieldMapping`] are left out of the payload.

use threadnote_core::{
    ContentItem, FieldMapping, MetricKind, Metrics, Properties, PropertyValue, Role,
};

const TITLE_MAX_CHARS: usize = 100;

/// Page title for an item: its first non-empty line, shortened to 100
/// characters, or the author and date for items without text.
#[must_use]
pub fn title_for(item: &ContentItem) -> String {
    let first_line = item
        .text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty());
    match first_line {
        Some(line) if line.chars().count() > TITLE_MAX_CHARS => {
            let mut short: String = line.chars().take(TITLE_MAX_CHARS - 1).collect();
            short.push('…');
            short
        }
        Some(line) => line.to_owned(),
        None => format!(
            "@{} {}",
            item.username,
            item.created_at.format("%Y-%m-%d %H:%M")
        ),
    }
}

/// Full property set for a newly created page.
#[must_use]
pub fn item_properties(
    item: &ContentItem,
    metrics: Option<&Metrics>,
    mapping: &FieldMapping,
) -> Properties {
    let mut properties = Properties::new();
    let mut put = |role: Role, value: PropertyValue| {
        if let Some(field) = mapping.get(role) {
            properties.insert(field.to_owned(), value);
        }
    };

    put(Role::Title, PropertyValue::Title(title_for(item)));
    put(Role::Body, PropertyValue::RichText(item.text.clone()));
    put(Role::Timestamp, PropertyValue::Date(item.created_at));
    put(Role::Url, PropertyValue::Url(item.permalink.clone()));
    put(Role::Author, PropertyValue::RichText(item.username.clone()));
    put(Role::ExternalId, PropertyValue::RichText(item.id.clone()));

    if let Some(metrics) = metrics {
        properties.extend(metric_properties(metrics, mapping));
    }
    properties
}

/// Only the metric fields, for refreshing an existing page.
#[must_use]
pub fn metric_properties(metrics: &Metrics, mapping: &FieldMapping) -> Properties {
    MetricKind::ALL
        .into_iter()
        .filter_map(|kind| {
            mapping
                .get(Role::for_metric(kind))
                .map(|field| (field.to_owned(), PropertyValue::Number(metrics.get(kind))))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use threadnote_core::MediaType;

    use super::*;

    fn item(text: &str) -> ContentItem {
        ContentItem {
            id: "1801".to_owned(),
            text: text.to_owned(),
            created_at: Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 0).unwrap(),
            permalink: "https://www.threads.net/@writer/post/X".to_owned(),
            username: "writer".to_owned(),
            media_type: MediaType::TextPost,
            is_quote_post: false,
        }
    }

    fn mapping() -> FieldMapping {
        let mut m = FieldMapping::new();
        m.assign(Role::Title, "Name");
        m.assign(Role::Url, "Link");
        m.assign(Role::Views, "Views");
        m.assign(Role::Likes, "Likes");
        m
    }

    #[test]
    fn title_uses_first_non_empty_line() {
        assert_eq!(title_for(&item("\n  hello world  \nsecond")), "hello world");
    }

    #[test]
    fn long_titles_are_shortened() {
        let title = title_for(&item(&"x".repeat(150)));
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS);
        assert!(title.ends_with('…'));
    }

    #[test]
    fn empty_text_titles_fall_back_to_author_and_date() {
        assert_eq!(title_for(&item("")), "@writer 2025-03-04 05:06");
    }

    #[test]
    fn unmapped_roles_are_skipped() {
        let metrics = Metrics {
            views: 12,
            likes: 3,
            replies: 9,
            ..Metrics::default()
        };
        let props = item_properties(&item("hi"), Some(&metrics), &mapping());
        let keys: Vec<&str> = props.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Likes", "Link", "Name", "Views"]);
        assert_eq!(props["Views"], PropertyValue::Number(12));
    }

    #[test]
    fn zero_metrics_are_written_as_zero() {
        let props = metric_properties(&Metrics::default(), &mapping());
        assert_eq!(props["Likes"], PropertyValue::Number(0));
        assert_eq!(props.len(), 2);
    }
}
