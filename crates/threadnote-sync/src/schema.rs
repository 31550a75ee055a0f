//! Destination schema detection: which field plays which role.
//!
//! Detection is driven by [`RULES`], an ordered table of
//! `{role, field type, keywords}`. One generic matcher walks the table and,
//! for each rule, tries the keywords in priority order; the first keyword
//! that matches an unused field of the right type wins, and ties go to
//! schema order. Short English keywords only match whole words of the field
//! name, so `id` does not match "Idea". Rules without keywords match on type
//! alone. If no date field matched a timestamp keyword, the first date field
//! in schema order is used.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use threadnote_core::{
    CollectionSchema, DestinationApi, FieldMapping, FieldType, Role, SchemaField, SyncError,
};

use Keyword::{Part, Word};

/// A lowercase keyword and how it is matched against a field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    /// Anywhere in the name.
    Part(&'static str),
    /// A whole word of the name, split on anything not alphanumeric.
    Word(&'static str),
}

impl Keyword {
    fn matches(self, name: &str) -> bool {
        match self {
            Part(kw) => name.contains(kw),
            Word(kw) => name
                .split(|c: char| !c.is_alphanumeric())
                .any(|word| word == kw),
        }
    }
}

#[derive(Debug)]
pub struct Rule {
    pub role: Role,
    pub field_type: FieldType,
    /// Highest priority first.
    pub keywords: &'static [Keyword],
}

/// Detection rules, consulted in order.
pub const RULES: &[Rule] = &[
    Rule {
        role: Role::Title,
        field_type: FieldType::Title,
        keywords: &[],
    },
    Rule {
        role: Role::Url,
        field_type: FieldType::Url,
        keywords: &[],
    },
    Rule {
        role: Role::Timestamp,
        field_type: FieldType::Date,
        keywords: &[
            Part("posted"),
            Part("published"),
            Part("created"),
            Part("작성"),
            Part("게시"),
            Part("발행"),
            Word("date"),
            Word("time"),
            Part("날짜"),
            Part("일시"),
        ],
    },
    Rule {
        role: Role::Views,
        field_type: FieldType::Number,
        keywords: &[Part("view"), Part("impression"), Part("조회"), Part("노출")],
    },
    Rule {
        role: Role::Likes,
        field_type: FieldType::Number,
        keywords: &[Word("likes"), Word("like"), Part("좋아요")],
    },
    Rule {
        role: Role::Replies,
        field_type: FieldType::Number,
        keywords: &[Part("repl"), Part("comment"), Part("답글"), Part("댓글")],
    },
    Rule {
        role: Role::Reposts,
        field_type: FieldType::Number,
        keywords: &[Part("repost"), Part("리포스트"), Part("재게시")],
    },
    Rule {
        role: Role::Quotes,
        field_type: FieldType::Number,
        keywords: &[Part("quote"), Part("인용")],
    },
    Rule {
        role: Role::Shares,
        field_type: FieldType::Number,
        keywords: &[Part("share"), Part("공유")],
    },
    Rule {
        role: Role::Author,
        field_type: FieldType::RichText,
        keywords: &[
            Part("author"),
            Part("username"),
            Word("handle"),
            Part("작성자"),
            Part("계정"),
        ],
    },
    Rule {
        role: Role::ExternalId,
        field_type: FieldType::RichText,
        keywords: &[
            Part("post id"),
            Part("thread id"),
            Part("source id"),
            Part("external"),
            Part("게시물 id"),
            Word("id"),
        ],
    },
    Rule {
        role: Role::Body,
        field_type: FieldType::RichText,
        keywords: &[
            Part("body"),
            Part("content"),
            Word("text"),
            Part("본문"),
            Part("내용"),
        ],
    },
];

impl Rule {
    /// The best unused candidate of the right type: highest-priority keyword
    /// first, then schema order.
    fn pick<'a>(
        &self,
        fields: &'a [SchemaField],
        mapping: &FieldMapping,
    ) -> Option<&'a SchemaField> {
        let mut candidates = fields
            .iter()
            .filter(|f| f.field_type == self.field_type && !mapping.uses_field(&f.name));
        if self.keywords.is_empty() {
            return candidates.next();
        }
        let named: Vec<(&SchemaField, String)> =
            candidates.map(|f| (f, f.name.to_lowercase())).collect();
        self.keywords.iter().find_map(|kw| {
            named
                .iter()
                .find(|(_, name)| kw.matches(name))
                .map(|(field, _)| *field)
        })
    }
}

/// Detects a [`FieldMapping`] for `schema`.
///
/// # Errors
///
/// Returns [`SyncError::ValidationFailure`] if the schema has no title field.
pub fn detect(schema: &CollectionSchema) -> Result<FieldMapping, SyncError> {
    let mut mapping = FieldMapping::new();

    for rule in RULES {
        if mapping.contains(rule.role) {
            continue;
        }
        if let Some(field) = rule.pick(&schema.fields, &mapping) {
            mapping.assign(rule.role, field.name.clone());
        }
    }

    if !mapping.contains(Role::Timestamp) {
        let fallback = schema
            .fields
            .iter()
            .find(|f| f.field_type == FieldType::Date && !mapping.uses_field(&f.name));
        if let Some(field) = fallback {
            tracing::debug!(field = %field.name, "no timestamp keyword matched, using first date field");
            mapping.assign(Role::Timestamp, field.name.clone());
        }
    }

    if !mapping.contains(Role::Title) {
        return Err(SyncError::ValidationFailure(format!(
            "collection {} has no title field",
            schema.collection_id
        )));
    }
    Ok(mapping)
}

/// Checks that every field named by an explicit mapping exists in `schema`.
///
/// # Errors
///
/// Returns [`SyncError::ValidationFailure`] naming the first missing field.
pub fn validate_override(
    schema: &CollectionSchema,
    mapping: &FieldMapping,
) -> Result<(), SyncError> {
    for (role, field) in mapping.iter() {
        if schema.field_type(field).is_none() {
            return Err(SyncError::ValidationFailure(format!(
                "field mapping for {role:?} names '{field}', which collection {} does not have",
                schema.collection_id
            )));
        }
    }
    Ok(())
}

/// Resolved mappings keyed by destination collection id.
#[derive(Debug, Default)]
pub struct SchemaCache {
    resolved: Mutex<HashMap<String, FieldMapping>>,
}

impl SchemaCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn cached(&self, collection_id: &str) -> Option<FieldMapping> {
        self.resolved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection_id)
            .cloned()
    }

    /// Returns the cached mapping for `collection_id`, fetching the schema
    /// and resolving it on a miss. An explicit `override_mapping` replaces
    /// detection but is still checked against the schema.
    ///
    /// # Errors
    ///
    /// Returns the schema fetch error, or [`SyncError::ValidationFailure`]
    /// if no usable mapping can be produced.
    pub async fn resolve(
        &self,
        destination: &dyn DestinationApi,
        collection_id: &str,
        override_mapping: Option<&FieldMapping>,
    ) -> Result<FieldMapping, SyncError> {
        if let Some(hit) = self.cached(collection_id) {
            return Ok(hit);
        }

        let schema = destination.get_collection_schema(collection_id).await?;
        let mapping = match override_mapping {
            Some(explicit) => {
                validate_override(&schema, explicit)?;
                explicit.clone()
            }
            None => detect(&schema)?,
        };
        tracing::info!(
            collection_id,
            roles = ?mapping.iter().map(|(r, _)| r).collect::<Vec<_>>(),
            "resolved field mapping"
        );

        self.resolved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(collection_id.to_owned(), mapping.clone());
        Ok(mapping)
    }

    pub fn invalidate(&self, collection_id: &str) {
        self.resolved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(collection_id);
    }

    pub fn invalidate_all(&self) {
        self.resolved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
#[path = "schema_test.rs"]
mod tests;
