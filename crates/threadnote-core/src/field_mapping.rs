//! Destination schema shapes and the role → field correspondence.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::MetricKind;

/// Semantic role a destination field can play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Title,
    Body,
    Timestamp,
    Url,
    Author,
    ExternalId,
    Views,
    Likes,
    Replies,
    Reposts,
    Quotes,
    Shares,
}

impl Role {
    #[must_use]
    pub fn metric(self) -> Option<MetricKind> {
        match self {
            Role::Views => Some(MetricKind::Views),
            Role::Likes => Some(MetricKind::Likes),
            Role::Replies => Some(MetricKind::Replies),
            Role::Reposts => Some(MetricKind::Reposts),
            Role::Quotes => Some(MetricKind::Quotes),
            Role::Shares => Some(MetricKind::Shares),
            Role::Title
            | Role::Body
            | Role::Timestamp
            | Role::Url
            | Role::Author
            | Role::ExternalId => None,
        }
    }

    #[must_use]
    pub fn for_metric(kind: MetricKind) -> Role {
        match kind {
            MetricKind::Views => Role::Views,
            MetricKind::Likes => Role::Likes,
            MetricKind::Replies => Role::Replies,
            MetricKind::Reposts => Role::Reposts,
            MetricKind::Quotes => Role::Quotes,
            MetricKind::Shares => Role::Shares,
        }
    }
}

/// Resolved correspondence between roles and destination field names.
///
/// A role with no entry is skipped when writing pages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMapping {
    fields: BTreeMap<Role, String>,
}

impl FieldMapping {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, role: Role) -> Option<&str> {
        self.fields.get(&role).map(String::as_str)
    }

    pub fn assign(&mut self, role: Role, field: impl Into<String>) {
        self.fields.insert(role, field.into());
    }

    #[must_use]
    pub fn contains(&self, role: Role) -> bool {
        self.fields.contains_key(&role)
    }

    /// `true` if some role already points at `field`.
    #[must_use]
    pub fn uses_field(&self, field: &str) -> bool {
        self.fields.values().any(|f| f == field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Role, &str)> {
        self.fields.iter().map(|(r, f)| (*r, f.as_str()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Destination field type tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Title,
    RichText,
    Number,
    Url,
    Date,
    Select,
    MultiSelect,
    Checkbox,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaField {
    pub name: String,
    pub field_type: FieldType,
}

/// Destination collection schema, fields in schema order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSchema {
    pub collection_id: String,
    pub fields: Vec<SchemaField>,
}

impl CollectionSchema {
    #[must_use]
    pub fn field_type(&self, name: &str) -> Option<&FieldType> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| &f.field_type)
    }
}

/// A typed property value in a destination write payload.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Title(String),
    RichText(String),
    Number(u64),
    Url(String),
    Date(DateTime<Utc>),
}

/// Field name → value, as written to one destination page.
pub type Properties = BTreeMap<String, PropertyValue>;
