//! Encoding of typed property values, filters, and page bodies into Notion's
//! JSON shapes, and decoding of database schemas.

use serde_json::{json, Map, Value};
use threadnote_core::{
    CollectionSchema, FieldType, PageFilter, PageSort, Properties, PropertyValue, SchemaField,
};

use crate::types::{DatabaseResponse, PropertySchema};

/// Notion rejects text objects longer than this many characters.
pub const MAX_TEXT_CHARS: usize = 2000;
/// Notion accepts at most this many rich-text objects per property and
/// this many child blocks per request.
pub const MAX_ARRAY_LEN: usize = 100;

/// Splits `text` into rich-text objects of at most [`MAX_TEXT_CHARS`]
/// characters each, capped at [`MAX_ARRAY_LEN`] objects.
#[must_use]
pub fn rich_text(text: &str) -> Value {
    let chars: Vec<char> = text.chars().collect();
    let chunks: Vec<Value> = chars
        .chunks(MAX_TEXT_CHARS)
        .take(MAX_ARRAY_LEN)
        .map(|chunk| {
            let content: String = chunk.iter().collect();
            json!({ "type": "text", "text": { "content": content } })
        })
        .collect();
    Value::Array(chunks)
}

#[must_use]
pub fn encode_value(value: &PropertyValue) -> Value {
    match value {
        PropertyValue::Title(s) => json!({ "title": rich_text(s) }),
        PropertyValue::RichText(s) => json!({ "rich_text": rich_text(s) }),
        PropertyValue::Number(n) => json!({ "number": n }),
        PropertyValue::Url(s) => json!({ "url": s }),
        PropertyValue::Date(dt) => json!({ "date": { "start": dt.to_rfc3339() } }),
    }
}

#[must_use]
pub fn encode_properties(properties: &Properties) -> Map<String, Value> {
    properties
        .iter()
        .map(|(name, value)| (name.clone(), encode_value(value)))
        .collect()
}

/// Encodes an equality filter using the condition key that matches the
/// value's property type.
#[must_use]
pub fn encode_filter(filter: &PageFilter) -> Value {
    let (kind, equals) = match &filter.equals {
        PropertyValue::Title(s) => ("title", json!(s)),
        PropertyValue::RichText(s) => ("rich_text", json!(s)),
        PropertyValue::Number(n) => ("number", json!(n)),
        PropertyValue::Url(s) => ("url", json!(s)),
        PropertyValue::Date(dt) => ("date", json!(dt.to_rfc3339())),
    };
    json!({ "property": filter.field, kind: { "equals": equals } })
}

#[must_use]
pub fn encode_sort(sort: &PageSort) -> Value {
    let direction = if sort.ascending {
        "ascending"
    } else {
        "descending"
    };
    json!({ "property": sort.field, "direction": direction })
}

/// Turns plain text into paragraph blocks, one per blank-line separated
/// paragraph.
#[must_use]
pub fn paragraph_blocks(content: &str) -> Vec<Value> {
    content
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .take(MAX_ARRAY_LEN)
        .map(|p| {
            json!({
                "object": "block",
                "type": "paragraph",
                "paragraph": { "rich_text": rich_text(p) }
            })
        })
        .collect()
}

fn parse_field_type(kind: &str) -> FieldType {
    serde_json::from_value(Value::String(kind.to_owned())).unwrap_or(FieldType::Other)
}

/// Converts a database response into a [`CollectionSchema`], preserving the
/// order in which Notion listed the properties.
#[must_use]
pub fn decode_schema(collection_id: &str, db: DatabaseResponse) -> CollectionSchema {
    let fields = db
        .properties
        .into_iter()
        .filter_map(|(name, schema)| {
            let schema: PropertySchema = serde_json::from_value(schema).ok()?;
            Some(SchemaField {
                name,
                field_type: parse_field_type(&schema.kind),
            })
        })
        .collect();
    CollectionSchema {
        collection_id: collection_id.to_owned(),
        fields,
    }
}
