// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Logical document schemas.
//!
//! A [`DocumentSchema`] is an ordered list of typed, named, feature-flagged
//! [`SchemaItem`]s. It is compiled into an index descriptor by
//! [`crate::search::schema_compiler`], encoded field by field by
//! [`field_codec`], and persisted as a [`SchemaRecord`] so it can be recovered
//! without re-deriving it from the index.
//!
//! # Example
//!
//! ```
//! use docgrid::schema::{DocumentSchema, LogicalType, SchemaItem};
//!
//! let schema = DocumentSchema::new("people")
//!     .with_item(SchemaItem::new("id", LogicalType::Integer).primary())
//!     .unwrap()
//!     .with_item(SchemaItem::new("name", LogicalType::Text).stemmed())
//!     .unwrap();
//!
//! let json = schema.save(None).unwrap();
//! let (loaded, _) = DocumentSchema::load(&json).unwrap();
//! assert_eq!(loaded, schema);
//! ```

pub mod field_codec;
pub mod registry;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{DocError, DocResult};

pub use registry::SchemaRegistry;

/// Matcher used when a phonetic item names none.
pub const DEFAULT_PHONETIC_MATCHER: &str = "English";

/// Multi-value separator used when an item names none.
pub const DEFAULT_TAG_SEPARATOR: char = ',';

/// Attribute linking a parent row to its child rows.
pub const CHILDREN_ATTRIBUTE: &str = "_children";

/// Field names starting with this prefix are criteria meta-entries.
pub const RESERVED_PREFIX: &str = "__";

const SCHEMA_RECORD_VERSION: u32 = 1;

/// Logical field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LogicalType {
    Text,
    Integer,
    Long,
    Float,
    Double,
    Boolean,
    Date,
    DateTime,
    Geo,
}

impl LogicalType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "Text",
            Self::Integer => "Integer",
            Self::Long => "Long",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::Boolean => "Boolean",
            Self::Date => "Date",
            Self::DateTime => "DateTime",
            Self::Geo => "Geo",
        }
    }

    /// Case-insensitive lookup by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let t = match name.to_ascii_lowercase().as_str() {
            "text" => Self::Text,
            "integer" => Self::Integer,
            "long" => Self::Long,
            "float" => Self::Float,
            "double" => Self::Double,
            "boolean" => Self::Boolean,
            "date" => Self::Date,
            "datetime" => Self::DateTime,
            "geo" => Self::Geo,
            _ => return None,
        };
        Some(t)
    }

    /// Parse the type of `field`, failing with a schema error naming both.
    pub fn parse_for(field: &str, name: &str) -> DocResult<Self> {
        Self::from_name(name)
            .ok_or_else(|| DocError::schema(field, format!("unrecognized logical type '{}'", name)))
    }

    #[must_use]
    pub fn is_number(&self) -> bool {
        matches!(self, Self::Integer | Self::Long | Self::Float | Self::Double)
    }

    #[must_use]
    pub fn is_integral(&self) -> bool {
        matches!(self, Self::Integer | Self::Long)
    }

    #[must_use]
    pub fn is_date(&self) -> bool {
        matches!(self, Self::Date | Self::DateTime)
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for LogicalType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_name(&value).ok_or_else(|| format!("unrecognized logical type '{}'", value))
    }
}

impl From<LogicalType> for String {
    fn from(value: LogicalType) -> Self {
        value.as_str().to_string()
    }
}

fn default_true() -> bool {
    true
}

/// One typed, named, feature-flagged field of a document schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaItem {
    pub name: String,
    pub logical_type: LogicalType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub is_multi_value: bool,
    #[serde(default = "default_true")]
    pub is_visible: bool,
    #[serde(default = "default_true")]
    pub is_searchable: bool,
    #[serde(default)]
    pub is_suggestable: bool,
    #[serde(default)]
    pub is_stemmed: bool,
    #[serde(default)]
    pub is_phonetic: bool,
    #[serde(default)]
    pub is_tag_field: bool,
    #[serde(default)]
    pub is_facet: bool,
    #[serde(default)]
    pub is_highlighted: bool,
    #[serde(default)]
    pub is_secret: bool,
    /// Relevance weight of the stemmed text variant (None = configured default).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_separator: Option<char>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phonetic_matcher: Option<String>,
}

impl SchemaItem {
    /// A visible, searchable item with every other feature off.
    #[must_use]
    pub fn new(name: &str, logical_type: LogicalType) -> Self {
        Self {
            name: name.to_string(),
            logical_type,
            title: None,
            is_primary: false,
            is_multi_value: false,
            is_visible: true,
            is_searchable: true,
            is_suggestable: false,
            is_stemmed: false,
            is_phonetic: false,
            is_tag_field: false,
            is_facet: false,
            is_highlighted: false,
            is_secret: false,
            weight: None,
            tag_separator: None,
            phonetic_matcher: None,
        }
    }

    #[must_use]
    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    #[must_use]
    pub fn titled(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    #[must_use]
    pub fn multi_value(mut self, separator: char) -> Self {
        self.is_multi_value = true;
        self.tag_separator = Some(separator);
        self
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.is_visible = false;
        self
    }

    #[must_use]
    pub fn stemmed(mut self) -> Self {
        self.is_stemmed = true;
        self
    }

    #[must_use]
    pub fn phonetic(mut self) -> Self {
        self.is_phonetic = true;
        self
    }

    #[must_use]
    pub fn tag(mut self) -> Self {
        self.is_tag_field = true;
        self
    }

    #[must_use]
    pub fn facet(mut self) -> Self {
        self.is_facet = true;
        self
    }

    #[must_use]
    pub fn suggestable(mut self) -> Self {
        self.is_suggestable = true;
        self
    }

    #[must_use]
    pub fn highlighted(mut self) -> Self {
        self.is_highlighted = true;
        self
    }

    #[must_use]
    pub fn secret(mut self) -> Self {
        self.is_secret = true;
        self
    }

    #[must_use]
    pub fn weighted(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    /// Title for presentation, falling back to the name.
    #[must_use]
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }

    #[must_use]
    pub fn separator(&self) -> char {
        self.tag_separator.unwrap_or(DEFAULT_TAG_SEPARATOR)
    }

    /// Whether text predicates compile against the exact tag variant.
    #[must_use]
    pub fn matches_as_tag(&self) -> bool {
        self.is_tag_field || self.is_facet
    }

    fn validate(&self) -> DocResult<()> {
        if self.name.is_empty() {
            return Err(DocError::schema("", "field name is empty"));
        }
        if self.name.starts_with(RESERVED_PREFIX) || self.name == CHILDREN_ATTRIBUTE {
            return Err(DocError::schema(&self.name, "field name is reserved"));
        }
        if self.logical_type == LogicalType::Geo
            && (self.is_stemmed || self.is_phonetic || self.is_tag_field)
        {
            return Err(DocError::schema(
                &self.name,
                "geo fields cannot be stemmed, phonetic or tagged",
            ));
        }
        if self.is_multi_value && self.logical_type.is_number() {
            return Err(DocError::schema(
                &self.name,
                "numeric fields cannot hold several values",
            ));
        }
        Ok(())
    }
}

/// Ordered list of schema items describing one document type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSchema {
    pub name: String,
    items: Vec<SchemaItem>,
}

/// Persisted form of a schema, stored under a deterministic key.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SchemaRecord {
    version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fingerprint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filter: Option<String>,
    schema: DocumentSchema,
}

/// A schema as persisted beside its index.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSchema {
    pub schema: DocumentSchema,
    /// Fingerprint of the FT.CREATE arguments the index was built with.
    pub fingerprint: Option<String>,
    /// Compiled FILTER expression the index was built with.
    pub filter: Option<String>,
}

impl DocumentSchema {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            items: Vec::new(),
        }
    }

    /// Build from items, validating the whole set.
    pub fn from_items(name: &str, items: Vec<SchemaItem>) -> DocResult<Self> {
        let schema = Self {
            name: name.to_string(),
            items,
        };
        schema.validate()?;
        Ok(schema)
    }

    /// Builder: append an item.
    pub fn with_item(mut self, item: SchemaItem) -> DocResult<Self> {
        self.push(item)?;
        Ok(self)
    }

    /// Append an item; the schema is unchanged on failure.
    pub fn push(&mut self, item: SchemaItem) -> DocResult<()> {
        item.validate()?;
        if self.item(&item.name).is_some() {
            return Err(DocError::schema(&item.name, "duplicate field name"));
        }
        if item.is_primary {
            if let Some(existing) = self.primary() {
                return Err(DocError::schema(
                    &item.name,
                    format!("'{}' is already the primary field", existing.name),
                ));
            }
        }
        self.items.push(item);
        Ok(())
    }

    /// Check every invariant: valid items, unique names, at most one primary.
    pub fn validate(&self) -> DocResult<()> {
        let mut primary: Option<&str> = None;
        for (i, item) in self.items.iter().enumerate() {
            item.validate()?;
            if self.items[..i].iter().any(|other| other.name == item.name) {
                return Err(DocError::schema(&item.name, "duplicate field name"));
            }
            if item.is_primary {
                if let Some(existing) = primary {
                    return Err(DocError::schema(
                        &item.name,
                        format!("'{}' is already the primary field", existing),
                    ));
                }
                primary = Some(&item.name);
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn items(&self) -> &[SchemaItem] {
        &self.items
    }

    #[must_use]
    pub fn item(&self, name: &str) -> Option<&SchemaItem> {
        self.items.iter().find(|i| i.name == name)
    }

    /// Look up an item, failing with `UnknownField`.
    pub fn require(&self, name: &str) -> DocResult<&SchemaItem> {
        self.item(name).ok_or_else(|| DocError::UnknownField(name.to_string()))
    }

    /// Whether `attribute` is stored as text: an item of a non-numeric type.
    /// Numbers, date shadows and reserved attributes are not.
    #[must_use]
    pub fn stores_text(&self, attribute: &str) -> bool {
        self.item(attribute).is_some_and(|i| !i.logical_type.is_number())
    }

    #[must_use]
    pub fn primary(&self) -> Option<&SchemaItem> {
        self.items.iter().find(|i| i.is_primary)
    }

    pub fn facets(&self) -> impl Iterator<Item = &SchemaItem> {
        self.items.iter().filter(|i| i.is_facet)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Serialize to the persisted record form, with the index fingerprint if known.
    pub fn save(&self, fingerprint: Option<&str>) -> DocResult<String> {
        self.save_indexed(fingerprint, None)
    }

    /// [`save`](Self::save), also recording the index FILTER expression.
    pub fn save_indexed(&self, fingerprint: Option<&str>, filter: Option<&str>) -> DocResult<String> {
        let record = SchemaRecord {
            version: SCHEMA_RECORD_VERSION,
            fingerprint: fingerprint.map(str::to_string),
            filter: filter.map(str::to_string),
            schema: self.clone(),
        };
        Ok(serde_json::to_string(&record)?)
    }

    /// Inverse of [`save`](Self::save): the schema and its stored fingerprint.
    ///
    /// An item with an unrecognized logical type fails with a schema error
    /// naming the field and the type.
    pub fn load(json: &str) -> DocResult<(Self, Option<String>)> {
        Self::load_stored(json).map(|stored| (stored.schema, stored.fingerprint))
    }

    /// Inverse of [`save_indexed`](Self::save_indexed).
    pub fn load_stored(json: &str) -> DocResult<StoredSchema> {
        let raw: Value = serde_json::from_str(json)?;
        let items = raw
            .get("schema")
            .and_then(|s| s.get("items"))
            .and_then(Value::as_array);
        for item in items.into_iter().flatten() {
            let field = item.get("name").and_then(Value::as_str).unwrap_or_default();
            match item.get("logical_type").and_then(Value::as_str) {
                Some(type_name) => {
                    LogicalType::parse_for(field, type_name)?;
                }
                None => return Err(DocError::schema(field, "missing logical type")),
            }
        }

        let record: SchemaRecord = serde_json::from_value(raw)?;
        if record.version != SCHEMA_RECORD_VERSION {
            return Err(DocError::Serialization(format!(
                "unsupported schema record version {}",
                record.version
            )));
        }
        record.schema.validate()?;
        Ok(StoredSchema {
            schema: record.schema,
            fingerprint: record.fingerprint,
            filter: record.filter,
        })
    }

    /// Apply `patch` in place and report whether the index must be rebuilt.
    ///
    /// Items are matched by name; patch items naming unknown fields are
    /// ignored. Title and facet changes never require a rebuild. Weight and
    /// the searchable, suggestable, stemmed and phonetic flags do. Any other
    /// attribute change is taken into the in-memory schema but is not
    /// reflected in the live index until it is recreated.
    pub fn update(&mut self, patch: &DocumentSchema) -> bool {
        let mut rebuild = false;
        for patch_item in &patch.items {
            let Some(item) = self.items.iter_mut().find(|i| i.name == patch_item.name) else {
                warn!(field = %patch_item.name, "Schema update names unknown field, ignored");
                continue;
            };

            item.title = patch_item.title.clone();
            item.is_facet = patch_item.is_facet;

            if item.weight != patch_item.weight
                || item.is_searchable != patch_item.is_searchable
                || item.is_suggestable != patch_item.is_suggestable
                || item.is_stemmed != patch_item.is_stemmed
                || item.is_phonetic != patch_item.is_phonetic
            {
                rebuild = true;
            }
            item.weight = patch_item.weight;
            item.is_searchable = patch_item.is_searchable;
            item.is_suggestable = patch_item.is_suggestable;
            item.is_stemmed = patch_item.is_stemmed;
            item.is_phonetic = patch_item.is_phonetic;

            if item.logical_type != patch_item.logical_type
                || item.is_primary != patch_item.is_primary
                || item.is_multi_value != patch_item.is_multi_value
                || item.is_visible != patch_item.is_visible
                || item.is_tag_field != patch_item.is_tag_field
                || item.is_highlighted != patch_item.is_highlighted
                || item.is_secret != patch_item.is_secret
                || item.tag_separator != patch_item.tag_separator
                || item.phonetic_matcher != patch_item.phonetic_matcher
            {
                warn!(
                    field = %item.name,
                    "Schema update changes an immutable attribute; applied in memory only"
                );
                *item = SchemaItem {
                    name: item.name.clone(),
                    title: item.title.clone(),
                    ..patch_item.clone()
                };
            }
        }
        rebuild
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> DocumentSchema {
        DocumentSchema::new("people")
            .with_item(SchemaItem::new("id", LogicalType::Integer).primary())
            .unwrap()
            .with_item(SchemaItem::new("name", LogicalType::Text).stemmed().weighted(2.0))
            .unwrap()
            .with_item(SchemaItem::new("born", LogicalType::Date))
            .unwrap()
            .with_item(SchemaItem::new("city", LogicalType::Text).facet().titled("City"))
            .unwrap()
    }

    #[test]
    fn test_logical_type_names() {
        assert_eq!(LogicalType::from_name("datetime"), Some(LogicalType::DateTime));
        assert_eq!(LogicalType::from_name("GEO"), Some(LogicalType::Geo));
        assert_eq!(LogicalType::from_name("blob"), None);
        assert!(LogicalType::Double.is_number());
        assert!(!LogicalType::Date.is_number());
        assert!(LogicalType::Date.is_date());
    }

    #[test]
    fn test_parse_for_names_field_and_type() {
        let err = LogicalType::parse_for("avatar", "Blob").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("avatar"));
        assert!(msg.contains("Blob"));
    }

    #[test]
    fn test_second_primary_rejected() {
        let err = people()
            .with_item(SchemaItem::new("code", LogicalType::Text).primary())
            .unwrap_err();
        assert!(matches!(err, DocError::Schema { ref field, .. } if field == "code"));
    }

    #[test]
    fn test_geo_cannot_be_stemmed() {
        let err = DocumentSchema::new("p")
            .with_item(SchemaItem::new("loc", LogicalType::Geo).stemmed())
            .unwrap_err();
        assert!(matches!(err, DocError::Schema { .. }));
    }

    #[test]
    fn test_numeric_multi_value_rejected() {
        let err = DocumentSchema::new("p")
            .with_item(SchemaItem::new("scores", LogicalType::Integer).multi_value(';'))
            .unwrap_err();
        assert!(matches!(err, DocError::Schema { ref field, .. } if field == "scores"));
        assert!(DocumentSchema::new("p")
            .with_item(SchemaItem::new("days", LogicalType::Date).multi_value(';'))
            .is_ok());
    }

    #[test]
    fn test_reserved_names_rejected() {
        assert!(DocumentSchema::new("p")
            .with_item(SchemaItem::new("__offset", LogicalType::Text))
            .is_err());
        assert!(DocumentSchema::new("p")
            .with_item(SchemaItem::new(CHILDREN_ATTRIBUTE, LogicalType::Text))
            .is_err());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let err = DocumentSchema::from_items(
            "p",
            vec![
                SchemaItem::new("a", LogicalType::Text),
                SchemaItem::new("a", LogicalType::Integer),
            ],
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_save_load_round_trip() {
        let schema = people();
        let json = schema.save(Some("abc123")).unwrap();
        let (loaded, fingerprint) = DocumentSchema::load(&json).unwrap();
        assert_eq!(loaded, schema);
        assert_eq!(fingerprint.as_deref(), Some("abc123"));
        let names: Vec<&str> = loaded.items().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "born", "city"]);
    }

    #[test]
    fn test_stored_filter_round_trip() {
        let json = people().save_indexed(Some("fp"), Some("@age>18")).unwrap();
        let stored = DocumentSchema::load_stored(&json).unwrap();
        assert_eq!(stored.filter.as_deref(), Some("@age>18"));
        assert_eq!(stored.fingerprint.as_deref(), Some("fp"));
        assert!(DocumentSchema::load_stored(&people().save(None).unwrap()).unwrap().filter.is_none());
    }

    #[test]
    fn test_load_rejects_unknown_type() {
        let json = r#"{"version":1,"schema":{"name":"p","items":[{"name":"pic","logical_type":"Blob"}]}}"#;
        let err = DocumentSchema::load(json).unwrap_err();
        assert!(matches!(err, DocError::Schema { ref field, ref reason } if field == "pic" && reason.contains("Blob")));
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        assert!(matches!(DocumentSchema::load("{not json").unwrap_err(), DocError::Serialization(_)));
    }

    #[test]
    fn test_update_title_and_facet_no_rebuild() {
        let mut schema = people();
        let mut patch_item = schema.item("city").unwrap().clone();
        patch_item.title = Some("Town".into());
        patch_item.is_facet = false;
        let patch = DocumentSchema::from_items("people", vec![patch_item]).unwrap();

        assert!(!schema.update(&patch));
        let city = schema.item("city").unwrap();
        assert_eq!(city.display_title(), "Town");
        assert!(!city.is_facet);
    }

    #[test]
    fn test_update_weight_requires_rebuild() {
        let mut schema = people();
        let patch_item = schema.item("name").unwrap().clone().weighted(5.0);
        let patch = DocumentSchema::from_items("people", vec![patch_item]).unwrap();
        assert!(schema.update(&patch));
        assert_eq!(schema.item("name").unwrap().weight, Some(5.0));
    }

    #[test]
    fn test_update_phonetic_requires_rebuild() {
        let mut schema = people();
        let patch_item = schema.item("name").unwrap().clone().phonetic();
        let patch = DocumentSchema::from_items("people", vec![patch_item]).unwrap();
        assert!(schema.update(&patch));
    }

    #[test]
    fn test_update_other_attribute_applied_without_rebuild() {
        let mut schema = people();
        let patch_item = schema.item("city").unwrap().clone().hidden();
        let patch = DocumentSchema::from_items("people", vec![patch_item]).unwrap();
        assert!(!schema.update(&patch));
        assert!(!schema.item("city").unwrap().is_visible);
    }

    #[test]
    fn test_update_ignores_unknown_fields() {
        let mut schema = people();
        let before = schema.clone();
        let patch = DocumentSchema::from_items("people", vec![SchemaItem::new("ghost", LogicalType::Text)]).unwrap();
        assert!(!schema.update(&patch));
        assert_eq!(schema, before);
    }
}
