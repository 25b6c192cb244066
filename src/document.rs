// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Logical documents.
//!
//! A [`LogicalDocument`] is what callers read and write: an ordered mapping
//! from field name to one or more string values, each tagged with its
//! logical type. Physical encodings (tag/stem/phonetic variants, shadow
//! epoch fields) never appear here; the field codec produces and strips them.
//!
//! ```
//! use docgrid::LogicalDocument;
//!
//! let doc = LogicalDocument::new()
//!     .with("id", "1")
//!     .with("name", "Ann")
//!     .with_values("tags", vec!["a".into(), "b".into()]);
//!
//! assert_eq!(doc.first("name"), Some("Ann"));
//! assert_eq!(doc.get("tags").map(|v| v.values.len()), Some(2));
//! assert_eq!(doc.names().collect::<Vec<_>>(), vec!["id", "name", "tags"]);
//! ```

use serde::{Deserialize, Serialize};

use crate::schema::LogicalType;

/// Values of one logical field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    pub values: Vec<String>,
    pub logical_type: LogicalType,
}

impl FieldValue {
    #[must_use]
    pub fn new(values: Vec<String>, logical_type: LogicalType) -> Self {
        Self { values, logical_type }
    }

    #[must_use]
    pub fn first(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }
}

/// An ordered, possibly hierarchical document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogicalDocument {
    /// Physical row key, set once the document has been stored or read back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    fields: Vec<(String, FieldValue)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<LogicalDocument>,
}

impl LogicalDocument {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set a single text value.
    #[must_use]
    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.set(name, value);
        self
    }

    /// Builder: set several values for a multi-value field.
    #[must_use]
    pub fn with_values(mut self, name: &str, values: Vec<String>) -> Self {
        self.set_field(name, FieldValue::new(values, LogicalType::Text));
        self
    }

    /// Builder: attach a child document.
    #[must_use]
    pub fn with_child(mut self, child: LogicalDocument) -> Self {
        self.children.push(child);
        self
    }

    /// Set (or replace) a single-valued field, keeping its position.
    pub fn set(&mut self, name: &str, value: &str) {
        let logical_type = self.get(name).map_or(LogicalType::Text, |f| f.logical_type);
        self.set_field(name, FieldValue::new(vec![value.to_string()], logical_type));
    }

    /// Set (or replace) a field, keeping its position if already present.
    pub fn set_field(&mut self, name: &str, value: FieldValue) {
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    /// Append a value to a field, creating it if needed.
    pub fn push_value(&mut self, name: &str, value: &str, logical_type: LogicalType) {
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => existing.values.push(value.to_string()),
            None => self
                .fields
                .push((name.to_string(), FieldValue::new(vec![value.to_string()], logical_type))),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// First value of a field.
    #[must_use]
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::first)
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        let pos = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.remove(pos).1)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn add_child(&mut self, child: LogicalDocument) {
        self.children.push(child);
    }

    #[must_use]
    pub fn children(&self) -> &[LogicalDocument] {
        &self.children
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_in_place() {
        let mut doc = LogicalDocument::new().with("a", "1").with("b", "2");
        doc.set("a", "3");
        assert_eq!(doc.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(doc.first("a"), Some("3"));
    }

    #[test]
    fn test_set_keeps_logical_type() {
        let mut doc = LogicalDocument::new();
        doc.set_field("n", FieldValue::new(vec!["1".into()], LogicalType::Integer));
        doc.set("n", "2");
        assert_eq!(doc.get("n").unwrap().logical_type, LogicalType::Integer);
    }

    #[test]
    fn test_push_value_and_remove() {
        let mut doc = LogicalDocument::new();
        doc.push_value("tags", "x", LogicalType::Text);
        doc.push_value("tags", "y", LogicalType::Text);
        assert_eq!(doc.get("tags").unwrap().values, vec!["x", "y"]);
        assert!(doc.remove("tags").is_some());
        assert!(doc.is_empty());
        assert!(doc.remove("tags").is_none());
    }

    #[test]
    fn test_children() {
        let mut doc = LogicalDocument::new()
            .with("id", "1")
            .with_child(LogicalDocument::new().with("line", "a"));
        doc.add_child(LogicalDocument::new().with("line", "b"));
        assert_eq!(doc.children().len(), 2);
        assert_eq!(doc.children()[1].first("line"), Some("b"));
    }
}
