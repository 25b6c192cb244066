// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Criteria - abstract, type-agnostic filter expressions
//!
//! A [`Criteria`] is an ordered list of `(connector, criterion)` pairs plus
//! free-form features. Field types are not known here; the query compiler
//! resolves each field against a schema.
//!
//! # Example
//!
//! ```rust
//! use docgrid::search::{Criteria, Operator};
//!
//! let criteria = Criteria::new()
//!     .and("age", Operator::Between, ["18", "30"])
//!     .or("city", Operator::In, ["Paris", "Rome"])
//!     .and("name", Operator::Sort, ["ASC"])
//!     .with_query("engineer")
//!     .with_limit(20);
//!
//! assert_eq!(criteria.predicates().count(), 3);
//! assert_eq!(criteria.limit().unwrap(), Some(20));
//! assert_eq!(criteria.free_text(), Some("engineer"));
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DocError, DocResult};
use crate::schema::RESERVED_PREFIX;

/// Meta-entry carrying the page offset.
pub const META_OFFSET: &str = "__offset";
/// Meta-entry carrying the page size.
pub const META_LIMIT: &str = "__limit";
/// Meta-entry carrying raw free text.
pub const META_QUERY: &str = "__query";
/// Feature holding the last compiled query string.
pub const COMPILED_QUERY_FEATURE: &str = "compiled_query";

/// Criterion operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    Equal,
    NotEqual,
    StartsWith,
    In,
    NotIn,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
    Between,
    BetweenInclusive,
    NotBetween,
    GeoLocation,
    Sort,
    Highlight,
    Snippet,
    Facet,
}

impl Operator {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equal => "EQUAL",
            Self::NotEqual => "NOT_EQUAL",
            Self::StartsWith => "STARTS_WITH",
            Self::In => "IN",
            Self::NotIn => "NOT_IN",
            Self::GreaterThan => "GREATER_THAN",
            Self::GreaterThanEqual => "GREATER_THAN_EQUAL",
            Self::LessThan => "LESS_THAN",
            Self::LessThanEqual => "LESS_THAN_EQUAL",
            Self::Between => "BETWEEN",
            Self::BetweenInclusive => "BETWEEN_INCLUSIVE",
            Self::NotBetween => "NOT_BETWEEN",
            Self::GeoLocation => "GEO_LOCATION",
            Self::Sort => "SORT",
            Self::Highlight => "HIGHLIGHT",
            Self::Snippet => "SNIPPET",
            Self::Facet => "FACET",
        }
    }

    /// Operators that shape the result instead of filtering it.
    #[must_use]
    pub fn is_directive(&self) -> bool {
        matches!(self, Self::Sort | Self::Highlight | Self::Snippet | Self::Facet)
    }

    /// Exact number of values required, if fixed.
    #[must_use]
    pub fn fixed_arity(&self) -> Option<usize> {
        match self {
            Self::Between | Self::BetweenInclusive | Self::NotBetween => Some(2),
            Self::GeoLocation => Some(4),
            _ => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boolean connector joining a criterion to everything before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Connector {
    #[default]
    And,
    Or,
}

/// One predicate or directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub field: String,
    pub operator: Operator,
    pub values: Vec<String>,
}

impl Criterion {
    pub fn new<I, S>(field: &str, operator: Operator, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field: field.to_string(),
            operator,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Meta-entries (offset, limit, raw query) are never compiled as predicates.
    #[must_use]
    pub fn is_meta(&self) -> bool {
        self.field.starts_with(RESERVED_PREFIX)
    }
}

/// Ordered criteria plus free-form features.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Criteria {
    entries: Vec<(Connector, Criterion)>,
    #[serde(default)]
    features: BTreeMap<String, String>,
}

impl Criteria {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a criterion joined with AND.
    #[must_use]
    pub fn and<I, S>(mut self, field: &str, operator: Operator, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(Connector::And, Criterion::new(field, operator, values));
        self
    }

    /// Append a criterion joined with OR.
    #[must_use]
    pub fn or<I, S>(mut self, field: &str, operator: Operator, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(Connector::Or, Criterion::new(field, operator, values));
        self
    }

    /// Raw free-text query fragment, emitted ahead of field predicates.
    #[must_use]
    pub fn with_query(mut self, text: &str) -> Self {
        self.push(Connector::And, Criterion::new(META_QUERY, Operator::Equal, [text]));
        self
    }

    #[must_use]
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.push(Connector::And, Criterion::new(META_OFFSET, Operator::Equal, [offset.to_string()]));
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.push(Connector::And, Criterion::new(META_LIMIT, Operator::Equal, [limit.to_string()]));
        self
    }

    pub fn push(&mut self, connector: Connector, criterion: Criterion) {
        self.entries.push((connector, criterion));
    }

    #[must_use]
    pub fn entries(&self) -> &[(Connector, Criterion)] {
        &self.entries
    }

    /// Non-meta entries, predicates and directives alike.
    pub fn predicates(&self) -> impl Iterator<Item = &(Connector, Criterion)> {
        self.entries.iter().filter(|(_, c)| !c.is_meta())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn meta(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(_, c)| c.field == name)
            .and_then(|(_, c)| c.values.first())
            .map(String::as_str)
    }

    fn meta_usize(&self, name: &str) -> DocResult<Option<usize>> {
        self.meta(name)
            .map(|v| {
                v.trim().parse::<usize>().map_err(|_| DocError::Type {
                    field: name.to_string(),
                    value: v.to_string(),
                    expected: "non-negative integer",
                })
            })
            .transpose()
    }

    /// Last free-text fragment, if any.
    #[must_use]
    pub fn free_text(&self) -> Option<&str> {
        self.meta(META_QUERY)
    }

    pub fn offset(&self) -> DocResult<Option<usize>> {
        self.meta_usize(META_OFFSET)
    }

    pub fn limit(&self) -> DocResult<Option<usize>> {
        self.meta_usize(META_LIMIT)
    }

    #[must_use]
    pub fn feature(&self, key: &str) -> Option<&str> {
        self.features.get(key).map(String::as_str)
    }

    pub fn set_feature(&mut self, key: &str, value: &str) {
        self.features.insert(key.to_string(), value.to_string());
    }

    #[must_use]
    pub fn features(&self) -> &BTreeMap<String, String> {
        &self.features
    }

    /// Query string cached by the last compile, for inspection.
    #[must_use]
    pub fn compiled_query(&self) -> Option<&str> {
        self.feature(COMPILED_QUERY_FEATURE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_keeps_order_and_connectors() {
        let c = Criteria::new()
            .and("a", Operator::Equal, ["1"])
            .or("b", Operator::NotEqual, ["2"]);
        let entries = c.entries();
        assert_eq!(entries[0].0, Connector::And);
        assert_eq!(entries[1].0, Connector::Or);
        assert_eq!(entries[1].1.field, "b");
    }

    #[test]
    fn test_meta_entries_excluded_from_predicates() {
        let c = Criteria::new()
            .with_offset(5)
            .and("a", Operator::Equal, ["1"])
            .with_query("hello");
        assert_eq!(c.predicates().count(), 1);
        assert_eq!(c.offset().unwrap(), Some(5));
        assert_eq!(c.limit().unwrap(), None);
    }

    #[test]
    fn test_last_meta_wins() {
        let c = Criteria::new().with_limit(5).with_limit(7);
        assert_eq!(c.limit().unwrap(), Some(7));
    }

    #[test]
    fn test_bad_offset_is_type_error() {
        let mut c = Criteria::new();
        c.push(Connector::And, Criterion::new(META_OFFSET, Operator::Equal, ["-3"]));
        assert!(matches!(c.offset().unwrap_err(), DocError::Type { .. }));
    }

    #[test]
    fn test_operator_serde_names() {
        let json = serde_json::to_string(&Operator::BetweenInclusive).unwrap();
        assert_eq!(json, "\"BETWEEN_INCLUSIVE\"");
        let op: Operator = serde_json::from_str("\"GEO_LOCATION\"").unwrap();
        assert_eq!(op, Operator::GeoLocation);
        assert_eq!(op.fixed_arity(), Some(4));
    }

    #[test]
    fn test_features() {
        let mut c = Criteria::new();
        assert!(c.compiled_query().is_none());
        c.set_feature(COMPILED_QUERY_FEATURE, "*");
        assert_eq!(c.compiled_query(), Some("*"));
    }
}
