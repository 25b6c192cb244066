// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Query Compiler
//!
//! Compiles [`Criteria`] into RediSearch FT.SEARCH syntax, resolving every
//! field against a [`DocumentSchema`] and the field codec's variant naming.
//!
//! # RediSearch Query Syntax
//!
//! ```text
//! @age:[18 30]              - Closed numeric range
//! @age:[(18 (30]            - Open numeric range
//! @age:[(18 +inf]           - Greater than
//! @city_tag:{New\ York}     - Tag equality (escaped)
//! @city_tag:{Par*}          - Tag prefix
//! @name_stem:(Alice Smith)  - Full-text phrase
//! @loc:[2.35 48.85 10 km]   - Geo radius (lon lat radius unit)
//! a b                       - AND (implicit)
//! (a | b)                   - OR
//! -a                        - NOT
//! ```
//!
//! Directives (SORT, HIGHLIGHT, SNIPPET, FACET) produce no predicate text;
//! they shape the surrounding FT.SEARCH / FT.AGGREGATE options instead.

use tracing::{debug, warn};

use super::criteria::{Connector, Criteria, Criterion, Operator, COMPILED_QUERY_FEATURE};
use crate::error::{DocError, DocResult};
use crate::metrics;
use crate::schema::field_codec::{canonical_bool, parse_epoch_millis, FieldCodec, VariantRole};
use crate::schema::{DocumentSchema, LogicalType, SchemaItem};

/// Universal match-all query.
pub const MATCH_ALL: &str = "*";

const GEO_UNITS: [&str; 4] = ["m", "km", "mi", "ft"];

/// Sort directive resolved to a sortable physical variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub alias: String,
    pub ascending: bool,
}

/// Everything one compile pass produces.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompiledQuery {
    pub query: String,
    pub sort: Option<SortSpec>,
    /// Resolved aliases to highlight.
    pub highlight: Vec<String>,
    /// Resolved aliases to summarize.
    pub snippet: Vec<String>,
    /// Logical names of fields requested as facets.
    pub facets: Vec<String>,
}

/// Escape every non-alphanumeric character of a tag value.
#[must_use]
pub fn escape_tag(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() * 2);
    for c in value.chars() {
        if !c.is_alphanumeric() {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Strip single backslashes, inverse of [`escape_tag`].
#[must_use]
pub fn unescape_tag(escaped: &str) -> String {
    let mut value = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                value.push(next);
            }
        } else {
            value.push(c);
        }
    }
    value
}

/// Escape query syntax characters but preserve spaces (for phrase matching).
fn escape_text(value: &str) -> String {
    let mut escaped = String::new();
    for c in value.chars() {
        match c {
            '@' | ':' | '|' | '(' | ')' | '[' | ']' | '{' | '}' | '*' | '%' | '-' | '+' | '"'
            | '~' | '\\' | '$' | '!' => {
                escaped.push('\\');
                escaped.push(c);
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Escape query syntax characters including spaces (for single-term matching).
fn escape_term(value: &str) -> String {
    let mut escaped = String::new();
    for c in value.chars() {
        if c == ' ' {
            escaped.push('\\');
            escaped.push(c);
        } else {
            escaped.push_str(&escape_text(&c.to_string()));
        }
    }
    escaped
}

/// Full-text phrase: single term as-is, several terms parenthesized.
fn phrase(value: &str) -> String {
    let escaped = escape_text(value.trim());
    if escaped.contains(' ') {
        format!("({})", escaped)
    } else {
        escaped
    }
}

fn negate(negated: bool, predicate: String) -> String {
    if negated {
        format!("-{}", predicate)
    } else {
        predicate
    }
}

/// Operators whose value list may be empty (the criterion is then dropped).
fn is_list_operator(op: Operator) -> bool {
    matches!(op, Operator::In | Operator::NotIn)
}

#[derive(Clone, Copy, PartialEq)]
enum Shape {
    Atom,
    And,
}

/// Criteria → RediSearch query compiler.
#[derive(Debug, Clone, Default)]
pub struct QueryCompiler {
    codec: FieldCodec,
}

impl QueryCompiler {
    #[must_use]
    pub fn new(codec: FieldCodec) -> Self {
        Self { codec }
    }

    /// Compile the query string and every directive.
    pub fn compile(&self, criteria: &Criteria, schema: &DocumentSchema) -> DocResult<CompiledQuery> {
        let mut highlight = Vec::new();
        let mut snippet = Vec::new();
        let result = self
            .compile_with_sinks(criteria, schema, &mut highlight, &mut snippet)
            .and_then(|query| {
                let sort = self.compile_sort(criteria, schema)?;
                let facets = self.facet_fields(criteria, schema)?;
                Ok(CompiledQuery {
                    query,
                    sort,
                    highlight,
                    snippet,
                    facets,
                })
            });
        metrics::record_compile("query", result.is_ok());
        result
    }

    /// Compile and cache the query string onto `criteria` for inspection.
    pub fn compile_and_annotate(
        &self,
        criteria: &mut Criteria,
        schema: &DocumentSchema,
    ) -> DocResult<CompiledQuery> {
        let compiled = self.compile(criteria, schema)?;
        criteria.set_feature(COMPILED_QUERY_FEATURE, &compiled.query);
        Ok(compiled)
    }

    /// Compile the query string, pushing HIGHLIGHT/SNIPPET aliases into the sinks.
    pub fn compile_with_sinks(
        &self,
        criteria: &Criteria,
        schema: &DocumentSchema,
        highlight: &mut Vec<String>,
        snippet: &mut Vec<String>,
    ) -> DocResult<String> {
        let mut expr: Option<(String, Shape)> = None;

        for (connector, criterion) in criteria.predicates() {
            let item = schema.require(&criterion.field)?;
            let predicate = match criterion.operator {
                Operator::Highlight | Operator::Snippet => {
                    let alias = self.text_alias(item, criterion.operator)?;
                    let sink = if criterion.operator == Operator::Highlight {
                        &mut *highlight
                    } else {
                        &mut *snippet
                    };
                    if !sink.contains(&alias) {
                        sink.push(alias);
                    }
                    None
                }
                Operator::Sort | Operator::Facet => None,
                _ => self.compile_predicate(criterion, item)?,
            };
            let Some(predicate) = predicate else { continue };

            expr = Some(match (expr, connector) {
                (None, _) => (predicate, Shape::Atom),
                (Some((left, _)), Connector::And) => (format!("{} {}", left, predicate), Shape::And),
                (Some((left, shape)), Connector::Or) => {
                    let left = if shape == Shape::And { format!("({})", left) } else { left };
                    (format!("({} | {})", left, predicate), Shape::Atom)
                }
            });
        }

        let predicates = expr.map(|(s, _)| s);
        let free_text = criteria
            .free_text()
            .map(str::trim)
            .filter(|t| !t.is_empty());

        let query = match (free_text, predicates) {
            (Some(t), Some(p)) if t == MATCH_ALL => p,
            (Some(t), Some(p)) => format!("{} {}", t, p),
            (Some(t), None) => t.to_string(),
            (None, Some(p)) => p,
            (None, None) => MATCH_ALL.to_string(),
        };
        debug!(schema = %schema.name, query = %query, "Compiled query");
        Ok(query)
    }

    /// Resolve the SORT directive. Only one sort key is sent; the last wins.
    pub fn compile_sort(&self, criteria: &Criteria, schema: &DocumentSchema) -> DocResult<Option<SortSpec>> {
        let sorts: Vec<&Criterion> = criteria
            .predicates()
            .map(|(_, c)| c)
            .filter(|c| c.operator == Operator::Sort)
            .collect();
        let Some(last) = sorts.last() else {
            return Ok(None);
        };
        if sorts.len() > 1 {
            let ignored: Vec<&str> = sorts[..sorts.len() - 1].iter().map(|c| c.field.as_str()).collect();
            warn!(used = %last.field, ignored = ?ignored, "Multiple SORT criteria, last one wins");
        }

        let item = schema.require(&last.field)?;
        let ascending = match last.values.first().map(|d| d.trim().to_ascii_uppercase()) {
            None => true,
            Some(d) if d == "ASC" => true,
            Some(d) if d == "DESC" => false,
            Some(_) => {
                return Err(DocError::Type {
                    field: item.name.clone(),
                    value: last.values.join(","),
                    expected: "sort direction (ASC or DESC)",
                })
            }
        };
        let role = match item.logical_type {
            LogicalType::Integer | LogicalType::Long | LogicalType::Float | LogicalType::Double => {
                VariantRole::Numeric
            }
            LogicalType::Date | LogicalType::DateTime => VariantRole::Shadow,
            LogicalType::Text | LogicalType::Boolean => VariantRole::Exact,
            LogicalType::Geo => return Err(unsupported(item, Operator::Sort)),
        };
        let alias = self
            .codec
            .alias_for(item, role)?
            .ok_or_else(|| unsupported(item, Operator::Sort))?;
        Ok(Some(SortSpec { alias, ascending }))
    }

    /// Logical names of FACET fields, in criteria order, deduplicated.
    pub fn facet_fields(&self, criteria: &Criteria, schema: &DocumentSchema) -> DocResult<Vec<String>> {
        let mut facets: Vec<String> = Vec::new();
        for (_, c) in criteria.predicates().filter(|(_, c)| c.operator == Operator::Facet) {
            let item = schema.require(&c.field)?;
            if item.logical_type == LogicalType::Geo {
                return Err(unsupported(item, Operator::Facet));
            }
            if !facets.contains(&item.name) {
                facets.push(item.name.clone());
            }
        }
        Ok(facets)
    }

    /// Compile one filtering criterion. `None` means the criterion is dropped.
    pub fn compile_predicate(&self, criterion: &Criterion, item: &SchemaItem) -> DocResult<Option<String>> {
        let op = criterion.operator;
        let values = &criterion.values;

        if values.is_empty() && is_list_operator(op) {
            debug!(field = %item.name, operator = %op, "Empty value list, criterion dropped");
            return Ok(None);
        }
        check_arity(criterion, item)?;

        let predicate = match item.logical_type {
            LogicalType::Boolean => self.compile_boolean(criterion, item)?,
            LogicalType::Integer | LogicalType::Long | LogicalType::Float | LogicalType::Double => {
                let alias = self.required_alias(item, VariantRole::Numeric, op)?;
                let bounds = values
                    .iter()
                    .map(|v| number_literal(item, v))
                    .collect::<DocResult<Vec<_>>>()?;
                compile_range(&alias, op, &bounds).ok_or_else(|| unsupported(item, op))?
            }
            LogicalType::Date | LogicalType::DateTime => {
                let alias = self.required_alias(item, VariantRole::Shadow, op)?;
                let bounds = values
                    .iter()
                    .map(|v| {
                        parse_epoch_millis(item.logical_type, v)
                            .map(|ms| ms.to_string())
                            .ok_or_else(|| DocError::Type {
                                field: item.name.clone(),
                                value: v.clone(),
                                expected: "date",
                            })
                    })
                    .collect::<DocResult<Vec<_>>>()?;
                compile_range(&alias, op, &bounds).ok_or_else(|| unsupported(item, op))?
            }
            LogicalType::Geo => self.compile_geo(criterion, item)?,
            LogicalType::Text => self.compile_text(criterion, item)?,
        };
        Ok(Some(predicate))
    }

    fn required_alias(&self, item: &SchemaItem, role: VariantRole, op: Operator) -> DocResult<String> {
        self.codec.alias_for(item, role)?.ok_or_else(|| unsupported(item, op))
    }

    fn compile_boolean(&self, criterion: &Criterion, item: &SchemaItem) -> DocResult<String> {
        let negated = match criterion.operator {
            Operator::Equal => false,
            Operator::NotEqual => true,
            op => return Err(unsupported(item, op)),
        };
        let alias = self.required_alias(item, VariantRole::Exact, criterion.operator)?;
        let value = &criterion.values[0];
        let token = canonical_bool(value).ok_or_else(|| DocError::Type {
            field: item.name.clone(),
            value: value.clone(),
            expected: "boolean",
        })?;
        Ok(negate(negated, format!("@{}:{{{}}}", alias, token)))
    }

    fn compile_geo(&self, criterion: &Criterion, item: &SchemaItem) -> DocResult<String> {
        if criterion.operator != Operator::GeoLocation {
            return Err(unsupported(item, criterion.operator));
        }
        let alias = self.required_alias(item, VariantRole::Geo, criterion.operator)?;
        let v = &criterion.values;
        let number = |value: &String| -> DocResult<String> {
            let trimmed = value.trim();
            trimmed
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(|_| trimmed.to_string())
                .ok_or_else(|| DocError::Type {
                    field: item.name.clone(),
                    value: value.clone(),
                    expected: "number",
                })
        };
        let (lat, lon, radius) = (number(&v[0])?, number(&v[1])?, number(&v[2])?);
        let unit = v[3].trim().to_ascii_lowercase();
        if !GEO_UNITS.contains(&unit.as_str()) {
            return Err(DocError::Type {
                field: item.name.clone(),
                value: v[3].clone(),
                expected: "distance unit (m, km, mi, ft)",
            });
        }
        Ok(format!("@{}:[{} {} {} {}]", alias, lon, lat, radius, unit))
    }

    fn compile_text(&self, criterion: &Criterion, item: &SchemaItem) -> DocResult<String> {
        let op = criterion.operator;
        let values = &criterion.values;
        if op == Operator::GeoLocation {
            return Err(unsupported(item, op));
        }
        if values.iter().any(|v| v.trim().is_empty()) {
            return Err(DocError::Type {
                field: item.name.clone(),
                value: String::new(),
                expected: "non-empty text",
            });
        }

        if item.matches_as_tag() {
            let alias = self.required_alias(item, VariantRole::Exact, op)?;
            let group = |vals: &[String]| vals.iter().map(|v| escape_tag(v)).collect::<Vec<_>>().join("|");
            return match op {
                Operator::Equal => Ok(format!("@{}:{{{}}}", alias, escape_tag(&values[0]))),
                Operator::NotEqual => Ok(format!("-@{}:{{{}}}", alias, escape_tag(&values[0]))),
                Operator::In => Ok(format!("@{}:{{{}}}", alias, group(values))),
                Operator::NotIn => Ok(format!("-@{}:{{{}}}", alias, group(values))),
                Operator::StartsWith => Ok(format!("@{}:{{{}*}}", alias, escape_tag(&values[0]))),
                _ => Err(unsupported(item, op)),
            };
        }

        let role = if item.is_stemmed { VariantRole::Stemmed } else { VariantRole::Plain };
        let alias = self.required_alias(item, role, op)?;
        let group = |vals: &[String]| vals.iter().map(|v| phrase(v)).collect::<Vec<_>>().join("|");
        match op {
            Operator::Equal => Ok(format!("@{}:{}", alias, phrase(&values[0]))),
            Operator::NotEqual => Ok(format!("-@{}:{}", alias, phrase(&values[0]))),
            Operator::In => Ok(format!("@{}:({})", alias, group(values))),
            Operator::NotIn => Ok(format!("-@{}:({})", alias, group(values))),
            Operator::StartsWith => Ok(format!("@{}:{}*", alias, escape_term(values[0].trim()))),
            _ => Err(unsupported(item, op)),
        }
    }

    /// Alias a HIGHLIGHT/SNIPPET directive resolves to.
    fn text_alias(&self, item: &SchemaItem, op: Operator) -> DocResult<String> {
        if item.logical_type != LogicalType::Text {
            return Err(unsupported(item, op));
        }
        let role = if item.is_stemmed { VariantRole::Stemmed } else { VariantRole::Plain };
        self.required_alias(item, role, op)
    }
}

fn unsupported(item: &SchemaItem, op: Operator) -> DocError {
    DocError::UnsupportedOperator {
        field: item.name.clone(),
        operator: op.to_string(),
    }
}

fn check_arity(criterion: &Criterion, item: &SchemaItem) -> DocResult<()> {
    let op = criterion.operator;
    let actual = criterion.values.len();
    let (ok, expected) = match op.fixed_arity() {
        Some(2) => (actual == 2, "exactly 2"),
        Some(_) => (actual == 4, "exactly 4"),
        None if is_list_operator(op) => (actual >= 1, "at least 1"),
        None => (actual == 1, "exactly 1"),
    };
    if ok {
        Ok(())
    } else {
        Err(DocError::Arity {
            field: item.name.clone(),
            operator: op.to_string(),
            expected,
            actual,
        })
    }
}

fn number_literal(item: &SchemaItem, value: &str) -> DocResult<String> {
    let trimmed = value.trim();
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(trimmed.to_string()),
        _ => Err(DocError::Type {
            field: item.name.clone(),
            value: value.to_string(),
            expected: "number",
        }),
    }
}

/// Range-bracket syntax shared by numeric and date fields.
fn compile_range(alias: &str, op: Operator, v: &[String]) -> Option<String> {
    let range = |lo: &str, hi: &str| format!("@{}:[{} {}]", alias, lo, hi);
    let point = |x: &str| range(x, x);
    let predicate = match op {
        Operator::Equal => point(&v[0]),
        Operator::NotEqual => format!("-{}", point(&v[0])),
        Operator::GreaterThan => range(&format!("({}", v[0]), "+inf"),
        Operator::GreaterThanEqual => range(&v[0], "+inf"),
        Operator::LessThan => range("-inf", &format!("({}", v[0])),
        Operator::LessThanEqual => range("-inf", &v[0]),
        Operator::Between => range(&format!("({}", v[0]), &format!("({}", v[1])),
        Operator::BetweenInclusive => range(&v[0], &v[1]),
        Operator::NotBetween => format!("-{}", range(&v[0], &v[1])),
        Operator::In => {
            let points: Vec<String> = v.iter().map(|x| point(x)).collect();
            if points.len() == 1 {
                points.into_iter().next()?
            } else {
                format!("({})", points.join(" | "))
            }
        }
        Operator::NotIn => v.iter().map(|x| format!("-{}", point(x))).collect::<Vec<_>>().join(" "),
        _ => return None,
    };
    Some(predicate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaItem;

    fn schema() -> DocumentSchema {
        DocumentSchema::from_items(
            "people",
            vec![
                SchemaItem::new("id", LogicalType::Integer).primary(),
                SchemaItem::new("age", LogicalType::Integer),
                SchemaItem::new("name", LogicalType::Text).stemmed(),
                SchemaItem::new("bio", LogicalType::Text),
                SchemaItem::new("city", LogicalType::Text).facet(),
                SchemaItem::new("code", LogicalType::Text).tag(),
                SchemaItem::new("born", LogicalType::Date),
                SchemaItem::new("active", LogicalType::Boolean),
                SchemaItem::new("loc", LogicalType::Geo),
                SchemaItem::new("secret", LogicalType::Text).secret(),
            ],
        )
        .unwrap()
    }

    fn q(criteria: Criteria) -> String {
        QueryCompiler::default().compile(&criteria, &schema()).unwrap().query
    }

    fn err(criteria: Criteria) -> DocError {
        QueryCompiler::default().compile(&criteria, &schema()).unwrap_err()
    }

    #[test]
    fn test_empty_criteria_is_match_all() {
        assert_eq!(q(Criteria::new()), "*");
    }

    #[test]
    fn test_number_operators() {
        assert_eq!(q(Criteria::new().and("age", Operator::Equal, ["5"])), "@age:[5 5]");
        assert_eq!(q(Criteria::new().and("age", Operator::NotEqual, ["5"])), "-@age:[5 5]");
        assert_eq!(q(Criteria::new().and("age", Operator::GreaterThan, ["5"])), "@age:[(5 +inf]");
        assert_eq!(q(Criteria::new().and("age", Operator::GreaterThanEqual, ["5"])), "@age:[5 +inf]");
        assert_eq!(q(Criteria::new().and("age", Operator::LessThan, ["5"])), "@age:[-inf (5]");
        assert_eq!(q(Criteria::new().and("age", Operator::LessThanEqual, ["5"])), "@age:[-inf 5]");
        assert_eq!(q(Criteria::new().and("age", Operator::Between, ["10", "20"])), "@age:[(10 (20]");
        assert_eq!(
            q(Criteria::new().and("age", Operator::BetweenInclusive, ["10", "20"])),
            "@age:[10 20]"
        );
        assert_eq!(q(Criteria::new().and("age", Operator::NotBetween, ["10", "20"])), "-@age:[10 20]");
        assert_eq!(
            q(Criteria::new().and("age", Operator::In, ["1", "2"])),
            "(@age:[1 1] | @age:[2 2])"
        );
    }

    #[test]
    fn test_number_type_error() {
        assert!(matches!(
            err(Criteria::new().and("age", Operator::Equal, ["ten"])),
            DocError::Type { expected: "number", .. }
        ));
    }

    #[test]
    fn test_between_arity() {
        let e = err(Criteria::new().and("age", Operator::Between, ["10"]));
        assert!(matches!(e, DocError::Arity { actual: 1, expected: "exactly 2", .. }));
    }

    #[test]
    fn test_date_targets_shadow() {
        assert_eq!(
            q(Criteria::new().and("born", Operator::GreaterThanEqual, ["1970-01-02"])),
            "@born_epoch:[86400000 +inf]"
        );
        assert!(matches!(
            err(Criteria::new().and("born", Operator::Equal, ["someday"])),
            DocError::Type { expected: "date", .. }
        ));
    }

    #[test]
    fn test_boolean() {
        assert_eq!(q(Criteria::new().and("active", Operator::Equal, ["yes"])), "@active:{true}");
        assert_eq!(q(Criteria::new().and("active", Operator::NotEqual, ["true"])), "-@active:{true}");
        assert!(matches!(
            err(Criteria::new().and("active", Operator::GreaterThan, ["1"])),
            DocError::UnsupportedOperator { .. }
        ));
    }

    #[test]
    fn test_tag_field_escaping() {
        assert_eq!(
            q(Criteria::new().and("code", Operator::Equal, ["a-b,c"])),
            r"@code_tag:{a\-b\,c}"
        );
        assert_eq!(
            q(Criteria::new().and("city", Operator::In, ["New York", "Rome"])),
            r"@city_tag:{New\ York|Rome}"
        );
        assert_eq!(
            q(Criteria::new().and("city", Operator::NotIn, ["Rome"])),
            r"-@city_tag:{Rome}"
        );
        assert_eq!(q(Criteria::new().and("city", Operator::StartsWith, ["Par"])), "@city_tag:{Par*}");
    }

    #[test]
    fn test_text_stemmed_and_plain() {
        assert_eq!(q(Criteria::new().and("name", Operator::Equal, ["Alice"])), "@name_stem:Alice");
        assert_eq!(
            q(Criteria::new().and("bio", Operator::Equal, ["likes rust"])),
            "@bio:(likes rust)"
        );
        assert_eq!(q(Criteria::new().and("bio", Operator::StartsWith, ["ru"])), "@bio:ru*");
        assert_eq!(
            q(Criteria::new().and("bio", Operator::Equal, ["user@example.com"])),
            r"@bio:user\@example.com"
        );
    }

    #[test]
    fn test_empty_in_is_dropped() {
        let empty: [&str; 0] = [];
        assert_eq!(q(Criteria::new().and("city", Operator::In, empty)), "*");
        assert_eq!(
            q(Criteria::new()
                .and("age", Operator::Equal, ["1"])
                .and("city", Operator::NotIn, empty)),
            "@age:[1 1]"
        );
    }

    #[test]
    fn test_geo_longitude_first() {
        assert_eq!(
            q(Criteria::new().and("loc", Operator::GeoLocation, ["48.85", "2.35", "10", "km"])),
            "@loc:[2.35 48.85 10 km]"
        );
        let e = err(Criteria::new().and("loc", Operator::GeoLocation, ["48.85", "2.35", "10"]));
        assert!(matches!(e, DocError::Arity { expected: "exactly 4", .. }));
        let e = err(Criteria::new().and("loc", Operator::GeoLocation, ["48.85", "2.35", "10", "parsec"]));
        assert!(matches!(e, DocError::Type { .. }));
    }

    #[test]
    fn test_connectors() {
        let c = Criteria::new()
            .and("age", Operator::Equal, ["1"])
            .and("age", Operator::Equal, ["2"])
            .or("age", Operator::Equal, ["3"]);
        assert_eq!(q(c), "((@age:[1 1] @age:[2 2]) | @age:[3 3])");

        let c = Criteria::new()
            .and("age", Operator::Equal, ["1"])
            .or("age", Operator::Equal, ["2"])
            .and("active", Operator::Equal, ["true"]);
        assert_eq!(q(c), "(@age:[1 1] | @age:[2 2]) @active:{true}");
    }

    #[test]
    fn test_free_text_placement() {
        assert_eq!(q(Criteria::new().with_query("*").and("age", Operator::Equal, ["1"])), "@age:[1 1]");
        assert_eq!(
            q(Criteria::new().with_query("rust").and("age", Operator::Equal, ["1"])),
            "rust @age:[1 1]"
        );
        assert_eq!(q(Criteria::new().with_query("rust")), "rust");
        assert_eq!(q(Criteria::new().with_query("*")), "*");
    }

    #[test]
    fn test_unknown_field() {
        assert!(matches!(
            err(Criteria::new().and("nope", Operator::Equal, ["1"])),
            DocError::UnknownField(ref f) if f == "nope"
        ));
    }

    #[test]
    fn test_secret_field_cannot_be_queried() {
        assert!(matches!(
            err(Criteria::new().and("secret", Operator::Equal, ["x"])),
            DocError::Schema { .. }
        ));
    }

    #[test]
    fn test_directives() {
        let c = Criteria::new()
            .and("name", Operator::Highlight, Vec::<String>::new())
            .and("bio", Operator::Snippet, Vec::<String>::new())
            .and("city", Operator::Facet, Vec::<String>::new())
            .and("age", Operator::Sort, ["DESC"]);
        let compiled = QueryCompiler::default().compile(&c, &schema()).unwrap();
        assert_eq!(compiled.query, "*");
        assert_eq!(compiled.highlight, vec!["name_stem"]);
        assert_eq!(compiled.snippet, vec!["bio"]);
        assert_eq!(compiled.facets, vec!["city"]);
        assert_eq!(compiled.sort, Some(SortSpec { alias: "age".into(), ascending: false }));
    }

    #[test]
    fn test_sort_last_wins_and_resolves_variant() {
        let c = Criteria::new()
            .and("age", Operator::Sort, ["ASC"])
            .and("born", Operator::Sort, ["DESC"]);
        let sort = QueryCompiler::default().compile_sort(&c, &schema()).unwrap().unwrap();
        assert_eq!(sort, SortSpec { alias: "born_epoch".into(), ascending: false });

        let c = Criteria::new().and("city", Operator::Sort, Vec::<String>::new());
        let sort = QueryCompiler::default().compile_sort(&c, &schema()).unwrap().unwrap();
        assert_eq!(sort, SortSpec { alias: "city_tag".into(), ascending: true });
    }

    #[test]
    fn test_annotate_recomputes() {
        let compiler = QueryCompiler::default();
        let mut c = Criteria::new().and("age", Operator::Equal, ["1"]);
        compiler.compile_and_annotate(&mut c, &schema()).unwrap();
        assert_eq!(c.compiled_query(), Some("@age:[1 1]"));
        let mut c2 = c.clone().and("age", Operator::Equal, ["2"]);
        compiler.compile_and_annotate(&mut c2, &schema()).unwrap();
        assert_eq!(c2.compiled_query(), Some("@age:[1 1] @age:[2 2]"));
    }

    #[test]
    fn test_tag_escape_round_trip() {
        let value = "a-b,c d_é!";
        assert_eq!(unescape_tag(&escape_tag(value)), value);
    }
}
