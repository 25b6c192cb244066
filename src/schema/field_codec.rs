// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Field codec: logical fields ↔ physical field variants.
//!
//! Each logical field is indexed as one or more physical variants, each
//! suited to a different match mode:
//!
//! | Logical type | Variants (alias → kind) |
//! |---|---|
//! | Text | `n_tag` TAG SORTABLE, `n` TEXT NOSTEM, `n_stem` TEXT WEIGHT w, `n_phonetic` TEXT PHONETIC (if phonetic) |
//! | Geo | `n` GEO |
//! | Integer/Long/Float/Double | `n` NUMERIC SORTABLE |
//! | Date/DateTime | `n_epoch` NUMERIC SORTABLE (shadow), `n` TAG |
//! | Boolean | `n` TAG SORTABLE |
//!
//! Date values are written twice: the literal under the field's own
//! attribute and the epoch milliseconds under the shadow attribute
//! `n_epoch`. A literal that does not parse is logged and written without
//! its shadow.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Number, Value};
use tracing::warn;

use super::{DocumentSchema, LogicalType, SchemaItem, DEFAULT_PHONETIC_MATCHER};
use crate::error::{DocError, DocResult};

/// Suffix of the shadow attribute holding a date's epoch milliseconds.
pub const SHADOW_SUFFIX: &str = "_epoch";

const TAG_SUFFIX: &str = "_tag";
const STEM_SUFFIX: &str = "_stem";
const PHONETIC_SUFFIX: &str = "_phonetic";

pub const TRUE_TOKEN: &str = "true";
pub const FALSE_TOKEN: &str = "false";

#[must_use]
pub fn shadow_name(name: &str) -> String {
    format!("{}{}", name, SHADOW_SUFFIX)
}

#[must_use]
pub fn tag_alias(name: &str) -> String {
    format!("{}{}", name, TAG_SUFFIX)
}

#[must_use]
pub fn stem_alias(name: &str) -> String {
    format!("{}{}", name, STEM_SUFFIX)
}

#[must_use]
pub fn phonetic_alias(name: &str) -> String {
    format!("{}{}", name, PHONETIC_SUFFIX)
}

/// What a physical variant is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantRole {
    /// Exact/tag matching (equality, IN, prefix, facets, text sort).
    Exact,
    /// Full-text without stemming.
    Plain,
    /// Full-text with stemming and weight.
    Stemmed,
    Phonetic,
    Numeric,
    /// Numeric epoch re-encoding of a date.
    Shadow,
    Geo,
}

/// Index options of a full-text variant.
#[derive(Debug, Clone, PartialEq)]
pub struct TextOptions {
    pub stemmed: bool,
    pub weight: f64,
    /// Engine matcher code, e.g. `dm:en`.
    pub phonetic: Option<String>,
    pub no_index: bool,
    pub suffix_trie: bool,
}

/// Engine field type of a variant.
#[derive(Debug, Clone, PartialEq)]
pub enum VariantKind {
    Tag { separator: char },
    Text(TextOptions),
    Numeric,
    Geo,
}

/// One physical encoding of a logical field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldVariant {
    /// Name the index knows this variant by.
    pub alias: String,
    /// Stored attribute the variant reads.
    pub attribute: String,
    pub role: VariantRole,
    pub kind: VariantKind,
    pub sortable: bool,
    /// Attribute holds several values (JSON arrays are indexed element-wise).
    pub multi_value: bool,
}

/// Wire form of one stored attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    Scalar(String),
    /// Canonical number text; stored as a JSON number in document rows.
    Number(String),
    Multi { values: Vec<String>, separator: char },
}

impl WireValue {
    /// Flat hash representation.
    #[must_use]
    pub fn to_hash_string(&self) -> String {
        match self {
            Self::Scalar(s) | Self::Number(s) => s.clone(),
            Self::Multi { values, separator } => values.join(&separator.to_string()),
        }
    }

    /// JSON document representation, with `transform` applied to strings.
    pub fn to_json(&self, transform: impl Fn(&str) -> String) -> Value {
        match self {
            Self::Scalar(s) => Value::String(transform(s)),
            Self::Number(s) => s
                .parse::<i64>()
                .map(Number::from)
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(Number::from_f64))
                .map_or_else(|| Value::String(s.clone()), Value::Number),
            Self::Multi { values, .. } => {
                Value::Array(values.iter().map(|v| Value::String(transform(v))).collect())
            }
        }
    }
}

/// One attribute produced by [`FieldCodec::encode`].
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedValue {
    pub attribute: String,
    pub value: WireValue,
}

/// Result of decoding one stored attribute against a schema.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Field { name: String, logical_type: LogicalType, values: Vec<String> },
    Shadow { owner: String, epoch_ms: String },
    Unknown,
}

/// Map a phonetic matcher name to the engine's matcher code.
pub fn phonetic_code(field: &str, matcher: &str) -> DocResult<&'static str> {
    match matcher.to_ascii_lowercase().as_str() {
        "english" | "en" | "dm:en" => Ok("dm:en"),
        "french" | "fr" | "dm:fr" => Ok("dm:fr"),
        "portuguese" | "pt" | "dm:pt" => Ok("dm:pt"),
        "spanish" | "es" | "dm:es" => Ok("dm:es"),
        _ => Err(DocError::schema(field, format!("unsupported phonetic matcher '{}'", matcher))),
    }
}

/// Parse a date literal into epoch milliseconds (UTC).
///
/// `Date` accepts `%Y-%m-%d`; `DateTime` accepts RFC 3339,
/// `%Y-%m-%d %H:%M:%S` and `%Y-%m-%dT%H:%M:%S`.
#[must_use]
pub fn parse_epoch_millis(logical_type: LogicalType, literal: &str) -> Option<i64> {
    let literal = literal.trim();
    if logical_type == LogicalType::Date {
        return NaiveDate::parse_from_str(literal, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc().timestamp_millis());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(literal) {
        return Some(dt.timestamp_millis());
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(literal, fmt).ok())
        .map(|dt| dt.and_utc().timestamp_millis())
}

/// Canonical boolean token, if `value` is a recognized boolean literal.
#[must_use]
pub fn canonical_bool(value: &str) -> Option<&'static str> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "on" => Some(TRUE_TOKEN),
        "false" | "0" | "no" | "n" | "off" => Some(FALSE_TOKEN),
        _ => None,
    }
}

/// Validate a numeric literal for `item`, returning its trimmed text.
pub fn canonical_number(item: &SchemaItem, value: &str) -> DocResult<String> {
    let trimmed = value.trim();
    let ok = if item.logical_type.is_integral() {
        trimmed.parse::<i64>().is_ok()
    } else {
        trimmed.parse::<f64>().is_ok_and(f64::is_finite)
    };
    if ok {
        Ok(trimmed.to_string())
    } else {
        Err(DocError::Type {
            field: item.name.clone(),
            value: value.to_string(),
            expected: if item.logical_type.is_integral() { "integer" } else { "number" },
        })
    }
}

/// Per-type variant naming and value conversion.
#[derive(Debug, Clone)]
pub struct FieldCodec {
    default_weight: f64,
}

impl Default for FieldCodec {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl FieldCodec {
    #[must_use]
    pub fn new(default_weight: f64) -> Self {
        Self { default_weight }
    }

    /// Physical variants of `item`. Pure in the item's type and flags.
    ///
    /// Fails for secret items: their stored values are transformed, so
    /// nothing about them can be indexed.
    pub fn variants_for(&self, item: &SchemaItem) -> DocResult<Vec<FieldVariant>> {
        if item.is_secret {
            return Err(DocError::schema(&item.name, "secret fields cannot be indexed"));
        }
        let name = &item.name;
        let multi_value = item.is_multi_value;
        let variant = |alias: String, attribute: String, role, kind, sortable| FieldVariant {
            alias,
            attribute,
            role,
            kind,
            sortable,
            multi_value,
        };

        let variants = match item.logical_type {
            LogicalType::Text => {
                let text = |stemmed: bool, weight: f64, phonetic: Option<String>, suffix_trie: bool| {
                    VariantKind::Text(TextOptions {
                        stemmed,
                        weight,
                        phonetic,
                        no_index: !item.is_searchable,
                        suffix_trie,
                    })
                };
                let mut v = vec![
                    variant(
                        tag_alias(name),
                        name.clone(),
                        VariantRole::Exact,
                        VariantKind::Tag { separator: item.separator() },
                        true,
                    ),
                    variant(
                        name.clone(),
                        name.clone(),
                        VariantRole::Plain,
                        text(false, 1.0, None, item.is_suggestable),
                        false,
                    ),
                    variant(
                        stem_alias(name),
                        name.clone(),
                        VariantRole::Stemmed,
                        text(true, item.weight.unwrap_or(self.default_weight), None, false),
                        false,
                    ),
                ];
                if item.is_phonetic {
                    let matcher = item.phonetic_matcher.as_deref().unwrap_or(DEFAULT_PHONETIC_MATCHER);
                    let code = phonetic_code(name, matcher)?;
                    v.push(variant(
                        phonetic_alias(name),
                        name.clone(),
                        VariantRole::Phonetic,
                        text(false, 1.0, Some(code.to_string()), false),
                        false,
                    ));
                }
                v
            }
            LogicalType::Geo => vec![variant(
                name.clone(),
                name.clone(),
                VariantRole::Geo,
                VariantKind::Geo,
                false,
            )],
            LogicalType::Integer | LogicalType::Long | LogicalType::Float | LogicalType::Double => {
                vec![variant(
                    name.clone(),
                    name.clone(),
                    VariantRole::Numeric,
                    VariantKind::Numeric,
                    true,
                )]
            }
            LogicalType::Date | LogicalType::DateTime => vec![
                FieldVariant {
                    multi_value: false,
                    ..variant(
                        shadow_name(name),
                        shadow_name(name),
                        VariantRole::Shadow,
                        VariantKind::Numeric,
                        true,
                    )
                },
                variant(
                    name.clone(),
                    name.clone(),
                    VariantRole::Exact,
                    VariantKind::Tag { separator: item.separator() },
                    false,
                ),
            ],
            LogicalType::Boolean => vec![variant(
                name.clone(),
                name.clone(),
                VariantRole::Exact,
                VariantKind::Tag { separator: item.separator() },
                true,
            )],
        };
        Ok(variants)
    }

    /// Alias of the variant playing `role` for `item`, if it has one.
    pub fn alias_for(&self, item: &SchemaItem, role: VariantRole) -> DocResult<Option<String>> {
        Ok(self
            .variants_for(item)?
            .into_iter()
            .find(|v| v.role == role)
            .map(|v| v.alias))
    }

    /// Stored attributes for `values` of `item`, shadow included.
    ///
    /// Numbers and booleans are validated and a number takes exactly one
    /// value; a date literal that does not parse is written without its shadow.
    pub fn encode(&self, item: &SchemaItem, values: &[String]) -> DocResult<Vec<EncodedValue>> {
        if values.is_empty() {
            return Ok(Vec::new());
        }
        let own = |value: WireValue| EncodedValue {
            attribute: item.name.clone(),
            value,
        };
        let collect = |values: Vec<String>| {
            if item.is_multi_value {
                WireValue::Multi { values, separator: item.separator() }
            } else {
                WireValue::Scalar(values.join(" "))
            }
        };

        let encoded = match item.logical_type {
            LogicalType::Text | LogicalType::Geo => vec![own(collect(values.to_vec()))],
            LogicalType::Integer | LogicalType::Long | LogicalType::Float | LogicalType::Double => {
                if values.len() > 1 {
                    return Err(DocError::Arity {
                        field: item.name.clone(),
                        operator: "write".to_string(),
                        expected: "exactly 1",
                        actual: values.len(),
                    });
                }
                vec![own(WireValue::Number(canonical_number(item, &values[0])?))]
            }
            LogicalType::Boolean => {
                let tokens = values
                    .iter()
                    .map(|v| {
                        canonical_bool(v).map(str::to_string).ok_or_else(|| DocError::Type {
                            field: item.name.clone(),
                            value: v.clone(),
                            expected: "boolean",
                        })
                    })
                    .collect::<DocResult<Vec<_>>>()?;
                vec![own(collect(tokens))]
            }
            LogicalType::Date | LogicalType::DateTime => {
                let mut out = vec![own(collect(values.to_vec()))];
                match parse_epoch_millis(item.logical_type, &values[0]) {
                    Some(epoch) => out.push(EncodedValue {
                        attribute: shadow_name(&item.name),
                        value: WireValue::Number(epoch.to_string()),
                    }),
                    None => warn!(
                        field = %item.name,
                        value = %values[0],
                        "Unparsable date literal, shadow field omitted"
                    ),
                }
                out
            }
        };
        Ok(encoded)
    }

    /// Identify a stored attribute and split its raw value back into values.
    #[must_use]
    pub fn decode(&self, schema: &DocumentSchema, attribute: &str, raw: &str) -> Decoded {
        if let Some(item) = schema.item(attribute) {
            let values = if item.is_multi_value {
                raw.split(item.separator())
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
                    .collect()
            } else {
                vec![raw.to_string()]
            };
            return Decoded::Field {
                name: item.name.clone(),
                logical_type: item.logical_type,
                values,
            };
        }
        if let Some(owner) = attribute.strip_suffix(SHADOW_SUFFIX) {
            return Decoded::Shadow {
                owner: owner.to_string(),
                epoch_ms: raw.to_string(),
            };
        }
        Decoded::Unknown
    }
}
