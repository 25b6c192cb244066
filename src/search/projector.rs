// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Result Projector
//!
//! Turns raw rows (hash field maps, JSON documents, FT.SEARCH hits) back into
//! [`LogicalDocument`]s:
//!
//! - unknown attributes are skipped
//! - shadow attributes are dropped when their owner exists, surfaced otherwise
//! - hidden items are left out
//! - multi-value attributes are split back into values
//!
//! Fields come out in schema order, whatever order the store returned them in.

use serde_json::Value;

use crate::document::{FieldValue, LogicalDocument};
use crate::error::{DocError, DocResult};
use crate::schema::field_codec::{Decoded, FieldCodec};
use crate::schema::{DocumentSchema, LogicalType};
use crate::storage::command::SearchHit;
use crate::storage::Backend;

/// Attribute FT.SEARCH returns whole JSON documents under.
const JSON_ROOT: &str = "$";

/// Read-side value transform, called with `(attribute, value)`.
pub type ReadTransform<'a> = dyn Fn(&str, &str) -> String + 'a;

/// The backend's read transform, applied to text attributes of `schema` only.
///
/// Numbers, date shadows and child links are stored untransformed so the
/// index can read them.
pub fn text_transform<'a>(backend: &'a Backend, schema: &'a DocumentSchema) -> impl Fn(&str, &str) -> String + 'a {
    move |attribute: &str, value: &str| {
        if schema.stores_text(attribute) {
            backend.after_read(value)
        } else {
            value.to_string()
        }
    }
}

/// One raw attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// Hash field (multi-values joined by the item's separator).
    Flat(String),
    /// JSON array.
    List(Vec<String>),
}

/// A row as read from the store, text values already passed through the
/// read-side transform.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    pub key: Option<String>,
    pub entries: Vec<(String, RawValue)>,
}

impl RawRow {
    /// From hash field/value pairs. `transform` receives `(attribute, value)`.
    pub fn from_pairs(key: Option<String>, pairs: Vec<(String, String)>, transform: &ReadTransform<'_>) -> Self {
        Self {
            key,
            entries: pairs
                .into_iter()
                .map(|(name, value)| {
                    let value = transform(&name, &value);
                    (name, RawValue::Flat(value))
                })
                .collect(),
        }
    }

    /// From a JSON document; strings are transformed, numbers and booleans are not.
    pub fn from_json(key: Option<String>, json: &str, transform: &ReadTransform<'_>) -> DocResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        // JSON.GET with a path returns an array of matches.
        let object = match value {
            Value::Array(mut matches) if matches.len() == 1 => matches.remove(0),
            other => other,
        };
        let Value::Object(map) = object else {
            return Err(DocError::Serialization(format!(
                "row {} is not a JSON object",
                key.as_deref().unwrap_or("?")
            )));
        };

        let scalar = |name: &str, v: &Value| -> Option<String> {
            match v {
                Value::String(s) => Some(transform(name, s)),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                Value::Null => None,
                other => Some(other.to_string()),
            }
        };
        let entries = map
            .iter()
            .filter_map(|(name, v)| match v {
                Value::Array(items) => Some((
                    name.clone(),
                    RawValue::List(items.iter().filter_map(|item| scalar(name.as_str(), item)).collect()),
                )),
                other => scalar(name.as_str(), other).map(|s| (name.clone(), RawValue::Flat(s))),
            })
            .collect();
        Ok(Self { key, entries })
    }

    /// From an FT.SEARCH hit of either storage kind.
    pub fn from_hit(hit: &SearchHit, transform: &ReadTransform<'_>) -> DocResult<Self> {
        let key = Some(hit.key.clone());
        if let Some((_, json)) = hit.fields.iter().find(|(name, _)| name == JSON_ROOT) {
            return Self::from_json(key, json, transform);
        }
        Ok(Self::from_pairs(key, hit.fields.clone(), transform))
    }

    /// Remove and return an attribute.
    pub fn take(&mut self, attribute: &str) -> Option<RawValue> {
        let pos = self.entries.iter().position(|(name, _)| name == attribute)?;
        Some(self.entries.remove(pos).1)
    }
}

/// Raw rows → logical documents.
#[derive(Debug, Clone, Default)]
pub struct ResultProjector {
    codec: FieldCodec,
}

impl ResultProjector {
    #[must_use]
    pub fn new(codec: FieldCodec) -> Self {
        Self { codec }
    }

    #[must_use]
    pub fn project(&self, schema: &DocumentSchema, row: RawRow) -> LogicalDocument {
        let mut known: Vec<(usize, String, FieldValue)> = Vec::new();
        let mut orphans: Vec<(String, FieldValue)> = Vec::new();

        for (attribute, raw) in row.entries {
            let flat = match &raw {
                RawValue::Flat(s) => s.clone(),
                RawValue::List(items) => items.first().cloned().unwrap_or_default(),
            };
            match self.codec.decode(schema, &attribute, &flat) {
                Decoded::Field { name, logical_type, values } => {
                    let Some(position) = schema.items().iter().position(|i| i.name == name) else {
                        continue;
                    };
                    if !schema.items()[position].is_visible {
                        continue;
                    }
                    let values = match raw {
                        RawValue::List(items) => items,
                        RawValue::Flat(_) => values,
                    };
                    known.push((position, name, FieldValue::new(values, logical_type)));
                }
                Decoded::Shadow { owner, epoch_ms } => {
                    if schema.item(&owner).is_none() {
                        orphans.push((attribute, FieldValue::new(vec![epoch_ms], LogicalType::Long)));
                    }
                }
                Decoded::Unknown => {}
            }
        }

        known.sort_by_key(|(position, _, _)| *position);
        let mut doc = LogicalDocument::new();
        doc.key = row.key;
        for (_, name, value) in known {
            doc.set_field(&name, value);
        }
        for (name, value) in orphans {
            doc.set_field(&name, value);
        }
        doc
    }
}
