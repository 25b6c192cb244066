// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Physical row records.
//!
//! A row is either a flat hash (one field per stored attribute, multi-values
//! joined by the item separator) or a JSON document (arrays for multi-values,
//! numbers as JSON numbers). Child links live under the reserved
//! `_children` attribute in both encodings.
//!
//! Text values pass through the backend's [`ValueTransform`] on the way in
//! and out. Numbers, date shadows and child links are stored as-is so the
//! index can range over them and links resolve.
//!
//! [`ValueTransform`]: crate::storage::ValueTransform

use serde_json::{Map, Value};

use crate::document::LogicalDocument;
use crate::error::DocResult;
use crate::schema::field_codec::{EncodedValue, FieldCodec, WireValue};
use crate::schema::{DocumentSchema, CHILDREN_ATTRIBUTE};
use crate::search::projector::{text_transform, RawRow, RawValue};
use crate::search::StorageKind;
use crate::storage::{Backend, Command, Reply};

const CHILD_SEPARATOR: char = ',';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowStore {
    kind: StorageKind,
}

impl RowStore {
    #[must_use]
    pub fn new(kind: StorageKind) -> Self {
        Self { kind }
    }

    #[must_use]
    pub fn kind(&self) -> StorageKind {
        self.kind
    }

    /// Stored attributes of the document's own fields; children are not included.
    pub fn encode(&self, codec: &FieldCodec, schema: &DocumentSchema, doc: &LogicalDocument) -> DocResult<Vec<EncodedValue>> {
        let mut encoded = Vec::new();
        for (name, value) in doc.fields() {
            let item = schema.require(name)?;
            encoded.extend(codec.encode(item, &value.values)?);
        }
        Ok(encoded)
    }

    /// Command writing one record. Hash writes upsert field by field; callers
    /// replacing a record delete it first in the same batch.
    #[must_use]
    pub fn write(&self, backend: &Backend, key: &str, encoded: &[EncodedValue], children: &[String]) -> Command {
        match self.kind {
            StorageKind::Hash => {
                let mut fields: Vec<(String, String)> = encoded
                    .iter()
                    .map(|e| {
                        let value = match &e.value {
                            WireValue::Number(n) => n.clone(),
                            text => backend.before_write(&text.to_hash_string()),
                        };
                        (e.attribute.clone(), value)
                    })
                    .collect();
                if !children.is_empty() {
                    let links = children.join(&CHILD_SEPARATOR.to_string());
                    fields.push((CHILDREN_ATTRIBUTE.to_string(), links));
                }
                Command::HSet {
                    key: key.to_string(),
                    fields,
                }
            }
            StorageKind::Json => {
                let mut map = Map::new();
                for e in encoded {
                    map.insert(e.attribute.clone(), e.value.to_json(|v| backend.before_write(v)));
                }
                if !children.is_empty() {
                    map.insert(
                        CHILDREN_ATTRIBUTE.to_string(),
                        Value::Array(children.iter().map(|c| Value::String(c.clone())).collect()),
                    );
                }
                Command::JsonSet {
                    key: key.to_string(),
                    document: Value::Object(map).to_string(),
                }
            }
        }
    }

    #[must_use]
    pub fn read(&self, key: &str) -> Command {
        match self.kind {
            StorageKind::Hash => Command::HGetAll { key: key.to_string() },
            StorageKind::Json => Command::JsonGet { key: key.to_string() },
        }
    }

    /// `None` when the record does not exist.
    pub fn parse(&self, backend: &Backend, schema: &DocumentSchema, key: &str, reply: Reply) -> DocResult<Option<RawRow>> {
        let transform = text_transform(backend, schema);
        match self.kind {
            StorageKind::Hash => {
                let pairs = reply.into_pairs();
                if pairs.is_empty() {
                    return Ok(None);
                }
                Ok(Some(RawRow::from_pairs(Some(key.to_string()), pairs, &transform)))
            }
            StorageKind::Json => match reply.into_text() {
                None => Ok(None),
                Some(json) => RawRow::from_json(Some(key.to_string()), &json, &transform).map(Some),
            },
        }
    }
}

/// Remove the child links from a raw row.
pub fn take_child_links(row: &mut RawRow) -> Vec<String> {
    match row.take(CHILDREN_ATTRIBUTE) {
        Some(RawValue::Flat(links)) => links
            .split(CHILD_SEPARATOR)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect(),
        Some(RawValue::List(links)) => links,
        None => Vec::new(),
    }
}
