// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Schema Compiler
//!
//! Compiles a [`DocumentSchema`] into an [`IndexDescriptor`]: the engine-facing
//! description of which physical fields exist and how they are indexed.
//!
//! # RediSearch Index Creation
//!
//! ```text
//! FT.CREATE docgrid:idx:people
//!   ON HASH
//!   PREFIX 1 docgrid:grid:people:row:
//!   FILTER @age>=18
//!   SCHEMA
//!     id AS id NUMERIC SORTABLE
//!     name AS name_tag TAG SEPARATOR , SORTABLE
//!     name AS name TEXT NOSTEM
//!     name AS name_stem TEXT WEIGHT 2
//!     born_epoch AS born_epoch NUMERIC SORTABLE
//!     born AS born TAG SEPARATOR ,
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::criteria::Criteria;
use super::filter::compile_filter;
use crate::config::DocGridConfig;
use crate::error::{DocError, DocResult};
use crate::metrics;
use crate::schema::field_codec::{FieldCodec, FieldVariant, VariantKind};
use crate::schema::DocumentSchema;
use crate::storage::command::format_score;

/// Physical row encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Flat hash, one field per attribute.
    #[default]
    Hash,
    /// JSON document (RedisJSON).
    Json,
}

impl StorageKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hash => "HASH",
            Self::Json => "JSON",
        }
    }
}

/// Stop-word handling.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Stopwords {
    /// Engine default list.
    #[default]
    Default,
    /// `STOPWORDS 0`
    None,
    List(Vec<String>),
}

/// Global index options.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexOptions {
    pub no_term_offsets: bool,
    pub no_field_flags: bool,
    pub no_term_frequencies: bool,
    pub stopwords: Stopwords,
    /// TEMPORARY index lifetime in seconds.
    pub ttl_secs: Option<u64>,
}

impl IndexOptions {
    #[must_use]
    pub fn from_config(config: &DocGridConfig) -> Self {
        Self {
            no_term_offsets: config.no_term_offsets,
            no_field_flags: config.no_field_flags,
            no_term_frequencies: config.no_term_frequencies,
            stopwords: match &config.stopwords {
                None => Stopwords::Default,
                Some(list) if list.is_empty() => Stopwords::None,
                Some(list) => Stopwords::List(list.clone()),
            },
            ttl_secs: config.index_ttl_secs,
        }
    }
}

/// Compiled index definition.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDescriptor {
    pub index_name: String,
    pub storage: StorageKind,
    /// Key prefix of indexed rows.
    pub prefix: String,
    /// FILTER expression pre-filtering indexed rows.
    pub filter: Option<String>,
    pub fields: Vec<FieldVariant>,
    pub options: IndexOptions,
}

impl IndexDescriptor {
    /// Number of full-text variants.
    #[must_use]
    pub fn text_field_count(&self) -> usize {
        self.fields
            .iter()
            .filter(|f| matches!(f.kind, VariantKind::Text(_)))
            .count()
    }

    #[must_use]
    pub fn field(&self, alias: &str) -> Option<&FieldVariant> {
        self.fields.iter().find(|f| f.alias == alias)
    }

    /// FT.CREATE arguments (index name first).
    #[must_use]
    pub fn to_ft_create_args(&self) -> Vec<String> {
        let mut args = vec![
            self.index_name.clone(),
            "ON".to_string(),
            self.storage.as_str().to_string(),
            "PREFIX".to_string(),
            "1".to_string(),
            self.prefix.clone(),
        ];
        if let Some(filter) = &self.filter {
            args.push("FILTER".to_string());
            args.push(filter.clone());
        }
        if let Some(ttl) = self.options.ttl_secs {
            args.push("TEMPORARY".to_string());
            args.push(ttl.to_string());
        }
        if self.options.no_term_offsets {
            args.push("NOOFFSETS".to_string());
        }
        if self.options.no_field_flags {
            args.push("NOFIELDS".to_string());
        }
        if self.options.no_term_frequencies {
            args.push("NOFREQS".to_string());
        }
        match &self.options.stopwords {
            Stopwords::Default => {}
            Stopwords::None => {
                args.push("STOPWORDS".to_string());
                args.push("0".to_string());
            }
            Stopwords::List(words) => {
                args.push("STOPWORDS".to_string());
                args.push(words.len().to_string());
                args.extend(words.iter().cloned());
            }
        }
        args.push("SCHEMA".to_string());
        for field in &self.fields {
            args.extend(self.field_args(field));
        }
        args
    }

    fn field_args(&self, field: &FieldVariant) -> Vec<String> {
        let source = match self.storage {
            StorageKind::Hash => field.attribute.clone(),
            StorageKind::Json if field.multi_value => format!("$.{}[*]", field.attribute),
            StorageKind::Json => format!("$.{}", field.attribute),
        };
        let mut args = vec![source, "AS".to_string(), field.alias.clone()];

        let mut no_index = false;
        match &field.kind {
            VariantKind::Tag { separator } => {
                args.push("TAG".to_string());
                args.push("SEPARATOR".to_string());
                args.push(separator.to_string());
            }
            VariantKind::Text(opts) => {
                args.push("TEXT".to_string());
                if opts.stemmed {
                    args.push("WEIGHT".to_string());
                    args.push(format_score(opts.weight));
                } else {
                    args.push("NOSTEM".to_string());
                }
                if let Some(matcher) = &opts.phonetic {
                    args.push("PHONETIC".to_string());
                    args.push(matcher.clone());
                }
                if opts.suffix_trie {
                    args.push("WITHSUFFIXTRIE".to_string());
                }
                no_index = opts.no_index;
            }
            VariantKind::Numeric => args.push("NUMERIC".to_string()),
            VariantKind::Geo => args.push("GEO".to_string()),
        }
        if field.sortable {
            args.push("SORTABLE".to_string());
        }
        if no_index {
            args.push("NOINDEX".to_string());
        }
        args
    }

    /// Hex SHA-256 of the FT.CREATE arguments.
    ///
    /// Identical descriptors always produce identical fingerprints, so a
    /// persisted fingerprint tells whether the live index is current.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for arg in self.to_ft_create_args() {
            hasher.update(arg.as_bytes());
            hasher.update(b"\x1f");
        }
        hex::encode(hasher.finalize())
    }
}

/// Schema → index descriptor compiler.
#[derive(Debug, Clone)]
pub struct SchemaCompiler {
    codec: FieldCodec,
    storage: StorageKind,
    options: IndexOptions,
    max_fields: usize,
    max_text_fields: usize,
}

impl Default for SchemaCompiler {
    fn default() -> Self {
        Self::new(&DocGridConfig::default())
    }
}

impl SchemaCompiler {
    #[must_use]
    pub fn new(config: &DocGridConfig) -> Self {
        Self {
            codec: FieldCodec::new(config.default_weight),
            storage: config.storage_kind,
            options: IndexOptions::from_config(config),
            max_fields: config.max_fields,
            max_text_fields: config.max_text_fields,
        }
    }

    #[must_use]
    pub fn codec(&self) -> &FieldCodec {
        &self.codec
    }

    /// Compile `schema` into a descriptor for rows under `prefix`.
    ///
    /// Limits are checked here, before anything is sent to the engine.
    pub fn compile(
        &self,
        index_name: &str,
        prefix: &str,
        schema: &DocumentSchema,
        filter: Option<&Criteria>,
    ) -> DocResult<IndexDescriptor> {
        let result = self.compile_inner(index_name, prefix, schema, filter);
        metrics::record_compile("schema", result.is_ok());
        result
    }

    fn compile_inner(
        &self,
        index_name: &str,
        prefix: &str,
        schema: &DocumentSchema,
        filter: Option<&Criteria>,
    ) -> DocResult<IndexDescriptor> {
        schema.validate()?;

        let mut fields: Vec<FieldVariant> = Vec::new();
        for item in schema.items() {
            for variant in self.codec.variants_for(item)? {
                if fields.iter().any(|f| f.alias == variant.alias) {
                    return Err(DocError::schema(
                        &item.name,
                        format!("physical field '{}' is defined twice", variant.alias),
                    ));
                }
                fields.push(variant);
            }
        }

        let filter = match filter {
            Some(criteria) => compile_filter(criteria, schema)?,
            None => None,
        };

        let descriptor = IndexDescriptor {
            index_name: index_name.to_string(),
            storage: self.storage,
            prefix: prefix.to_string(),
            filter,
            fields,
            options: self.options.clone(),
        };
        self.check_limits(&descriptor)?;
        debug!(
            index = %index_name,
            fields = descriptor.fields.len(),
            text_fields = descriptor.text_field_count(),
            "Compiled index descriptor"
        );
        Ok(descriptor)
    }

    /// Field and text-field ceilings.
    pub fn check_limits(&self, descriptor: &IndexDescriptor) -> DocResult<()> {
        let count = descriptor.fields.len();
        if count > self.max_fields {
            return Err(DocError::SchemaLimit {
                what: "fields",
                count,
                ceiling: self.max_fields,
            });
        }
        let text = descriptor.text_field_count();
        if text > self.max_text_fields {
            return Err(DocError::SchemaLimit {
                what: "text fields",
                count: text,
                ceiling: self.max_text_fields,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{LogicalType, SchemaItem};
    use crate::search::criteria::Operator;

    fn schema() -> DocumentSchema {
        DocumentSchema::from_items(
            "people",
            vec![
                SchemaItem::new("id", LogicalType::Integer).primary(),
                SchemaItem::new("name", LogicalType::Text).stemmed().weighted(2.0),
                SchemaItem::new("born", LogicalType::Date),
                SchemaItem::new("tags", LogicalType::Text).multi_value('|'),
            ],
        )
        .unwrap()
    }

    fn window(args: &[String], start: &str, len: usize) -> Vec<String> {
        let pos = args.iter().position(|a| a == start).unwrap();
        args[pos..pos + len].to_vec()
    }

    #[test]
    fn test_hash_args() {
        let d = SchemaCompiler::default().compile("idx", "p:", &schema(), None).unwrap();
        let args = d.to_ft_create_args();
        assert_eq!(&args[..7], &["idx", "ON", "HASH", "PREFIX", "1", "p:", "SCHEMA"]);
        assert_eq!(window(&args, "id", 5), vec!["id", "AS", "id", "NUMERIC", "SORTABLE"]);
        assert_eq!(
            window(&args, "born_epoch", 5),
            vec!["born_epoch", "AS", "born_epoch", "NUMERIC", "SORTABLE"]
        );
        let stem = args.iter().position(|a| a == "name_stem").unwrap();
        assert_eq!(&args[stem..stem + 4], &["name_stem", "TEXT", "WEIGHT", "2"]);
        let tag = args.iter().position(|a| a == "tags_tag").unwrap();
        assert_eq!(&args[tag..tag + 4], &["tags_tag", "TAG", "SEPARATOR", "|"]);
    }

    #[test]
    fn test_json_paths() {
        let config = DocGridConfig {
            storage_kind: StorageKind::Json,
            ..Default::default()
        };
        let d = SchemaCompiler::new(&config).compile("idx", "p:", &schema(), None).unwrap();
        let args = d.to_ft_create_args();
        assert_eq!(args[2], "JSON");
        assert!(args.contains(&"$.name".to_string()));
        assert!(args.contains(&"$.tags[*]".to_string()));
        assert!(args.contains(&"$.born_epoch".to_string()));
    }

    #[test]
    fn test_options_and_filter() {
        let config = DocGridConfig {
            stopwords: Some(vec![]),
            no_term_offsets: true,
            index_ttl_secs: Some(60),
            ..Default::default()
        };
        let filter = Criteria::new().and("id", Operator::GreaterThan, ["0"]);
        let d = SchemaCompiler::new(&config)
            .compile("idx", "p:", &schema(), Some(&filter))
            .unwrap();
        let args = d.to_ft_create_args();
        assert_eq!(window(&args, "FILTER", 2), vec!["FILTER", "@id>0"]);
        assert_eq!(window(&args, "TEMPORARY", 2), vec!["TEMPORARY", "60"]);
        assert_eq!(window(&args, "STOPWORDS", 2), vec!["STOPWORDS", "0"]);
        assert!(args.contains(&"NOOFFSETS".to_string()));
        let schema_pos = args.iter().position(|a| a == "SCHEMA").unwrap();
        assert!(args.iter().position(|a| a == "FILTER").unwrap() < schema_pos);
    }

    #[test]
    fn test_not_searchable_is_noindex() {
        let mut item = SchemaItem::new("notes", LogicalType::Text);
        item.is_searchable = false;
        let s = DocumentSchema::from_items("n", vec![item]).unwrap();
        let args = SchemaCompiler::default().compile("idx", "n:", &s, None).unwrap().to_ft_create_args();
        assert_eq!(args.iter().filter(|a| *a == "NOINDEX").count(), 2);
    }

    #[test]
    fn test_field_limit() {
        let config = DocGridConfig {
            max_fields: 3,
            ..Default::default()
        };
        let err = SchemaCompiler::new(&config).compile("idx", "p:", &schema(), None).unwrap_err();
        assert!(matches!(err, DocError::SchemaLimit { what: "fields", ceiling: 3, .. }));
    }

    #[test]
    fn test_text_field_limit() {
        let config = DocGridConfig {
            max_text_fields: 3,
            ..Default::default()
        };
        let err = SchemaCompiler::new(&config).compile("idx", "p:", &schema(), None).unwrap_err();
        assert!(matches!(err, DocError::SchemaLimit { what: "text fields", count: 4, ceiling: 3 }));
    }

    #[test]
    fn test_alias_collision() {
        let s = DocumentSchema::from_items(
            "c",
            vec![
                SchemaItem::new("born", LogicalType::Date),
                SchemaItem::new("born_epoch", LogicalType::Integer),
            ],
        )
        .unwrap();
        assert!(matches!(
            SchemaCompiler::default().compile("idx", "c:", &s, None).unwrap_err(),
            DocError::Schema { .. }
        ));
    }

    #[test]
    fn test_deterministic_fingerprint() {
        let compiler = SchemaCompiler::default();
        let a = compiler.compile("idx", "p:", &schema(), None).unwrap();
        let b = compiler.compile("idx", "p:", &schema(), None).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);

        let c = compiler.compile("idx", "q:", &schema(), None).unwrap();
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}
