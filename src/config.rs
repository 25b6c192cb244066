// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the document grid engine.
//!
//! # Example
//!
//! ```
//! use docgrid::{DocGridConfig, StorageKind};
//!
//! // Minimal config (uses defaults)
//! let config = DocGridConfig::default();
//! assert_eq!(config.key_prefix, "docgrid:");
//! assert_eq!(config.fetch_batch_size, 100);
//!
//! // Full config
//! let config = DocGridConfig {
//!     redis_url: Some("redis://localhost:6379".into()),
//!     storage_kind: StorageKind::Json,
//!     stopwords: Some(vec![]), // STOPWORDS 0
//!     ..Default::default()
//! };
//! assert!(config.stopwords.as_ref().is_some_and(|s| s.is_empty()));
//! ```

use serde::Deserialize;

use crate::search::schema_compiler::StorageKind;

/// Configuration for the document grid engine.
///
/// All fields have sensible defaults. Only `redis_url` needs to be set to
/// talk to a real Redis Stack server.
#[derive(Debug, Clone, Deserialize)]
pub struct DocGridConfig {
    /// Redis connection string (e.g., "redis://localhost:6379")
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Namespace prepended to every key written (default: "docgrid:")
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Physical row encoding: flat hash or JSON document
    #[serde(default)]
    pub storage_kind: StorageKind,

    /// Rows fetched per pipelined round-trip on ranged reads
    #[serde(default = "default_fetch_batch_size")]
    pub fetch_batch_size: usize,

    /// Index ceilings, checked before FT.CREATE
    #[serde(default = "default_max_fields")]
    pub max_fields: usize,
    #[serde(default = "default_max_text_fields")]
    pub max_text_fields: usize,

    /// Relevance weight for stemmed text variants without an explicit weight
    #[serde(default = "default_weight")]
    pub default_weight: f64,

    /// None = engine default list, Some([]) = STOPWORDS 0
    #[serde(default)]
    pub stopwords: Option<Vec<String>>,

    /// Index options
    #[serde(default)]
    pub no_term_offsets: bool,
    #[serde(default)]
    pub no_field_flags: bool,
    #[serde(default)]
    pub no_term_frequencies: bool,

    /// TEMPORARY index lifetime in seconds
    #[serde(default)]
    pub index_ttl_secs: Option<u64>,

    /// Page size when `execute` is called without an explicit limit
    #[serde(default = "default_search_limit")]
    pub default_search_limit: usize,

    /// Distinct values returned per facet
    #[serde(default = "default_facet_value_limit")]
    pub facet_value_limit: usize,

    /// Lease lock defaults
    #[serde(default = "default_lock_lease_ms")]
    pub lock_lease_ms: u64,
    #[serde(default = "default_lock_wait_ms")]
    pub lock_wait_ms: u64,
}

fn default_key_prefix() -> String { "docgrid:".to_string() }
fn default_fetch_batch_size() -> usize { 100 }
fn default_max_fields() -> usize { 1024 }
fn default_max_text_fields() -> usize { 128 }
fn default_weight() -> f64 { 1.0 }
fn default_search_limit() -> usize { 10 }
fn default_facet_value_limit() -> usize { 100 }
fn default_lock_lease_ms() -> u64 { 30_000 }
fn default_lock_wait_ms() -> u64 { 10_000 }

impl Default for DocGridConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            key_prefix: default_key_prefix(),
            storage_kind: StorageKind::default(),
            fetch_batch_size: default_fetch_batch_size(),
            max_fields: default_max_fields(),
            max_text_fields: default_max_text_fields(),
            default_weight: default_weight(),
            stopwords: None,
            no_term_offsets: false,
            no_field_flags: false,
            no_term_frequencies: false,
            index_ttl_secs: None,
            default_search_limit: default_search_limit(),
            facet_value_limit: default_facet_value_limit(),
            lock_lease_ms: default_lock_lease_ms(),
            lock_wait_ms: default_lock_wait_ms(),
        }
    }
}
