// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Registry of compiled schemas by index name, with key-prefix routing.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use docgrid::schema::{DocumentSchema, SchemaRegistry};
//!
//! let registry = SchemaRegistry::new();
//! registry.register("people_idx", "docgrid:grid:people:", Arc::new(DocumentSchema::new("people")));
//! registry.register("vip_idx", "docgrid:grid:people:vip", Arc::new(DocumentSchema::new("vip")));
//!
//! // Keys are routed by longest prefix match
//! assert_eq!(registry.index_for_key("docgrid:grid:people:row:1").as_deref(), Some("people_idx"));
//! assert_eq!(registry.index_for_key("docgrid:grid:people:vip:row:1").as_deref(), Some("vip_idx"));
//! assert!(registry.index_for_key("other:key").is_none());
//! ```

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use super::DocumentSchema;

/// Thread-safe map of index name → schema.
///
/// Prefixes are matched using longest-prefix-first semantics.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: DashMap<String, Arc<DocumentSchema>>,
    /// Prefix -> index name, sorted by prefix length (descending).
    prefixes: RwLock<Vec<(String, String)>>,
}

impl SchemaRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the schema of `index`, routed from `prefix`.
    pub fn register(&self, index: &str, prefix: &str, schema: Arc<DocumentSchema>) {
        self.schemas.insert(index.to_string(), schema);

        let mut prefixes = self.prefixes.write();
        prefixes.retain(|(_, i)| i != index);
        if let Some(pos) = prefixes.iter().position(|(p, _)| p == prefix) {
            prefixes[pos].1 = index.to_string();
        } else {
            prefixes.push((prefix.to_string(), index.to_string()));
        }
        prefixes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    }

    /// Replace the schema of an already-registered index, keeping its prefix.
    pub fn replace(&self, index: &str, schema: Arc<DocumentSchema>) -> bool {
        match self.schemas.get_mut(index) {
            Some(mut entry) => {
                *entry = schema;
                true
            }
            None => false,
        }
    }

    /// Returns `true` if the index was registered.
    pub fn unregister(&self, index: &str) -> bool {
        self.prefixes.write().retain(|(_, i)| i != index);
        self.schemas.remove(index).is_some()
    }

    #[must_use]
    pub fn get(&self, index: &str) -> Option<Arc<DocumentSchema>> {
        self.schemas.get(index).map(|s| Arc::clone(s.value()))
    }

    /// Index whose prefix is the longest match for `key`.
    #[must_use]
    pub fn index_for_key(&self, key: &str) -> Option<String> {
        self.prefixes
            .read()
            .iter()
            .find(|(prefix, _)| key.starts_with(prefix.as_str()))
            .map(|(_, index)| index.clone())
    }

    /// Prefix `index` is routed from.
    #[must_use]
    pub fn prefix_of(&self, index: &str) -> Option<String> {
        self.prefixes
            .read()
            .iter()
            .find(|(_, i)| i == index)
            .map(|(prefix, _)| prefix.clone())
    }

    #[must_use]
    pub fn schema_for_key(&self, key: &str) -> Option<Arc<DocumentSchema>> {
        self.index_for_key(key).and_then(|index| self.get(&index))
    }

    /// Registered index names, sorted.
    #[must_use]
    pub fn indexes(&self) -> Vec<String> {
        let mut names: Vec<String> = self.schemas.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn clear(&self) {
        self.schemas.clear();
        self.prefixes.write().clear();
    }
}
