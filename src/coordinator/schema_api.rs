// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Schema management: compile, index lifecycle, persistence and updates.
//!
//! Each index keeps a persisted schema record at `{prefix}schema:{index}`
//! holding the schema, the fingerprint of the FT.CREATE arguments it was
//! created with and its FILTER expression. [`DocEngine::ensure_index`]
//! compares fingerprints so an unchanged schema never re-issues FT.CREATE.
//!
//! The registry only learns a schema once the store has accepted it.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::error::DocResult;
use crate::metrics;
use crate::schema::{DocumentSchema, StoredSchema};
use crate::search::{Criteria, IndexDescriptor};
use crate::storage::Command;

use super::{DocEngine, IndexAction};

impl DocEngine {
    /// Compile `schema` into an index descriptor and register it for
    /// `index`. Nothing is sent to the store.
    pub fn compile_schema(
        &self,
        index: &str,
        prefix: &str,
        schema: &DocumentSchema,
        filter: Option<&Criteria>,
    ) -> DocResult<IndexDescriptor> {
        let descriptor = self.schema_compiler.compile(index, prefix, schema, filter)?;
        self.registry.register(index, prefix, Arc::new(schema.clone()));
        Ok(descriptor)
    }

    /// Persisted schema record of `index`, with its fingerprint.
    pub async fn load_schema(&self, index: &str) -> DocResult<Option<(DocumentSchema, Option<String>)>> {
        Ok(self
            .load_stored_schema(index)
            .await?
            .map(|stored| (stored.schema, stored.fingerprint)))
    }

    /// Persisted schema record of `index`, FILTER expression included.
    pub async fn load_stored_schema(&self, index: &str) -> DocResult<Option<StoredSchema>> {
        let record = self
            .backend
            .run(Command::Get {
                key: self.schema_key(index),
            })
            .await?
            .into_text();
        record.map(|json| DocumentSchema::load_stored(&json)).transpose()
    }

    /// Persist the schema record of `index`.
    pub async fn save_schema(&self, index: &str, schema: &DocumentSchema, fingerprint: Option<&str>) -> DocResult<()> {
        self.save_stored_schema(index, schema, fingerprint, None).await
    }

    async fn save_stored_schema(
        &self,
        index: &str,
        schema: &DocumentSchema,
        fingerprint: Option<&str>,
        filter: Option<&str>,
    ) -> DocResult<()> {
        let record = schema.save_indexed(fingerprint, filter)?;
        self.backend
            .run(Command::Set {
                key: self.schema_key(index),
                value: record,
            })
            .await?;
        debug!(index = %index, "Schema record saved");
        Ok(())
    }

    /// Load the persisted schema of an existing index into the registry.
    /// Returns `false` when no record exists.
    pub async fn open_index(&self, index: &str, prefix: &str) -> DocResult<bool> {
        match self.load_schema(index).await? {
            Some((schema, _)) => {
                self.registry.register(index, prefix, Arc::new(schema));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Create the index for `schema`, or rebuild it when the persisted
    /// fingerprint differs. Idempotent for an unchanged schema.
    #[instrument(skip(self, schema, filter), fields(schema = %schema.name))]
    pub async fn ensure_index(
        &self,
        index: &str,
        prefix: &str,
        schema: &DocumentSchema,
        filter: Option<&Criteria>,
    ) -> DocResult<IndexAction> {
        let result = self.ensure_index_inner(index, prefix, schema, filter).await;
        metrics::record_index_operation("ensure", result.is_ok());
        result
    }

    async fn ensure_index_inner(
        &self,
        index: &str,
        prefix: &str,
        schema: &DocumentSchema,
        filter: Option<&Criteria>,
    ) -> DocResult<IndexAction> {
        let descriptor = self.schema_compiler.compile(index, prefix, schema, filter)?;
        self.apply_descriptor(index, schema, &descriptor).await
    }

    /// Create or rebuild the index described by `descriptor`, then persist
    /// and register `schema`. Nothing is registered if the store refuses.
    async fn apply_descriptor(
        &self,
        index: &str,
        schema: &DocumentSchema,
        descriptor: &IndexDescriptor,
    ) -> DocResult<IndexAction> {
        let fingerprint = descriptor.fingerprint();

        let action = match self.load_stored_schema(index).await? {
            Some(stored) if stored.fingerprint.as_deref() == Some(fingerprint.as_str()) => {
                debug!(index = %index, "Index definition unchanged");
                self.registry.register(index, &descriptor.prefix, Arc::new(schema.clone()));
                return Ok(IndexAction::Unchanged);
            }
            Some(_) => {
                if let Err(e) = self.backend.drop_index(index, false).await {
                    warn!(index = %index, error = %e, "Drop before rebuild failed, creating anyway");
                }
                IndexAction::Rebuilt
            }
            None => IndexAction::Created,
        };

        self.backend.create_index(&descriptor.to_ft_create_args()).await?;
        self.save_stored_schema(index, schema, Some(&fingerprint), descriptor.filter.as_deref())
            .await?;
        self.registry.register(index, &descriptor.prefix, Arc::new(schema.clone()));
        info!(
            index = %index,
            prefix = %descriptor.prefix,
            fields = descriptor.fields.len(),
            filtered = descriptor.filter.is_some(),
            action = %action,
            "Search index ready"
        );
        Ok(action)
    }

    /// Apply a schema patch to a registered index.
    ///
    /// Returns whether the patch required an index rebuild; when it did, the
    /// index is rebuilt before returning, keeping its FILTER. Otherwise only
    /// the persisted record is refreshed.
    #[instrument(skip(self, patch))]
    pub async fn update_schema(&self, index: &str, patch: &DocumentSchema) -> DocResult<bool> {
        let current = self.schema(index)?;
        let prefix = self.registry.prefix_of(index).unwrap_or_default();

        let mut updated = (*current).clone();
        let rebuild = updated.update(patch);
        updated.validate()?;

        let stored = self.load_stored_schema(index).await?;
        let (fingerprint, filter) = stored.map_or((None, None), |s| (s.fingerprint, s.filter));

        if rebuild {
            let mut descriptor = self.schema_compiler.compile(index, &prefix, &updated, None)?;
            descriptor.filter = filter;
            let result = self.apply_descriptor(index, &updated, &descriptor).await;
            metrics::record_index_operation("ensure", result.is_ok());
            result?;
        } else {
            self.save_stored_schema(index, &updated, fingerprint.as_deref(), filter.as_deref())
                .await?;
            self.registry.replace(index, Arc::new(updated));
        }
        info!(index = %index, rebuild, "Schema updated");
        Ok(rebuild)
    }
}
