// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Ordered Grid Storage
//!
//! A grid is a named, 1-based sequence of documents sharing one schema, laid
//! out on a key-value store with no native "insert at position":
//!
//! ```text
//! {prefix}grid:{name}:ordinals      ZSET  ordinal → row key (see ordinal.rs)
//! {prefix}grid:{name}:schema        STRING persisted schema record (ordinal 0)
//! {prefix}grid:{name}:row:<uuid>    HASH | JSON row record
//! {prefix}grid:{name}:child:<uuid>  HASH | JSON child record
//! ```
//!
//! # Write protocol
//!
//! - **append**: write the record, then publish `max + 1`. Two steps, not
//!   atomic; a crash in between leaves a record with no ordinal, which
//!   [`Grid::orphaned_rows`] reports.
//! - **insert_after(k)**: write the record, then in one MULTI/EXEC shift every
//!   row after `k` up by one and assign `k + 1`.
//! - **delete_at(k)**: delete the record, then in one MULTI/EXEC remove its
//!   ordinal and shift every row after `k` down by one.
//!
//! Readers therefore never see a duplicated or missing ordinal. Ranged reads
//! fetch records in pipelined groups of `fetch_batch_size`, in ordinal order.

pub mod ordinal;
pub mod row;

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::DocGridConfig;
use crate::document::LogicalDocument;
use crate::error::{DocError, DocResult};
use crate::metrics::{self, LatencyTimer};
use crate::schema::field_codec::FieldCodec;
use crate::schema::DocumentSchema;
use crate::search::projector::ResultProjector;
use crate::storage::{Backend, Command};

pub use ordinal::{OrdinalIndex, SCHEMA_ORDINAL};
pub use row::RowStore;

/// Lifecycle of a grid as observed in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GridState {
    Uninitialized,
    SchemaWritten,
    Populated,
}

/// Read-result metadata. Offsets are 0-based row counts; `total_count`
/// never includes the schema slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageMetadata {
    pub current_limit: u64,
    pub current_offset: u64,
    /// Offset of the next page, `None` on the last page.
    pub next_offset: Option<u64>,
    pub total_count: u64,
}

impl PageMetadata {
    #[must_use]
    pub fn new(offset: u64, limit: u64, returned: u64, total_count: u64) -> Self {
        let end = offset.saturating_add(returned);
        Self {
            current_limit: limit,
            current_offset: offset,
            next_offset: (returned > 0 && end < total_count).then_some(end),
            total_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridPage {
    pub rows: Vec<LogicalDocument>,
    pub metadata: PageMetadata,
}

/// Keys of one grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridKeys {
    pub ordering: String,
    pub schema: String,
    pub row_prefix: String,
    pub child_prefix: String,
}

impl GridKeys {
    #[must_use]
    pub fn new(prefix: &str, name: &str) -> Self {
        let base = format!("{}grid:{}", prefix, name);
        Self {
            ordering: format!("{}:ordinals", base),
            schema: format!("{}:schema", base),
            row_prefix: format!("{}:row:", base),
            child_prefix: format!("{}:child:", base),
        }
    }

    fn new_row_key(&self) -> String {
        format!("{}{}", self.row_prefix, Uuid::new_v4())
    }

    fn new_child_key(&self) -> String {
        format!("{}{}", self.child_prefix, Uuid::new_v4())
    }
}

type DocumentsFuture<'a> = Pin<Box<dyn Future<Output = DocResult<Vec<LogicalDocument>>> + Send + 'a>>;

/// Handle on one grid. Cheap to clone; holds no connection state of its own.
#[derive(Clone)]
pub struct Grid {
    name: String,
    keys: GridKeys,
    backend: Backend,
    schema: Arc<DocumentSchema>,
    ordinals: OrdinalIndex,
    rows: RowStore,
    codec: FieldCodec,
    projector: ResultProjector,
    fetch_batch_size: usize,
}

impl std::fmt::Debug for Grid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grid")
            .field("name", &self.name)
            .field("storage", &self.rows.kind())
            .finish_non_exhaustive()
    }
}

impl Grid {
    fn assemble(backend: Backend, config: &DocGridConfig, name: &str, schema: DocumentSchema) -> Self {
        let keys = GridKeys::new(&config.key_prefix, name);
        let codec = FieldCodec::new(config.default_weight);
        Self {
            name: name.to_string(),
            ordinals: OrdinalIndex::new(keys.ordering.clone(), keys.schema.clone()),
            keys,
            backend,
            schema: Arc::new(schema),
            rows: RowStore::new(config.storage_kind),
            projector: ResultProjector::new(codec.clone()),
            codec,
            fetch_batch_size: config.fetch_batch_size.max(1),
        }
    }

    /// Create a grid, or rewrite the schema of an existing one.
    ///
    /// Writes the schema record and its ordinal-0 slot in one transaction.
    #[instrument(skip(backend, config, schema))]
    pub async fn create(backend: Backend, config: &DocGridConfig, name: &str, schema: DocumentSchema) -> DocResult<Self> {
        if name.is_empty() {
            return Err(DocError::schema(name, "grid name must not be empty"));
        }
        schema.validate()?;
        let grid = Self::assemble(backend, config, name, schema);
        grid.write_schema().await?;
        info!(grid = %grid.name, storage = grid.rows.kind().as_str(), "Grid created");
        Ok(grid)
    }

    /// Open an existing grid from its persisted schema record.
    #[instrument(skip(backend, config))]
    pub async fn open(backend: Backend, config: &DocGridConfig, name: &str) -> DocResult<Self> {
        let keys = GridKeys::new(&config.key_prefix, name);
        let record = backend.run(Command::Get { key: keys.schema }).await?.into_text();
        let Some(record) = record else {
            return Err(DocError::GridMissing(name.to_string()));
        };
        let (schema, _) = DocumentSchema::load(&record)?;
        debug!(grid = %name, fields = schema.len(), "Grid opened");
        Ok(Self::assemble(backend, config, name, schema))
    }

    async fn write_schema(&self) -> DocResult<()> {
        let record = self.schema.save(None)?;
        self.backend
            .transaction(vec![
                Command::Set {
                    key: self.keys.schema.clone(),
                    value: record,
                },
                self.ordinals.assign_schema(),
            ])
            .await?;
        Ok(())
    }

    /// Replace the grid schema. Existing rows are not rewritten.
    pub async fn set_schema(&mut self, schema: DocumentSchema) -> DocResult<()> {
        schema.validate()?;
        self.schema = Arc::new(schema);
        self.write_schema().await
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn schema(&self) -> &DocumentSchema {
        &self.schema
    }

    #[must_use]
    pub fn keys(&self) -> &GridKeys {
        &self.keys
    }

    /// Key prefix shared by every row record, for indexing the grid.
    #[must_use]
    pub fn row_prefix(&self) -> &str {
        &self.keys.row_prefix
    }

    #[must_use]
    pub fn row_store(&self) -> RowStore {
        self.rows
    }

    pub async fn state(&self) -> DocResult<GridState> {
        Ok(match self.ordinals.cardinality(&self.backend).await? {
            0 => GridState::Uninitialized,
            1 => GridState::SchemaWritten,
            _ => GridState::Populated,
        })
    }

    pub async fn exists(&self) -> DocResult<bool> {
        let reply = self
            .backend
            .run(Command::Exists {
                key: self.keys.ordering.clone(),
            })
            .await?;
        Ok(reply.as_int() > 0)
    }

    /// Row count; 0 for an absent grid.
    pub async fn count(&self) -> DocResult<u64> {
        let count = self.ordinals.count(&self.backend).await?;
        metrics::set_grid_rows(&self.name, count);
        Ok(count)
    }

    /// Row count, failing when the schema slot is gone.
    async fn checked_count(&self) -> DocResult<u64> {
        match self.ordinals.cardinality(&self.backend).await? {
            0 => Err(DocError::GridMissing(self.name.clone())),
            n => Ok(n - 1),
        }
    }

    /// Write commands for `doc` at `key`, children first.
    fn plan_record(&self, key: &str, doc: &LogicalDocument, commands: &mut Vec<Command>) -> DocResult<()> {
        let mut links = Vec::with_capacity(doc.children().len());
        for child in doc.children() {
            let child_key = self.keys.new_child_key();
            self.plan_record(&child_key, child, commands)?;
            links.push(child_key);
        }
        let encoded = self.rows.encode(&self.codec, &self.schema, doc)?;
        if encoded.is_empty() && links.is_empty() {
            return Err(DocError::schema(&self.name, "document has no stored fields"));
        }
        commands.push(self.rows.write(&self.backend, key, &encoded, &links));
        Ok(())
    }

    /// Phase one of every insert: write the record under a fresh key.
    async fn write_new_row(&self, doc: &LogicalDocument) -> DocResult<String> {
        let key = self.keys.new_row_key();
        let mut commands = Vec::new();
        self.plan_record(&key, doc, &mut commands)?;
        self.backend.pipeline(commands).await?;
        Ok(key)
    }

    /// Phase two of every insert: give `key` an ordinal (`None` appends).
    ///
    /// A refused placement means the grid was dropped, or shrank below
    /// `at`, since phase one; the record just written is unreachable and
    /// is deleted with its children.
    async fn publish(&self, key: &str, at: Option<u64>) -> DocResult<u64> {
        let reply = self.backend.run(self.ordinals.insert(key, at)).await?.as_int();
        if let Ok(ordinal) = u64::try_from(reply) {
            return Ok(ordinal);
        }
        self.discard(vec![key.to_string()]).await?;
        match (at, self.ordinals.cardinality(&self.backend).await?) {
            (_, 0) | (None, _) => Err(DocError::GridMissing(self.name.clone())),
            (Some(at), members) => Err(DocError::Ordinal {
                ordinal: at - 1,
                count: members - 1,
            }),
        }
    }

    /// Delete unpublished records and everything they link to.
    async fn discard(&self, keys: Vec<String>) -> DocResult<()> {
        let mut doomed = Vec::new();
        for key in keys {
            doomed.extend(self.descendant_keys(&key).await?);
            doomed.push(key);
        }
        self.backend.run(Command::Del { keys: doomed }).await?;
        Ok(())
    }

    /// Append a row; returns its ordinal.
    #[instrument(skip(self, doc), fields(grid = %self.name))]
    pub async fn append(&self, doc: &LogicalDocument) -> DocResult<u64> {
        let _timer = LatencyTimer::new("append");
        let result = self.append_inner(doc).await;
        metrics::record_grid_operation("append", result.is_ok());
        result
    }

    async fn append_inner(&self, doc: &LogicalDocument) -> DocResult<u64> {
        let key = self.write_new_row(doc).await?;
        let ordinal = self.publish(&key, None).await?;
        metrics::set_grid_rows(&self.name, ordinal);
        debug!(ordinal, key = %key, "Row appended");
        Ok(ordinal)
    }

    /// Append several rows: one pipeline of record writes, then one
    /// transaction publishing consecutive ordinals. Returns the ordinals in
    /// input order.
    #[instrument(skip(self, docs), fields(grid = %self.name, rows = docs.len()))]
    pub async fn append_all(&self, docs: &[LogicalDocument]) -> DocResult<Vec<u64>> {
        let _timer = LatencyTimer::new("append_all");
        let result = self.append_all_inner(docs).await;
        metrics::record_grid_operation("append_all", result.is_ok());
        result
    }

    async fn append_all_inner(&self, docs: &[LogicalDocument]) -> DocResult<Vec<u64>> {
        if docs.is_empty() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::with_capacity(docs.len());
        let mut commands = Vec::new();
        for doc in docs {
            let key = self.keys.new_row_key();
            self.plan_record(&key, doc, &mut commands)?;
            keys.push(key);
        }
        self.backend.pipeline(commands).await?;

        // One transaction, so the rows get consecutive ordinals.
        let publish = keys.iter().map(|key| self.ordinals.insert(key, None)).collect();
        let replies = self.backend.transaction(publish).await?;
        let ordinals: Vec<u64> = replies
            .iter()
            .filter_map(|reply| u64::try_from(reply.as_int()).ok())
            .collect();
        if ordinals.len() != keys.len() {
            self.discard(keys).await?;
            return Err(DocError::GridMissing(self.name.clone()));
        }
        if let Some(last) = ordinals.last() {
            metrics::set_grid_rows(&self.name, *last);
        }
        debug!(first = ordinals[0], "Rows appended");
        Ok(ordinals)
    }

    /// Insert a row directly after ordinal `after` (0 inserts at the front);
    /// returns the new row's ordinal.
    #[instrument(skip(self, doc), fields(grid = %self.name))]
    pub async fn insert_after(&self, after: u64, doc: &LogicalDocument) -> DocResult<u64> {
        let _timer = LatencyTimer::new("insert_after");
        let result = self.insert_after_inner(after, doc).await;
        metrics::record_grid_operation("insert_after", result.is_ok());
        result
    }

    async fn insert_after_inner(&self, after: u64, doc: &LogicalDocument) -> DocResult<u64> {
        let count = self.checked_count().await?;
        if after > count {
            return Err(DocError::Ordinal { ordinal: after, count });
        }
        let key = self.write_new_row(doc).await?;
        let ordinal = self.publish(&key, Some(after + 1)).await?;

        let shifted = (count - after) as usize;
        metrics::record_reindex_shift("insert_after", shifted);
        metrics::set_grid_rows(&self.name, count + 1);
        debug!(ordinal, shifted, "Row inserted");
        Ok(ordinal)
    }

    /// Delete the row at `ordinal` and close the gap.
    ///
    /// Returns `false` when the record (or part of its children) was already
    /// gone; the ordinal is removed either way.
    #[instrument(skip(self), fields(grid = %self.name))]
    pub async fn delete_at(&self, ordinal: u64) -> DocResult<bool> {
        let _timer = LatencyTimer::new("delete_at");
        let result = self.delete_at_inner(ordinal).await;
        metrics::record_grid_operation("delete_at", result.is_ok());
        result
    }

    async fn delete_at_inner(&self, ordinal: u64) -> DocResult<bool> {
        let key = self.resolve(ordinal).await?;

        let mut doomed = vec![key.clone()];
        doomed.extend(self.descendant_keys(&key).await?);
        let expected = doomed.len() as i64;
        let removed = self.backend.run(Command::Del { keys: doomed }).await?.as_int();
        let clean = removed == expected;
        if !clean {
            warn!(key = %key, expected, removed, "Delete count mismatch, row may already be gone");
            metrics::record_storage_inconsistency("delete_at");
        }

        let moved = self.backend.run(self.ordinals.remove(&key)).await?.as_int();
        let Ok(shifted) = usize::try_from(moved) else {
            warn!(key = %key, "Row lost its ordinal before the delete reached it");
            metrics::record_storage_inconsistency("delete_at");
            return Ok(false);
        };

        metrics::record_reindex_shift("delete_at", shifted);
        debug!(ordinal, shifted, "Row deleted");
        Ok(clean)
    }

    /// Replace the record at `ordinal` without touching any ordinal.
    #[instrument(skip(self, doc), fields(grid = %self.name))]
    pub async fn update_at(&self, ordinal: u64, doc: &LogicalDocument) -> DocResult<()> {
        let _timer = LatencyTimer::new("update_at");
        let result = self.update_at_inner(ordinal, doc).await;
        metrics::record_grid_operation("update_at", result.is_ok());
        result
    }

    async fn update_at_inner(&self, ordinal: u64, doc: &LogicalDocument) -> DocResult<()> {
        let key = self.resolve(ordinal).await?;
        let mut stale = vec![key.clone()];
        stale.extend(self.descendant_keys(&key).await?);

        let mut commands = vec![Command::Del { keys: stale }];
        self.plan_record(&key, doc, &mut commands)?;
        self.backend.transaction(commands).await?;
        debug!(ordinal, key = %key, "Row updated");
        Ok(())
    }

    /// Row key at a data ordinal, or an `Ordinal` error.
    async fn resolve(&self, ordinal: u64) -> DocResult<String> {
        if ordinal != SCHEMA_ORDINAL {
            if let Some(key) = self.ordinals.key_at(&self.backend, ordinal).await? {
                return Ok(key);
            }
        }
        let count = self.ordinals.count(&self.backend).await?;
        Err(DocError::Ordinal { ordinal, count })
    }

    /// Every child record reachable from `key`, depth-first.
    async fn descendant_keys(&self, key: &str) -> DocResult<Vec<String>> {
        let mut found = Vec::new();
        let mut pending = vec![key.to_string()];
        while let Some(next) = pending.pop() {
            let reply = self.backend.run(self.rows.read(&next)).await?;
            if let Some(mut raw) = self.rows.parse(&self.backend, &self.schema, &next, reply)? {
                let links = row::take_child_links(&mut raw);
                found.extend(links.iter().cloned());
                pending.extend(links);
            }
        }
        Ok(found)
    }

    /// Row at `ordinal`, `None` past the end.
    pub async fn get(&self, ordinal: u64) -> DocResult<Option<LogicalDocument>> {
        if ordinal == SCHEMA_ORDINAL {
            let count = self.ordinals.count(&self.backend).await?;
            return Err(DocError::Ordinal { ordinal, count });
        }
        let Some(key) = self.ordinals.key_at(&self.backend, ordinal).await? else {
            return Ok(None);
        };
        Ok(self.fetch_documents(std::slice::from_ref(&key)).await?.pop())
    }

    /// Rows at ordinals `start..=finish`; `finish = None` reads to the last row.
    #[instrument(skip(self), fields(grid = %self.name))]
    pub async fn read(&self, start: u64, finish: Option<u64>) -> DocResult<GridPage> {
        let _timer = LatencyTimer::new("read");
        let result = self.read_inner(start, finish).await;
        metrics::record_grid_operation("read", result.is_ok());
        result
    }

    async fn read_inner(&self, start: u64, finish: Option<u64>) -> DocResult<GridPage> {
        let total = self.ordinals.count(&self.backend).await?;
        if start == SCHEMA_ORDINAL {
            return Err(DocError::Ordinal { ordinal: start, count: total });
        }
        let offset = start - 1;
        let limit = match finish {
            Some(f) => f.saturating_add(1).saturating_sub(start),
            None => total.saturating_sub(offset),
        };
        let rows = if limit == 0 {
            Vec::new()
        } else {
            let keys = self.ordinals.window(&self.backend, start, finish).await?;
            self.fetch_documents(&keys).await?
        };
        let metadata = PageMetadata::new(offset, limit, rows.len() as u64, total);
        Ok(GridPage { rows, metadata })
    }

    /// Page of at most `limit` rows skipping the first `offset`.
    pub async fn read_page(&self, offset: u64, limit: u64) -> DocResult<GridPage> {
        if limit == 0 {
            let total = self.ordinals.count(&self.backend).await?;
            return Ok(GridPage {
                rows: Vec::new(),
                metadata: PageMetadata::new(offset, 0, 0, total),
            });
        }
        self.read(offset.saturating_add(1), Some(offset.saturating_add(limit))).await
    }

    /// Row keys in ordinal order.
    pub async fn row_keys(&self) -> DocResult<Vec<String>> {
        self.ordinals.window(&self.backend, 1, None).await
    }

    /// Fetch and project records in pipelined groups, preserving order.
    /// Records that vanished since their keys were resolved are skipped.
    fn fetch_documents<'a>(&'a self, keys: &'a [String]) -> DocumentsFuture<'a> {
        Box::pin(async move {
            let mut documents = Vec::with_capacity(keys.len());
            for chunk in keys.chunks(self.fetch_batch_size) {
                let commands = chunk.iter().map(|key| self.rows.read(key)).collect();
                let replies = self.backend.pipeline(commands).await?;
                for (key, reply) in chunk.iter().zip(replies) {
                    let Some(mut raw) = self.rows.parse(&self.backend, &self.schema, key, reply)? else {
                        warn!(key = %key, "Ordered key has no record");
                        metrics::record_storage_inconsistency("read");
                        continue;
                    };
                    let links = row::take_child_links(&mut raw);
                    let mut doc = self.projector.project(&self.schema, raw);
                    if !links.is_empty() {
                        for child in self.fetch_documents(&links).await? {
                            doc.add_child(child);
                        }
                    }
                    documents.push(doc);
                }
            }
            Ok(documents)
        })
    }

    /// Row records present in the store but absent from the ordering,
    /// typically left by an append interrupted between its two phases.
    #[instrument(skip(self), fields(grid = %self.name))]
    pub async fn orphaned_rows(&self) -> DocResult<Vec<String>> {
        let pattern = format!("{}*", self.keys.row_prefix);
        let stored = self.backend.run(Command::Keys { pattern }).await?.into_list();
        let ordered: HashSet<String> = self.ordinals.members(&self.backend).await?.into_iter().collect();
        let orphans: Vec<String> = stored.into_iter().filter(|k| !ordered.contains(k)).collect();
        if !orphans.is_empty() {
            warn!(orphans = orphans.len(), "Row records without an ordinal");
        }
        Ok(orphans)
    }

    /// Delete every row, child, the schema record and the ordering.
    /// Returns the number of keys removed.
    #[instrument(skip(self), fields(grid = %self.name))]
    pub async fn drop_grid(&self) -> DocResult<u64> {
        let mut doomed = self.ordinals.members(&self.backend).await?;
        let pattern = format!("{}*", self.keys.child_prefix);
        doomed.extend(self.backend.run(Command::Keys { pattern }).await?.into_list());
        doomed.push(self.keys.ordering.clone());

        let commands = doomed
            .chunks(self.fetch_batch_size)
            .map(|chunk| Command::Del { keys: chunk.to_vec() })
            .collect();
        let removed: i64 = self.backend.pipeline(commands).await?.iter().map(|r| r.as_int()).sum();
        metrics::set_grid_rows(&self.name, 0);
        info!(removed, "Grid dropped");
        Ok(u64::try_from(removed).unwrap_or(0))
    }
}
