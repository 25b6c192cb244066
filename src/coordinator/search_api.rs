// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search API for DocEngine
//!
//! # Architecture
//!
//! ```text
//! execute(index, criteria, offset, limit)
//!       │
//!       ├─→ QueryCompiler (registered schema) ──→ query + SORTBY/HIGHLIGHT/SUMMARIZE
//!       ├─→ FT.SEARCH index query ... LIMIT offset limit
//!       └─→ ResultProjector ──→ SearchPage { documents, metadata }
//!
//! aggregate(index, criteria, presentation)
//!       │
//!       ├─→ one FT.AGGREGATE GROUPBY per FACET field
//!       └─→ FacetReport (flat grid or tree)
//! ```

use std::time::Instant;

use tracing::{debug, info, instrument};

use crate::error::{DocError, DocResult};
use crate::grid::PageMetadata;
use crate::metrics;
use crate::search::facet::{aggregate_args, build_report, facet_alias, project_facet};
use crate::search::query_compiler::CompiledQuery;
use crate::search::projector::text_transform;
use crate::search::{Criteria, FacetPresentation, FacetReport, Operator, RawRow};
use crate::storage::Command;

use super::{DocEngine, SearchPage};

/// FT.SEARCH arguments after the index name.
pub(crate) fn search_args(compiled: &CompiledQuery, offset: usize, limit: usize) -> Vec<String> {
    let mut args = vec![compiled.query.clone()];
    for (keyword, fields) in [("SUMMARIZE", &compiled.snippet), ("HIGHLIGHT", &compiled.highlight)] {
        if fields.is_empty() {
            continue;
        }
        args.push(keyword.to_string());
        args.push("FIELDS".to_string());
        args.push(fields.len().to_string());
        args.extend(fields.iter().cloned());
    }
    if let Some(sort) = &compiled.sort {
        args.push("SORTBY".to_string());
        args.push(sort.alias.clone());
        args.push(if sort.ascending { "ASC" } else { "DESC" }.to_string());
    }
    args.push("LIMIT".to_string());
    args.push(offset.to_string());
    args.push(limit.to_string());
    args
}

impl DocEngine {
    /// Compile `criteria` against the schema of `index`. The query string is
    /// also cached on `criteria` for inspection.
    pub fn compile_query(&self, index: &str, criteria: &mut Criteria) -> DocResult<String> {
        let schema = self.schema(index)?;
        Ok(self.query_compiler.compile_and_annotate(criteria, &schema)?.query)
    }

    /// Run one page of a search.
    ///
    /// `offset`/`limit` default to the criteria's meta entries, then to 0 and
    /// the configured page size.
    #[instrument(skip(self, criteria))]
    pub async fn execute(
        &self,
        index: &str,
        criteria: &mut Criteria,
        offset: Option<usize>,
        limit: Option<usize>,
    ) -> DocResult<SearchPage> {
        let start = Instant::now();
        let result = self.execute_inner(index, criteria, offset, limit).await;
        metrics::record_search_latency("search", start.elapsed());
        metrics::record_search_query("search", result.is_ok());
        if let Ok(page) = &result {
            metrics::record_search_results(page.documents.len());
        }
        result
    }

    async fn execute_inner(
        &self,
        index: &str,
        criteria: &mut Criteria,
        offset: Option<usize>,
        limit: Option<usize>,
    ) -> DocResult<SearchPage> {
        let schema = self.schema(index)?;
        let offset = match offset {
            Some(o) => o,
            None => criteria.offset()?.unwrap_or(0),
        };
        let limit = match limit {
            Some(l) => l,
            None => criteria.limit()?.unwrap_or(self.config.default_search_limit),
        };

        let compiled = self.query_compiler.compile_and_annotate(criteria, &schema)?;
        let args = search_args(&compiled, offset, limit);
        debug!(index = %index, args = ?args, "FT.SEARCH");
        let reply = self.backend.search(index, &args).await?;

        let transform = text_transform(&self.backend, &schema);
        let mut documents = Vec::with_capacity(reply.hits.len());
        for hit in &reply.hits {
            let row = RawRow::from_hit(hit, &transform)?;
            documents.push(self.projector.project(&schema, row));
        }
        let metadata = PageMetadata::new(offset as u64, limit as u64, documents.len() as u64, reply.total);
        Ok(SearchPage {
            documents,
            metadata,
            query: compiled.query,
        })
    }

    /// Facet counts for every FACET criterion, over documents matching the
    /// rest of `criteria`.
    #[instrument(skip(self, criteria))]
    pub async fn aggregate(
        &self,
        index: &str,
        criteria: &mut Criteria,
        presentation: FacetPresentation,
    ) -> DocResult<FacetReport> {
        let start = Instant::now();
        let result = self.aggregate_inner(index, criteria, presentation).await;
        metrics::record_search_latency("aggregate", start.elapsed());
        metrics::record_search_query("aggregate", result.is_ok());
        result
    }

    async fn aggregate_inner(
        &self,
        index: &str,
        criteria: &mut Criteria,
        presentation: FacetPresentation,
    ) -> DocResult<FacetReport> {
        let schema = self.schema(index)?;
        let compiled = self.query_compiler.compile_and_annotate(criteria, &schema)?;
        let codec = self.schema_compiler.codec();

        let mut facets = Vec::with_capacity(compiled.facets.len());
        for name in &compiled.facets {
            let item = schema.require(name)?;
            let alias = facet_alias(codec, item)?.ok_or_else(|| DocError::UnsupportedOperator {
                field: item.name.clone(),
                operator: Operator::Facet.to_string(),
            })?;
            let args = aggregate_args(&compiled.query, &alias, self.config.facet_value_limit);
            let reply = self.backend.aggregate(index, &args).await?;
            facets.push(project_facet(item, &alias, &reply));
        }
        debug!(index = %index, facets = facets.len(), "Facets aggregated");
        Ok(build_report(facets, presentation))
    }

    /// Drop `index`, optionally with its documents, and forget its schema.
    #[instrument(skip(self))]
    pub async fn drop_index(&self, index: &str, delete_documents: bool) -> DocResult<()> {
        let result = self.backend.drop_index(index, delete_documents).await;
        metrics::record_index_operation("drop", result.is_ok());
        result?;
        self.backend
            .run(Command::Del {
                keys: vec![self.schema_key(index)],
            })
            .await?;
        self.registry.unregister(index);
        info!(index = %index, delete_documents, "Search index dropped");
        Ok(())
    }

    /// Synonym groups of `index`: `(term, group ids)`.
    pub async fn dump_synonyms(&self, index: &str) -> DocResult<Vec<(String, Vec<String>)>> {
        Ok(self.backend.dump_synonyms(index).await?)
    }

    /// Add `terms` to synonym group `group_id`.
    pub async fn update_synonyms(&self, index: &str, group_id: &str, terms: &[String]) -> DocResult<()> {
        let result = self.backend.update_synonyms(index, group_id, terms).await;
        metrics::record_index_operation("synonyms", result.is_ok());
        Ok(result?)
    }
}
