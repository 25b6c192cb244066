// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search Infrastructure
//!
//! Schema and query compilation for RediSearch, plus result projection.
//!
//! # Architecture
//!
//! ```text
//! DocumentSchema ──→ SchemaCompiler ──→ IndexDescriptor ──→ FT.CREATE
//!                         │
//!                         └─→ filter (FILTER expression)
//!
//! Criteria ──→ QueryCompiler ──→ query string + SORTBY/HIGHLIGHT/SUMMARIZE ──→ FT.SEARCH
//!          └─→ facet ──→ FT.AGGREGATE per facet field ──→ FacetReport
//!
//! FT.SEARCH hits / grid rows ──→ ResultProjector ──→ LogicalDocument
//! ```
//!
//! # Query Language (RediSearch syntax)
//!
//! ```text
//! @age:[25 40]              - Numeric range
//! @tags_tag:{rust|database} - Tag membership (OR)
//! @name_stem:Alice          - Full-text (stemmed variant)
//! a b                       - Boolean AND
//! (a | b)                   - Boolean OR
//! -a                        - Boolean NOT
//! ```

pub mod criteria;
pub mod facet;
pub mod filter;
pub mod projector;
pub mod query_compiler;
pub mod schema_compiler;

pub use criteria::{Connector, Criteria, Criterion, Operator};
pub use facet::{FacetGrid, FacetPresentation, FacetReport, FacetResult, FacetRow, FacetTreeNode, FacetValue};
pub use filter::compile_filter;
pub use projector::{RawRow, RawValue, ResultProjector};
pub use query_compiler::{escape_tag, unescape_tag, CompiledQuery, QueryCompiler, SortSpec, MATCH_ALL};
pub use schema_compiler::{IndexDescriptor, IndexOptions, SchemaCompiler, Stopwords, StorageKind};
