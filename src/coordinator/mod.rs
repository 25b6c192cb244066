// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Engine coordinator.
//!
//! [`DocEngine`] ties the compilers, the schema registry and the grid storage
//! to one [`Backend`]:
//!
//! - **schema**: compile, create/rebuild indexes, persist and update schemas
//! - **search**: compile criteria, run FT.SEARCH pages, facet aggregations
//! - **grids**: create and open ordered grids sharing the engine's backend
//!
//! # Example
//!
//! ```rust,no_run
//! use docgrid::{DocEngine, DocGridConfig, LogicalDocument};
//! use docgrid::schema::{DocumentSchema, LogicalType, SchemaItem};
//! use docgrid::search::{Criteria, Operator};
//!
//! # #[tokio::main]
//! # async fn main() -> docgrid::DocResult<()> {
//! let config = DocGridConfig {
//!     redis_url: Some("redis://localhost:6379".into()),
//!     ..Default::default()
//! };
//! let engine = DocEngine::connect(config).await?;
//!
//! let schema = DocumentSchema::from_items("people", vec![
//!     SchemaItem::new("id", LogicalType::Integer).primary(),
//!     SchemaItem::new("name", LogicalType::Text).stemmed(),
//! ])?;
//! let grid = engine.create_grid("people", schema).await?;
//! grid.append(&LogicalDocument::new().with("id", "1").with("name", "Ann")).await?;
//! engine.create_grid_index(&grid, None).await?;
//!
//! let mut criteria = Criteria::new().and("name", Operator::Equal, ["Ann"]);
//! let page = engine.execute("people", &mut criteria, None, None).await?;
//! println!("{} of {}", page.documents.len(), page.metadata.total_count);
//! # Ok(())
//! # }
//! ```

mod grid_api;
mod schema_api;
mod search_api;
mod types;

pub use types::{IndexAction, SearchPage};

use std::sync::Arc;

use tracing::info;

use crate::config::DocGridConfig;
use crate::error::{DocError, DocResult};
use crate::schema::field_codec::FieldCodec;
use crate::schema::{DocumentSchema, SchemaRegistry};
use crate::search::{QueryCompiler, ResultProjector, SchemaCompiler};
use crate::storage::{Backend, RedisExecutor, StorageError};

/// Document grid engine.
///
/// `Send + Sync`; every operation takes `&self`.
pub struct DocEngine {
    pub(super) config: DocGridConfig,
    pub(super) backend: Backend,
    pub(super) registry: SchemaRegistry,
    pub(super) schema_compiler: SchemaCompiler,
    pub(super) query_compiler: QueryCompiler,
    pub(super) projector: ResultProjector,
}

impl std::fmt::Debug for DocEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocEngine")
            .field("key_prefix", &self.config.key_prefix)
            .field("storage_kind", &self.config.storage_kind)
            .field("indexes", &self.registry.indexes())
            .finish_non_exhaustive()
    }
}

impl DocEngine {
    /// Engine over an existing backend.
    #[must_use]
    pub fn new(config: DocGridConfig, backend: Backend) -> Self {
        let codec = FieldCodec::new(config.default_weight);
        Self {
            schema_compiler: SchemaCompiler::new(&config),
            query_compiler: QueryCompiler::new(codec.clone()),
            projector: ResultProjector::new(codec),
            registry: SchemaRegistry::new(),
            backend,
            config,
        }
    }

    /// Connect to `config.redis_url`.
    pub async fn connect(config: DocGridConfig) -> DocResult<Self> {
        let url = config
            .redis_url
            .clone()
            .ok_or_else(|| StorageError::Connection("redis_url is not configured".into()))?;
        let executor = RedisExecutor::connect(&url).await?;
        info!(prefix = %config.key_prefix, storage = config.storage_kind.as_str(), "Engine connected");
        Ok(Self::new(config, Backend::new(Arc::new(executor))))
    }

    #[must_use]
    pub fn config(&self) -> &DocGridConfig {
        &self.config
    }

    #[must_use]
    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    #[must_use]
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    #[must_use]
    pub fn schema_compiler(&self) -> &SchemaCompiler {
        &self.schema_compiler
    }

    #[must_use]
    pub fn query_compiler(&self) -> &QueryCompiler {
        &self.query_compiler
    }

    /// Registered schema of `index`.
    pub fn schema(&self, index: &str) -> DocResult<Arc<DocumentSchema>> {
        self.registry
            .get(index)
            .ok_or_else(|| DocError::schema(index, "index has no registered schema"))
    }

    /// Key of the persisted schema record of `index`.
    #[must_use]
    pub fn schema_key(&self, index: &str) -> String {
        format!("{}schema:{}", self.config.key_prefix, index)
    }
}
