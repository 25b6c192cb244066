// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # DocGrid
//!
//! Typed documents stored in Redis and indexed with RediSearch, plus ordered
//! grids of those documents addressed by ordinal.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         DocEngine                           │
//! │  • schema registry (index name → DocumentSchema)            │
//! │  • ensure_index / update_schema / drop_index                │
//! │  • execute (FT.SEARCH pages) / aggregate (facets)           │
//! └─────────────────────────────────────────────────────────────┘
//!          │                    │                     │
//!          ▼                    ▼                     ▼
//! ┌─────────────────┐ ┌───────────────────┐ ┌───────────────────┐
//! │ SchemaCompiler  │ │  QueryCompiler    │ │  Grid             │
//! │ schema → FT.    │ │  criteria → query │ │  ZSET ordinals +  │
//! │ CREATE args     │ │  string, SORTBY,  │ │  hash/JSON rows,  │
//! │ + fingerprint   │ │  HIGHLIGHT, FILTER│ │  contiguous 1..N  │
//! └─────────────────┘ └───────────────────┘ └───────────────────┘
//!          │                    │                     │
//!          └────────────── FieldCodec ────────────────┘
//!                    (logical type → field variants)
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │        Backend → CommandExecutor (Redis or in-memory)       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docgrid::{DocEngine, DocGridConfig, LogicalDocument};
//! use docgrid::schema::{DocumentSchema, LogicalType, SchemaItem};
//!
//! #[tokio::main]
//! async fn main() -> docgrid::DocResult<()> {
//!     let config = DocGridConfig {
//!         redis_url: Some("redis://localhost:6379".into()),
//!         ..Default::default()
//!     };
//!     let engine = DocEngine::connect(config).await?;
//!
//!     let schema = DocumentSchema::from_items("tasks", vec![
//!         SchemaItem::new("title", LogicalType::Text).stemmed(),
//!         SchemaItem::new("done", LogicalType::Boolean),
//!     ])?;
//!     let grid = engine.create_grid("tasks", schema).await?;
//!     grid.append(&LogicalDocument::new().with("title", "write docs").with("done", "false")).await?;
//!     grid.insert_after(0, &LogicalDocument::new().with("title", "plan").with("done", "true")).await?;
//!
//!     let page = grid.read_page(0, 10).await?;
//!     for row in &page.rows {
//!         println!("{:?}", row.first("title"));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`schema`]: logical types, schema items, the field codec and registry
//! - [`search`]: criteria, schema/query/filter compilers, projection, facets
//! - [`grid`]: ordinal-addressed document grids
//! - [`storage`]: the command vocabulary and its Redis/in-memory executors
//! - [`coordinator`]: the [`DocEngine`] tying them together
//! - [`lock`]: lease locks for cross-process coordination

pub mod config;
pub mod coordinator;
pub mod document;
pub mod error;
pub mod grid;
pub mod lock;
pub mod metrics;
pub mod schema;
pub mod search;
pub mod storage;

// Note: We don't expose a `tracing` module to avoid conflict with the tracing crate

pub use config::DocGridConfig;
pub use coordinator::{DocEngine, IndexAction, SearchPage};
pub use document::{FieldValue, LogicalDocument};
pub use error::{DocError, DocResult};
pub use grid::{Grid, GridPage, GridState, PageMetadata};
pub use lock::LeaseLock;
pub use crate::metrics::LatencyTimer;
pub use schema::{DocumentSchema, LogicalType, SchemaItem};
pub use search::{Criteria, Operator, StorageKind};
pub use storage::{Backend, StorageError};
