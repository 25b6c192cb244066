// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Grid API: grids sharing the engine's backend and configuration.

use std::time::Duration;

use crate::error::DocResult;
use crate::grid::Grid;
use crate::lock::LeaseLock;
use crate::schema::DocumentSchema;
use crate::search::Criteria;

use super::{DocEngine, IndexAction};

impl DocEngine {
    /// Create a grid (ordinal 0 = schema record).
    pub async fn create_grid(&self, name: &str, schema: DocumentSchema) -> DocResult<Grid> {
        Grid::create(self.backend.clone(), &self.config, name, schema).await
    }

    /// Open a grid from its persisted schema.
    pub async fn open_grid(&self, name: &str) -> DocResult<Grid> {
        Grid::open(self.backend.clone(), &self.config, name).await
    }

    /// Ensure a search index over the grid's rows, named after the grid.
    pub async fn create_grid_index(&self, grid: &Grid, filter: Option<&Criteria>) -> DocResult<IndexAction> {
        self.ensure_index(grid.name(), grid.row_prefix(), grid.schema(), filter)
            .await
    }

    /// Take the lease lock `name` with the configured lease and wait budget.
    pub async fn lock(&self, name: &str) -> DocResult<LeaseLock> {
        LeaseLock::acquire(
            &self.backend,
            &self.config.key_prefix,
            name,
            Duration::from_millis(self.config.lock_lease_ms),
            Duration::from_millis(self.config.lock_wait_ms),
        )
        .await
    }
}
