// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Public types for the engine coordinator.

use serde::Serialize;

use crate::document::LogicalDocument;
use crate::grid::PageMetadata;

/// What [`ensure_index`](super::DocEngine::ensure_index) did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IndexAction {
    /// No previous record; FT.CREATE issued.
    Created,
    /// Persisted fingerprint matched; nothing sent.
    Unchanged,
    /// Fingerprint differed; index dropped and recreated.
    Rebuilt,
}

impl std::fmt::Display for IndexAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Unchanged => write!(f, "Unchanged"),
            Self::Rebuilt => write!(f, "Rebuilt"),
        }
    }
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchPage {
    pub documents: Vec<LogicalDocument>,
    pub metadata: PageMetadata,
    /// The query string sent to the engine.
    pub query: String,
}

impl SearchPage {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
