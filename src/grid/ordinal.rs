// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Ordinal index: ordinal → row key, kept in one sorted set.
//!
//! ```text
//! {prefix}grid:{name}:ordinals   ZSET
//!   score 0   {prefix}grid:{name}:schema     (reserved schema slot)
//!   score 1   {prefix}grid:{name}:row:<uuid>
//!   score 2   {prefix}grid:{name}:row:<uuid>
//!   ...
//! ```
//!
//! The index knows nothing about how rows are stored. It only reads member
//! windows and builds the placement commands the grid sends. Placing and
//! removing a row move the rest of the set in the same server-side step, so
//! concurrent writers never observe a gap or a duplicate ordinal.

use crate::error::DocResult;
use crate::storage::{Backend, Command, ScoreBound};

/// Ordinal reserved for the schema record.
pub const SCHEMA_ORDINAL: u64 = 0;

#[derive(Debug, Clone)]
pub struct OrdinalIndex {
    key: String,
    schema_member: String,
}

impl OrdinalIndex {
    #[must_use]
    pub fn new(key: String, schema_member: String) -> Self {
        Self { key, schema_member }
    }

    /// Key of the sorted set.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn schema_member(&self) -> &str {
        &self.schema_member
    }

    /// Members including the schema slot; 0 when the grid is absent.
    pub async fn cardinality(&self, backend: &Backend) -> DocResult<u64> {
        let reply = backend.run(Command::ZCard { key: self.key.clone() }).await?;
        Ok(u64::try_from(reply.as_int()).unwrap_or(0))
    }

    /// Row count, schema slot excluded. Never negative.
    pub async fn count(&self, backend: &Backend) -> DocResult<u64> {
        Ok(self.cardinality(backend).await?.saturating_sub(1))
    }

    /// Row key at `ordinal`.
    pub async fn key_at(&self, backend: &Backend, ordinal: u64) -> DocResult<Option<String>> {
        let score = ordinal as f64;
        let members = backend
            .run(Command::ZRangeByScore {
                key: self.key.clone(),
                min: ScoreBound::Inclusive(score),
                max: ScoreBound::Inclusive(score),
            })
            .await?
            .into_list();
        Ok(members.into_iter().next())
    }

    /// Row keys in `[start, finish]`, ordinal order. `None` reads to the end.
    pub async fn window(&self, backend: &Backend, start: u64, finish: Option<u64>) -> DocResult<Vec<String>> {
        let max = finish.map_or(ScoreBound::PosInf, |f| ScoreBound::Inclusive(f as f64));
        let members = backend
            .run(Command::ZRangeByScore {
                key: self.key.clone(),
                min: ScoreBound::Inclusive(start as f64),
                max,
            })
            .await?
            .into_list();
        Ok(members)
    }

    /// Every member, schema slot included.
    pub async fn members(&self, backend: &Backend) -> DocResult<Vec<String>> {
        let members = backend
            .run(Command::ZRangeByScore {
                key: self.key.clone(),
                min: ScoreBound::NegInf,
                max: ScoreBound::PosInf,
            })
            .await?
            .into_list();
        Ok(members)
    }

    #[must_use]
    pub fn assign(&self, row_key: &str, ordinal: u64) -> Command {
        Command::ZAdd {
            key: self.key.clone(),
            score: ordinal as f64,
            member: row_key.to_string(),
        }
    }

    #[must_use]
    pub fn assign_schema(&self) -> Command {
        self.assign(&self.schema_member, SCHEMA_ORDINAL)
    }

    /// Place `row_key` at `ordinal`, moving later rows up by one; `None`
    /// places it after the last row. The reply is the ordinal given, or -1
    /// when the grid is gone or `ordinal` lies past its end.
    #[must_use]
    pub fn insert(&self, row_key: &str, ordinal: Option<u64>) -> Command {
        Command::ZInsertOrdinal {
            key: self.key.clone(),
            member: row_key.to_string(),
            at: ordinal,
        }
    }

    /// Remove `row_key` and move later rows down by one. The reply is the
    /// number of rows moved, or -1 when `row_key` had no ordinal.
    #[must_use]
    pub fn remove(&self, row_key: &str) -> Command {
        Command::ZRemoveOrdinal {
            key: self.key.clone(),
            member: row_key.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryExecutor;
    use std::sync::Arc;

    fn setup() -> (Backend, OrdinalIndex) {
        let backend = Backend::new(Arc::new(InMemoryExecutor::new()));
        (backend, OrdinalIndex::new("g:ordinals".into(), "g:schema".into()))
    }

    #[tokio::test]
    async fn test_empty_index() {
        let (backend, index) = setup();
        assert_eq!(index.count(&backend).await.unwrap(), 0);
        assert_eq!(index.key_at(&backend, 1).await.unwrap(), None);
        assert_eq!(backend.run(index.insert("r1", None)).await.unwrap().as_int(), -1);
    }

    #[tokio::test]
    async fn test_count_excludes_schema_slot() {
        let (backend, index) = setup();
        backend.run(index.assign_schema()).await.unwrap();
        assert_eq!(index.count(&backend).await.unwrap(), 0);

        assert_eq!(backend.run(index.insert("r1", None)).await.unwrap().as_int(), 1);
        assert_eq!(backend.run(index.insert("r2", None)).await.unwrap().as_int(), 2);
        assert_eq!(index.count(&backend).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_windows() {
        let (backend, index) = setup();
        backend.run(index.assign_schema()).await.unwrap();
        for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
            backend.run(index.assign(key, i as u64 + 1)).await.unwrap();
        }
        assert_eq!(index.window(&backend, 2, Some(3)).await.unwrap(), vec!["b", "c"]);
        assert_eq!(index.window(&backend, 3, None).await.unwrap(), vec!["c", "d"]);
        assert_eq!(index.key_at(&backend, 4).await.unwrap().as_deref(), Some("d"));
        assert_eq!(index.members(&backend).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_insert_and_remove_move_the_tail() {
        let (backend, index) = setup();
        backend.run(index.assign_schema()).await.unwrap();
        for key in ["a", "b", "c"] {
            backend.run(index.insert(key, None)).await.unwrap();
        }

        assert_eq!(backend.run(index.insert("x", Some(2))).await.unwrap().as_int(), 2);
        assert_eq!(index.window(&backend, 1, None).await.unwrap(), vec!["a", "x", "b", "c"]);
        assert_eq!(backend.run(index.insert("y", Some(6))).await.unwrap().as_int(), -1);

        assert_eq!(backend.run(index.remove("a")).await.unwrap().as_int(), 3);
        assert_eq!(index.window(&backend, 1, None).await.unwrap(), vec!["x", "b", "c"]);
        assert_eq!(index.key_at(&backend, 3).await.unwrap().as_deref(), Some("c"));
        assert_eq!(backend.run(index.remove("a")).await.unwrap().as_int(), -1);
    }
}
