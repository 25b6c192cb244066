// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error taxonomy for schema compilation, query compilation and grid storage.
//!
//! Validation errors ([`DocError::is_validation`]) indicate a caller
//! programming error and are never retried. Transport errors come from the
//! command executor and are surfaced unchanged.
//!
//! Storage inconsistencies (a delete touching fewer rows than expected) are
//! not errors: they are logged with `warn!` and counted in metrics.

use thiserror::Error;

use crate::storage::traits::StorageError;

/// Result alias used throughout the crate.
pub type DocResult<T> = Result<T, DocError>;

#[derive(Error, Debug)]
pub enum DocError {
    /// Unrecognized logical type, secret field indexed, duplicate primary, ...
    #[error("schema error on field '{field}': {reason}")]
    Schema { field: String, reason: String },

    /// Engine-imposed ceiling exceeded before FT.CREATE was issued.
    #[error("schema limit exceeded: {count} {what} (ceiling {ceiling})")]
    SchemaLimit {
        what: &'static str,
        count: usize,
        ceiling: usize,
    },

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("operator {operator} on '{field}' expects {expected} value(s), got {actual}")]
    Arity {
        field: String,
        operator: String,
        expected: &'static str,
        actual: usize,
    },

    #[error("value '{value}' for field '{field}' is not a valid {expected}")]
    Type {
        field: String,
        value: String,
        expected: &'static str,
    },

    #[error("operator {operator} is not supported on field '{field}'")]
    UnsupportedOperator { field: String, operator: String },

    #[error("ordinal {ordinal} is outside the grid (row count {count})")]
    Ordinal { ordinal: u64, count: u64 },

    #[error("grid '{0}' has no schema record")]
    GridMissing(String),

    #[error("lock error: {0}")]
    Lock(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Transport(#[from] StorageError),
}

impl DocError {
    pub(crate) fn schema(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Schema {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error is a local validation failure (caller error).
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Schema { .. }
                | Self::SchemaLimit { .. }
                | Self::UnknownField(_)
                | Self::Arity { .. }
                | Self::Type { .. }
                | Self::UnsupportedOperator { .. }
                | Self::Ordinal { .. }
        )
    }

    /// Short label for metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Schema { .. } => "schema",
            Self::SchemaLimit { .. } => "schema_limit",
            Self::UnknownField(_) => "unknown_field",
            Self::Arity { .. } => "arity",
            Self::Type { .. } => "type",
            Self::UnsupportedOperator { .. } => "operator",
            Self::Ordinal { .. } => "ordinal",
            Self::GridMissing(_) => "grid_missing",
            Self::Lock(_) => "lock",
            Self::Serialization(_) => "serialization",
            Self::Transport(_) => "transport",
        }
    }
}

impl From<serde_json::Error> for DocError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
