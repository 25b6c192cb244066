// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Collaborator boundaries: the command executor, the value transform hook
//! and the command-audit sink.

use async_trait::async_trait;
use thiserror::Error;
use tracing::trace;

use super::command::{AggregateReply, Command, Reply, SearchReply};

/// Opaque transport failure, never interpreted by the core.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Unexpected reply to {command}: {detail}")]
    Protocol { command: String, detail: String },
    #[error("Operation not supported by this executor: {0}")]
    Unsupported(String),
}

/// Executes store and search-engine commands.
///
/// Implementations own connection lifecycle and any retry policy; the core
/// issues each call once and surfaces failures unchanged.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, command: Command) -> Result<Reply, StorageError>;

    /// Send commands in one round-trip, replies in order. Not atomic.
    /// Default implementation falls back to sequential execution.
    async fn pipeline(&self, commands: Vec<Command>) -> Result<Vec<Reply>, StorageError> {
        let mut replies = Vec::with_capacity(commands.len());
        for command in commands {
            replies.push(self.execute(command).await?);
        }
        Ok(replies)
    }

    /// Execute all commands atomically (MULTI/EXEC), replies in order.
    async fn transaction(&self, commands: Vec<Command>) -> Result<Vec<Reply>, StorageError>;

    async fn ft_create(&self, args: &[String]) -> Result<(), StorageError>;

    async fn ft_dropindex(&self, index: &str, delete_documents: bool) -> Result<(), StorageError>;

    /// FT.SEARCH `index` followed by `args` (query string first).
    async fn ft_search(&self, index: &str, args: &[String]) -> Result<SearchReply, StorageError>;

    /// FT.AGGREGATE `index` followed by `args` (query string first).
    async fn ft_aggregate(&self, index: &str, args: &[String]) -> Result<AggregateReply, StorageError>;

    /// FT.SYNDUMP: term → synonym group ids.
    async fn ft_syndump(&self, index: &str) -> Result<Vec<(String, Vec<String>)>, StorageError>;

    async fn ft_synupdate(&self, index: &str, group_id: &str, terms: &[String]) -> Result<(), StorageError>;
}

/// At-rest value transformation (e.g. encryption), applied to every row value.
pub trait ValueTransform: Send + Sync {
    fn before_write(&self, value: &str) -> String;
    fn after_read(&self, value: &str) -> String;
}

/// Identity transform.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTransform;

impl ValueTransform for NoTransform {
    fn before_write(&self, value: &str) -> String {
        value.to_string()
    }

    fn after_read(&self, value: &str) -> String {
        value.to_string()
    }
}

/// Fire-and-forget sink for the text of every command issued.
pub trait CommandAudit: Send + Sync {
    fn record(&self, command_text: &str);
}

/// Discards audit records.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAudit;

impl CommandAudit for NoAudit {
    fn record(&self, _command_text: &str) {}
}

/// Emits each command at `trace` level under the `docgrid::audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAudit;

impl CommandAudit for TracingAudit {
    fn record(&self, command_text: &str) {
        trace!(target: "docgrid::audit", command = %command_text);
    }
}
