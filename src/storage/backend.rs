// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Executor handle shared by the grid and the coordinator.
//!
//! Every command goes through [`Backend`], which records its text in the
//! audit sink before handing it to the executor. Row values pass through the
//! [`ValueTransform`] hook on the way in and out.

use std::sync::Arc;

use super::command::{AggregateReply, Command, Reply, SearchReply};
use super::traits::{CommandAudit, CommandExecutor, NoAudit, NoTransform, StorageError, ValueTransform};

#[derive(Clone)]
pub struct Backend {
    executor: Arc<dyn CommandExecutor>,
    transform: Arc<dyn ValueTransform>,
    audit: Arc<dyn CommandAudit>,
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend").finish_non_exhaustive()
    }
}

impl Backend {
    /// Backend with identity transform and no audit.
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            executor,
            transform: Arc::new(NoTransform),
            audit: Arc::new(NoAudit),
        }
    }

    #[must_use]
    pub fn with_transform(mut self, transform: Arc<dyn ValueTransform>) -> Self {
        self.transform = transform;
        self
    }

    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn CommandAudit>) -> Self {
        self.audit = audit;
        self
    }

    pub fn executor(&self) -> &Arc<dyn CommandExecutor> {
        &self.executor
    }

    pub(crate) fn before_write(&self, value: &str) -> String {
        self.transform.before_write(value)
    }

    pub(crate) fn after_read(&self, value: &str) -> String {
        self.transform.after_read(value)
    }

    pub async fn run(&self, command: Command) -> Result<Reply, StorageError> {
        self.audit.record(&command.to_string());
        self.executor.execute(command).await
    }

    pub async fn pipeline(&self, commands: Vec<Command>) -> Result<Vec<Reply>, StorageError> {
        if commands.is_empty() {
            return Ok(Vec::new());
        }
        for command in &commands {
            self.audit.record(&command.to_string());
        }
        self.executor.pipeline(commands).await
    }

    pub async fn transaction(&self, commands: Vec<Command>) -> Result<Vec<Reply>, StorageError> {
        if commands.is_empty() {
            return Ok(Vec::new());
        }
        self.audit.record("MULTI");
        for command in &commands {
            self.audit.record(&command.to_string());
        }
        self.audit.record("EXEC");
        self.executor.transaction(commands).await
    }

    pub async fn create_index(&self, args: &[String]) -> Result<(), StorageError> {
        self.audit.record(&format!("FT.CREATE {}", args.join(" ")));
        self.executor.ft_create(args).await
    }

    pub async fn drop_index(&self, index: &str, delete_documents: bool) -> Result<(), StorageError> {
        let suffix = if delete_documents { " DD" } else { "" };
        self.audit.record(&format!("FT.DROPINDEX {}{}", index, suffix));
        self.executor.ft_dropindex(index, delete_documents).await
    }

    pub async fn search(&self, index: &str, args: &[String]) -> Result<SearchReply, StorageError> {
        self.audit.record(&format!("FT.SEARCH {} {}", index, args.join(" ")));
        self.executor.ft_search(index, args).await
    }

    pub async fn aggregate(&self, index: &str, args: &[String]) -> Result<AggregateReply, StorageError> {
        self.audit.record(&format!("FT.AGGREGATE {} {}", index, args.join(" ")));
        self.executor.ft_aggregate(index, args).await
    }

    pub async fn dump_synonyms(&self, index: &str) -> Result<Vec<(String, Vec<String>)>, StorageError> {
        self.audit.record(&format!("FT.SYNDUMP {}", index));
        self.executor.ft_syndump(index).await
    }

    pub async fn update_synonyms(
        &self,
        index: &str,
        group_id: &str,
        terms: &[String],
    ) -> Result<(), StorageError> {
        self.audit.record(&format!("FT.SYNUPDATE {} {} {}", index, group_id, terms.join(" ")));
        self.executor.ft_synupdate(index, group_id, terms).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::InMemoryExecutor;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct CollectingAudit(Mutex<Vec<String>>);

    impl CommandAudit for CollectingAudit {
        fn record(&self, command_text: &str) {
            self.0.lock().push(command_text.to_string());
        }
    }

    struct Reverse;

    impl ValueTransform for Reverse {
        fn before_write(&self, value: &str) -> String {
            value.chars().rev().collect()
        }
        fn after_read(&self, value: &str) -> String {
            value.chars().rev().collect()
        }
    }

    #[tokio::test]
    async fn test_transaction_is_audited_in_order() {
        let audit = Arc::new(CollectingAudit::default());
        let backend = Backend::new(Arc::new(InMemoryExecutor::new())).with_audit(audit.clone());

        backend
            .transaction(vec![
                Command::ZAdd { key: "z".into(), score: 1.0, member: "a".into() },
                Command::ZInsertOrdinal { key: "z".into(), member: "b".into(), at: Some(1) },
            ])
            .await
            .unwrap();

        let records = audit.0.lock().clone();
        assert_eq!(records, vec!["MULTI", "ZADD z 1 a", "EVAL <insert> 1 z b 1", "EXEC"]);
    }

    #[tokio::test]
    async fn test_empty_batches_skip_executor() {
        let audit = Arc::new(CollectingAudit::default());
        let backend = Backend::new(Arc::new(InMemoryExecutor::new())).with_audit(audit.clone());
        assert!(backend.pipeline(vec![]).await.unwrap().is_empty());
        assert!(backend.transaction(vec![]).await.unwrap().is_empty());
        assert!(audit.0.lock().is_empty());
    }

    #[test]
    fn test_transform_hooks() {
        let backend = Backend::new(Arc::new(InMemoryExecutor::new())).with_transform(Arc::new(Reverse));
        let wire = backend.before_write("abc");
        assert_eq!(wire, "cba");
        assert_eq!(backend.after_read(&wire), "abc");
    }
}
