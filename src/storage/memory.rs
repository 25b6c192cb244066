// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-process command executor.
//!
//! Implements strings, hashes, sorted sets and JSON documents with the same
//! reply shapes as Redis. Search commands are recorded and answered from a
//! queue of scripted replies, which makes the query path testable without a
//! search engine.
//!
//! All state sits behind one mutex so transactions are trivially atomic.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::command::{AggregateReply, Command, Reply, SearchReply};
use super::traits::{CommandExecutor, StorageError};

#[derive(Debug, Clone)]
enum Stored {
    Text(String),
    Hash(Vec<(String, String)>),
    Sorted(HashMap<String, f64>),
    Json(String),
}

#[derive(Default)]
struct State {
    data: HashMap<String, Stored>,
    expiry: HashMap<String, Instant>,
}

impl State {
    fn purge(&mut self, key: &str) {
        if let Some(deadline) = self.expiry.get(key) {
            if Instant::now() >= *deadline {
                self.expiry.remove(key);
                self.data.remove(key);
            }
        }
    }

    fn get(&mut self, key: &str) -> Option<&Stored> {
        self.purge(key);
        self.data.get(key)
    }

    fn remove(&mut self, key: &str) -> bool {
        self.purge(key);
        self.expiry.remove(key);
        self.data.remove(key).is_some()
    }
}

#[derive(Default)]
struct SearchState {
    indexes: HashMap<String, Vec<String>>,
    synonyms: HashMap<String, BTreeMap<String, Vec<String>>>,
    search_replies: VecDeque<SearchReply>,
    aggregate_replies: VecDeque<AggregateReply>,
    search_log: Vec<(String, Vec<String>)>,
    aggregate_log: Vec<(String, Vec<String>)>,
}

pub struct InMemoryExecutor {
    state: Mutex<State>,
    search: Mutex<SearchState>,
}

impl InMemoryExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            search: Mutex::new(SearchState::default()),
        }
    }

    /// Number of live keys.
    #[must_use]
    pub fn len(&self) -> usize {
        let mut state = self.state.lock();
        let keys: Vec<String> = state.data.keys().cloned().collect();
        for key in &keys {
            state.purge(key);
        }
        state.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all keys (search state is kept).
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.data.clear();
        state.expiry.clear();
    }

    /// FT.CREATE arguments recorded for `index`, if it exists.
    #[must_use]
    pub fn index_args(&self, index: &str) -> Option<Vec<String>> {
        self.search.lock().indexes.get(index).cloned()
    }

    /// Queue the reply returned by the next FT.SEARCH.
    pub fn push_search_reply(&self, reply: SearchReply) {
        self.search.lock().search_replies.push_back(reply);
    }

    /// Queue the reply returned by the next FT.AGGREGATE.
    pub fn push_aggregate_reply(&self, reply: AggregateReply) {
        self.search.lock().aggregate_replies.push_back(reply);
    }

    /// Every FT.SEARCH issued so far: (index, args).
    #[must_use]
    pub fn search_log(&self) -> Vec<(String, Vec<String>)> {
        self.search.lock().search_log.clone()
    }

    /// Every FT.AGGREGATE issued so far: (index, args).
    #[must_use]
    pub fn aggregate_log(&self) -> Vec<(String, Vec<String>)> {
        self.search.lock().aggregate_log.clone()
    }

    fn wrong_type(command: &Command) -> StorageError {
        StorageError::Backend(format!(
            "WRONGTYPE Operation against a key holding the wrong kind of value ({})",
            command.name()
        ))
    }

    fn apply(state: &mut State, command: Command) -> Result<Reply, StorageError> {
        match command {
            Command::Get { ref key } => match state.get(key) {
                None => Ok(Reply::Nil),
                Some(Stored::Text(s)) => Ok(Reply::Text(s.clone())),
                Some(_) => Err(Self::wrong_type(&command)),
            },
            Command::Set { key, value } => {
                state.expiry.remove(&key);
                state.data.insert(key, Stored::Text(value));
                Ok(Reply::Ok)
            }
            Command::SetNxPx { key, value, ttl_ms } => {
                if state.get(&key).is_some() {
                    return Ok(Reply::Nil);
                }
                state
                    .expiry
                    .insert(key.clone(), Instant::now() + Duration::from_millis(ttl_ms));
                state.data.insert(key, Stored::Text(value));
                Ok(Reply::Ok)
            }
            Command::CompareAndDelete { key, token } => {
                let matches = matches!(state.get(&key), Some(Stored::Text(s)) if *s == token);
                if matches {
                    state.remove(&key);
                    Ok(Reply::Int(1))
                } else {
                    Ok(Reply::Int(0))
                }
            }
            Command::Del { keys } => {
                let removed = keys.iter().filter(|k| state.remove(k)).count();
                Ok(Reply::Int(removed as i64))
            }
            Command::Exists { key } => Ok(Reply::Int(i64::from(state.get(&key).is_some()))),
            Command::ZAdd { ref key, score, ref member } => {
                state.purge(key);
                let entry = state
                    .data
                    .entry(key.clone())
                    .or_insert_with(|| Stored::Sorted(HashMap::new()));
                match entry {
                    Stored::Sorted(set) => {
                        let added = set.insert(member.clone(), score).is_none();
                        Ok(Reply::Int(i64::from(added)))
                    }
                    _ => Err(Self::wrong_type(&command)),
                }
            }
            Command::ZRangeByScore { ref key, min, max } => match state.get(key) {
                None => Ok(Reply::List(Vec::new())),
                Some(Stored::Sorted(set)) => {
                    let mut members: Vec<(&String, f64)> = set
                        .iter()
                        .filter(|(_, s)| min.admits_min(**s) && max.admits_max(**s))
                        .map(|(m, s)| (m, *s))
                        .collect();
                    members.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));
                    Ok(Reply::List(members.into_iter().map(|(m, _)| m.clone()).collect()))
                }
                Some(_) => Err(Self::wrong_type(&command)),
            },
            Command::ZCard { ref key } => match state.get(key) {
                None => Ok(Reply::Int(0)),
                Some(Stored::Sorted(set)) => Ok(Reply::Int(set.len() as i64)),
                Some(_) => Err(Self::wrong_type(&command)),
            },
            Command::ZInsertOrdinal { ref key, ref member, at } => {
                let set = match state.data.get_mut(key) {
                    None => return Ok(Reply::Int(-1)),
                    Some(Stored::Sorted(set)) => set,
                    Some(_) => return Err(Self::wrong_type(&command)),
                };
                let card = set.len() as u64;
                let at = at.unwrap_or(card);
                if card == 0 || at > card {
                    return Ok(Reply::Int(-1));
                }
                let floor = at as f64;
                for score in set.values_mut() {
                    if *score >= floor {
                        *score += 1.0;
                    }
                }
                set.insert(member.clone(), floor);
                Ok(Reply::Int(at as i64))
            }
            Command::ZRemoveOrdinal { ref key, ref member } => {
                let (moved, now_empty) = match state.data.get_mut(key) {
                    None => return Ok(Reply::Int(-1)),
                    Some(Stored::Sorted(set)) => {
                        let Some(removed) = set.remove(member) else {
                            return Ok(Reply::Int(-1));
                        };
                        let mut moved = 0;
                        for score in set.values_mut() {
                            if *score > removed {
                                *score -= 1.0;
                                moved += 1;
                            }
                        }
                        (moved, set.is_empty())
                    }
                    Some(_) => return Err(Self::wrong_type(&command)),
                };
                if now_empty {
                    state.data.remove(key);
                }
                Ok(Reply::Int(moved))
            }
            Command::HSet { ref key, ref fields } => {
                state.purge(key);
                let entry = state
                    .data
                    .entry(key.clone())
                    .or_insert_with(|| Stored::Hash(Vec::new()));
                match entry {
                    Stored::Hash(existing) => {
                        let mut added = 0;
                        for (name, value) in fields {
                            match existing.iter_mut().find(|(n, _)| n == name) {
                                Some(slot) => slot.1 = value.clone(),
                                None => {
                                    existing.push((name.clone(), value.clone()));
                                    added += 1;
                                }
                            }
                        }
                        Ok(Reply::Int(added))
                    }
                    _ => Err(Self::wrong_type(&command)),
                }
            }
            Command::HGetAll { ref key } => match state.get(key) {
                None => Ok(Reply::Pairs(Vec::new())),
                Some(Stored::Hash(fields)) => Ok(Reply::Pairs(fields.clone())),
                Some(_) => Err(Self::wrong_type(&command)),
            },
            Command::HDel { ref key, ref fields } => {
                let (removed, now_empty) = match state.data.get_mut(key) {
                    None => (0, false),
                    Some(Stored::Hash(existing)) => {
                        let before = existing.len();
                        existing.retain(|(n, _)| !fields.contains(n));
                        (before - existing.len(), existing.is_empty())
                    }
                    Some(_) => return Err(Self::wrong_type(&command)),
                };
                if now_empty {
                    state.data.remove(key);
                }
                Ok(Reply::Int(removed as i64))
            }
            Command::JsonSet { key, document } => {
                state.expiry.remove(&key);
                state.data.insert(key, Stored::Json(document));
                Ok(Reply::Ok)
            }
            Command::JsonGet { ref key } => match state.get(key) {
                None => Ok(Reply::Nil),
                Some(Stored::Json(doc)) => Ok(Reply::Text(doc.clone())),
                Some(_) => Err(Self::wrong_type(&command)),
            },
            Command::Keys { pattern } => {
                let keys: Vec<String> = state.data.keys().cloned().collect();
                let mut matched: Vec<String> = Vec::new();
                for key in keys {
                    state.purge(&key);
                    if state.data.contains_key(&key) && glob_match(&pattern, &key) {
                        matched.push(key);
                    }
                }
                matched.sort();
                Ok(Reply::List(matched))
            }
        }
    }
}

impl Default for InMemoryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Glob matching supporting `*` (any run) and `?` (one char).
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

#[async_trait]
impl CommandExecutor for InMemoryExecutor {
    async fn execute(&self, command: Command) -> Result<Reply, StorageError> {
        let mut state = self.state.lock();
        Self::apply(&mut state, command)
    }

    async fn transaction(&self, commands: Vec<Command>) -> Result<Vec<Reply>, StorageError> {
        let mut state = self.state.lock();
        commands
            .into_iter()
            .map(|command| Self::apply(&mut state, command))
            .collect()
    }

    async fn ft_create(&self, args: &[String]) -> Result<(), StorageError> {
        let name = args
            .first()
            .ok_or_else(|| StorageError::Backend("FT.CREATE without index name".into()))?;
        let mut search = self.search.lock();
        if search.indexes.contains_key(name) {
            return Err(StorageError::Backend("Index already exists".into()));
        }
        search.indexes.insert(name.clone(), args[1..].to_vec());
        Ok(())
    }

    async fn ft_dropindex(&self, index: &str, _delete_documents: bool) -> Result<(), StorageError> {
        match self.search.lock().indexes.remove(index) {
            Some(_) => Ok(()),
            None => Err(StorageError::Backend("Unknown Index name".into())),
        }
    }

    async fn ft_search(&self, index: &str, args: &[String]) -> Result<SearchReply, StorageError> {
        let mut search = self.search.lock();
        search.search_log.push((index.to_string(), args.to_vec()));
        Ok(search.search_replies.pop_front().unwrap_or_default())
    }

    async fn ft_aggregate(&self, index: &str, args: &[String]) -> Result<AggregateReply, StorageError> {
        let mut search = self.search.lock();
        search.aggregate_log.push((index.to_string(), args.to_vec()));
        Ok(search.aggregate_replies.pop_front().unwrap_or_default())
    }

    async fn ft_syndump(&self, index: &str) -> Result<Vec<(String, Vec<String>)>, StorageError> {
        let search = self.search.lock();
        let mut by_term: BTreeMap<String, Vec<String>> = BTreeMap::new();
        if let Some(groups) = search.synonyms.get(index) {
            for (group, terms) in groups {
                for term in terms {
                    by_term.entry(term.clone()).or_default().push(group.clone());
                }
            }
        }
        Ok(by_term.into_iter().collect())
    }

    async fn ft_synupdate(&self, index: &str, group_id: &str, terms: &[String]) -> Result<(), StorageError> {
        let mut search = self.search.lock();
        let group = search
            .synonyms
            .entry(index.to_string())
            .or_default()
            .entry(group_id.to_string())
            .or_default();
        for term in terms {
            if !group.contains(term) {
                group.push(term.clone());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::command::ScoreBound;

    fn zadd(key: &str, score: f64, member: &str) -> Command {
        Command::ZAdd { key: key.into(), score, member: member.into() }
    }

    #[tokio::test]
    async fn test_new_executor_is_empty() {
        let exec = InMemoryExecutor::new();
        assert!(exec.is_empty());
        assert_eq!(exec.len(), 0);
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let exec = InMemoryExecutor::new();
        exec.execute(Command::Set { key: "k".into(), value: "v".into() }).await.unwrap();
        let reply = exec.execute(Command::Get { key: "k".into() }).await.unwrap();
        assert_eq!(reply, Reply::Text("v".into()));
        let missing = exec.execute(Command::Get { key: "nope".into() }).await.unwrap();
        assert_eq!(missing, Reply::Nil);
    }

    #[tokio::test]
    async fn test_sorted_set_range_is_score_ordered() {
        let exec = InMemoryExecutor::new();
        exec.pipeline(vec![zadd("z", 3.0, "c"), zadd("z", 1.0, "a"), zadd("z", 2.0, "b")])
            .await
            .unwrap();

        let all = exec
            .execute(Command::ZRangeByScore {
                key: "z".into(),
                min: ScoreBound::NegInf,
                max: ScoreBound::PosInf,
            })
            .await
            .unwrap();
        assert_eq!(all.into_list(), vec!["a", "b", "c"]);

        let tail = exec
            .execute(Command::ZRangeByScore {
                key: "z".into(),
                min: ScoreBound::Exclusive(1.0),
                max: ScoreBound::PosInf,
            })
            .await
            .unwrap();
        assert_eq!(tail.into_list(), vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_ordinal_insert_and_remove_keep_scores_contiguous() {
        let exec = InMemoryExecutor::new();
        let range = || Command::ZRangeByScore {
            key: "z".into(),
            min: ScoreBound::NegInf,
            max: ScoreBound::PosInf,
        };
        let insert = |member: &str, at: Option<u64>| Command::ZInsertOrdinal {
            key: "z".into(),
            member: member.into(),
            at,
        };

        assert_eq!(exec.execute(insert("a", None)).await.unwrap(), Reply::Int(-1));
        exec.execute(Command::ZAdd { key: "z".into(), score: 0.0, member: "schema".into() })
            .await
            .unwrap();
        assert_eq!(exec.execute(insert("a", None)).await.unwrap(), Reply::Int(1));
        assert_eq!(exec.execute(insert("c", None)).await.unwrap(), Reply::Int(2));
        assert_eq!(exec.execute(insert("b", Some(2))).await.unwrap(), Reply::Int(2));
        assert_eq!(exec.execute(insert("x", Some(9))).await.unwrap(), Reply::Int(-1));
        assert_eq!(exec.execute(range()).await.unwrap().into_list(), vec!["schema", "a", "b", "c"]);

        let remove = |member: &str| Command::ZRemoveOrdinal { key: "z".into(), member: member.into() };
        assert_eq!(exec.execute(remove("a")).await.unwrap(), Reply::Int(2));
        assert_eq!(exec.execute(remove("a")).await.unwrap(), Reply::Int(-1));
        let c_at_two = exec
            .execute(Command::ZRangeByScore {
                key: "z".into(),
                min: ScoreBound::Inclusive(2.0),
                max: ScoreBound::Inclusive(2.0),
            })
            .await
            .unwrap();
        assert_eq!(c_at_two.into_list(), vec!["c"]);
    }

    #[tokio::test]
    async fn test_hash_upsert_preserves_field_order() {
        let exec = InMemoryExecutor::new();
        let key = "h".to_string();
        exec.execute(Command::HSet {
            key: key.clone(),
            fields: vec![("a".into(), "1".into()), ("b".into(), "2".into())],
        })
        .await
        .unwrap();
        exec.execute(Command::HSet { key: key.clone(), fields: vec![("a".into(), "9".into())] })
            .await
            .unwrap();
        let pairs = exec.execute(Command::HGetAll { key }).await.unwrap().into_pairs();
        assert_eq!(pairs, vec![("a".to_string(), "9".to_string()), ("b".to_string(), "2".to_string())]);
    }

    #[tokio::test]
    async fn test_wrong_type_is_backend_error() {
        let exec = InMemoryExecutor::new();
        exec.execute(Command::Set { key: "k".into(), value: "v".into() }).await.unwrap();
        let err = exec.execute(zadd("k", 1.0, "m")).await.unwrap_err();
        assert!(err.to_string().contains("WRONGTYPE"));
    }

    #[tokio::test]
    async fn test_set_nx_respects_existing_and_expiry() {
        let exec = InMemoryExecutor::new();
        let first = exec
            .execute(Command::SetNxPx { key: "lock".into(), value: "t1".into(), ttl_ms: 20 })
            .await
            .unwrap();
        assert_eq!(first, Reply::Ok);
        let second = exec
            .execute(Command::SetNxPx { key: "lock".into(), value: "t2".into(), ttl_ms: 20 })
            .await
            .unwrap();
        assert_eq!(second, Reply::Nil);

        tokio::time::sleep(Duration::from_millis(30)).await;
        let third = exec
            .execute(Command::SetNxPx { key: "lock".into(), value: "t3".into(), ttl_ms: 20 })
            .await
            .unwrap();
        assert_eq!(third, Reply::Ok);
    }

    #[tokio::test]
    async fn test_compare_and_delete() {
        let exec = InMemoryExecutor::new();
        exec.execute(Command::Set { key: "lock".into(), value: "mine".into() }).await.unwrap();
        let wrong = exec
            .execute(Command::CompareAndDelete { key: "lock".into(), token: "theirs".into() })
            .await
            .unwrap();
        assert_eq!(wrong, Reply::Int(0));
        let right = exec
            .execute(Command::CompareAndDelete { key: "lock".into(), token: "mine".into() })
            .await
            .unwrap();
        assert_eq!(right, Reply::Int(1));
        assert!(exec.is_empty());
    }

    #[tokio::test]
    async fn test_keys_glob() {
        let exec = InMemoryExecutor::new();
        for key in ["g:row:1", "g:row:2", "g:schema", "other"] {
            exec.execute(Command::Set { key: key.into(), value: "x".into() }).await.unwrap();
        }
        let keys = exec.execute(Command::Keys { pattern: "g:row:*".into() }).await.unwrap();
        assert_eq!(keys.into_list(), vec!["g:row:1", "g:row:2"]);
        assert!(glob_match("a?c", "abc"));
        assert!(!glob_match("a*d", "abc"));
    }

    #[tokio::test]
    async fn test_scripted_search_replies() {
        let exec = InMemoryExecutor::new();
        exec.push_search_reply(SearchReply { total: 7, hits: vec![] });
        let reply = exec.ft_search("idx", &["*".to_string()]).await.unwrap();
        assert_eq!(reply.total, 7);
        let empty = exec.ft_search("idx", &["*".to_string()]).await.unwrap();
        assert_eq!(empty.total, 0);
        assert_eq!(exec.search_log().len(), 2);
    }

    #[tokio::test]
    async fn test_synonym_dump_groups_by_term() {
        let exec = InMemoryExecutor::new();
        exec.ft_synupdate("idx", "g1", &["car".into(), "auto".into()]).await.unwrap();
        exec.ft_synupdate("idx", "g2", &["car".into()]).await.unwrap();
        let dump = exec.ft_syndump("idx").await.unwrap();
        assert_eq!(
            dump,
            vec![
                ("auto".to_string(), vec!["g1".to_string()]),
                ("car".to_string(), vec!["g1".to_string(), "g2".to_string()]),
            ]
        );
    }
}
