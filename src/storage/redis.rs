// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Redis command executor (Redis Stack: RediSearch + RedisJSON).
//!
//! Maps [`Command`] values onto raw Redis commands over a shared
//! [`ConnectionManager`]. Pipelines use `redis::pipe()`, transactions use
//! `pipe().atomic()` (MULTI/EXEC). Search commands are sent as raw `FT.*`
//! commands and their RESP2 replies parsed here.
//!
//! ```text
//! FT.SEARCH idx "@name:Ann" LIMIT 0 10
//!   → [2, "docgrid:people:row:1", ["name", "Ann", ...], "docgrid:people:row:2", [...]]
//! ```

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{cmd, pipe, Client, Cmd, Value};
use tracing::{debug, instrument};

use super::command::{format_score, AggregateReply, Command, Reply, SearchHit, SearchReply};
use super::traits::{CommandExecutor, StorageError};

/// Releases a lease only if it still holds the caller's token.
const RELEASE_SCRIPT: &str =
    "if redis.call('get', KEYS[1]) == ARGV[1] then return redis.call('del', KEYS[1]) else return 0 end";

/// Places a member at a score, moving the tail up to keep scores contiguous.
const INSERT_ORDINAL_SCRIPT: &str = r"
local card = redis.call('zcard', KEYS[1])
local at = tonumber(ARGV[2]) or card
if card == 0 or at > card then return -1 end
local moved = redis.call('zrangebyscore', KEYS[1], at, '+inf')
for _, member in ipairs(moved) do redis.call('zincrby', KEYS[1], 1, member) end
redis.call('zadd', KEYS[1], at, ARGV[1])
return at
";

/// Removes a member and moves the tail down to close the gap.
const REMOVE_ORDINAL_SCRIPT: &str = r"
local score = redis.call('zscore', KEYS[1], ARGV[1])
if not score then return -1 end
redis.call('zrem', KEYS[1], ARGV[1])
local moved = redis.call('zrangebyscore', KEYS[1], '(' .. score, '+inf')
for _, member in ipairs(moved) do redis.call('zincrby', KEYS[1], -1, member) end
return #moved
";

/// Keys fetched per SCAN iteration.
const SCAN_COUNT: usize = 100;

pub struct RedisExecutor {
    connection: ConnectionManager,
}

impl RedisExecutor {
    /// Connect to `connection_string` (e.g. `redis://localhost:6379`).
    pub async fn connect(connection_string: &str) -> Result<Self, StorageError> {
        let client = Client::open(connection_string)
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(Self { connection })
    }

    /// Wrap an existing connection manager.
    pub fn from_connection(connection: ConnectionManager) -> Self {
        Self { connection }
    }

    /// Get a clone of the connection manager.
    pub fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }

    fn to_cmd(command: &Command) -> Result<Cmd, StorageError> {
        let mut c;
        match command {
            Command::Get { key } => {
                c = cmd("GET");
                c.arg(key);
            }
            Command::Set { key, value } => {
                c = cmd("SET");
                c.arg(key).arg(value);
            }
            Command::SetNxPx { key, value, ttl_ms } => {
                c = cmd("SET");
                c.arg(key).arg(value).arg("NX").arg("PX").arg(*ttl_ms);
            }
            Command::CompareAndDelete { key, token } => {
                c = cmd("EVAL");
                c.arg(RELEASE_SCRIPT).arg(1).arg(key).arg(token);
            }
            Command::Del { keys } => {
                c = cmd("DEL");
                c.arg(keys);
            }
            Command::Exists { key } => {
                c = cmd("EXISTS");
                c.arg(key);
            }
            Command::ZAdd { key, score, member } => {
                c = cmd("ZADD");
                c.arg(key).arg(format_score(*score)).arg(member);
            }
            Command::ZRangeByScore { key, min, max } => {
                c = cmd("ZRANGEBYSCORE");
                c.arg(key).arg(min.to_arg()).arg(max.to_arg());
            }
            Command::ZCard { key } => {
                c = cmd("ZCARD");
                c.arg(key);
            }
            Command::ZInsertOrdinal { key, member, at } => {
                c = cmd("EVAL");
                let at = at.map_or_else(|| "end".to_string(), |at| at.to_string());
                c.arg(INSERT_ORDINAL_SCRIPT).arg(1).arg(key).arg(member).arg(at);
            }
            Command::ZRemoveOrdinal { key, member } => {
                c = cmd("EVAL");
                c.arg(REMOVE_ORDINAL_SCRIPT).arg(1).arg(key).arg(member);
            }
            Command::HSet { key, fields } => {
                c = cmd("HSET");
                c.arg(key);
                for (name, value) in fields {
                    c.arg(name).arg(value);
                }
            }
            Command::HGetAll { key } => {
                c = cmd("HGETALL");
                c.arg(key);
            }
            Command::HDel { key, fields } => {
                c = cmd("HDEL");
                c.arg(key).arg(fields);
            }
            Command::JsonSet { key, document } => {
                c = cmd("JSON.SET");
                c.arg(key).arg("$").arg(document);
            }
            Command::JsonGet { key } => {
                c = cmd("JSON.GET");
                c.arg(key);
            }
            Command::Keys { .. } => {
                return Err(StorageError::Unsupported(
                    "SCAN cannot be pipelined or run inside a transaction".into(),
                ))
            }
        }
        Ok(c)
    }

    fn protocol(command: &Command, e: impl std::fmt::Display) -> StorageError {
        StorageError::Protocol {
            command: command.name().to_string(),
            detail: e.to_string(),
        }
    }

    fn to_reply(command: &Command, value: Value) -> Result<Reply, StorageError> {
        match command {
            Command::Get { .. } | Command::JsonGet { .. } => {
                let text: Option<String> =
                    redis::from_redis_value(&value).map_err(|e| Self::protocol(command, e))?;
                Ok(text.map_or(Reply::Nil, Reply::Text))
            }
            Command::Set { .. } | Command::SetNxPx { .. } | Command::JsonSet { .. } => {
                Ok(if value == Value::Nil { Reply::Nil } else { Reply::Ok })
            }
            Command::ZRangeByScore { .. } | Command::Keys { .. } => {
                let items: Vec<String> =
                    redis::from_redis_value(&value).map_err(|e| Self::protocol(command, e))?;
                Ok(Reply::List(items))
            }
            Command::HGetAll { .. } => {
                let pairs: Vec<(String, String)> =
                    redis::from_redis_value(&value).map_err(|e| Self::protocol(command, e))?;
                Ok(Reply::Pairs(pairs))
            }
            Command::CompareAndDelete { .. }
            | Command::Del { .. }
            | Command::Exists { .. }
            | Command::ZAdd { .. }
            | Command::ZCard { .. }
            | Command::ZInsertOrdinal { .. }
            | Command::ZRemoveOrdinal { .. }
            | Command::HSet { .. }
            | Command::HDel { .. } => {
                let n: i64 = redis::from_redis_value(&value).map_err(|e| Self::protocol(command, e))?;
                Ok(Reply::Int(n))
            }
        }
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>, StorageError> {
        let mut conn = self.connection.clone();
        let mut keys = Vec::new();
        let mut cursor = 0u64;
        loop {
            let (next, batch): (u64, Vec<String>) = cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await
                .map_err(|e| StorageError::Backend(format!("Failed to scan keys: {}", e)))?;
            keys.extend(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn run_batch(&self, commands: Vec<Command>, atomic: bool) -> Result<Vec<Reply>, StorageError> {
        if commands.is_empty() {
            return Ok(Vec::new());
        }
        let mut pipeline = pipe();
        if atomic {
            pipeline.atomic();
        }
        for command in &commands {
            pipeline.add_command(Self::to_cmd(command)?);
        }

        let mut conn = self.connection.clone();
        let values: Vec<Value> = pipeline
            .query_async(&mut conn)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        if values.len() != commands.len() {
            return Err(StorageError::Protocol {
                command: if atomic { "EXEC".into() } else { "PIPELINE".into() },
                detail: format!("expected {} replies, got {}", commands.len(), values.len()),
            });
        }
        commands
            .iter()
            .zip(values)
            .map(|(command, value)| Self::to_reply(command, value))
            .collect()
    }
}

fn value_string(value: &Value) -> Option<String> {
    redis::from_redis_value::<String>(value).ok()
}

fn field_pairs(value: &Value) -> Vec<(String, String)> {
    match value {
        Value::Array(items) => items
            .chunks(2)
            .filter_map(|chunk| match chunk {
                [name, value] => Some((value_string(name)?, value_string(value).unwrap_or_default())),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Parse an FT.SEARCH reply: `[total, key, [field, value, ...], key, ...]`.
pub(crate) fn parse_search_reply(value: &Value) -> Result<SearchReply, StorageError> {
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(StorageError::Protocol {
                command: "FT.SEARCH".into(),
                detail: format!("expected array reply, got {:?}", other),
            })
        }
    };
    let total = match items.first() {
        Some(Value::Int(n)) => (*n).max(0) as u64,
        _ => 0,
    };

    let mut hits = Vec::new();
    let mut i = 1;
    while i < items.len() {
        let key = value_string(&items[i]).unwrap_or_default();
        i += 1;
        let fields = match items.get(i) {
            Some(fields @ Value::Array(_)) => {
                i += 1;
                field_pairs(fields)
            }
            _ => Vec::new(),
        };
        hits.push(SearchHit { key, fields });
    }
    Ok(SearchReply { total, hits })
}

/// Parse an FT.AGGREGATE reply: `[count, [field, value, ...], ...]`.
pub(crate) fn parse_aggregate_reply(value: &Value) -> Result<AggregateReply, StorageError> {
    match value {
        Value::Array(items) => Ok(AggregateReply {
            rows: items.iter().skip(1).map(field_pairs).collect(),
        }),
        other => Err(StorageError::Protocol {
            command: "FT.AGGREGATE".into(),
            detail: format!("expected array reply, got {:?}", other),
        }),
    }
}

/// Parse an FT.SYNDUMP reply: `[term, [group, ...], term, ...]`.
pub(crate) fn parse_syndump_reply(value: &Value) -> Vec<(String, Vec<String>)> {
    match value {
        Value::Array(items) => items
            .chunks(2)
            .filter_map(|chunk| match chunk {
                [term, groups] => {
                    let groups: Vec<String> = redis::from_redis_value(groups).unwrap_or_default();
                    Some((value_string(term)?, groups))
                }
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[async_trait]
impl CommandExecutor for RedisExecutor {
    async fn execute(&self, command: Command) -> Result<Reply, StorageError> {
        if let Command::Keys { pattern } = &command {
            return self.scan(pattern).await.map(Reply::List);
        }
        let redis_cmd = Self::to_cmd(&command)?;
        let mut conn = self.connection.clone();
        let value: Value = redis_cmd
            .query_async(&mut conn)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Self::to_reply(&command, value)
    }

    async fn pipeline(&self, commands: Vec<Command>) -> Result<Vec<Reply>, StorageError> {
        self.run_batch(commands, false).await
    }

    async fn transaction(&self, commands: Vec<Command>) -> Result<Vec<Reply>, StorageError> {
        self.run_batch(commands, true).await
    }

    #[instrument(skip(self, args), fields(index = args.first().map(String::as_str).unwrap_or("")))]
    async fn ft_create(&self, args: &[String]) -> Result<(), StorageError> {
        let mut conn = self.connection.clone();
        let _: () = cmd("FT.CREATE")
            .arg(args)
            .query_async(&mut conn)
            .await
            .map_err(|e| StorageError::Backend(format!("FT.CREATE failed: {}", e)))?;
        Ok(())
    }

    async fn ft_dropindex(&self, index: &str, delete_documents: bool) -> Result<(), StorageError> {
        let mut conn = self.connection.clone();
        let mut c = cmd("FT.DROPINDEX");
        c.arg(index);
        if delete_documents {
            c.arg("DD");
        }
        let _: () = c
            .query_async(&mut conn)
            .await
            .map_err(|e| StorageError::Backend(format!("FT.DROPINDEX failed: {}", e)))?;
        Ok(())
    }

    #[instrument(skip(self, args))]
    async fn ft_search(&self, index: &str, args: &[String]) -> Result<SearchReply, StorageError> {
        let mut conn = self.connection.clone();
        let value: Value = cmd("FT.SEARCH")
            .arg(index)
            .arg(args)
            .query_async(&mut conn)
            .await
            .map_err(|e| StorageError::Backend(format!("FT.SEARCH failed: {}", e)))?;
        let reply = parse_search_reply(&value)?;
        debug!(index = %index, total = reply.total, returned = reply.hits.len(), "FT.SEARCH reply");
        Ok(reply)
    }

    #[instrument(skip(self, args))]
    async fn ft_aggregate(&self, index: &str, args: &[String]) -> Result<AggregateReply, StorageError> {
        let mut conn = self.connection.clone();
        let value: Value = cmd("FT.AGGREGATE")
            .arg(index)
            .arg(args)
            .query_async(&mut conn)
            .await
            .map_err(|e| StorageError::Backend(format!("FT.AGGREGATE failed: {}", e)))?;
        parse_aggregate_reply(&value)
    }

    async fn ft_syndump(&self, index: &str) -> Result<Vec<(String, Vec<String>)>, StorageError> {
        let mut conn = self.connection.clone();
        let value: Value = cmd("FT.SYNDUMP")
            .arg(index)
            .query_async(&mut conn)
            .await
            .map_err(|e| StorageError::Backend(format!("FT.SYNDUMP failed: {}", e)))?;
        Ok(parse_syndump_reply(&value))
    }

    async fn ft_synupdate(&self, index: &str, group_id: &str, terms: &[String]) -> Result<(), StorageError> {
        let mut conn = self.connection.clone();
        let _: () = cmd("FT.SYNUPDATE")
            .arg(index)
            .arg(group_id)
            .arg(terms)
            .query_async(&mut conn)
            .await
            .map_err(|e| StorageError::Backend(format!("FT.SYNUPDATE failed: {}", e)))?;
        Ok(())
    }
}
