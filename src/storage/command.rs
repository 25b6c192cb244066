// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Store command model.
//!
//! The grid and the coordinator never talk to Redis directly: they build
//! [`Command`] values and hand them to a [`CommandExecutor`], one at a time,
//! as a pipeline, or as a MULTI/EXEC transaction. The executor returns one
//! [`Reply`] per command, in order.
//!
//! [`CommandExecutor`]: super::traits::CommandExecutor

use std::fmt;

/// Inclusive or exclusive bound on a sorted-set score range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreBound {
    NegInf,
    PosInf,
    Inclusive(f64),
    Exclusive(f64),
}

impl ScoreBound {
    /// Wire form used by ZRANGEBYSCORE (`-inf`, `+inf`, `5`, `(5`).
    #[must_use]
    pub fn to_arg(&self) -> String {
        match self {
            Self::NegInf => "-inf".to_string(),
            Self::PosInf => "+inf".to_string(),
            Self::Inclusive(v) => format_score(*v),
            Self::Exclusive(v) => format!("({}", format_score(*v)),
        }
    }

    /// Whether `score` lies on the allowed side of this bound used as a minimum.
    #[must_use]
    pub fn admits_min(&self, score: f64) -> bool {
        match self {
            Self::NegInf => true,
            Self::PosInf => false,
            Self::Inclusive(v) => score >= *v,
            Self::Exclusive(v) => score > *v,
        }
    }

    /// Whether `score` lies on the allowed side of this bound used as a maximum.
    #[must_use]
    pub fn admits_max(&self, score: f64) -> bool {
        match self {
            Self::NegInf => false,
            Self::PosInf => true,
            Self::Inclusive(v) => score <= *v,
            Self::Exclusive(v) => score < *v,
        }
    }
}

pub(crate) fn format_score(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

/// A single key-value store command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Get { key: String },
    Set { key: String, value: String },
    /// SET key value NX PX ttl
    SetNxPx { key: String, value: String, ttl_ms: u64 },
    /// Delete `key` only if it holds `token` (lease release).
    CompareAndDelete { key: String, token: String },
    Del { keys: Vec<String> },
    Exists { key: String },
    ZAdd { key: String, score: f64, member: String },
    ZRangeByScore { key: String, min: ScoreBound, max: ScoreBound },
    ZCard { key: String },
    /// Atomically move every member scored `>= at` up by one and add `member`
    /// at `at`; `None` places it at the set's cardinality (one past the last
    /// contiguous score). Replies with the score given, or -1 when the set is
    /// missing or `at` lies past its end.
    ZInsertOrdinal { key: String, member: String, at: Option<u64> },
    /// Atomically remove `member` and move every later member down by one.
    /// Replies with the number moved, or -1 when `member` is absent.
    ZRemoveOrdinal { key: String, member: String },
    HSet { key: String, fields: Vec<(String, String)> },
    HGetAll { key: String },
    HDel { key: String, fields: Vec<String> },
    JsonSet { key: String, document: String },
    JsonGet { key: String },
    /// SCAN for keys matching a glob pattern (executor iterates the cursor).
    Keys { pattern: String },
}

impl Command {
    /// Short name for logs and metrics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Get { .. } => "GET",
            Self::Set { .. } | Self::SetNxPx { .. } => "SET",
            Self::CompareAndDelete { .. } | Self::ZInsertOrdinal { .. } | Self::ZRemoveOrdinal { .. } => "EVAL",
            Self::Del { .. } => "DEL",
            Self::Exists { .. } => "EXISTS",
            Self::ZAdd { .. } => "ZADD",
            Self::ZRangeByScore { .. } => "ZRANGEBYSCORE",
            Self::ZCard { .. } => "ZCARD",
            Self::HSet { .. } => "HSET",
            Self::HGetAll { .. } => "HGETALL",
            Self::HDel { .. } => "HDEL",
            Self::JsonSet { .. } => "JSON.SET",
            Self::JsonGet { .. } => "JSON.GET",
            Self::Keys { .. } => "SCAN",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get { key } => write!(f, "GET {}", key),
            Self::Set { key, .. } => write!(f, "SET {} <value>", key),
            Self::SetNxPx { key, ttl_ms, .. } => write!(f, "SET {} <token> NX PX {}", key, ttl_ms),
            Self::CompareAndDelete { key, .. } => write!(f, "EVAL <release> 1 {} <token>", key),
            Self::Del { keys } => write!(f, "DEL {}", keys.join(" ")),
            Self::Exists { key } => write!(f, "EXISTS {}", key),
            Self::ZAdd { key, score, member } => {
                write!(f, "ZADD {} {} {}", key, format_score(*score), member)
            }
            Self::ZRangeByScore { key, min, max } => {
                write!(f, "ZRANGEBYSCORE {} {} {}", key, min.to_arg(), max.to_arg())
            }
            Self::ZCard { key } => write!(f, "ZCARD {}", key),
            Self::ZInsertOrdinal { key, member, at } => match at {
                Some(at) => write!(f, "EVAL <insert> 1 {} {} {}", key, member, at),
                None => write!(f, "EVAL <insert> 1 {} {} end", key, member),
            },
            Self::ZRemoveOrdinal { key, member } => write!(f, "EVAL <remove> 1 {} {}", key, member),
            // Field values may be transformed (encrypted); only names are audited.
            Self::HSet { key, fields } => {
                let names: Vec<&str> = fields.iter().map(|(n, _)| n.as_str()).collect();
                write!(f, "HSET {} {}", key, names.join(" "))
            }
            Self::HGetAll { key } => write!(f, "HGETALL {}", key),
            Self::HDel { key, fields } => write!(f, "HDEL {} {}", key, fields.join(" ")),
            Self::JsonSet { key, .. } => write!(f, "JSON.SET {} $ <document>", key),
            Self::JsonGet { key } => write!(f, "JSON.GET {}", key),
            Self::Keys { pattern } => write!(f, "SCAN 0 MATCH {}", pattern),
        }
    }
}

/// Reply to a single [`Command`].
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Nil,
    Ok,
    Int(i64),
    Text(String),
    List(Vec<String>),
    Pairs(Vec<(String, String)>),
}

impl Reply {
    #[must_use]
    pub fn as_int(&self) -> i64 {
        match self {
            Self::Int(n) => *n,
            Self::Ok => 1,
            _ => 0,
        }
    }

    #[must_use]
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_list(self) -> Vec<String> {
        match self {
            Self::List(items) => items,
            _ => Vec::new(),
        }
    }

    #[must_use]
    pub fn into_pairs(self) -> Vec<(String, String)> {
        match self {
            Self::Pairs(pairs) => pairs,
            _ => Vec::new(),
        }
    }
}

/// One document returned by FT.SEARCH.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchHit {
    pub key: String,
    pub fields: Vec<(String, String)>,
}

/// Parsed FT.SEARCH reply.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchReply {
    pub total: u64,
    pub hits: Vec<SearchHit>,
}

/// Parsed FT.AGGREGATE reply: one field map per result row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregateReply {
    pub rows: Vec<Vec<(String, String)>>,
}
