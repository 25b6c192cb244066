// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Store access.
//!
//! The core never talks to Redis directly. It builds [`Command`]s and hands
//! them to a [`CommandExecutor`] through a [`Backend`], which applies the
//! value transform and command audit hooks.
//!
//! - [`RedisExecutor`]: Redis / Redis Stack over a connection manager
//! - [`memory::InMemoryExecutor`]: in-process executor with the same reply shapes

pub mod backend;
pub mod command;
pub mod memory;
pub mod redis;
pub mod traits;

pub use backend::Backend;
pub use command::{AggregateReply, Command, Reply, ScoreBound, SearchHit, SearchReply};
pub use memory::InMemoryExecutor;
pub use self::redis::RedisExecutor;
pub use traits::{CommandAudit, CommandExecutor, NoAudit, NoTransform, StorageError, TracingAudit, ValueTransform};
