//! Storage Module
//!
//! Everything the service knows about its backing key-value store goes
//! through the [`KvStore`] trait: a value lookup, a write with an optional
//! time-to-live, and an atomic counter increment. Stored records and rate
//! limit counters both live behind it and are never cached locally.
//!
//! ## Implementations
//!
//! - [`RespStore`](crate::connection::RespStore): the single connection to a
//!   Redis-compatible server, behind either a mutex (threaded dispatch) or an
//!   owning task (cooperative dispatch).
//! - [`MemoryStore`]: a sharded in-process engine with lazy and active
//!   expiry, used for the `memory` backend and in tests.

pub mod engine;
pub mod expiry;

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

pub use engine::{MemoryStore, StorageStats, SweepReport};
pub use expiry::ExpirySweeper;

/// Errors reported by a [`KvStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or the conversation with it broke down.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store answered with an error reply.
    #[error("store rejected command: {0}")]
    Rejected(String),

    /// The store answered, but not with the reply shape the command expects.
    #[error("unexpected {kind} reply to {command}")]
    UnexpectedReply {
        command: &'static str,
        kind: &'static str,
    },
}

impl StoreError {
    /// True when the failure is about reaching the store rather than its answer.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// The operations the service needs from its backing store.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// `GET key` - `None` when the key does not exist (or has expired).
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>>;

    /// `SET key value [EX seconds]` - overwrites any previous value.
    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> StoreResult<()>;

    /// `INCR key` - returns the incremented value. An existing TTL is kept.
    async fn incr(&self, key: &str) -> StoreResult<i64>;
}
