//! Store Client Guard
//!
//! The store protocol is a strict request/reply conversation, so the one
//! connection must never see two commands interleaved. How that is ensured
//! depends on the dispatch mode chosen at startup:
//!
//! - [`LockedConnection`]: multi-threaded runtime. Every command takes an
//!   async mutex for exactly one round trip.
//! - [`ConnectionTask`]: single-threaded runtime. One task owns the
//!   connection and serves queued commands in arrival order. Nothing locks.
//!
//! [`RespStore`] turns either executor into a [`KvStore`].

use crate::commands::{bulk_reply, integer_reply, status_reply, Command};
use crate::connection::StoreConnection;
use crate::protocol::RespValue;
use crate::storage::{KvStore, StoreError, StoreResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::debug;

/// Depth of the command queue in front of a [`ConnectionTask`].
const QUEUE_DEPTH: usize = 1024;

/// Runs one command against the single store connection.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, command: Command) -> StoreResult<RespValue>;
}

/// Mutex-guarded connection for the multi-threaded runtime.
#[derive(Debug)]
pub struct LockedConnection {
    inner: Mutex<StoreConnection>,
}

impl LockedConnection {
    pub fn new(connection: StoreConnection) -> Self {
        Self {
            inner: Mutex::new(connection),
        }
    }
}

#[async_trait]
impl CommandExecutor for LockedConnection {
    async fn execute(&self, command: Command) -> StoreResult<RespValue> {
        let mut connection = self.inner.lock().await;
        connection.execute(&command).await
    }
}

type Job = (Command, oneshot::Sender<StoreResult<RespValue>>);

/// Connection owned by a dedicated task, for the single-threaded runtime.
///
/// The task ends, releasing the connection, once every handle is dropped.
#[derive(Debug, Clone)]
pub struct ConnectionTask {
    jobs: mpsc::Sender<Job>,
}

impl ConnectionTask {
    /// Spawns the owning task on the current runtime.
    pub fn spawn(mut connection: StoreConnection) -> Self {
        let (jobs, mut queue) = mpsc::channel::<Job>(QUEUE_DEPTH);

        tokio::spawn(async move {
            while let Some((command, reply)) = queue.recv().await {
                let result = connection.execute(&command).await;
                // The requester may have gone away; nothing to do then.
                let _ = reply.send(result);
            }
            debug!(address = %connection.address(), "Store connection released");
        });

        Self { jobs }
    }
}

#[async_trait]
impl CommandExecutor for ConnectionTask {
    async fn execute(&self, command: Command) -> StoreResult<RespValue> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.jobs
            .send((command, reply_tx))
            .await
            .map_err(|_| StoreError::Unavailable("store connection task has stopped".to_string()))?;
        reply_rx
            .await
            .map_err(|_| StoreError::Unavailable("store connection task dropped the command".to_string()))?
    }
}

/// A [`KvStore`] backed by a RESP server.
#[derive(Debug)]
pub struct RespStore<E> {
    executor: E,
}

impl<E: CommandExecutor> RespStore<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn ping(&self) -> StoreResult<()> {
        let reply = self.executor.execute(Command::Ping).await?;
        status_reply("PING", reply)
    }
}

#[async_trait]
impl<E: CommandExecutor> KvStore for RespStore<E> {
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        let reply = self.executor.execute(Command::get(key)).await?;
        bulk_reply(reply)
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> StoreResult<()> {
        let reply = self.executor.execute(Command::set(key, value, ttl)).await?;
        status_reply("SET", reply)
    }

    async fn incr(&self, key: &str) -> StoreResult<i64> {
        let reply = self.executor.execute(Command::incr(key)).await?;
        integer_reply("INCR", reply)
    }
}
