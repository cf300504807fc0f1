//! Store Connection Module
//!
//! webstore holds exactly one connection to its backing store for the
//! lifetime of the process. This module owns that connection and the
//! discipline that keeps concurrent requests from interleaving on it.
//!
//! ## Architecture
//!
//! ```text
//!   handlers / rate limiter
//!            │  KvStore
//!            ▼
//! ┌──────────────────────────┐
//! │       RespStore<E>       │  build command, interpret reply
//! └────────────┬─────────────┘
//!              │ CommandExecutor
//!      ┌───────┴────────┐
//!      ▼                ▼
//! LockedConnection  ConnectionTask     (chosen once at startup)
//!  (async mutex)    (owning task + queue)
//!      └───────┬────────┘
//!              ▼
//! ┌──────────────────────────┐
//! │     StoreConnection      │  TCP or Unix socket, lazy reconnect
//! └──────────────────────────┘
//! ```

pub mod client;
pub mod guard;

pub use client::{ConnectionOptions, StoreAddress, StoreConnection, StoreStream};
pub use guard::{CommandExecutor, ConnectionTask, LockedConnection, RespStore};
