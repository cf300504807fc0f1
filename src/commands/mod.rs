//! Store Command Module
//!
//! The service only ever needs a handful of commands from its backing store.
//! This module builds them as RESP arrays and turns the replies into the
//! typed results the [`KvStore`](crate::storage::KvStore) trait promises.
//!
//! ## Architecture
//!
//! ```text
//! Route handler / rate limiter
//!       │
//!       ▼
//! ┌─────────────────┐
//! │    Command      │  (this module: build + interpret)
//! └────────┬────────┘
//!          │ RespValue
//!          ▼
//! ┌─────────────────┐
//! │ StoreConnection │  (connection module: one round trip)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - `GET key` - fetch a stored payload or counter
//! - `SET key value [EX seconds]` - store a payload or start a counter
//! - `INCR key` - bump a rate limit counter
//! - `PING` - startup health check
//! - `AUTH password` - sent first on every (re)connect when configured

pub mod command;

pub use command::{bulk_reply, integer_reply, status_reply, Command};
