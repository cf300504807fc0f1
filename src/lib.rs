//! # webstore - Content-Addressable Storage for Z85 Payloads
//!
//! Clients POST a Z85-encoded payload to `/store/{alg}/{digest}` and later
//! GET it back with the same digest. Payloads live in a Redis-compatible
//! key-value store under the lowercase hex digest; nothing is decoded or
//! transformed on the way through.
//!
//! ## Features
//!
//! - **Six digest widths**: md5, sha1, sha224, sha256, sha384, sha512
//! - **Admission control**: per-address fixed-window limiting, checked before
//!   a connection's first request is parsed
//! - **One store connection**: serialized by a mutex or owned by a single task,
//!   depending on the dispatch mode
//! - **Graceful shutdown**: in-flight requests finish, new ones get 503
//! - **Optional TLS** via rustls
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            webstored                             │
//! │                                                                  │
//! │  ┌────────────┐   ┌─────────────┐   ┌──────────┐   ┌──────────┐  │
//! │  │  Listener  │──>│ RateLimiter │──>│  Router  │──>│ Handler  │  │
//! │  │ (+ TLS)    │   │  (IPS:ip)   │   │ 6 routes │   │ GET/POST │  │
//! │  └────────────┘   └──────┬──────┘   └──────────┘   └────┬─────┘  │
//! │                          │                              │        │
//! │                          ▼                              ▼        │
//! │                 ┌──────────────────────────────────────────┐     │
//! │                 │        KvStore (RespStore | MemoryStore) │     │
//! │                 └────────────────────┬─────────────────────┘     │
//! └──────────────────────────────────────┼───────────────────────────┘
//!                                        ▼
//!                              Redis-compatible store
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use webstore::config::AppConfig;
//! use webstore::server::{open_store, Server};
//! use webstore::state::AppState;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! let store = open_store(&config).await?;
//! let state = AppState::new(store.store.clone());
//! let server = Server::bind(&config, state).await?;
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod commands;
pub mod config;
pub mod connection;
pub mod error;
pub mod handlers;
pub mod post;
pub mod protocol;
pub mod ratelimit;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod state;
pub mod storage;
pub mod tls;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;

/// Version of webstore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
