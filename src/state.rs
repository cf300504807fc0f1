//! Service context shared by every handler.

use crate::ratelimit::RateLimiter;
use crate::shutdown::Shutdown;
use crate::storage::KvStore;
use std::sync::Arc;
use std::time::Duration;

/// Everything a request needs, built once at startup and cloned per request.
#[derive(Clone)]
pub struct AppState {
    /// The single backing store, behind whichever guard the dispatch mode needs.
    pub store: Arc<dyn KvStore>,
    /// Admission control consulted when a connection is accepted.
    pub limiter: RateLimiter,
    pub shutdown: Shutdown,
    /// TTL applied to every stored record, if configured.
    pub expiration: Option<Duration>,
    /// Largest POST body accepted.
    pub max_payload_bytes: usize,
}

impl AppState {
    /// State with rate limiting disabled and default limits.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            limiter: RateLimiter::disabled(Arc::clone(&store)),
            store,
            shutdown: Shutdown::new(),
            expiration: None,
            max_payload_bytes: crate::config::DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }

    pub fn with_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_expiration(mut self, expiration: Option<Duration>) -> Self {
        self.expiration = expiration;
        self
    }

    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn with_max_payload_bytes(mut self, max: usize) -> Self {
        self.max_payload_bytes = max;
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("limiter", &self.limiter)
            .field("shutting_down", &self.shutdown.is_triggered())
            .field("expiration", &self.expiration)
            .field("max_payload_bytes", &self.max_payload_bytes)
            .finish()
    }
}
