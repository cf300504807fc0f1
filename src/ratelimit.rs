//! IP admission control.
//!
//! A fixed-window counter per source address, kept in the backing store
//! under `IPS:{ip}`:
//!
//! ```text
//! loopback?               -> accept (no store traffic, no log)
//! GET IPS:{ip}
//!   nil                   -> SET IPS:{ip} 1 EX period, accept
//!   n < limit             -> INCR IPS:{ip} (TTL untouched), accept
//!   n >= limit            -> deny
//!   error reply / other   -> deny (no write)
//! ```
//!
//! The lookup and the write are two separate store operations. Concurrent
//! connections from one address may each see the same count, so a burst can
//! be admitted one or two past the limit. The limiter is a soft defense.
//!
//! The check runs when a connection is accepted, before any request on it is
//! parsed.

use crate::storage::KvStore;
use bytes::Bytes;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, trace};

/// Namespace for counters, kept apart from digest keys.
pub const COUNTER_PREFIX: &str = "IPS:";

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    Denied,
}

impl Admission {
    pub fn is_accepted(self) -> bool {
        self == Admission::Accepted
    }
}

/// Store-backed fixed-window limiter.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn KvStore>,
    limit: u32,
    period: Duration,
    enabled: bool,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("limit", &self.limit)
            .field("period", &self.period)
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl RateLimiter {
    /// At most `limit` connections per address in each `period`.
    pub fn new(store: Arc<dyn KvStore>, limit: u32, period: Duration) -> Self {
        Self {
            store,
            limit,
            period,
            enabled: true,
        }
    }

    /// A limiter that admits everything without touching the store.
    pub fn disabled(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            limit: 0,
            period: Duration::ZERO,
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Decides whether a connection from `ip` may proceed.
    pub async fn check(&self, ip: IpAddr) -> Admission {
        if !self.enabled {
            return Admission::Accepted;
        }

        let ip = ip.to_canonical();
        if ip.is_loopback() {
            return Admission::Accepted;
        }

        let key = counter_key(ip);
        let admission = self.check_counter(ip, &key).await;
        if admission == Admission::Denied {
            debug!(client = %ip, limit = self.limit, "Connection denied by rate limiter");
        }
        admission
    }

    async fn check_counter(&self, ip: IpAddr, key: &str) -> Admission {
        let current = match self.store.get(key).await {
            Ok(current) => current,
            Err(e) => {
                error!(client = %ip, error = %e, "Rate limit lookup failed, denying");
                return Admission::Denied;
            }
        };

        match current {
            None => match self.store.set(key, Bytes::from_static(b"1"), Some(self.period)).await {
                Ok(()) => {
                    trace!(client = %ip, "Rate limit window opened");
                    Admission::Accepted
                }
                Err(e) => {
                    error!(client = %ip, error = %e, "Rate limit counter could not be created, denying");
                    Admission::Denied
                }
            },
            Some(raw) => {
                let Some(count) = parse_count(&raw) else {
                    error!(client = %ip, "Rate limit counter is not a number, denying");
                    return Admission::Denied;
                };
                if count >= u64::from(self.limit) {
                    return Admission::Denied;
                }
                match self.store.incr(key).await {
                    Ok(_) => Admission::Accepted,
                    Err(e) => {
                        error!(client = %ip, error = %e, "Rate limit counter could not be incremented, denying");
                        Admission::Denied
                    }
                }
            }
        }
    }
}

/// Store key of the counter for `ip`.
pub fn counter_key(ip: IpAddr) -> String {
    format!("{}{}", COUNTER_PREFIX, ip)
}

fn parse_count(raw: &[u8]) -> Option<u64> {
    std::str::from_utf8(raw).ok()?.trim().parse::<u64>().ok()
}
