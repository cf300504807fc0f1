//! In-Process Storage Engine with Expiry Support
//!
//! A thread-safe map with TTL support that stands in for the external store
//! when the `memory` backend is configured, and backs the test suites.
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: Keys are spread over independent `RwLock`ed shards.
//! 2. **Lazy Expiry**: Expired entries are treated as absent and removed on access.
//! 3. **Active Expiry**: [`ExpirySweeper`](super::ExpirySweeper) reclaims
//!    rate-limit counters and records that are never read again.
//!
//! The engine is internally synchronized, so it needs no store guard and is
//! shared behind an `Arc` in both dispatch modes.

use super::{KvStore, StoreError, StoreResult};
use crate::ratelimit::COUNTER_PREFIX;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

/// Number of shards for the storage engine.
const NUM_SHARDS: usize = 16;

/// A stored value with optional expiry time.
#[derive(Debug, Clone)]
struct Entry {
    value: Bytes,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Bytes, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    #[inline]
    fn is_expired(&self) -> bool {
        self.expires_at
            .map(|exp| Instant::now() >= exp)
            .unwrap_or(false)
    }
}

type ShardMap = HashMap<String, Entry>;

/// Engine statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageStats {
    pub keys: u64,
    pub get_ops: u64,
    pub set_ops: u64,
    pub incr_ops: u64,
    pub expired: u64,
}

/// What one [`MemoryStore::cleanup_expired`] pass reclaimed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Expired `IPS:` rate-limit counters.
    pub counters: u64,
    /// Expired payload records.
    pub records: u64,
}

impl SweepReport {
    pub fn total(&self) -> u64 {
        self.counters + self.records
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Sharded in-process key-value store.
///
/// # Example
///
/// ```
/// use webstore::storage::MemoryStore;
/// use bytes::Bytes;
/// use std::time::Duration;
///
/// let store = MemoryStore::new();
/// store.set_value("e3b0", Bytes::from("00000"), None);
/// assert_eq!(store.get_value("e3b0"), Some(Bytes::from("00000")));
///
/// store.set_value("IPS:10.0.0.1", Bytes::from("1"), Some(Duration::from_secs(2)));
/// assert_eq!(store.incr_value("IPS:10.0.0.1"), Ok(2));
/// ```
pub struct MemoryStore {
    shards: Vec<RwLock<ShardMap>>,
    key_count: AtomicU64,
    get_count: AtomicU64,
    set_count: AtomicU64,
    incr_count: AtomicU64,
    expired_count: AtomicU64,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("shards", &self.shards.len())
            .field("key_count", &self.key_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            shards: (0..NUM_SHARDS).map(|_| RwLock::new(HashMap::new())).collect(),
            key_count: AtomicU64::new(0),
            get_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
            incr_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
        }
    }

    #[inline]
    fn shard(&self, key: &str) -> &RwLock<ShardMap> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % NUM_SHARDS]
    }

    fn read(shard: &RwLock<ShardMap>) -> RwLockReadGuard<'_, ShardMap> {
        shard.read().unwrap_or_else(|poisoned| {
            tracing::warn!("memory store shard lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(shard: &RwLock<ShardMap>) -> RwLockWriteGuard<'_, ShardMap> {
        shard.write().unwrap_or_else(|poisoned| {
            tracing::warn!("memory store shard lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Stores `value` under `key`, replacing any previous value and TTL.
    ///
    /// Returns `true` if a new key was created.
    pub fn set_value(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> bool {
        self.set_count.fetch_add(1, Ordering::Relaxed);

        let mut data = Self::write(self.shard(key));
        let previous = data.insert(key.to_string(), Entry::new(value, ttl));

        match previous {
            None => {
                self.key_count.fetch_add(1, Ordering::Relaxed);
                true
            }
            // The expired entry was still counted, so the key count stays put.
            Some(entry) if entry.is_expired() => {
                self.expired_count.fetch_add(1, Ordering::Relaxed);
                true
            }
            Some(_) => false,
        }
    }

    /// Returns the value for `key`, or `None` if absent or expired.
    pub fn get_value(&self, key: &str) -> Option<Bytes> {
        self.get_count.fetch_add(1, Ordering::Relaxed);

        let shard = self.shard(key);
        {
            let data = Self::read(shard);
            match data.get(key) {
                Some(entry) if !entry.is_expired() => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Key exists but is expired - need write lock to remove it
        let mut data = Self::write(shard);
        match data.get(key) {
            Some(entry) if entry.is_expired() => {
                data.remove(key);
                self.key_count.fetch_sub(1, Ordering::Relaxed);
                self.expired_count.fetch_add(1, Ordering::Relaxed);
                None
            }
            // Another writer replaced it in between
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    /// Increments the integer stored at `key`, creating it at 0 first.
    ///
    /// A live TTL is preserved; an expired entry counts as absent.
    pub fn incr_value(&self, key: &str) -> Result<i64, &'static str> {
        self.incr_count.fetch_add(1, Ordering::Relaxed);

        let mut data = Self::write(self.shard(key));
        let live = data.get(key).filter(|e| !e.is_expired()).cloned();
        let was_present = data.contains_key(key);

        let current = match &live {
            Some(entry) => std::str::from_utf8(&entry.value)
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .ok_or("value is not an integer or out of range")?,
            None => 0,
        };
        let next = current.checked_add(1).ok_or("increment would overflow")?;

        let expires_at = live.and_then(|e| e.expires_at);
        data.insert(
            key.to_string(),
            Entry {
                value: Bytes::from(next.to_string()),
                expires_at,
            },
        );
        if !was_present {
            self.key_count.fetch_add(1, Ordering::Relaxed);
        }
        Ok(next)
    }

    /// Remaining time to live of `key`, `None` if absent or persistent.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let data = Self::read(self.shard(key));
        data.get(key)
            .filter(|e| !e.is_expired())
            .and_then(|e| e.expires_at)
            .map(|exp| exp.saturating_duration_since(Instant::now()))
    }

    /// Removes every expired entry, counting rate-limit counters and stored
    /// records separately.
    pub fn cleanup_expired(&self) -> SweepReport {
        let mut report = SweepReport::default();

        for shard in &self.shards {
            let mut data = Self::write(shard);
            data.retain(|key, entry| {
                if !entry.is_expired() {
                    return true;
                }
                if key.starts_with(COUNTER_PREFIX) {
                    report.counters += 1;
                } else {
                    report.records += 1;
                }
                false
            });
        }

        let cleaned = report.total();
        if cleaned > 0 {
            self.key_count.fetch_sub(cleaned, Ordering::Relaxed);
            self.expired_count.fetch_add(cleaned, Ordering::Relaxed);
        }

        report
    }

    /// Approximate number of keys, including expired ones not yet reclaimed.
    pub fn len(&self) -> u64 {
        self.key_count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> StorageStats {
        StorageStats {
            keys: self.key_count.load(Ordering::Relaxed),
            get_ops: self.get_count.load(Ordering::Relaxed),
            set_ops: self.set_count.load(Ordering::Relaxed),
            incr_ops: self.incr_count.load(Ordering::Relaxed),
            expired: self.expired_count.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        Ok(self.get_value(key))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> StoreResult<()> {
        self.set_value(key, value, ttl);
        Ok(())
    }

    async fn incr(&self, key: &str) -> StoreResult<i64> {
        self.incr_value(key)
            .map_err(|reason| StoreError::Rejected(format!("ERR {}", reason)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_set_and_get() {
        let store = MemoryStore::new();
        assert!(store.set_value("k", Bytes::from("v"), None));
        assert_eq!(store.get_value("k"), Some(Bytes::from("v")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_nonexistent() {
        let store = MemoryStore::new();
        assert_eq!(store.get_value("missing"), None);
    }

    #[test]
    fn test_last_write_wins() {
        let store = MemoryStore::new();
        store.set_value("k", Bytes::from("first"), None);
        assert!(!store.set_value("k", Bytes::from("second"), None));
        assert_eq!(store.get_value("k"), Some(Bytes::from("second")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_expiry() {
        let store = MemoryStore::new();
        store.set_value("k", Bytes::from("v"), Some(Duration::from_millis(30)));
        assert!(store.get_value("k").is_some());

        thread::sleep(Duration::from_millis(60));

        assert_eq!(store.get_value("k"), None);
        assert_eq!(store.len(), 0);
        assert_eq!(store.stats().expired, 1);
    }

    #[test]
    fn test_incr_creates_and_counts() {
        let store = MemoryStore::new();
        assert_eq!(store.incr_value("counter"), Ok(1));
        assert_eq!(store.incr_value("counter"), Ok(2));
        assert_eq!(store.get_value("counter"), Some(Bytes::from("2")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_incr_preserves_ttl() {
        let store = MemoryStore::new();
        store.set_value("IPS:1.2.3.4", Bytes::from("1"), Some(Duration::from_secs(2)));
        assert_eq!(store.incr_value("IPS:1.2.3.4"), Ok(2));

        let ttl = store.ttl("IPS:1.2.3.4").expect("ttl kept");
        assert!(ttl <= Duration::from_secs(2));
        assert!(ttl > Duration::from_secs(1));
    }

    #[test]
    fn test_incr_after_expiry_restarts() {
        let store = MemoryStore::new();
        store.set_value("c", Bytes::from("9"), Some(Duration::from_millis(20)));
        thread::sleep(Duration::from_millis(40));
        assert_eq!(store.incr_value("c"), Ok(1));
        assert_eq!(store.ttl("c"), None);
    }

    #[test]
    fn test_incr_non_integer() {
        let store = MemoryStore::new();
        store.set_value("k", Bytes::from("abc"), None);
        assert!(store.incr_value("k").is_err());
        assert_eq!(store.get_value("k"), Some(Bytes::from("abc")));
    }

    #[test]
    fn test_cleanup_expired() {
        let store = MemoryStore::new();
        for i in 0..10 {
            store.set_value(
                &format!("IPS:10.0.0.{}", i),
                Bytes::from("1"),
                Some(Duration::from_millis(10)),
            );
        }
        store.set_value("d41d8cd9", Bytes::from("00000"), Some(Duration::from_millis(10)));
        store.set_value("persistent", Bytes::from("v"), None);
        assert_eq!(store.len(), 12);

        thread::sleep(Duration::from_millis(30));

        let report = store.cleanup_expired();
        assert_eq!(report, SweepReport { counters: 10, records: 1 });
        assert_eq!(report.total(), 11);
        assert_eq!(store.len(), 1);
        assert!(store.cleanup_expired().is_empty());
    }

    #[test]
    fn test_concurrent_access() {
        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..100 {
                        store.set_value(&format!("t{}:{}", t, i), Bytes::from("v"), None);
                        store.incr_value("shared").unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.get_value("shared"), Some(Bytes::from("800")));
        assert_eq!(store.len(), 801);
    }

    #[tokio::test]
    async fn test_kv_store_trait() {
        let store = MemoryStore::new();
        let kv: &dyn KvStore = &store;
        kv.set("k", Bytes::from("v"), None).await.unwrap();
        assert_eq!(kv.get("k").await.unwrap(), Some(Bytes::from("v")));
        assert_eq!(kv.incr("n").await.unwrap(), 1);

        kv.set("bad", Bytes::from("x"), None).await.unwrap();
        assert!(matches!(kv.incr("bad").await, Err(StoreError::Rejected(_))));
    }
}
