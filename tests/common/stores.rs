//! KvStore doubles.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::time::Duration;
use webstore::storage::{KvStore, MemoryStore, StoreError, StoreResult};

/// How a [`CountingStore`] answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Mode {
    Normal = 0,
    Unavailable = 1,
    Rejecting = 2,
}

/// A memory store that counts every operation and can be told to fail.
#[derive(Default)]
pub struct CountingStore {
    pub inner: MemoryStore,
    gets: AtomicUsize,
    sets: AtomicUsize,
    incrs: AtomicUsize,
    mode: AtomicU8,
}

#[allow(dead_code)]
impl CountingStore {
    pub fn set_mode(&self, mode: Mode) {
        self.mode.store(mode as u8, Ordering::SeqCst);
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn incrs(&self) -> usize {
        self.incrs.load(Ordering::SeqCst)
    }

    pub fn operations(&self) -> usize {
        self.gets() + self.sets() + self.incrs()
    }

    fn fail(&self) -> Option<StoreError> {
        match self.mode.load(Ordering::SeqCst) {
            1 => Some(StoreError::Unavailable("connection refused".to_string())),
            2 => Some(StoreError::Rejected("READONLY You can't write against a read only replica.".to_string())),
            _ => None,
        }
    }
}

#[async_trait]
impl KvStore for CountingStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        match self.fail() {
            Some(e) => Err(e),
            None => self.inner.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> StoreResult<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        match self.fail() {
            Some(e) => Err(e),
            None => self.inner.set(key, value, ttl).await,
        }
    }

    async fn incr(&self, key: &str) -> StoreResult<i64> {
        self.incrs.fetch_add(1, Ordering::SeqCst);
        match self.fail() {
            Some(e) => Err(e),
            None => self.inner.incr(key).await,
        }
    }
}
