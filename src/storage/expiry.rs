//! Active expiry for the `memory` backend.
//!
//! Every admitted client leaves an `IPS:` counter that expires one rate-limit
//! window later. A client that never reconnects never reads its counter
//! again, so lazy expiry alone would keep one dead counter per address ever
//! seen. The sweeper reclaims them once per window, together with any
//! records whose configured expiration has passed.

use crate::storage::MemoryStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Handle to the running sweeper. Dropping it stops the task.
#[derive(Debug)]
pub struct ExpirySweeper {
    task: JoinHandle<()>,
    every: Duration,
}

impl ExpirySweeper {
    /// Spawns a sweep of `store` every `every` on the current runtime.
    pub fn start(store: Arc<MemoryStore>, every: Duration) -> Self {
        let task = tokio::spawn(sweep(store, every));
        info!(interval_ms = every.as_millis() as u64, "Expiry sweeper started");
        Self { task, every }
    }

    pub fn interval(&self) -> Duration {
        self.every
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.task.abort();
        debug!("Expiry sweeper stopped");
    }
}

async fn sweep(store: Arc<MemoryStore>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    // A late sweep finds the same keys; there is nothing to catch up on.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately, before anything can have expired.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let report = store.cleanup_expired();
        if !report.is_empty() {
            debug!(
                counters = report.counters,
                records = report.records,
                remaining = store.len(),
                "Reclaimed expired keys"
            );
        }
    }
}
