use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use super::types::{Article, Snapshot};

/// Default TTL for the cached snapshot (5 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Source of "now" for freshness decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Monotonic system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Holder for the single feed snapshot.
///
/// Capacity is always zero or one entry. `set` replaces the whole snapshot in
/// one assignment, so readers never observe a partial update.
pub trait FeedCache: Send + Sync {
    /// Current snapshot, or `None` before the first successful fetch.
    fn get(&self) -> Option<Arc<Snapshot>>;

    /// Replaces the snapshot and returns the new one.
    fn set(&self, articles: Vec<Article>, now: Instant) -> Arc<Snapshot>;

    /// True iff a snapshot exists and is younger than `ttl` at `now`.
    fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        self.get().is_some_and(|snapshot| snapshot.age(now) < ttl)
    }
}

/// In-process [`FeedCache`] living for the lifetime of the server.
#[derive(Debug, Default)]
pub struct MemoryCache {
    slot: RwLock<Option<Arc<Snapshot>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave the slot half-written
    fn read(&self) -> RwLockReadGuard<'_, Option<Arc<Snapshot>>> {
        self.slot.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Arc<Snapshot>>> {
        self.slot.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl FeedCache for MemoryCache {
    fn get(&self) -> Option<Arc<Snapshot>> {
        self.read().clone()
    }

    fn set(&self, articles: Vec<Article>, now: Instant) -> Arc<Snapshot> {
        let snapshot = Arc::new(Snapshot::new(articles, now));
        *self.write() = Some(Arc::clone(&snapshot));
        snapshot
    }
}
