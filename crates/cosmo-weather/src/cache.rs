//! In-memory TTL cache shared by concurrent request handlers.
//!
//! Every read and write goes through a single mutex. The lock is only held
//! for the map operation itself and never across an `.await`, so a request
//! cancelled mid-flight cannot leave a partially written entry behind.
//!
//! There is no capacity bound: entries leave the map when a read finds them
//! expired, or when [`TtlCache::purge_expired`] sweeps them.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Default time-to-live for cached entries
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Longest lifetime an entry can get; larger TTLs saturate here.
const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug)]
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Default TTL applied by [`TtlCache::set`]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get a live value. An expired entry is evicted and reported as absent.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock();
        let now = Instant::now();

        let entry = entries.get(key)?;
        if !entry.is_expired(now) {
            return Some(entry.value.clone());
        }

        entries.remove(key);
        tracing::debug!(key, "cache entry expired");
        None
    }

    /// Store a value with the default TTL, replacing any existing entry.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.ttl);
    }

    /// Store a value with an explicit TTL, replacing any existing entry.
    /// TTLs beyond a century are shortened to one.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let now = Instant::now();
        // A clock too close to its own limit for even MAX_TTL stores nothing live.
        let expires_at = now.checked_add(ttl.min(MAX_TTL)).unwrap_or(now);
        let entry = CacheEntry { value, expires_at };
        self.entries.lock().insert(key.into(), entry);
    }

    /// Remove every expired entry, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Number of stored entries, including expired ones not yet evicted
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
