//! Query cache implementation
//!
//! Keyed response cache with stale-while-revalidate reads, per-key
//! request deduplication, and scope-prefix invalidation. Values are the
//! raw JSON rows a query returned; typed decoding happens at the edge.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::keys::QueryKey;
use crate::config::CacheConfig;
use crate::error::Result;

/// A cached query result with freshness metadata
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Raw rows as returned by the gateway
    pub data: Value,
    /// When this entry was stored
    pub stored_at: Instant,
    /// Served as-is until this instant
    pub fresh_until: Instant,
    /// Served while revalidating until this instant, then dropped
    pub stale_until: Instant,
}

impl CacheEntry {
    fn new(data: Value, fresh_ttl: Duration, stale_ttl: Duration) -> Self {
        let now = Instant::now();
        let fresh_until = now + fresh_ttl;
        Self {
            data,
            stored_at: now,
            fresh_until,
            stale_until: fresh_until + stale_ttl,
        }
    }

    /// Servable without revalidation
    pub fn is_fresh(&self) -> bool {
        Instant::now() < self.fresh_until
    }

    /// Past the stale window entirely
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.stale_until
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub invalidations: u64,
    pub dedup_waits: u64,
}

impl CacheStats {
    /// Calculate hit rate as percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

enum Lookup {
    Fresh(Value),
    Stale(Value),
    Miss,
}

/// Keyed query cache shared by every client clone
pub struct QueryCache {
    /// The cache storage: storage_key -> entry
    entries: DashMap<String, CacheEntry>,
    /// One in-flight fetch per storage key; joiners subscribe
    flights: DashMap<String, broadcast::Sender<Result<Value>>>,
    /// Per-scope generation counters, bumped on invalidation
    epochs: DashMap<String, u64>,
    /// Configuration
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    invalidations: AtomicU64,
    dedup_waits: AtomicU64,
}

/// Clears an abandoned flight entry if the owning future is dropped
/// before it publishes.
struct FlightGuard {
    cache: Arc<QueryCache>,
    storage_key: String,
    armed: bool,
}

impl FlightGuard {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        if self.armed {
            self.cache.flights.remove(&self.storage_key);
        }
    }
}

impl QueryCache {
    /// Create a new cache with configuration
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            flights: DashMap::new(),
            epochs: DashMap::new(),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
            dedup_waits: AtomicU64::new(0),
        }
    }

    /// Create with default configuration
    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    /// Serve a cached value or run the fetch, whichever freshness
    /// allows.
    ///
    /// A fresh entry is returned as-is. A stale entry is returned
    /// immediately while one background revalidation runs. On a miss
    /// the fetch runs inline, and concurrent callers for the same key
    /// share that single fetch instead of issuing their own.
    ///
    /// A fetch that completes after its scope was invalidated still
    /// hands its value to the caller but does not repopulate the cache.
    pub async fn get_or_fetch<F, Fut>(
        self: &Arc<Self>,
        key: &QueryKey,
        ttl: Option<Duration>,
        fetch: F,
    ) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let storage_key = key.to_storage_key();
        let fresh_ttl = ttl.unwrap_or(self.config.fresh_ttl);

        match self.lookup(&storage_key) {
            Lookup::Fresh(value) => return Ok(value),
            Lookup::Stale(value) => {
                self.spawn_revalidate(key.clone(), fresh_ttl, fetch());
                return Ok(value);
            }
            Lookup::Miss => {}
        }

        loop {
            // Subscribing happens under the entry lock, so an existing
            // leader cannot publish before the subscription is live.
            let waiter = match self.flights.entry(storage_key.clone()) {
                Entry::Occupied(flight) => Some(flight.get().subscribe()),
                Entry::Vacant(slot) => {
                    let (tx, _) = broadcast::channel(1);
                    slot.insert(tx);
                    None
                }
            };

            let mut rx = match waiter {
                Some(rx) => rx,
                None => break,
            };

            self.dedup_waits.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "Joining in-flight request");
            match rx.recv().await {
                Ok(result) => return result,
                // The leader vanished without publishing to us; its
                // result, if it produced one, is in the cache now.
                Err(_) => match self.lookup(&storage_key) {
                    Lookup::Fresh(value) | Lookup::Stale(value) => return Ok(value),
                    Lookup::Miss => continue,
                },
            }
        }

        // Leader path. The guard clears the flight entry if this future
        // is dropped mid-fetch, releasing any joiners to retry.
        let mut guard = FlightGuard {
            cache: Arc::clone(self),
            storage_key: storage_key.clone(),
            armed: true,
        };

        let epoch = self.scope_epoch(&key.scope);
        let result = fetch().await;

        if let Ok(ref value) = result {
            self.store_if_current(key, value.clone(), fresh_ttl, epoch);
        }

        // Remove the flight before publishing: a subscriber that raced
        // past the publish re-reads the cache instead of waiting.
        if let Some((_, tx)) = self.flights.remove(&storage_key) {
            let _ = tx.send(result.clone());
        }
        guard.disarm();

        result
    }

    /// Cached value if the entry is still servable
    pub fn get(&self, key: &QueryKey) -> Option<Value> {
        match self.lookup(&key.to_storage_key()) {
            Lookup::Fresh(value) | Lookup::Stale(value) => Some(value),
            Lookup::Miss => None,
        }
    }

    /// Store a value directly under the scope's current epoch
    pub fn insert(&self, key: &QueryKey, data: Value, ttl: Option<Duration>) {
        let fresh_ttl = ttl.unwrap_or(self.config.fresh_ttl);
        let epoch = self.scope_epoch(&key.scope);
        self.store_if_current(key, data, fresh_ttl, epoch);
    }

    /// Drop every cached read in a scope. The next read re-fetches.
    pub fn invalidate_scope(&self, scope: &str) -> usize {
        self.bump_epoch(scope);
        let removed = self.invalidate_pattern(&QueryKey::scope_pattern(scope));
        debug!(scope = scope, removed = removed, "Invalidated scope");
        removed
    }

    /// Drop one viewer's cached reads in a scope
    pub fn invalidate_viewer_scope(&self, scope: &str, viewer: &str) -> usize {
        self.bump_epoch(scope);
        let removed = self.invalidate_pattern(&QueryKey::viewer_pattern(scope, viewer));
        debug!(
            scope = scope,
            viewer = viewer,
            removed = removed,
            "Invalidated viewer scope"
        );
        removed
    }

    /// Remove entries whose storage key starts with the pattern
    pub fn invalidate_pattern(&self, pattern: &str) -> usize {
        let keys_to_remove: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(pattern))
            .map(|entry| entry.key().clone())
            .collect();

        let count = keys_to_remove.len();
        for key in keys_to_remove {
            self.entries.remove(&key);
        }
        count
    }

    /// Drop everything. Every scope's epoch moves so in-flight fetches
    /// from before the clear cannot repopulate entries.
    pub fn clear(&self) {
        for mut epoch in self.epochs.iter_mut() {
            *epoch += 1;
        }
        self.entries.clear();
        info!("Query cache cleared");
    }

    /// Remove entries past their stale window
    pub fn cleanup(&self) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.is_expired())
            .map(|entry| entry.key().clone())
            .collect();

        let count = expired.len();
        for key in expired {
            self.entries.remove(&key);
        }

        if count > 0 {
            debug!(count = count, "Cleaned up expired cache entries");
        }
        count
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            dedup_waits: self.dedup_waits.load(Ordering::Relaxed),
        }
    }

    /// Get configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn lookup(&self, storage_key: &str) -> Lookup {
        if let Some(entry) = self.entries.get(storage_key) {
            if entry.is_fresh() {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = storage_key, "Cache hit");
                return Lookup::Fresh(entry.data.clone());
            }
            if !entry.is_expired() {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = storage_key, "Stale cache hit");
                return Lookup::Stale(entry.data.clone());
            }
            // Entry expired, remove it
            drop(entry); // Release the reference before removing
            self.entries.remove(storage_key);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key = storage_key, "Cache miss");
        Lookup::Miss
    }

    fn scope_epoch(&self, scope: &str) -> u64 {
        *self.epochs.entry(scope.to_string()).or_insert(0)
    }

    fn bump_epoch(&self, scope: &str) {
        let mut epoch = self.epochs.entry(scope.to_string()).or_insert(0);
        *epoch += 1;
        drop(epoch);
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    fn store_if_current(
        &self,
        key: &QueryKey,
        data: Value,
        fresh_ttl: Duration,
        epoch_at_fetch: u64,
    ) {
        if self.scope_epoch(&key.scope) != epoch_at_fetch {
            debug!(key = %key, "Discarding response fetched before invalidation");
            return;
        }

        let storage_key = key.to_storage_key();
        let entry = CacheEntry::new(data, fresh_ttl, self.config.stale_ttl);
        debug!(key = %key, ttl_secs = fresh_ttl.as_secs(), "Cache store");
        self.entries.insert(storage_key.clone(), entry);

        // Re-check after inserting: an invalidation racing this store
        // must not leave the entry behind.
        if self.scope_epoch(&key.scope) != epoch_at_fetch {
            self.entries.remove(&storage_key);
            return;
        }

        self.maybe_evict();
    }

    fn spawn_revalidate<Fut>(self: &Arc<Self>, key: QueryKey, fresh_ttl: Duration, fut: Fut)
    where
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let storage_key = key.to_storage_key();
        match self.flights.entry(storage_key.clone()) {
            // A fetch for this key is already running
            Entry::Occupied(_) => return,
            Entry::Vacant(slot) => {
                let (tx, _) = broadcast::channel(1);
                slot.insert(tx);
            }
        }

        let cache = Arc::clone(self);
        let epoch = self.scope_epoch(&key.scope);
        debug!(key = %key, "Revalidating stale entry");

        tokio::spawn(async move {
            let mut guard = FlightGuard {
                cache: Arc::clone(&cache),
                storage_key: storage_key.clone(),
                armed: true,
            };

            let result = fut.await;
            match &result {
                Ok(value) => cache.store_if_current(&key, value.clone(), fresh_ttl, epoch),
                // The stale entry stays; the next read retries.
                Err(err) => warn!(key = %key, error = %err, "Background revalidation failed"),
            }

            if let Some((_, tx)) = cache.flights.remove(&storage_key) {
                let _ = tx.send(result);
            }
            guard.disarm();
        });
    }

    /// Evict entries if over capacity (oldest first)
    fn maybe_evict(&self) {
        if self.entries.len() <= self.config.max_entries {
            return;
        }

        let to_evict = self.entries.len() - self.config.max_entries;

        let mut entries: Vec<(String, Instant)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.stored_at))
            .collect();

        entries.sort_by_key(|(_, stored)| *stored);

        for (key, _) in entries.into_iter().take(to_evict) {
            self.entries.remove(&key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }

        debug!(evicted = to_evict, "Evicted cache entries");
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Spawn a background task to periodically drop expired entries
pub fn spawn_cleanup_task(cache: Arc<QueryCache>) {
    let interval = cache.config.cleanup_interval;

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let removed = cache.cleanup();
            let stats = cache.stats();
            debug!(
                removed = removed,
                entries = stats.entries,
                hit_rate = format!("{:.1}%", stats.hit_rate()),
                "Cache cleanup completed"
            );
        }
    });

    info!("Cache cleanup task started");
}
