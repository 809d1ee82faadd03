//! Response Cache
//!
//! Per-method TTL cache for idempotent Bot API reads, keyed by
//! `method:canonical(params)`. Only methods with a registered TTL are
//! cacheable; stores for anything else are ignored. Expired entries are
//! evicted eagerly on lookup.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Canonical serialisation of a parameter object. `serde_json`'s map is
/// ordered by key (the `preserve_order` feature is off), so equivalent
/// parameter sets produce identical strings at every nesting level.
pub fn canonical_params(params: &Value) -> String {
    params.to_string()
}

fn cache_key(method: &str, params: &Value) -> String {
    format!("{}:{}", method, canonical_params(params))
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

/// Cache statistics snapshot.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub size: usize,
    pub by_method: HashMap<String, usize>,
    pub hits: u64,
    pub misses: u64,
}

/// TTL-scoped response cache.
pub struct ResponseCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttls: HashMap<String, Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    /// Create a cache over the given per-method TTL table.
    pub fn new(ttls: HashMap<String, Duration>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttls,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Whether the method has a registered TTL.
    pub fn is_cacheable(&self, method: &str) -> bool {
        self.ttls.contains_key(method)
    }

    /// Look up a cached reply. Expired entries are removed on the spot.
    pub async fn lookup(&self, method: &str, params: &Value) -> Option<Value> {
        if !self.is_cacheable(method) {
            return None;
        }

        let key = cache_key(method, params);
        let now = Instant::now();

        {
            let entries = self.entries.read().await;
            match entries.get(&key) {
                Some(entry) if now < entry.expires_at => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(method, "cache hit");
                    return Some(entry.value.clone());
                }
                Some(_) => {}
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            }
        }

        // Present but expired: evict under the write lock.
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(&key) {
            if now < entry.expires_at {
                // Raced with a concurrent store; honour the fresh entry.
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
            entries.remove(&key);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(method, "cache expired");
        None
    }

    /// Store a reply using the method's registered TTL. A no-op for
    /// methods without one.
    pub async fn store(&self, method: &str, params: &Value, value: Value) {
        let ttl = match self.ttls.get(method) {
            Some(ttl) => *ttl,
            None => return,
        };

        let key = cache_key(method, params);
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };

        self.entries.write().await.insert(key, entry);
        debug!(method, ttl_secs = ttl.as_secs(), "cache store");
    }

    /// Drop every entry belonging to `method`.
    pub async fn evict_method(&self, method: &str) {
        let prefix = format!("{}:", method);
        let mut entries = self.entries.write().await;
        entries.retain(|key, _| !key.starts_with(&prefix));
    }

    /// Drop everything.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Snapshot of live entries. Expired-but-unevicted entries are not
    /// counted.
    pub async fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let entries = self.entries.read().await;

        let mut by_method: HashMap<String, usize> = HashMap::new();
        let mut size = 0;
        for (key, entry) in entries.iter() {
            if now >= entry.expires_at {
                continue;
            }
            size += 1;
            let method = key.split(':').next().unwrap_or("").to_string();
            *by_method.entry(method).or_insert(0) += 1;
        }

        CacheStats {
            size,
            by_method,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
