//! Bounded LRU+TTL pool of live tenant resources.
//!
//! The pool caps how many tenant indexes stay resident at once. Eviction is
//! least-recently-used; entries older than the configured TTL are treated as
//! expired and evicted lazily on access or explicitly via
//! [`ResourcePool::cleanup_expired`]. There is no background timer.
//!
//! The internal mutex covers only map bookkeeping. Eviction callbacks run
//! after the lock is released, so a callback may log or touch storage
//! without stalling other pool users.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Why an entry left the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// Displaced as the least-recently-used entry at capacity.
    Lru,
    /// Exceeded the configured TTL.
    Expired,
    /// Removed by [`ResourcePool::clear`].
    Clear,
}

impl fmt::Display for EvictionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EvictionReason::Lru => "lru",
            EvictionReason::Expired => "expired",
            EvictionReason::Clear => "clear",
        };
        f.write_str(s)
    }
}

/// Callback invoked for every eviction with the key, the evicted resource,
/// and the reason. Runs outside the pool lock.
pub type EvictionCallback<R> = Box<dyn Fn(&str, &R, EvictionReason) + Send + Sync>;

/// Point-in-time pool statistics. Counters are monotonic over the pool's
/// lifetime; `size`/`keys` reflect the moment of the snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub size: usize,
    pub max_size: usize,
    /// `hits / (hits + misses)`, 0.0 before any lookup.
    pub hit_rate: f64,
    /// Resident keys in LRU order, least recent first.
    pub keys: Vec<String>,
}

/// Per-entry view for observability.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceInfo {
    pub key: String,
    pub age: Duration,
    pub access_count: u64,
}

struct CacheEntry<R> {
    resource: R,
    last_accessed: Instant,
    access_count: u64,
}

impl<R> CacheEntry<R> {
    fn new(resource: R) -> Self {
        Self {
            resource,
            last_accessed: Instant::now(),
            access_count: 0,
        }
    }

    fn is_expired(&self, ttl: Option<Duration>) -> bool {
        match ttl {
            Some(ttl) => self.last_accessed.elapsed() > ttl,
            None => false,
        }
    }

    fn touch(&mut self) {
        self.last_accessed = Instant::now();
        self.access_count += 1;
    }
}

struct PoolInner<R> {
    entries: HashMap<String, CacheEntry<R>>,
    /// LRU order: front is least recently used, back most recent.
    order: VecDeque<String>,
}

impl<R> PoolInner<R> {
    fn move_to_back(&mut self, key: &str) {
        if let Some(index) = self.order.iter().position(|k| k == key) {
            self.order.remove(index);
        }
        self.order.push_back(key.to_string());
    }

    fn detach(&mut self, key: &str) -> Option<CacheEntry<R>> {
        if let Some(index) = self.order.iter().position(|k| k == key) {
            self.order.remove(index);
        }
        self.entries.remove(key)
    }
}

/// Bounded, thread-safe LRU+TTL cache keyed by string.
///
/// `len() <= max_size` holds after every operation. Resources are handed
/// out by clone, so `R` is typically an `Arc` around the real resource.
pub struct ResourcePool<R: Clone> {
    inner: Mutex<PoolInner<R>>,
    max_size: usize,
    ttl: Option<Duration>,
    on_evict: Option<EvictionCallback<R>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl<R: Clone> ResourcePool<R> {
    /// Creates a pool holding at most `max_size` entries.
    ///
    /// `max_size` of zero is clamped to one. `ttl` of `None` disables
    /// expiry.
    pub fn new(max_size: usize, ttl: Option<Duration>) -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            max_size: max_size.max(1),
            ttl,
            on_evict: None,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    /// Registers an eviction callback. Invoked for LRU displacement, TTL
    /// expiry, and `clear`, after the pool lock is released.
    pub fn with_eviction_callback(mut self, callback: EvictionCallback<R>) -> Self {
        self.on_evict = Some(callback);
        self
    }

    /// Looks up a resource, marking it most recently used on a hit.
    ///
    /// An expired entry is evicted on the spot and counted as a miss.
    pub fn get(&self, key: &str) -> Option<R> {
        let (result, evicted) = {
            let mut inner = self.lock();
            let expired = match inner.entries.get(key) {
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
                Some(entry) => entry.is_expired(self.ttl),
            };

            if expired {
                let entry = inner.detach(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                self.expirations.fetch_add(1, Ordering::Relaxed);
                (None, entry.map(|e| (key.to_string(), e.resource)))
            } else {
                inner.move_to_back(key);
                let resource = inner.entries.get_mut(key).map(|e| {
                    e.touch();
                    e.resource.clone()
                });
                self.hits.fetch_add(1, Ordering::Relaxed);
                (resource, None)
            }
        };

        if let Some((key, resource)) = evicted {
            debug!(key = %key, "pool entry expired on read");
            self.notify(&key, &resource, EvictionReason::Expired);
        }
        result
    }

    /// Inserts or replaces a resource at the most-recently-used position.
    ///
    /// At capacity, the single least-recently-used entry is evicted first
    /// (callback reason `lru`). Replacement of an existing key never
    /// evicts.
    pub fn put(&self, key: &str, resource: R) {
        let evicted = {
            let mut inner = self.lock();
            let mut evicted = None;

            if inner.entries.contains_key(key) {
                inner.entries.insert(key.to_string(), CacheEntry::new(resource));
                inner.move_to_back(key);
            } else {
                if inner.entries.len() >= self.max_size {
                    if let Some(lru_key) = inner.order.front().cloned() {
                        if let Some(entry) = inner.detach(&lru_key) {
                            self.evictions.fetch_add(1, Ordering::Relaxed);
                            evicted = Some((lru_key, entry.resource));
                        }
                    }
                }
                inner.entries.insert(key.to_string(), CacheEntry::new(resource));
                inner.order.push_back(key.to_string());
            }
            evicted
        };

        if let Some((key, resource)) = evicted {
            info!(key = %key, "pool evicted least-recently-used entry");
            self.notify(&key, &resource, EvictionReason::Lru);
        }
    }

    /// Removes an entry, returning its resource. No eviction callback.
    pub fn remove(&self, key: &str) -> Option<R> {
        let mut inner = self.lock();
        inner.detach(key).map(|e| e.resource)
    }

    /// Evicts everything, invoking the callback with reason `clear` per
    /// entry.
    pub fn clear(&self) {
        let drained: Vec<(String, R)> = {
            let mut inner = self.lock();
            inner.order.clear();
            inner
                .entries
                .drain()
                .map(|(k, e)| (k, e.resource))
                .collect()
        };

        info!(count = drained.len(), "pool cleared");
        for (key, resource) in &drained {
            self.notify(key, resource, EvictionReason::Clear);
        }
    }

    /// Evicts every TTL-expired entry regardless of LRU order and returns
    /// the count removed. Explicit maintenance; nothing schedules this.
    pub fn cleanup_expired(&self) -> usize {
        let expired: Vec<(String, R)> = {
            let mut inner = self.lock();
            let keys: Vec<String> = inner
                .entries
                .iter()
                .filter(|(_, e)| e.is_expired(self.ttl))
                .map(|(k, _)| k.clone())
                .collect();
            keys.into_iter()
                .filter_map(|k| inner.detach(&k).map(|e| (k, e.resource)))
                .collect()
        };

        let count = expired.len();
        if count > 0 {
            self.expirations.fetch_add(count as u64, Ordering::Relaxed);
            info!(count, "expired pool entries removed");
        }
        for (key, resource) in &expired {
            self.notify(key, resource, EvictionReason::Expired);
        }
        count
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().entries.contains_key(key)
    }

    /// Statistics snapshot.
    pub fn stats(&self) -> PoolStats {
        let (size, keys) = {
            let inner = self.lock();
            (inner.entries.len(), inner.order.iter().cloned().collect())
        };
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        PoolStats {
            hits,
            misses,
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            size,
            max_size: self.max_size,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
            keys,
        }
    }

    /// Per-entry age and access counts, in LRU order.
    pub fn resource_info(&self) -> Vec<ResourceInfo> {
        let inner = self.lock();
        inner
            .order
            .iter()
            .filter_map(|key| {
                inner.entries.get(key).map(|e| ResourceInfo {
                    key: key.clone(),
                    age: e.last_accessed.elapsed(),
                    access_count: e.access_count,
                })
            })
            .collect()
    }

    fn notify(&self, key: &str, resource: &R, reason: EvictionReason) {
        if let Some(callback) = &self.on_evict {
            callback(key, resource, reason);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PoolInner<R>> {
        // A poisoned pool lock means a panic mid-bookkeeping; the map is
        // still structurally sound, so recover the guard.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Rewinds an entry's `last_accessed` so TTL paths are testable without
    /// sleeping.
    #[cfg(test)]
    fn backdate(&self, key: &str, age: Duration) {
        let mut inner = self.lock();
        if let Some(entry) = inner.entries.get_mut(key) {
            if let Some(past) = Instant::now().checked_sub(age) {
                entry.last_accessed = past;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn pool(max_size: usize, ttl_secs: Option<u64>) -> ResourcePool<Arc<String>> {
        ResourcePool::new(max_size, ttl_secs.map(Duration::from_secs))
    }

    fn resource(v: &str) -> Arc<String> {
        Arc::new(v.to_string())
    }

    #[test]
    fn get_miss_on_empty_pool() {
        let p = pool(2, None);
        assert!(p.get("a").is_none());
        assert_eq!(p.stats().misses, 1);
    }

    #[test]
    fn put_then_get_hits() {
        let p = pool(2, None);
        p.put("a", resource("1"));
        assert_eq!(p.get("a").unwrap().as_str(), "1");
        let stats = p.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.size, 1);
    }

    #[test]
    fn lru_eviction_order() {
        // put a, put b, get a, put c => b evicted, a and c resident.
        let p = pool(2, None);
        p.put("a", resource("1"));
        p.put("b", resource("2"));
        assert!(p.get("a").is_some());
        p.put("c", resource("3"));

        assert!(p.get("b").is_none());
        assert!(p.get("a").is_some());
        assert!(p.get("c").is_some());
        assert_eq!(p.stats().evictions, 1);
    }

    #[test]
    fn cap_invariant_holds_under_many_puts() {
        let p = pool(3, None);
        for i in 0..20 {
            p.put(&format!("k{i}"), resource("v"));
            assert!(p.len() <= 3);
        }
        assert_eq!(p.len(), 3);
    }

    #[test]
    fn replacing_existing_key_does_not_evict() {
        let p = pool(2, None);
        p.put("a", resource("1"));
        p.put("b", resource("2"));
        p.put("a", resource("updated"));

        assert_eq!(p.len(), 2);
        assert_eq!(p.get("a").unwrap().as_str(), "updated");
        assert!(p.get("b").is_some());
        assert_eq!(p.stats().evictions, 0);
    }

    #[test]
    fn replace_moves_key_to_most_recent() {
        let p = pool(2, None);
        p.put("a", resource("1"));
        p.put("b", resource("2"));
        p.put("a", resource("1b"));
        p.put("c", resource("3"));

        // "b" was least recent after the replace.
        assert!(p.get("b").is_none());
        assert!(p.get("a").is_some());
    }

    #[test]
    fn expired_entry_is_a_miss_and_removed() {
        let p = pool(2, Some(10));
        p.put("k", resource("v"));
        p.backdate("k", Duration::from_secs(11));

        assert!(p.get("k").is_none());
        assert!(!p.contains("k"));
        let stats = p.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.expirations, 1);
    }

    #[test]
    fn unexpired_entry_survives_get() {
        let p = pool(2, Some(10));
        p.put("k", resource("v"));
        p.backdate("k", Duration::from_secs(5));
        assert!(p.get("k").is_some());
    }

    #[test]
    fn cleanup_expired_reports_count() {
        let p = pool(4, Some(10));
        p.put("fresh", resource("v"));
        p.put("old1", resource("v"));
        p.put("old2", resource("v"));
        p.backdate("old1", Duration::from_secs(20));
        p.backdate("old2", Duration::from_secs(20));

        assert_eq!(p.cleanup_expired(), 2);
        assert!(p.contains("fresh"));
        assert!(!p.contains("old1"));
        assert_eq!(p.stats().expirations, 2);
    }

    #[test]
    fn no_ttl_means_no_expiry() {
        let p = pool(2, None);
        p.put("k", resource("v"));
        p.backdate("k", Duration::from_secs(1_000_000));
        assert!(p.get("k").is_some());
        assert_eq!(p.cleanup_expired(), 0);
    }

    #[test]
    fn remove_returns_resource_without_callback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_ref = calls.clone();
        let p = pool(2, None).with_eviction_callback(Box::new(move |_, _, _| {
            calls_ref.fetch_add(1, Ordering::SeqCst);
        }));
        p.put("a", resource("1"));

        assert_eq!(p.remove("a").unwrap().as_str(), "1");
        assert!(p.remove("a").is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn eviction_callback_reasons() {
        let seen: Arc<Mutex<Vec<(String, String)>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_ref = seen.clone();
        let p = pool(1, Some(10)).with_eviction_callback(Box::new(move |key, _, reason| {
            seen_ref
                .lock()
                .unwrap()
                .push((key.to_string(), reason.to_string()));
        }));

        p.put("a", resource("1"));
        p.put("b", resource("2")); // evicts a (lru)
        p.backdate("b", Duration::from_secs(20));
        assert_eq!(p.cleanup_expired(), 1); // expires b
        p.put("c", resource("3"));
        p.clear(); // clears c

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                ("a".to_string(), "lru".to_string()),
                ("b".to_string(), "expired".to_string()),
                ("c".to_string(), "clear".to_string()),
            ]
        );
    }

    #[test]
    fn stats_track_hit_rate_and_keys() {
        let p = pool(3, None);
        p.put("a", resource("1"));
        p.put("b", resource("2"));
        p.get("a");
        p.get("missing");

        let stats = p.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
        // LRU order: b is least recent after the get("a").
        assert_eq!(stats.keys, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn resource_info_reports_access_counts() {
        let p = pool(2, None);
        p.put("a", resource("1"));
        p.get("a");
        p.get("a");

        let info = p.resource_info();
        assert_eq!(info.len(), 1);
        assert_eq!(info[0].key, "a");
        assert_eq!(info[0].access_count, 2);
    }

    #[test]
    fn pool_is_shareable_across_threads() {
        let p = Arc::new(pool(4, None));
        let mut handles = Vec::new();
        for t in 0..4 {
            let p = p.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..50 {
                    let key = format!("k{}", (t + i) % 6);
                    p.put(&key, resource("v"));
                    p.get(&key);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert!(p.len() <= 4);
    }
}
