//! Cache Store Module
//!
//! Main cache engine: a key/value map plus an expirations index, guarded by a
//! single readers-writer lock, feeding metrics and events.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::runtime::Handle;
use tracing::debug;

use crate::cache::{AtomicMetrics, EventDispatcher, Item, MetricsSink, MetricsSnapshot, NoopMetrics};
use crate::config::Config;
use crate::tasks::ExpirationSweep;

// == Maps ==
/// Both maps live under one lock so they are always updated together.
///
/// Invariant: every key of `expirations` is a key of `items`, and a key has
/// an expirations entry exactly when its item can expire.
struct Maps<V> {
    items: HashMap<String, Item<V>>,
    expirations: HashMap<String, Instant>,
}

impl<V> Maps<V> {
    fn new() -> Self {
        Self {
            items: HashMap::new(),
            expirations: HashMap::new(),
        }
    }
}

// == Cache Store ==
/// Thread-safe key/value store with per-item TTL.
///
/// Reads (`get`, `keys`, `len`, `has`) take the shared lock; writes (`set`,
/// deletions) take the exclusive one. Reads never remove expired items: they
/// report them as misses and leave removal to `delete`, `get_delete` and
/// `delete_expired`.
pub struct CacheStore<V> {
    maps: RwLock<Maps<V>>,
    /// TTL used by `set`, `get_set` and `set_get`
    default_ttl: Duration,
    metrics: Arc<dyn MetricsSink>,
    events: EventDispatcher<V>,
    debug: bool,
}

impl<V> CacheStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates an empty store.
    ///
    /// # Arguments
    /// * `config` - TTL, metrics and debug settings (the cleanup interval is
    ///   handled by [`crate::Cache`])
    /// * `runtime` - Runtime used to run event callbacks
    pub fn new(config: &Config, runtime: Handle) -> Self {
        let metrics: Arc<dyn MetricsSink> = if config.enable_metrics {
            Arc::new(AtomicMetrics::new())
        } else {
            Arc::new(NoopMetrics)
        };

        Self {
            maps: RwLock::new(Maps::new()),
            default_ttl: config.ttl,
            metrics,
            events: EventDispatcher::new(runtime),
            debug: config.debug,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    // == Set ==
    /// Stores a value under `key` with the default TTL, replacing any previous item.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Stores a value under `key` with an explicit TTL.
    ///
    /// `Duration::ZERO` stores the value without expiration, and so does a
    /// TTL too large to form a deadline (e.g. `Duration::MAX`).
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let item = Item::new(value, ttl);

        let mut maps = self.maps.write();

        self.events.insertion(&key, &item.value);

        match item.expires_at {
            Some(deadline) => {
                maps.expirations.insert(key.clone(), deadline);
            }
            None => {
                maps.expirations.remove(&key);
            }
        }

        if self.debug {
            debug!("[set] key: '{}', ttl: {:?}", key, ttl);
        }

        maps.items.insert(key, item);
        self.metrics.incr_insertions();
    }

    // == Get ==
    /// Returns the value of `key` if it exists and has not expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let maps = self.maps.read();

        match maps.items.get(key) {
            None => {
                if self.debug {
                    debug!("[get] no value was found for the key: '{}'", key);
                }
                self.metrics.incr_misses();
                None
            }
            Some(item) if item.expired() => {
                if self.debug {
                    debug!("[get] value for the key: '{}' is expired", key);
                }
                self.metrics.incr_misses();
                None
            }
            Some(item) => {
                if self.debug {
                    debug!("[get] hit for the key: '{}'", key);
                }
                self.metrics.incr_hits();
                Some(item.value.clone())
            }
        }
    }

    /// Looks up every key in order. Missing or expired keys yield `None`
    /// at their position.
    pub fn get_multiple<K: AsRef<str>>(&self, keys: &[K]) -> Vec<Option<V>> {
        keys.iter().map(|key| self.get(key.as_ref())).collect()
    }

    // == Compound Operations ==
    // Each of these is two separately locked steps; a concurrent writer may
    // run in between.

    /// Returns the previous value of `key` and stores `value` with the default TTL.
    pub fn get_set(&self, key: impl Into<String>, value: V) -> Option<V> {
        self.get_set_with_ttl(key, value, self.default_ttl)
    }

    /// Returns the previous value of `key` and stores `value` with `ttl`.
    pub fn get_set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) -> Option<V> {
        let key = key.into();
        let previous = self.get(&key);
        self.set_with_ttl(key, value, ttl);
        previous
    }

    /// Stores `value` with the default TTL and reads it back.
    pub fn set_get(&self, key: impl Into<String>, value: V) -> Option<V> {
        self.set_get_with_ttl(key, value, self.default_ttl)
    }

    /// Stores `value` with `ttl` and reads it back.
    pub fn set_get_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) -> Option<V> {
        let key = key.into();
        self.set_with_ttl(key.as_str(), value, ttl);
        self.get(&key)
    }

    /// Returns the value of `key` and removes it. Nothing is removed when
    /// the key is missing or expired.
    pub fn get_delete(&self, key: &str) -> Option<V> {
        let value = self.get(key)?;
        self.evict(key);
        Some(value)
    }

    // == Delete ==
    /// Removes `key`. Returns false if it was not stored.
    pub fn delete(&self, key: &str) -> bool {
        self.evict(key)
    }

    /// Drops every entry at once.
    ///
    /// This is a bulk reset: no eviction events are fired and the evictions
    /// counter is not touched.
    pub fn delete_all(&self) {
        let mut maps = self.maps.write();
        let removed = maps.items.len();
        *maps = Maps::new();

        if self.debug {
            debug!("[delete_all] dropped {} entries", removed);
        }
    }

    /// Removes every entry whose deadline is at or before now and returns how
    /// many were removed.
    ///
    /// Candidates are collected under the shared lock, then evicted one by
    /// one under the exclusive lock. Each candidate's deadline is checked
    /// again before eviction, so a key re-set in between keeps its new value.
    pub fn delete_expired(&self) -> usize {
        let now = Instant::now();

        let candidates: Vec<String> = {
            let maps = self.maps.read();
            maps.expirations
                .iter()
                .filter(|(_, deadline)| **deadline <= now)
                .map(|(key, _)| key.clone())
                .collect()
        };

        let removed = candidates
            .iter()
            .filter(|key| self.evict_if_expired(key, now))
            .count();

        if self.debug {
            debug!(
                "[delete_expired] {} candidates, {} evicted",
                candidates.len(),
                removed
            );
        }

        removed
    }

    // == Introspection ==
    /// Returns every stored key, expired-but-unswept ones included.
    pub fn keys(&self) -> Vec<String> {
        self.maps.read().items.keys().cloned().collect()
    }

    /// Returns the number of stored entries.
    pub fn len(&self) -> usize {
        self.maps.read().items.len()
    }

    /// Same as [`len`](Self::len).
    pub fn count(&self) -> usize {
        self.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.read().items.is_empty()
    }

    /// Returns true if `key` is stored, even if it has expired but has not
    /// been swept yet.
    pub fn has(&self, key: &str) -> bool {
        self.maps.read().items.contains_key(key)
    }

    // == Metrics ==
    /// Returns the live metrics sink. Its counters keep updating.
    pub fn metrics(&self) -> Arc<dyn MetricsSink> {
        Arc::clone(&self.metrics)
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    // == Events ==
    /// Registers the callback run after each insertion, replacing the previous one.
    pub fn on_insertion<F>(&self, callback: F)
    where
        F: Fn(String, V) + Send + Sync + 'static,
    {
        self.events.set_on_insertion(callback);
    }

    /// Registers the callback run after each eviction, replacing the previous one.
    pub fn on_eviction<F>(&self, callback: F)
    where
        F: Fn(String, V) + Send + Sync + 'static,
    {
        self.events.set_on_eviction(callback);
    }

    pub(crate) fn events(&self) -> &EventDispatcher<V> {
        &self.events
    }

    // == Eviction ==
    fn evict(&self, key: &str) -> bool {
        let mut maps = self.maps.write();
        self.remove_locked(&mut maps, key)
    }

    fn evict_if_expired(&self, key: &str, now: Instant) -> bool {
        let mut maps = self.maps.write();

        let still_expired = maps
            .expirations
            .get(key)
            .is_some_and(|deadline| *deadline <= now);
        if !still_expired {
            return false;
        }

        self.remove_locked(&mut maps, key)
    }

    /// The only place a key leaves the cache one at a time: fires the
    /// eviction event and counts it. Does nothing if the key is absent.
    fn remove_locked(&self, maps: &mut Maps<V>, key: &str) -> bool {
        let Some(item) = maps.items.remove(key) else {
            return false;
        };
        maps.expirations.remove(key);

        self.events.eviction(key, &item.value);

        if self.debug {
            debug!("[evict] key: '{}'", key);
        }

        self.metrics.incr_evictions();
        true
    }

    #[cfg(test)]
    fn expiration_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.maps.read().expirations.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl<V> ExpirationSweep for CacheStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn delete_expired(&self) -> usize {
        CacheStore::delete_expired(self)
    }
}

impl<V> fmt::Debug for CacheStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("len", &self.maps.read().items.len())
            .field("default_ttl", &self.default_ttl)
            .field("metrics", &self.metrics)
            .field("events", &self.events)
            .finish()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::thread::sleep;

    fn new_store(config: Config) -> CacheStore<String> {
        CacheStore::new(&config, Handle::current())
    }

    fn metered_store() -> CacheStore<String> {
        new_store(Config::new().enable_metrics())
    }

    #[tokio::test]
    async fn test_store_new() {
        let store = new_store(Config::default());
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
        assert_eq!(store.default_ttl(), Config::default().ttl);
    }

    #[tokio::test]
    async fn test_store_set_and_get() {
        let store = new_store(Config::default());

        store.set("key1", "value1".to_string());

        assert_eq!(store.get("key1"), Some("value1".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_store_get_nonexistent() {
        let store = new_store(Config::default());
        assert_eq!(store.get("nonexistent"), None);
    }

    #[tokio::test]
    async fn test_store_overwrite() {
        let store = new_store(Config::default());

        store.set("key1", "value1".to_string());
        store.set("key1", "value2".to_string());

        assert_eq!(store.get("key1"), Some("value2".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_store_ttl_expiration() {
        let store = new_store(Config::default());

        store.set_with_ttl("x", "v".to_string(), Duration::from_millis(5));
        assert_eq!(store.get("x"), Some("v".to_string()));

        sleep(Duration::from_millis(10));

        assert_eq!(store.get("x"), None);
    }

    #[tokio::test]
    async fn test_store_get_does_not_evict_expired() {
        let store = metered_store();

        store.set_with_ttl("x", "v".to_string(), Duration::from_millis(1));
        sleep(Duration::from_millis(5));

        assert_eq!(store.get("x"), None);
        assert!(store.has("x"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.metrics().evictions(), 0);
    }

    #[tokio::test]
    async fn test_store_zero_ttl_never_expires() {
        let store = new_store(Config::new().ttl(Duration::ZERO));

        store.set("forever", "v".to_string());
        sleep(Duration::from_millis(5));

        assert_eq!(store.get("forever"), Some("v".to_string()));
        assert!(store.expiration_keys().is_empty());
        assert_eq!(store.delete_expired(), 0);
    }

    #[tokio::test]
    async fn test_store_max_ttl_is_stored_without_expiration() {
        let store = new_store(Config::default());

        store.set_with_ttl("k", "v".to_string(), Duration::MAX);

        assert_eq!(store.get("k"), Some("v".to_string()));
        assert!(store.expiration_keys().is_empty());
        assert_eq!(store.delete_expired(), 0);
        assert_eq!(
            store.get_set_with_ttl("k", "w".to_string(), Duration::MAX),
            Some("v".to_string())
        );
        assert_eq!(
            store.set_get_with_ttl("k", "x".to_string(), Duration::MAX),
            Some("x".to_string())
        );
    }

    #[tokio::test]
    async fn test_store_max_default_ttl() {
        let store = new_store(Config::new().ttl(Duration::MAX));

        store.set("k", "v".to_string());
        assert_eq!(store.get_set("k", "w".to_string()), Some("v".to_string()));
        assert_eq!(store.set_get("k", "x".to_string()), Some("x".to_string()));
        assert!(store.expiration_keys().is_empty());
    }

    #[tokio::test]
    async fn test_store_overwrite_updates_expirations_index() {
        let store = new_store(Config::default());

        store.set_with_ttl("key", "v1".to_string(), Duration::from_secs(60));
        assert_eq!(store.expiration_keys(), vec!["key".to_string()]);

        store.set_with_ttl("key", "v2".to_string(), Duration::ZERO);
        assert!(store.expiration_keys().is_empty());
    }

    #[tokio::test]
    async fn test_store_get_multiple_preserves_order() {
        let store = new_store(Config::default());

        store.set("a", "1".to_string());
        store.set("c", "3".to_string());

        let values = store.get_multiple(&["c", "b", "a"]);
        assert_eq!(values, vec![Some("3".to_string()), None, Some("1".to_string())]);
    }

    #[tokio::test]
    async fn test_store_get_set() {
        let store = new_store(Config::default());

        assert_eq!(store.get_set("key", "v1".to_string()), None);
        assert_eq!(store.get_set("key", "v2".to_string()), Some("v1".to_string()));
        assert_eq!(store.get("key"), Some("v2".to_string()));
    }

    #[tokio::test]
    async fn test_store_get_set_with_ttl() {
        let store = new_store(Config::default());

        store.set("key", "v1".to_string());
        let previous = store.get_set_with_ttl("key", "v2".to_string(), Duration::from_millis(1));
        assert_eq!(previous, Some("v1".to_string()));

        sleep(Duration::from_millis(5));
        assert_eq!(store.get("key"), None);
    }

    #[tokio::test]
    async fn test_store_set_get() {
        let store = new_store(Config::default());

        assert_eq!(store.set_get("key", "v".to_string()), Some("v".to_string()));
        assert_eq!(
            store.set_get_with_ttl("other", "w".to_string(), Duration::from_secs(60)),
            Some("w".to_string())
        );
    }

    #[tokio::test]
    async fn test_store_get_delete() {
        let store = metered_store();

        store.set("key", "v".to_string());

        assert_eq!(store.get_delete("key"), Some("v".to_string()));
        assert!(!store.has("key"));
        assert_eq!(store.get_delete("key"), None);
        assert_eq!(store.metrics().evictions(), 1);
    }

    #[tokio::test]
    async fn test_store_delete() {
        let store = metered_store();

        store.set("key1", "value1".to_string());
        assert!(store.delete("key1"));

        assert!(store.is_empty());
        assert_eq!(store.get("key1"), None);
        assert_eq!(store.metrics().evictions(), 1);
    }

    #[tokio::test]
    async fn test_store_delete_nonexistent() {
        let store = metered_store();

        assert!(!store.delete("nonexistent"));
        assert_eq!(store.metrics().evictions(), 0);
    }

    #[tokio::test]
    async fn test_store_delete_all() {
        let store = metered_store();

        store.set("key1", "value1".to_string());
        store.set_with_ttl("key2", "value2".to_string(), Duration::from_secs(60));

        store.delete_all();

        assert!(store.is_empty());
        assert!(store.keys().is_empty());
        assert!(store.expiration_keys().is_empty());
        assert_eq!(store.metrics().evictions(), 0);
    }

    #[tokio::test]
    async fn test_store_delete_expired() {
        let store = metered_store();

        store.set_with_ttl("short1", "v".to_string(), Duration::from_millis(1));
        store.set_with_ttl("short2", "v".to_string(), Duration::from_millis(1));
        store.set_with_ttl("long", "v".to_string(), Duration::from_secs(60));
        store.set_with_ttl("forever", "v".to_string(), Duration::ZERO);

        sleep(Duration::from_millis(5));

        assert_eq!(store.delete_expired(), 2);

        let mut keys = store.keys();
        keys.sort();
        assert_eq!(keys, vec!["forever".to_string(), "long".to_string()]);
        assert_eq!(store.expiration_keys(), vec!["long".to_string()]);
        assert_eq!(store.metrics().evictions(), 2);
    }

    #[tokio::test]
    async fn test_store_sweep_skips_key_reset_after_collection() {
        let store = metered_store();

        store.set_with_ttl("key", "old".to_string(), Duration::from_millis(1));
        sleep(Duration::from_millis(5));
        let sweep_time = Instant::now();

        // Re-set between collection and eviction
        store.set_with_ttl("key", "fresh".to_string(), Duration::from_secs(60));

        assert!(!store.evict_if_expired("key", sweep_time));
        assert_eq!(store.get("key"), Some("fresh".to_string()));
        assert_eq!(store.metrics().evictions(), 0);
    }

    #[tokio::test]
    async fn test_store_sweep_evicts_at_exact_deadline() {
        let store = metered_store();

        store.set_with_ttl("key", "v".to_string(), Duration::from_secs(60));
        let deadline = store.maps.read().expirations["key"];

        assert!(store.evict_if_expired("key", deadline));
        assert!(!store.has("key"));
        assert!(store.expiration_keys().is_empty());
        assert_eq!(store.metrics().evictions(), 1);
    }

    #[tokio::test]
    async fn test_store_sweep_keeps_key_just_before_deadline() {
        let store = metered_store();

        store.set_with_ttl("key", "v".to_string(), Duration::from_secs(60));
        let deadline = store.maps.read().expirations["key"];

        assert!(!store.evict_if_expired("key", deadline - Duration::from_nanos(1)));
        assert!(store.has("key"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_store_concurrent_removals_evict_exactly_once() {
        const KEYS: usize = 200;

        let store = Arc::new(metered_store());
        let evicted = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&evicted);
        store.on_eviction(move |key, _| sink.lock().unwrap().push(key));

        for i in 0..KEYS {
            store.set_with_ttl(format!("exp-{}", i), "v".to_string(), Duration::from_millis(1));
            store.set_with_ttl(format!("live-{}", i), "v".to_string(), Duration::ZERO);
        }
        sleep(Duration::from_millis(5));

        let mut handles = Vec::new();
        for t in 0..6 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                let mut removed = 0;
                for i in 0..KEYS {
                    let exp = format!("exp-{}", i);
                    let live = format!("live-{}", i);
                    if store.delete(&exp) {
                        removed += 1;
                    }
                    let live_removed = if t % 2 == 0 {
                        store.delete(&live)
                    } else {
                        store.get_delete(&live).is_some()
                    };
                    if live_removed {
                        removed += 1;
                    }
                }
                removed
            }));
        }
        for _ in 0..2 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                (0..20).map(|_| store.delete_expired()).sum::<usize>()
            }));
        }

        let removed: usize = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .sum();
        store.events().wait().await;

        let evicted = evicted.lock().unwrap();
        let distinct: std::collections::HashSet<&String> = evicted.iter().collect();

        assert_eq!(removed, 2 * KEYS);
        assert_eq!(evicted.len(), 2 * KEYS);
        assert_eq!(distinct.len(), 2 * KEYS);
        assert_eq!(store.metrics().evictions(), (2 * KEYS) as u64);
        assert!(store.is_empty());
        assert!(store.expiration_keys().is_empty());
    }

    #[tokio::test]
    async fn test_store_keys_and_has() {
        let store = new_store(Config::default());

        store.set("key1", "value1".to_string());
        store.set("key2", "value2".to_string());

        let mut keys = store.keys();
        keys.sort();
        assert_eq!(keys, vec!["key1".to_string(), "key2".to_string()]);
        assert!(store.has("key1"));
        assert!(!store.has("nokey"));
        assert_eq!(store.count(), 2);
    }

    #[tokio::test]
    async fn test_store_metrics_scenario() {
        let store = metered_store();

        store.set("a", "1".to_string());
        store.set("b", "2".to_string());
        assert_eq!(store.get("a"), Some("1".to_string()));
        assert_eq!(store.get("c"), None);
        store.delete("a");

        let metrics = store.metrics();
        assert_eq!(metrics.insertions(), 2);
        assert_eq!(metrics.hits(), 1);
        assert_eq!(metrics.misses(), 1);
        assert_eq!(metrics.evictions(), 1);

        assert!(!store.has("a"));
        assert!(store.has("b"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_store_metrics_handle_is_live() {
        let store = metered_store();
        let metrics = store.metrics();

        store.set("key1", "value1".to_string());
        assert_eq!(metrics.insertions(), 1);

        store.reset_metrics();
        assert_eq!(metrics.insertions(), 0);
    }

    #[tokio::test]
    async fn test_store_metrics_disabled() {
        let store = new_store(Config::default());

        for i in 0..10 {
            store.set(format!("key{}", i), "v".to_string());
            store.get("key0");
            store.get("missing");
            store.delete(&format!("key{}", i));
        }

        let snapshot = store.metrics_snapshot();
        assert_eq!(snapshot.insertions, 0);
        assert_eq!(snapshot.hits, 0);
        assert_eq!(snapshot.misses, 0);
        assert_eq!(snapshot.evictions, 0);
    }

    #[tokio::test]
    async fn test_store_events_fire_once() {
        let store = new_store(Config::default());
        let inserted = Arc::new(Mutex::new(Vec::new()));
        let evicted = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&inserted);
        store.on_insertion(move |key, value| sink.lock().unwrap().push((key, value)));
        let sink = Arc::clone(&evicted);
        store.on_eviction(move |key, value| sink.lock().unwrap().push((key, value)));

        store.set("key", "v1".to_string());
        store.set("key", "v2".to_string());
        store.delete("key");
        store.delete("key");
        store.events().wait().await;

        assert_eq!(inserted.lock().unwrap().len(), 2);
        assert_eq!(
            *evicted.lock().unwrap(),
            vec![("key".to_string(), "v2".to_string())]
        );
    }

    #[tokio::test]
    async fn test_store_debug_tracing_does_not_change_results() {
        let store = new_store(Config::new().debug().enable_metrics());

        store.set("key", "v".to_string());
        assert_eq!(store.get("key"), Some("v".to_string()));
        assert_eq!(store.get_delete("key"), Some("v".to_string()));
        store.delete_all();
        assert_eq!(store.delete_expired(), 0);
        assert_eq!(store.metrics().evictions(), 1);
    }
}
