//! In-memory key/value store with per-entry TTL.
//!
//! Entries are `serde_json::Value` payloads. Every key is also recorded in a
//! namespace index so that invalidating a whole class of entries touches only
//! the keys of that namespace.
//!
//! Each namespace also carries a generation that every delete bumps. A fill
//! computed from storage is only written back if the generation it captured
//! before loading is still current, so a read that overlaps an invalidation
//! cannot resurrect the data the invalidation purged.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::clock::{Clock, SystemClock};
use super::config::CacheConfig;
use super::keys::namespace_of;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

const METRIC_HIT: &str = "penmark_cache_hit_total";
const METRIC_MISS: &str = "penmark_cache_miss_total";
const METRIC_EVICT: &str = "penmark_cache_evict_total";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to serialize cache entry `{key}`: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to deserialize cache entry `{key}`: {source}")]
    Deserialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("ttl for `{key}` is out of range")]
    TtlOutOfRange { key: String },
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Value,
    pub expires_at: OffsetDateTime,
}

impl CacheEntry {
    fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }
}

/// Opaque invalidation epoch for one key, see [`CacheStore::generation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

#[derive(Default)]
struct Inner {
    entries: HashMap<String, CacheEntry>,
    namespaces: HashMap<String, HashSet<String>>,
    generations: HashMap<String, u64>,
    clears: u64,
}

impl Inner {
    fn generation(&self, key: &str) -> Generation {
        let namespace = self.generations.get(namespace_of(key)).copied().unwrap_or(0);
        Generation(namespace.wrapping_add(self.clears))
    }

    fn bump(&mut self, namespace: &str) {
        let generation = self.generations.entry(namespace.to_string()).or_default();
        *generation = generation.wrapping_add(1);
    }

    fn insert(&mut self, key: String, entry: CacheEntry) {
        self.namespaces
            .entry(namespace_of(&key).to_string())
            .or_default()
            .insert(key.clone());
        self.entries.insert(key, entry);
    }

    fn remove(&mut self, key: &str) -> bool {
        if self.entries.remove(key).is_none() {
            return false;
        }
        let namespace = namespace_of(key);
        if let Some(keys) = self.namespaces.get_mut(namespace) {
            keys.remove(key);
            if keys.is_empty() {
                self.namespaces.remove(namespace);
            }
        }
        true
    }
}

pub struct CacheStore {
    inner: RwLock<Inner>,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
}

impl CacheStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            clock,
            default_ttl: config.default_ttl(),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Raw lookup. Expired entries are never returned, whether or not the
    /// sweep has reached them yet.
    pub fn get_value(&self, key: &str) -> Option<Value> {
        let now = self.clock.now();
        let inner = rw_read(&self.inner, SOURCE, "get");
        match inner.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                counter!(METRIC_HIT, "namespace" => namespace_of(key).to_string()).increment(1);
                Some(entry.value.clone())
            }
            _ => {
                counter!(METRIC_MISS, "namespace" => namespace_of(key).to_string()).increment(1);
                None
            }
        }
    }

    /// Typed lookup. A payload that no longer matches `T` is an error, which
    /// callers treat as a miss.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        self.get_value(key)
            .map(|value| {
                serde_json::from_value(value).map_err(|source| CacheError::Deserialize {
                    key: key.to_string(),
                    source,
                })
            })
            .transpose()
    }

    /// Store `value` under `key`, replacing any previous entry. `ttl` of
    /// `None` applies the configured default.
    pub fn set<T: Serialize + ?Sized>(
        &self,
        key: impl Into<String>,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let (key, entry) = self.entry(key.into(), value, ttl)?;
        rw_write(&self.inner, SOURCE, "set").insert(key, entry);
        Ok(())
    }

    /// Current invalidation epoch for `key`. Capture it before loading the
    /// value that will be passed to [`CacheStore::set_if_current`].
    pub fn generation(&self, key: &str) -> Generation {
        rw_read(&self.inner, SOURCE, "generation").generation(key)
    }

    /// Like [`CacheStore::set`], but only stores the value when no delete has
    /// touched the key's namespace since `generation` was captured. Returns
    /// whether the value was stored.
    pub fn set_if_current<T: Serialize + ?Sized>(
        &self,
        key: impl Into<String>,
        value: &T,
        ttl: Option<Duration>,
        generation: Generation,
    ) -> Result<bool, CacheError> {
        let (key, entry) = self.entry(key.into(), value, ttl)?;
        let mut inner = rw_write(&self.inner, SOURCE, "set_if_current");
        if inner.generation(&key) != generation {
            return Ok(false);
        }
        inner.insert(key, entry);
        Ok(true)
    }

    fn entry<T: Serialize + ?Sized>(
        &self,
        key: String,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(String, CacheEntry), CacheError> {
        let value = serde_json::to_value(value).map_err(|source| CacheError::Serialize {
            key: key.clone(),
            source,
        })?;
        let ttl = time::Duration::try_from(ttl.unwrap_or(self.default_ttl))
            .map_err(|_| CacheError::TtlOutOfRange { key: key.clone() })?;
        let expires_at = self
            .clock
            .now()
            .checked_add(ttl)
            .ok_or_else(|| CacheError::TtlOutOfRange { key: key.clone() })?;
        Ok((key, CacheEntry { value, expires_at }))
    }

    /// Remove one key. Returns the number of entries removed (0 or 1).
    pub fn delete(&self, key: &str) -> usize {
        let mut inner = rw_write(&self.inner, SOURCE, "delete");
        inner.bump(namespace_of(key));
        usize::from(inner.remove(key))
    }

    pub fn delete_many<I, S>(&self, keys: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut inner = rw_write(&self.inner, SOURCE, "delete_many");
        keys.into_iter()
            .filter(|key| {
                let key = key.as_ref();
                inner.bump(namespace_of(key));
                inner.remove(key)
            })
            .count()
    }

    /// Remove every key whose namespace is exactly `namespace`.
    pub fn delete_namespace(&self, namespace: &str) -> usize {
        let mut inner = rw_write(&self.inner, SOURCE, "delete_namespace");
        inner.bump(namespace);
        let Some(keys) = inner.namespaces.remove(namespace) else {
            return 0;
        };
        keys.iter()
            .filter(|key| inner.entries.remove(key.as_str()).is_some())
            .count()
    }

    /// All live keys, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        let now = self.clock.now();
        rw_read(&self.inner, SOURCE, "keys")
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Live keys within one namespace.
    pub fn namespace_keys(&self, namespace: &str) -> Vec<String> {
        let now = self.clock.now();
        let inner = rw_read(&self.inner, SOURCE, "namespace_keys");
        inner
            .namespaces
            .get(namespace)
            .into_iter()
            .flatten()
            .filter(|key| {
                inner
                    .entries
                    .get(key.as_str())
                    .is_some_and(|entry| !entry.is_expired(now))
            })
            .cloned()
            .collect()
    }

    /// Number of stored entries, expired-but-unswept ones included.
    pub fn len(&self) -> usize {
        rw_read(&self.inner, SOURCE, "len").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = rw_write(&self.inner, SOURCE, "clear");
        inner.entries.clear();
        inner.namespaces.clear();
        inner.clears = inner.clears.wrapping_add(1);
    }

    /// Evict every expired entry. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut inner = rw_write(&self.inner, SOURCE, "sweep_expired");
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            inner.remove(key);
        }
        if !expired.is_empty() {
            counter!(METRIC_EVICT, "reason" => "expired").increment(expired.len() as u64);
        }
        expired.len()
    }
}

/// Run `sweep_expired` on a fixed cadence until the returned handle is aborted.
pub fn spawn_sweeper(store: Arc<CacheStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await; // first tick completes immediately
        loop {
            interval.tick().await;
            let evicted = store.sweep_expired();
            if evicted > 0 {
                debug!(evicted, remaining = store.len(), "Cache sweep evicted expired entries");
            }
        }
    })
}

/// Serve `key` from the cache, or run `load` and cache its result.
///
/// With no store (cache disabled) this is just `load`. Cache failures are
/// logged and never surface to the caller.
pub async fn read_through<T, E, F, Fut>(
    cache: Option<&CacheStore>,
    key: &str,
    load: F,
) -> Result<T, E>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let generation = cache.map(|store| store.generation(key));
    if let Some(hit) = cache.and_then(|store| get_or_warn(store, key)) {
        return Ok(hit);
    }
    let value = load().await?;
    if let (Some(store), Some(generation)) = (cache, generation) {
        fill_or_warn(store, key, &value, generation);
    }
    Ok(value)
}

fn get_or_warn<T: DeserializeOwned>(store: &CacheStore, key: &str) -> Option<T> {
    match store.get(key) {
        Ok(hit) => hit,
        Err(err) => {
            warn!(key, error = %err, "Cache read failed; treating as miss");
            None
        }
    }
}

fn fill_or_warn<T: Serialize + ?Sized>(
    store: &CacheStore,
    key: &str,
    value: &T,
    generation: Generation,
) {
    match store.set_if_current(key, value, None, generation) {
        Ok(true) => {}
        Ok(false) => debug!(key, "Invalidated while loading; result not cached"),
        Err(err) => warn!(key, error = %err, "Cache write failed; result not cached"),
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use serde::Deserialize;

    use super::*;
    use crate::cache::clock::ManualClock;

    fn store_with_clock() -> (CacheStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let store = CacheStore::with_clock(&CacheConfig::default(), clock.clone());
        (store, clock)
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Payload {
        title: String,
        likes: u64,
    }

    #[test]
    fn set_then_get_returns_equal_value() {
        let (store, _) = store_with_clock();
        let payload = Payload {
            title: "hello".to_string(),
            likes: 3,
        };
        store.set("postDetail:1", &payload, None).expect("set");

        let cached: Option<Payload> = store.get("postDetail:1").expect("get");
        assert_eq!(cached, Some(payload));
    }

    #[test]
    fn entries_expire_without_a_sweep() {
        let (store, clock) = store_with_clock();
        store
            .set("postDetail:1", &1_u32, Some(Duration::from_secs(1)))
            .expect("set");

        clock.advance(time::Duration::seconds(2));

        assert_eq!(store.get::<u32>("postDetail:1").expect("get"), None);
        assert!(store.keys().is_empty());
        assert_eq!(store.len(), 1, "sweep has not run yet");
    }

    #[test]
    fn default_ttl_applies_when_omitted() {
        let (store, clock) = store_with_clock();
        store.set("allPosts", &vec![1, 2, 3], None).expect("set");

        clock.advance(time::Duration::seconds(299));
        assert!(store.get_value("allPosts").is_some());

        clock.advance(time::Duration::seconds(1));
        assert!(store.get_value("allPosts").is_none());
    }

    #[test]
    fn sweep_evicts_only_expired_entries() {
        let (store, clock) = store_with_clock();
        store
            .set("postList:a", &1, Some(Duration::from_secs(1)))
            .expect("set");
        store
            .set("postList:b", &2, Some(Duration::from_secs(10)))
            .expect("set");

        clock.advance(time::Duration::seconds(5));

        assert_eq!(store.sweep_expired(), 1);
        assert_eq!(store.namespace_keys("postList"), vec!["postList:b".to_string()]);
    }

    #[test]
    fn delete_reports_removed_count() {
        let (store, _) = store_with_clock();
        store.set("postComments:1", &0, None).expect("set");
        store.set("postComments:2", &0, None).expect("set");

        assert_eq!(store.delete("postComments:1"), 1);
        assert_eq!(store.delete("postComments:1"), 0);
        assert_eq!(store.delete_many(["postComments:2", "missing"]), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn delete_namespace_matches_exactly() {
        let (store, _) = store_with_clock();
        store.set("postList:all:1", &0, None).expect("set");
        store.set("postList:all:2", &0, None).expect("set");
        store.set("postListArchive:1", &0, None).expect("set");
        store.set("allPosts", &0, None).expect("set");

        assert_eq!(store.delete_namespace("postList"), 2);

        let mut remaining = store.keys();
        remaining.sort();
        assert_eq!(remaining, vec!["allPosts".to_string(), "postListArchive:1".to_string()]);
        assert!(store.namespace_keys("postList").is_empty());
    }

    #[test]
    fn overwrite_replaces_value_and_ttl() {
        let (store, clock) = store_with_clock();
        store
            .set("postDetail:1", &1, Some(Duration::from_secs(1)))
            .expect("set");
        store
            .set("postDetail:1", &2, Some(Duration::from_secs(10)))
            .expect("set");

        clock.advance(time::Duration::seconds(5));

        assert_eq!(store.get::<i32>("postDetail:1").expect("get"), Some(2));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn mismatched_payload_is_a_deserialize_error() {
        let (store, _) = store_with_clock();
        store.set("postDetail:1", &"text", None).expect("set");

        let err = store.get::<Payload>("postDetail:1").expect_err("type mismatch");
        assert!(matches!(err, CacheError::Deserialize { .. }));
        assert!(get_or_warn::<Payload>(&store, "postDetail:1").is_none());
    }

    #[test]
    fn store_recovers_from_poisoned_lock() {
        let (store, _) = store_with_clock();

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = store.inner.write().expect("lock should be acquired");
            panic!("poison cache lock");
        }));

        store.set("allPosts", &1, None).expect("set after poison");
        assert_eq!(store.get::<i32>("allPosts").expect("get"), Some(1));
    }

    #[tokio::test]
    async fn read_through_loads_once_then_hits() {
        let (store, _) = store_with_clock();
        let mut loads = 0;

        for _ in 0..3 {
            let value: Result<u32, ()> = read_through(Some(&store), "allPosts", || {
                loads += 1;
                async { Ok(7) }
            })
            .await;
            assert_eq!(value, Ok(7));
        }

        assert_eq!(loads, 1);
    }

    #[tokio::test]
    async fn read_through_without_store_always_loads() {
        let mut loads = 0;
        for _ in 0..2 {
            let _: Result<u32, ()> = read_through(None, "allPosts", || {
                loads += 1;
                async { Ok(7) }
            })
            .await;
        }
        assert_eq!(loads, 2);
    }

    #[tokio::test]
    async fn read_through_does_not_cache_errors() {
        let (store, _) = store_with_clock();
        let value: Result<u32, &str> =
            read_through(Some(&store), "allPosts", || async { Err("storage down") }).await;
        assert_eq!(value, Err("storage down"));
        assert!(store.is_empty());
    }

    #[test]
    fn stale_generation_is_not_written_back() {
        let (store, _) = store_with_clock();
        let generation = store.generation("postList:all:1");

        store.delete_namespace("postList");

        assert!(!store.set_if_current("postList:all:1", &1, None, generation).expect("set"));
        assert!(store.get_value("postList:all:1").is_none());

        let fresh = store.generation("postList:all:1");
        assert!(store.set_if_current("postList:all:1", &2, None, fresh).expect("set"));
        assert_eq!(store.get::<i32>("postList:all:1").expect("get"), Some(2));
    }

    #[test]
    fn deletes_elsewhere_leave_generation_alone() {
        let (store, _) = store_with_clock();
        let generation = store.generation("allPosts");

        store.delete("postDetail:1");
        store.delete_many(["postComments:1"]);

        assert_eq!(store.generation("allPosts"), generation);
        assert!(store.set_if_current("allPosts", &0, None, generation).expect("set"));
    }

    #[test]
    fn deleting_a_missing_key_still_invalidates_pending_fills() {
        let (store, _) = store_with_clock();
        let generation = store.generation("postDetail:1");

        assert_eq!(store.delete_many(["postDetail:1"]), 0);

        assert_ne!(store.generation("postDetail:1"), generation);
    }

    #[tokio::test]
    async fn read_through_skips_fill_invalidated_during_load() {
        let (store, _) = store_with_clock();
        let value: Result<u32, ()> = read_through(Some(&store), "allPosts", || async {
            store.delete("allPosts");
            Ok(1)
        })
        .await;

        assert_eq!(value, Ok(1));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn sweeper_task_can_be_aborted() {
        let store = Arc::new(CacheStore::new(&CacheConfig::default()));
        let handle = spawn_sweeper(store, Duration::from_secs(60));
        handle.abort();
        assert!(handle.await.expect_err("aborted").is_cancelled());
    }
}
