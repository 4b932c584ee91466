//! Keyed cache of backend reads with request coalescing and staleness.
//!
//! Every fetch the cache issues for a key gets a generation number from a
//! cache-wide counter. Only the result of the latest generation issued for a
//! key is stored; older results still reach whoever awaited them but never
//! overwrite the entry. Concurrent reads of a key share one in-flight fetch.
//!
//! Staleness is tracked per entry. Invalidation marks the generation that was
//! current at that moment, so a fetch that was already in flight when the
//! invalidation arrived stores its value but leaves the entry stale.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crawlwatch_core::CacheKey;
use crawlwatch_logging::{cw_debug, cw_trace, cw_warn};
use futures_util::future::{BoxFuture, FutureExt, Shared};

use crate::ApiError;

type SharedFetch<V> = Shared<BoxFuture<'static, Result<Arc<V>, ApiError>>>;

pub struct QueryCache<V> {
    inner: Arc<Mutex<CacheState<V>>>,
}

impl<V> Clone for QueryCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Default for QueryCache<V> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheState {
                entries: HashMap::new(),
                next_generation: 0,
            })),
        }
    }
}

struct CacheState<V> {
    entries: HashMap<CacheKey, CacheEntry<V>>,
    next_generation: u64,
}

struct CacheEntry<V> {
    value: Option<Arc<V>>,
    stale: bool,
    issued: u64,
    applied: u64,
    stale_mark: u64,
    last_error: Option<ApiError>,
    in_flight: Option<(u64, SharedFetch<V>)>,
}

impl<V> Default for CacheEntry<V> {
    fn default() -> Self {
        Self {
            value: None,
            stale: false,
            issued: 0,
            applied: 0,
            stale_mark: 0,
            last_error: None,
            in_flight: None,
        }
    }
}

/// Point-in-time view of one entry.
#[derive(Debug)]
pub struct CacheSnapshot<V> {
    pub value: Option<Arc<V>>,
    pub stale: bool,
    pub loading: bool,
    pub last_error: Option<ApiError>,
    /// Generation of the stored value; 0 when nothing has been stored yet.
    pub generation: u64,
}

enum Lookup<V> {
    Hit(Arc<V>),
    Pending(SharedFetch<V>),
}

impl<V> QueryCache<V>
where
    V: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored value when it is fresh, joins a fetch already in
    /// flight for `key`, or issues a new one.
    ///
    /// `fetch` is only called when a new fetch is issued; it must not touch
    /// this cache before returning its future.
    pub async fn get_or_fetch<F, Fut>(&self, key: CacheKey, fetch: F) -> Result<Arc<V>, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, ApiError>> + Send + 'static,
    {
        match self.lookup(key, fetch, false) {
            Lookup::Hit(value) => Ok(value),
            Lookup::Pending(fetch) => fetch.await,
        }
    }

    /// Always issues a new fetch for `key`, superseding any in flight.
    pub async fn refresh<F, Fut>(&self, key: CacheKey, fetch: F) -> Result<Arc<V>, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, ApiError>> + Send + 'static,
    {
        match self.lookup(key, fetch, true) {
            Lookup::Hit(value) => Ok(value),
            Lookup::Pending(fetch) => fetch.await,
        }
    }

    fn lookup<F, Fut>(&self, key: CacheKey, fetch: F, force: bool) -> Lookup<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, ApiError>> + Send + 'static,
    {
        let mut guard = self.lock();
        let state = &mut *guard;
        let entry = state.entries.entry(key.clone()).or_default();

        if !force {
            if let (false, Some(value)) = (entry.stale, &entry.value) {
                cw_trace!("cache hit {}", key.fingerprint());
                return Lookup::Hit(Arc::clone(value));
            }
            if let Some((generation, pending)) = &entry.in_flight {
                // A fetch issued before the last invalidation cannot make the
                // entry fresh, so it is not worth joining.
                if !entry.stale || *generation > entry.stale_mark {
                    cw_trace!("joining fetch #{} for {}", generation, key.fingerprint());
                    return Lookup::Pending(pending.clone());
                }
            }
        }

        state.next_generation += 1;
        let generation = state.next_generation;
        let weak = Arc::downgrade(&self.inner);
        let pending_fetch = fetch();
        let completion_key = key.clone();
        let shared = async move {
            let result = pending_fetch.await.map(Arc::new);
            complete(&weak, &completion_key, generation, &result);
            result
        }
        .boxed()
        .shared();

        cw_debug!("issuing fetch #{} for {} ({})", generation, key.fingerprint(), key);
        entry.issued = generation;
        entry.in_flight = Some((generation, shared.clone()));
        Lookup::Pending(shared)
    }

    /// Marks one entry stale. Returns false when the key is not cached.
    pub fn mark_stale(&self, key: &CacheKey) -> bool {
        match self.lock().entries.get_mut(key) {
            Some(entry) => {
                entry.stale = true;
                entry.stale_mark = entry.issued;
                true
            }
            None => false,
        }
    }

    /// Marks every entry whose key matches stale and returns how many matched.
    /// Marking an already stale entry again changes nothing.
    pub fn mark_stale_where(&self, mut predicate: impl FnMut(&CacheKey) -> bool) -> usize {
        let mut guard = self.lock();
        let mut marked = 0;
        for (key, entry) in guard.entries.iter_mut() {
            if predicate(key) {
                entry.stale = true;
                entry.stale_mark = entry.issued;
                marked += 1;
            }
        }
        marked
    }

    pub fn snapshot(&self, key: &CacheKey) -> Option<CacheSnapshot<V>> {
        self.lock().entries.get(key).map(|entry| CacheSnapshot {
            value: entry.value.clone(),
            stale: entry.stale,
            loading: entry.in_flight.is_some(),
            last_error: entry.last_error.clone(),
            generation: entry.applied,
        })
    }

    /// Stored value regardless of staleness.
    pub fn peek(&self, key: &CacheKey) -> Option<Arc<V>> {
        self.lock()
            .entries
            .get(key)
            .and_then(|entry| entry.value.clone())
    }

    pub fn is_stale(&self, key: &CacheKey) -> bool {
        self.lock()
            .entries
            .get(key)
            .is_some_and(|entry| entry.stale)
    }

    pub fn stale_keys(&self) -> BTreeSet<CacheKey> {
        self.lock()
            .entries
            .iter()
            .filter(|(_, entry)| entry.stale)
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Drops every entry. Fetches still in flight complete for their callers
    /// but store nothing.
    pub fn clear(&self) {
        let mut guard = self.lock();
        let dropped = guard.entries.len();
        guard.entries.clear();
        cw_debug!("cache cleared ({} entries)", dropped);
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn complete<V>(
    inner: &Weak<Mutex<CacheState<V>>>,
    key: &CacheKey,
    generation: u64,
    result: &Result<Arc<V>, ApiError>,
) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let mut guard = inner.lock().unwrap_or_else(PoisonError::into_inner);
    let Some(entry) = guard.entries.get_mut(key) else {
        cw_trace!(
            "fetch #{} for {} finished after the entry was dropped",
            generation,
            key.fingerprint()
        );
        return;
    };
    if generation != entry.issued {
        cw_debug!(
            "discarding fetch #{} for {}; #{} is newer",
            generation,
            key.fingerprint(),
            entry.issued
        );
        return;
    }
    entry.in_flight = None;
    match result {
        Ok(value) => {
            entry.value = Some(Arc::clone(value));
            entry.applied = generation;
            entry.last_error = None;
            entry.stale = entry.stale && entry.stale_mark >= generation;
        }
        Err(err) => {
            cw_warn!("fetch for {} failed: {}", key, err);
            entry.last_error = Some(err.clone());
        }
    }
}
