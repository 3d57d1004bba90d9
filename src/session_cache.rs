//! Session resumption cache shared across channel configurations.
//!
//! A [`SessionCacheHandle`] is a reference-counted handle to one bounded
//! cache.  Copying the handle takes another reference; dropping the last
//! reference releases the cache.  Two handles are equal only when they
//! denote the same cache instance.
//!
//! The cache holds server-side session state in an LRU map and client-side
//! tickets in the engine's client session store, both bounded by the same
//! capacity.

use std::any::Any;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustls::client::{ClientSessionMemoryCache, ClientSessionStore};
use rustls::server::StoresServerSessions;
use tracing::{debug, trace};

use crate::channel_args::{ArgValue, ChannelArgs, PointerArg};

/// Channel argument key carrying a [`SessionCacheHandle`].
pub const SSL_SESSION_CACHE_ARG: &str = "ssl.session_cache";

// ─────────────────────────────────────────────────────────────────────────────
// LRU map
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct LruMap {
    entries: HashMap<Vec<u8>, (Vec<u8>, u64)>,
    recency: BTreeMap<u64, Vec<u8>>,
    clock: u64,
}

impl LruMap {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn get(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        let now = self.tick();
        let (value, stamp) = self.entries.get_mut(key)?;
        let previous = std::mem::replace(stamp, now);
        if let Some(k) = self.recency.remove(&previous) {
            self.recency.insert(now, k);
        }
        Some(value.clone())
    }

    /// Insert and return how many entries were evicted.
    fn put(&mut self, capacity: usize, key: Vec<u8>, value: Vec<u8>) -> usize {
        let now = self.tick();
        if let Some((_, previous)) = self.entries.insert(key.clone(), (value, now)) {
            self.recency.remove(&previous);
        }
        self.recency.insert(now, key);

        let mut evicted = 0;
        while self.entries.len() > capacity {
            let Some((_, oldest)) = self.recency.pop_first() else {
                break;
            };
            self.entries.remove(&oldest);
            evicted += 1;
        }
        evicted
    }

    fn take(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        let (value, stamp) = self.entries.remove(key)?;
        self.recency.remove(&stamp);
        Some(value)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cache
// ─────────────────────────────────────────────────────────────────────────────

/// Bounded session cache.  Only reachable through [`SessionCacheHandle`].
pub struct SessionCache {
    capacity: usize,
    server_sessions: Mutex<LruMap>,
    client_sessions: Arc<ClientSessionMemoryCache>,
}

impl SessionCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            server_sessions: Mutex::new(LruMap::default()),
            client_sessions: Arc::new(ClientSessionMemoryCache::new(capacity)),
        }
    }
}

impl fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCache")
            .field("capacity", &self.capacity)
            .field("server_sessions", &self.server_sessions.lock().len())
            .finish_non_exhaustive()
    }
}

impl Drop for SessionCache {
    fn drop(&mut self) {
        debug!(capacity = self.capacity, "Session cache released");
    }
}

impl StoresServerSessions for SessionCache {
    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> bool {
        if self.capacity == 0 {
            return false;
        }
        let evicted = self.server_sessions.lock().put(self.capacity, key, value);
        if evicted > 0 {
            trace!(evicted, "Evicted least recently used sessions");
        }
        true
    }

    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.server_sessions.lock().get(key)
    }

    fn take(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.server_sessions.lock().take(key)
    }

    fn can_cache(&self) -> bool {
        self.capacity > 0
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handle
// ─────────────────────────────────────────────────────────────────────────────

/// Shared handle to a [`SessionCache`].
///
/// `clone` is the copy operation and `drop` the destroy operation; the
/// reference count is atomic so handles may be copied and dropped from any
/// thread.
#[derive(Debug, Clone)]
pub struct SessionCacheHandle {
    cache: Arc<SessionCache>,
}

impl SessionCacheHandle {
    /// Create a cache holding at most `capacity` sessions, evicting the least
    /// recently used one when full.
    ///
    /// The returned handle is the creator's reference and must be dropped
    /// like any copy.
    #[must_use]
    pub fn create_lru(capacity: usize) -> Self {
        debug!(capacity, "Session cache created");
        Self {
            cache: Arc::new(SessionCache::new(capacity)),
        }
    }

    /// Maximum number of cached sessions.
    pub fn capacity(&self) -> usize {
        self.cache.capacity
    }

    /// Number of server sessions currently cached.
    pub fn server_session_count(&self) -> usize {
        self.cache.server_sessions.lock().len()
    }

    /// Live references to the cache, including engine configurations.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.cache)
    }

    /// Whether both handles denote the same cache.
    pub fn same_cache(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cache, &other.cache)
    }

    /// Non-owning reference, to observe when the cache is released.
    pub fn downgrade(&self) -> Weak<SessionCache> {
        Arc::downgrade(&self.cache)
    }

    /// Store for server configurations.
    pub fn server_store(&self) -> Arc<dyn StoresServerSessions> {
        Arc::clone(&self.cache) as Arc<dyn StoresServerSessions>
    }

    /// Store for client configurations.
    pub fn client_store(&self) -> Arc<dyn ClientSessionStore> {
        Arc::clone(&self.cache.client_sessions) as Arc<dyn ClientSessionStore>
    }

    /// Wrap a copy of this handle as a channel argument value.
    pub fn to_arg(&self) -> ArgValue {
        ArgValue::Pointer(self.copy())
    }

    /// Handle stored under [`SSL_SESSION_CACHE_ARG`], if any.
    pub fn from_channel_args(args: &ChannelArgs) -> Option<&Self> {
        args.get_pointer::<Self>(SSL_SESSION_CACHE_ARG)
    }

    fn cmp_identity(&self, other: &Self) -> Ordering {
        Arc::as_ptr(&self.cache).cmp(&Arc::as_ptr(&other.cache))
    }
}

impl PartialEq for SessionCacheHandle {
    fn eq(&self, other: &Self) -> bool {
        self.same_cache(other)
    }
}

impl Eq for SessionCacheHandle {}

impl PointerArg for SessionCacheHandle {
    fn copy(&self) -> Box<dyn PointerArg> {
        Box::new(self.clone())
    }

    fn compare(&self, other: &dyn PointerArg) -> Ordering {
        match other.as_any().downcast_ref::<Self>() {
            Some(other) => self.cmp_identity(other),
            None => Ordering::Greater,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Add `cache` to `args` under [`SSL_SESSION_CACHE_ARG`].
#[must_use]
pub fn with_session_cache(args: ChannelArgs, cache: &SessionCacheHandle) -> ChannelArgs {
    args.with(SSL_SESSION_CACHE_ARG, cache.to_arg())
}
