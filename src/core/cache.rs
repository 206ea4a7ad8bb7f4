use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

use super::price::Pair;

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-memory cache where every entry carries its own expiry.
///
/// Expired entries are evicted lazily by the lookup that finds them; there is
/// no background sweep and no capacity bound. Lookups hand out clones, the
/// stored entry never leaves the lock.
#[derive(Clone)]
pub struct Cache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Arc<Mutex<HashMap<K, CacheEntry<V>>>>,
}

/// Last traded prices keyed by pair.
pub type PriceCache = Cache<Pair, f64>;

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Send + Sync + Debug + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns the cached value if it has not expired yet, evicting it otherwise.
    pub async fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + Debug + ?Sized,
    {
        let mut cache = self.inner.lock().await;
        let live = cache.get(key).map(|entry| entry.is_live(Instant::now()));
        match live {
            Some(true) => {
                debug!("Cache HIT for key: {:?}", key);
                cache.get(key).map(|entry| entry.value.clone())
            }
            Some(false) => {
                debug!("Cache entry expired for key: {:?}", key);
                cache.remove(key);
                None
            }
            None => {
                debug!("Cache MISS for key: {:?}", key);
                None
            }
        }
    }

    /// Inserts or replaces the entry for `key`, valid for `ttl` from now.
    pub async fn put(&self, key: K, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };

        let mut cache = self.inner.lock().await;
        debug!("Cache PUT for key: {:?}", key);
        cache.insert(key, entry);
    }

    /// Number of stored entries, expired ones included until a lookup evicts them.
    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    #[cfg(test)]
    pub(crate) async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

impl<K, V> Default for Cache<K, V>
where
    K: Eq + Hash + Send + Sync + Debug + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
