use crate::stats::RedirectStats;
use hashbrown::HashMap;
use parking_lot::RwLock;
use std::hash::Hash;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};

/// Records every key whose actual shard differs from its natural shard.
///
/// Load-aware routing can send an insert away from the key's natural shard.
/// Without this index a later lookup would probe the natural shard, miss,
/// and have to scan every shard. With it, a lookup that misses the routed
/// shard consults the index and lands on the right shard in one more probe.
///
/// An entry exists iff the key's residence differs from its natural shard;
/// entries whose shards have reconverged are pruned by
/// [`gc_expired`](RedirectIndex::gc_expired).
pub(crate) struct RedirectIndex<K> {
    redirects: RwLock<HashMap<K, usize>>,
    total_redirects: AtomicU64,
    lookups: AtomicU64,
    hits: AtomicU64,
}

impl<K: Eq + Hash> RedirectIndex<K> {
    pub fn new() -> Self {
        Self {
            redirects: RwLock::new(HashMap::new()),
            total_redirects: AtomicU64::new(0),
            lookups: AtomicU64::new(0),
            hits: AtomicU64::new(0),
        }
    }

    /// Record that a key landed on `actual` instead of `natural`. No-op when
    /// the two agree.
    pub fn record_redirect(&self, key: K, natural: usize, actual: usize) {
        if natural == actual {
            return;
        }
        self.redirects.write().insert(key, actual);
        self.total_redirects.fetch_add(1, Ordering::Relaxed);
    }

    /// The shard this key was diverted to, if any.
    pub fn lookup(&self, key: &K) -> Option<usize> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let result = self.redirects.read().get(key).copied();
        if result.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Drop any entry for this key. Called when the key is removed from the
    /// store or migrates back to its natural shard.
    pub fn remove(&self, key: &K) {
        self.redirects.write().remove(key);
    }

    /// Remove entries whose recorded shard now equals the key's natural
    /// shard, so the diversion is no longer needed. Returns the number of
    /// entries removed.
    pub fn gc_expired(&self, natural_of: impl Fn(&K) -> usize) -> usize {
        let mut redirects = self.redirects.write();
        let before = redirects.len();
        redirects.retain(|key, &mut actual| natural_of(key) != actual);
        before - redirects.len()
    }

    /// Drop every entry and reset counters.
    pub fn clear(&self) {
        let mut redirects = self.redirects.write();
        redirects.clear();
        self.total_redirects.store(0, Ordering::Relaxed);
        self.lookups.store(0, Ordering::Relaxed);
        self.hits.store(0, Ordering::Relaxed);
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.redirects.read().len()
    }

    /// Estimated memory held by the index.
    pub fn memory_bytes(&self) -> usize {
        // Per entry: key + shard id + hash-table bucket overhead.
        self.len() * (mem::size_of::<K>() + mem::size_of::<usize>() + 16)
    }

    /// Run a closure over every (key, shard) entry. Used by whole-store
    /// invariant checks.
    pub fn for_each(&self, mut f: impl FnMut(&K, usize)) {
        for (key, &shard) in self.redirects.read().iter() {
            f(key, shard);
        }
    }

    pub fn stats(&self) -> RedirectStats {
        let lookups = self.lookups.load(Ordering::Relaxed);
        let hits = self.hits.load(Ordering::Relaxed);
        RedirectStats {
            total_redirects: self.total_redirects.load(Ordering::Relaxed),
            lookups,
            hits,
            hit_rate: if lookups > 0 {
                hits as f64 * 100.0 / lookups as f64
            } else {
                0.0
            },
            entries: self.len(),
            memory_bytes: self.memory_bytes(),
        }
    }
}
