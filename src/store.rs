use crate::config::{create_hasher, Config};
use crate::error::{Error, InvariantError};
use crate::hash::{KeyHasher, RangeKey};
use crate::redirect::RedirectIndex;
use crate::router::AdaptiveRouter;
use crate::shard::Shard;
use crate::stats::{Diagnostics, RedirectStats, ShardDiagnostics, ShardOps, Stats};
use parking_lot::RwLock;
use std::hash::Hash;
use std::sync::Arc;

/// Concurrent ordered map sharded across AVL trees, with adaptive
/// hotspot-aware routing.
///
/// Keys are partitioned across N independent height-balanced trees, each
/// behind its own read-write lock, so operations on different shards don't
/// block each other. The router picks the shard for each key and, under the
/// load-aware strategies, diverts inserts away from overloaded shards; the
/// redirect index records every diverted key so lookups stay correct.
/// Values are stored behind `Arc<V>` so reads are zero-copy.
///
/// # Example
///
/// ```rust
/// use shardtree::ShardTree;
///
/// let store = ShardTree::new();
/// store.put(1u64, "one");
/// assert_eq!(*store.get(&1).unwrap(), "one");
/// assert!(store.remove(&1));
/// ```
pub struct ShardTree<K, V> {
    shards: Vec<Shard<K, V>>,
    router: AdaptiveRouter,
    redirects: RedirectIndex<K>,
    /// Rebalance barrier: every normal operation holds it shared, rebalance
    /// holds it exclusive. Outermost lock in the crate.
    barrier: RwLock<()>,
    hasher: KeyHasher,
}

impl<K, V> ShardTree<K, V>
where
    K: Ord + Hash + RangeKey + Clone + Send + Sync,
    V: Send + Sync,
{
    /// Create a store with defaults: 8 shards, intelligent routing, hotspot
    /// ratio 1.5 over an absolute floor of 100, 150 virtual nodes per shard.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create a store with the given number of shards and defaults otherwise.
    pub fn with_shard_count(shard_count: usize) -> Result<Self, Error> {
        Ok(Self::with_config(Config::default().shard_count(shard_count)?))
    }

    /// Create a store from a validated [`Config`].
    pub fn with_config(config: Config) -> Self {
        let shards = (0..config.shard_count).map(|_| Shard::new()).collect();
        let router = AdaptiveRouter::new(
            config.shard_count,
            config.strategy,
            config.hotspot_ratio,
            config.hotspot_floor,
            config.virtual_nodes,
        );
        Self {
            shards,
            router,
            redirects: RedirectIndex::new(),
            barrier: RwLock::new(()),
            hasher: create_hasher(config.hash_function),
        }
    }

    /// Number of shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// The shard the router currently picks for this key, including hotspot
    /// diversion. Observability aid: where a `put` of this key would land
    /// right now.
    ///
    /// # Example
    ///
    /// ```rust
    /// use shardtree::ShardTree;
    ///
    /// let store = ShardTree::new();
    /// store.put(42u64, "data");
    /// let shard = store.shard_for_key(&42);
    /// let loads = store.shard_loads();
    /// assert!(loads[shard] <= store.len());
    /// ```
    pub fn shard_for_key(&self, key: &K) -> usize {
        self.router.route(self.hasher.route_key(key))
    }

    /// The key's natural shard: the router's choice with hotspot diversion
    /// disabled. Depends only on the key and the routing strategy.
    pub fn natural_shard_for_key(&self, key: &K) -> usize {
        self.router.natural(self.hasher.route_key(key))
    }

    /// Insert or update a key-value pair.
    ///
    /// A key that already lives away from its natural shard is updated in
    /// place; a fresh insert goes to the routed shard, recording a redirect
    /// when routing diverted it from home. The redirect entry is written
    /// while the shard's write lock is still held, so a concurrent `get`
    /// that misses the natural shard will find the redirect.
    ///
    /// # Example
    ///
    /// ```rust
    /// use shardtree::ShardTree;
    ///
    /// let store = ShardTree::new();
    /// store.put(1u64, "value");
    /// store.put(1u64, "new_value"); // overwrite, size stays 1
    /// assert_eq!(store.len(), 1);
    /// ```
    pub fn put(&self, key: K, value: V) {
        let _barrier = self.barrier.read();
        let route = self.hasher.route_key(&key);
        let natural = self.router.natural(route);

        // A previously diverted key keeps living where it is.
        if let Some(resident) = self.redirects.lookup(&key) {
            let shard = &self.shards[resident];
            let mut tree = shard.tree_write();
            let fresh = tree.insert(key.clone(), Arc::new(value));
            shard.sync_len(&tree);
            if fresh {
                // The entry was removed since the redirect lookup; this
                // insert re-creates it here, so the redirect must stand.
                shard.record_write();
                self.router.record_insertion(resident);
                self.redirects.record_redirect(key, natural, resident);
            }
            return;
        }

        let actual = self.router.route(route);
        if actual == natural {
            let fresh = self.shards[natural].insert(key, Arc::new(value));
            if fresh {
                self.router.record_insertion(natural);
            }
            return;
        }

        // Diverted insert. The key may still be resident at home from
        // before the hotspot flared, and a second copy elsewhere would
        // break the one-shard-per-key invariant, so both shards are locked
        // (in index order) while the residence decision is made.
        let (lo, hi) = if natural < actual {
            (natural, actual)
        } else {
            (actual, natural)
        };
        let mut lo_tree = self.shards[lo].tree_write();
        let mut hi_tree = self.shards[hi].tree_write();
        let (nat_tree, act_tree) = if natural == lo {
            (&mut lo_tree, &mut hi_tree)
        } else {
            (&mut hi_tree, &mut lo_tree)
        };

        if nat_tree.contains(&key) {
            nat_tree.insert(key, Arc::new(value));
            self.shards[natural].sync_len(nat_tree);
            return;
        }

        let fresh = act_tree.insert(key.clone(), Arc::new(value));
        self.shards[actual].sync_len(act_tree);
        if fresh {
            self.shards[actual].record_write();
            self.router.record_insertion(actual);
        }
        self.redirects.record_redirect(key, natural, actual);
    }

    /// Probe order: routed shard, then the redirect target, then the
    /// natural shard. The last covers keys resident at home while routing
    /// is currently diverting away from it. Assumes the barrier is held.
    fn probe(&self, key: &K) -> Option<Arc<V>> {
        let route = self.hasher.route_key(key);
        let routed = self.router.route(route);
        if let Some(value) = self.shards[routed].get(key) {
            return Some(value);
        }

        let redirected = self.redirects.lookup(key);
        if let Some(target) = redirected {
            if target != routed {
                if let Some(value) = self.shards[target].get(key) {
                    return Some(value);
                }
            }
        }

        let natural = self.router.natural(route);
        if natural != routed && Some(natural) != redirected {
            if let Some(value) = self.shards[natural].get(key) {
                return Some(value);
            }
        }

        // Safety-net fan-out, debug only: the redirect invariant makes any
        // residence outside the probe set a bug. A concurrent diverted
        // insert may publish its redirect entry after our lookup above, so
        // re-check the index before treating a hit as a violation.
        #[cfg(debug_assertions)]
        for (i, shard) in self.shards.iter().enumerate() {
            if i == routed || Some(i) == redirected || i == natural {
                continue;
            }
            if shard.contains(key) {
                debug_assert_eq!(
                    self.redirects.lookup(key),
                    Some(i),
                    "key resident in shard {} with no redirect entry",
                    i
                );
            }
        }

        None
    }

    /// Look up a key, returning a shared handle to its value.
    ///
    /// # Example
    ///
    /// ```rust
    /// use shardtree::{Error, ShardTree};
    ///
    /// let store = ShardTree::new();
    /// store.put(1u64, "value");
    ///
    /// // value is Arc<&str>, clone is cheap
    /// assert_eq!(*store.get(&1).unwrap(), "value");
    /// assert_eq!(store.get(&2).unwrap_err(), Error::NotFound);
    /// ```
    pub fn get(&self, key: &K) -> Result<Arc<V>, Error> {
        let _barrier = self.barrier.read();
        self.probe(key).ok_or(Error::NotFound)
    }

    /// Whether the key is present.
    pub fn contains(&self, key: &K) -> bool {
        let _barrier = self.barrier.read();
        self.probe(key).is_some()
    }

    /// Remove a key. Returns whether it was present.
    ///
    /// Tries the routed shard, then the redirect target, then every
    /// remaining shard: removal must find the key wherever it resides.
    ///
    /// # Example
    ///
    /// ```rust
    /// use shardtree::ShardTree;
    ///
    /// let store = ShardTree::new();
    /// store.put(1u64, "value");
    /// assert!(store.remove(&1));
    /// assert!(!store.remove(&1));
    /// ```
    pub fn remove(&self, key: &K) -> bool {
        let _barrier = self.barrier.read();
        let route = self.hasher.route_key(key);
        let routed = self.router.route(route);
        let redirected = self.redirects.lookup(key);

        let try_shard = |idx: usize| -> bool {
            if self.shards[idx].remove(key) {
                self.router.record_removal(idx);
                self.redirects.remove(key);
                true
            } else {
                false
            }
        };

        if try_shard(routed) {
            return true;
        }
        if let Some(target) = redirected {
            if target != routed && try_shard(target) {
                return true;
            }
        }
        for idx in 0..self.shards.len() {
            if idx == routed || Some(idx) == redirected {
                continue;
            }
            if try_shard(idx) {
                return true;
            }
        }
        false
    }

    /// Total number of entries across all shards.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.len()).sum()
    }

    /// Whether the store has no entries.
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.is_empty())
    }

    /// Smallest key in the store.
    ///
    /// # Example
    ///
    /// ```rust
    /// use shardtree::{Error, ShardTree};
    ///
    /// let store = ShardTree::new();
    /// assert_eq!(store.min_key().unwrap_err(), Error::Empty);
    /// store.put(30u64, "c");
    /// store.put(10u64, "a");
    /// assert_eq!(store.min_key().unwrap(), 10);
    /// assert_eq!(store.max_key().unwrap(), 30);
    /// ```
    pub fn min_key(&self) -> Result<K, Error> {
        let _barrier = self.barrier.read();
        self.shards
            .iter()
            .filter_map(|shard| shard.min_key())
            .min()
            .ok_or(Error::Empty)
    }

    /// Largest key in the store.
    pub fn max_key(&self) -> Result<K, Error> {
        let _barrier = self.barrier.read();
        self.shards
            .iter()
            .filter_map(|shard| shard.max_key())
            .max()
            .ok_or(Error::Empty)
    }

    /// Remove all entries, redirects, and router load state.
    pub fn clear(&self) {
        let _barrier = self.barrier.write();
        for shard in &self.shards {
            shard.clear();
        }
        self.redirects.clear();
        self.reconcile_counts();
    }

    /// Per-shard entry counts. Use for imbalance detection.
    pub fn shard_loads(&self) -> Vec<usize> {
        self.shards.iter().map(|shard| shard.len()).collect()
    }

    /// Balance score in [0, 1] derived from the router's load counters:
    /// 1.0 is perfectly even, 0.0 is everything on one shard.
    pub fn balance_score(&self) -> f64 {
        self.router.balance_score()
    }

    /// Whether the balance score has fallen below the given threshold
    /// (0.7 is a reasonable default).
    pub fn should_rebalance(&self, threshold: f64) -> bool {
        self.balance_score() < threshold
    }

    /// Redistribute entries from overloaded shards to underloaded ones.
    /// Returns the number of entries migrated.
    ///
    /// Takes the barrier exclusively: all other operations queue for the
    /// duration. A shard is overloaded when its count exceeds
    /// `ratio_threshold` times the mean; entries drain from it in key
    /// order and spread round-robin over the shards below the mean,
    /// retiring each target as it fills to the mean. Migrated keys'
    /// redirect entries are refreshed, and the router's load counters are
    /// reconciled with the actual counts before the barrier drops.
    ///
    /// # Example
    ///
    /// ```rust
    /// use shardtree::ShardTree;
    ///
    /// let store = ShardTree::new();
    /// for i in 0..1000u64 {
    ///     store.put(i, i);
    /// }
    /// if store.should_rebalance(0.7) {
    ///     store.rebalance(2.0);
    /// }
    /// assert_eq!(store.len(), 1000);
    /// ```
    pub fn rebalance(&self, ratio_threshold: f64) -> usize {
        let _barrier = self.barrier.write();
        let n = self.shards.len();
        let counts: Vec<usize> = self.shards.iter().map(|shard| shard.len()).collect();
        let total: usize = counts.iter().sum();
        if total == 0 || n < 2 {
            self.reconcile_counts();
            return 0;
        }
        let mean = total as f64 / n as f64;

        let mut overloaded: Vec<usize> = (0..n)
            .filter(|&i| counts[i] as f64 > ratio_threshold * mean)
            .collect();
        overloaded.sort_by(|&a, &b| counts[b].cmp(&counts[a]));
        let mut underloaded: Vec<usize> =
            (0..n).filter(|&i| (counts[i] as f64) < mean).collect();

        let mut new_counts = counts;
        let mut migrated = 0usize;

        for &src in &overloaded {
            if underloaded.is_empty() {
                break;
            }
            let excess = (new_counts[src] as f64 - mean).round();
            if excess < 1.0 {
                continue;
            }
            let excess = excess as usize;

            // Drain the source in key order; the first `excess` entries
            // migrate, the rest go back.
            let src_shard = &self.shards[src];
            let mut moved: Vec<(K, Arc<V>)> = Vec::with_capacity(excess);
            {
                let mut tree = src_shard.tree_write();
                let mut drained = std::mem::take(&mut *tree).into_ordered_iter();
                for _ in 0..excess {
                    match drained.next() {
                        Some(entry) => moved.push(entry),
                        None => break,
                    }
                }
                for (key, value) in drained {
                    tree.insert(key, value);
                }
                src_shard.sync_len(&tree);
                new_counts[src] = tree.len();
            }

            let mut rr = 0usize;
            let mut last_dst = None;
            for (key, value) in moved {
                underloaded.retain(|&t| (new_counts[t] as f64) < mean);
                let dst = if underloaded.is_empty() {
                    // Every target has reached the mean; the remainder goes
                    // to the last target rather than back to the source.
                    last_dst.unwrap_or(src)
                } else {
                    if rr >= underloaded.len() {
                        rr = 0;
                    }
                    let d = underloaded[rr];
                    rr += 1;
                    last_dst = Some(d);
                    d
                };

                let dst_shard = &self.shards[dst];
                {
                    let mut tree = dst_shard.tree_write();
                    tree.insert(key.clone(), value);
                    dst_shard.sync_len(&tree);
                    new_counts[dst] = tree.len();
                }
                if dst != src {
                    migrated += 1;
                }

                let natural = self.router.natural(self.hasher.route_key(&key));
                if natural == dst {
                    self.redirects.remove(&key);
                } else {
                    self.redirects.record_redirect(key, natural, dst);
                }
            }
        }

        self.reconcile_counts();
        migrated
    }

    /// Reconcile router load counters with actual shard counts. Callers
    /// must hold the barrier.
    fn reconcile_counts(&self) {
        let counts: Vec<u64> = self.shards.iter().map(|shard| shard.len() as u64).collect();
        self.router.reconcile(&counts);
    }

    /// Prune redirect entries whose key now routes naturally to where it
    /// lives. Returns the number of entries removed.
    pub fn gc_redirects(&self) -> usize {
        let _barrier = self.barrier.read();
        self.redirects
            .gc_expired(|key| self.router.natural(self.hasher.route_key(key)))
    }

    /// Redirect-index statistics snapshot.
    pub fn redirect_stats(&self) -> RedirectStats {
        self.redirects.stats()
    }

    /// Get basic statistics about the store and its shards.
    pub fn stats(&self) -> Stats {
        let shard_sizes = self.shard_loads();
        let operations: Vec<ShardOps> = self.shards.iter().map(|shard| shard.stats()).collect();
        let size: usize = shard_sizes.iter().sum();

        Stats {
            size,
            shard_sizes,
            operations,
        }
    }

    /// Structured diagnostics snapshot: per-shard state, routing strategy,
    /// balance score, and hotspot flags.
    pub fn diagnostics(&self) -> Diagnostics {
        let loads = self.router.loads();
        let flags = self.router.hotspot_flags();
        let shards: Vec<ShardDiagnostics> = self
            .shards
            .iter()
            .enumerate()
            .map(|(i, shard)| {
                let ops = shard.stats();
                ShardDiagnostics {
                    entries: shard.len(),
                    router_load: loads[i],
                    hotspot: flags[i],
                    reads: ops.reads,
                    writes: ops.writes,
                    removes: ops.removes,
                }
            })
            .collect();
        let total_entries: usize = shards.iter().map(|s| s.entries).sum();
        let n = self.shards.len() as f64;
        let avg_load_per_shard = total_entries as f64 / n;
        let max_load = shards.iter().map(|s| s.entries).max().unwrap_or(0) as f64;
        let max_load_ratio = if avg_load_per_shard > 0.0 {
            max_load / avg_load_per_shard
        } else {
            1.0
        };

        Diagnostics {
            total_entries,
            shards,
            strategy: self.router.strategy_name(),
            avg_load_per_shard,
            max_load_ratio,
            balance_score: self.router.balance_score(),
            has_hotspot: self.router.has_hotspot(),
            redirected_keys: self.redirects.len(),
        }
    }

    /// Create a snapshot-based iterator over all key-value pairs.
    ///
    /// Captures the current state under the barrier, then iterates over
    /// the captured entries (in key order within each shard). Concurrent
    /// modifications made after the snapshot are not visible.
    ///
    /// # Example
    ///
    /// ```rust
    /// use shardtree::ShardTree;
    ///
    /// let store = ShardTree::new();
    /// store.put(1u64, "a");
    /// store.put(2u64, "b");
    ///
    /// let mut count = 0;
    /// for (_key, _value) in store.iter_snapshot() {
    ///     count += 1;
    /// }
    /// assert_eq!(count, 2);
    /// ```
    pub fn iter_snapshot(&self) -> crate::iter::SnapshotIter<K, V> {
        let _barrier = self.barrier.read();
        crate::iter::SnapshotIter::new(&self.shards)
    }

    /// Verify every shard's tree invariants, the shard length mirrors, and
    /// redirect-index consistency (each entry's key must be resident in the
    /// recorded shard, which must differ from the key's natural shard).
    ///
    /// Quiesces the store via the exclusive barrier. Intended for tests
    /// and debugging.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let _barrier = self.barrier.write();

        for (i, shard) in self.shards.iter().enumerate() {
            let tree = shard.tree_read();
            tree.check_invariants()?;
            if tree.len() != shard.len() {
                return Err(InvariantError::new(format!(
                    "shard {} counter {} disagrees with tree length {}",
                    i,
                    shard.len(),
                    tree.len()
                )));
            }
        }

        let mut entries = Vec::new();
        self.redirects.for_each(|key, target| {
            entries.push((key.clone(), target));
        });
        for (key, target) in entries {
            if target >= self.shards.len() {
                return Err(InvariantError::new(format!(
                    "redirect points to nonexistent shard {}",
                    target
                )));
            }
            if !self.shards[target].contains(&key) {
                return Err(InvariantError::new(format!(
                    "redirect target shard {} does not hold its key",
                    target
                )));
            }
            let natural = self.router.natural(self.hasher.route_key(&key));
            if natural == target {
                return Err(InvariantError::new(format!(
                    "redirect to shard {} equals the key's natural shard",
                    target
                )));
            }
        }

        Ok(())
    }
}

impl<K, V> Default for ShardTree<K, V>
where
    K: Ord + Hash + RangeKey + Clone + Send + Sync,
    V: Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}
